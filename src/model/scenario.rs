//! 已校验的场景
//!
//! `ScenarioConfig` 在运行前经 `Scenario::from_config` 转换为不可变的 `Scenario`，
//! 所有配置错误都在这一步暴露。

use std::collections::BTreeSet;
use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Url};

use super::config::{BodyConfig, ClientConfig, RequestConfig, ScenarioConfig};
use super::error::ConfigError;
use crate::check::Check;
use crate::common::duration::parse_duration;
use crate::threshold::Threshold;

/// 请求体
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Raw {
        bytes: Bytes,
        content_type: Option<String>,
    },
    Json(serde_json::Value),
    GraphQl {
        query: String,
        variables: Option<serde_json::Value>,
    },
}

/// 单个请求规格（不可变）
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub name: String,
    pub method: Method,
    /// 已合并查询参数的完整 URL
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
    pub timeout: Duration,
    pub tag: String,
    pub checks: Vec<Check>,
    expected_statuses: Option<Vec<u16>>,
}

impl RequestSpec {
    /// 状态码是否计为成功样本（默认 200-399）
    pub fn is_expected_status(&self, status: u16) -> bool {
        match &self.expected_statuses {
            Some(list) => list.contains(&status),
            None => (200..400).contains(&status),
        }
    }

    fn from_config(config: &RequestConfig) -> Result<Self, ConfigError> {
        let method = Method::from_bytes(config.method.trim().to_ascii_uppercase().as_bytes())
            .map_err(|_| ConfigError::InvalidMethod(config.method.clone()))?;

        let mut url = Url::parse(&config.url).map_err(|e| ConfigError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: config.url.clone(),
                reason: format!("不支持的协议: {}", url.scheme()),
            });
        }
        if !config.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &config.query {
                pairs.append_pair(key, value);
            }
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &config.headers {
            let invalid = || ConfigError::InvalidHeader { name: name.clone() };
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.insert(header_name, header_value);
        }

        let body = match &config.body {
            None => RequestBody::Empty,
            Some(BodyConfig::Raw {
                content,
                content_type,
            }) => RequestBody::Raw {
                bytes: Bytes::from(content.clone()),
                content_type: content_type.clone(),
            },
            Some(BodyConfig::Json { content }) => RequestBody::Json(content.clone()),
            Some(BodyConfig::Graphql { query, variables }) => RequestBody::GraphQl {
                query: query.clone(),
                variables: variables.clone(),
            },
        };

        let name = config
            .name
            .clone()
            .unwrap_or_else(|| format!("{} {}", method, url));

        let tag = config.tag.trim().to_string();
        if tag.is_empty() {
            return Err(ConfigError::EmptyTag { request: name });
        }

        let timeout = parse_duration(&config.timeout)
            .filter(|d| !d.is_zero())
            .ok_or_else(|| ConfigError::InvalidDuration {
                field: format!("{}.timeout", name),
                value: config.timeout.clone(),
            })?;

        Ok(Self {
            name,
            method,
            url,
            headers,
            body,
            timeout,
            tag,
            checks: config.checks.clone(),
            expected_statuses: config.expected_statuses.clone(),
        })
    }
}

/// 不可变的场景
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub vus: u32,
    pub duration: Option<Duration>,
    /// 每个虚拟用户的迭代上限
    pub iterations: Option<u64>,
    pub think_time: Duration,
    pub requests: Vec<RequestSpec>,
    pub thresholds: Vec<Threshold>,
    pub client: ClientConfig,
}

impl Scenario {
    /// 校验配置并构建场景
    pub fn from_config(config: &ScenarioConfig) -> Result<Self, ConfigError> {
        if config.vus == 0 {
            return Err(ConfigError::NoVirtualUsers);
        }
        if config.requests.is_empty() {
            return Err(ConfigError::NoRequests);
        }

        let duration = config
            .duration
            .as_deref()
            .map(|value| {
                parse_duration(value)
                    .filter(|d| !d.is_zero())
                    .ok_or_else(|| ConfigError::InvalidDuration {
                        field: "duration".to_string(),
                        value: value.to_string(),
                    })
            })
            .transpose()?;

        if config.iterations == Some(0) {
            return Err(ConfigError::NoIterations);
        }
        // 两个边界都未配置时，每个虚拟用户执行一次迭代
        let iterations = match (duration, config.iterations) {
            (None, None) => Some(1),
            (_, iterations) => iterations,
        };

        let think_time =
            parse_duration(&config.think_time).ok_or_else(|| ConfigError::InvalidDuration {
                field: "thinkTime".to_string(),
                value: config.think_time.clone(),
            })?;

        let requests = config
            .requests
            .iter()
            .map(RequestSpec::from_config)
            .collect::<Result<Vec<_>, _>>()?;

        let known_tags: BTreeSet<&str> = requests.iter().map(|r| r.tag.as_str()).collect();

        let mut thresholds = Vec::new();
        for (key, exprs) in &config.thresholds {
            for expression in exprs.expressions() {
                let threshold = Threshold::parse(key, expression, exprs.require_samples())?;
                if let Some(tag) = &threshold.tag {
                    if !known_tags.contains(tag.as_str()) {
                        return Err(ConfigError::UnknownThresholdTag {
                            key: key.clone(),
                            tag: tag.clone(),
                        });
                    }
                }
                thresholds.push(threshold);
            }
        }

        Ok(Self {
            name: config.name.clone(),
            vus: config.vus,
            duration,
            iterations,
            think_time,
            requests,
            thresholds,
            client: config.client.clone(),
        })
    }

    /// 场景中出现的全部 tag（去重、有序）
    pub fn tags(&self) -> BTreeSet<&str> {
        self.requests.iter().map(|r| r.tag.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config(value: serde_json::Value) -> ScenarioConfig {
        serde_json::from_value(value).unwrap()
    }

    fn base() -> serde_json::Value {
        json!({
            "name": "smoke",
            "vus": 3,
            "duration": "5s",
            "thinkTime": "1s",
            "requests": [{
                "url": "https://restcountries.com/v3.1/all",
                "query": {"fields": "name,region"},
                "headers": {"Accept": "application/json", "Cache-Control": "no-cache"},
                "timeout": "10s",
                "tag": "positive"
            }]
        })
    }

    #[test]
    fn test_valid_scenario() {
        let scenario = Scenario::from_config(&config(base())).unwrap();

        assert_eq!(scenario.vus, 3);
        assert_eq!(scenario.duration, Some(Duration::from_secs(5)));
        assert_eq!(scenario.iterations, None);
        assert_eq!(scenario.think_time, Duration::from_secs(1));

        let request = &scenario.requests[0];
        assert_eq!(request.method, Method::GET);
        assert_eq!(
            request.url.as_str(),
            "https://restcountries.com/v3.1/all?fields=name%2Cregion"
        );
        assert_eq!(request.headers["accept"], "application/json");
        assert_eq!(request.timeout, Duration::from_secs(10));
        assert_eq!(request.body, RequestBody::Empty);
        assert_eq!(scenario.tags().into_iter().collect::<Vec<_>>(), vec!["positive"]);
    }

    #[test]
    fn test_no_bounds_defaults_to_single_iteration() {
        let mut value = base();
        value.as_object_mut().unwrap().remove("duration");
        let scenario = Scenario::from_config(&config(value)).unwrap();

        assert_eq!(scenario.duration, None);
        assert_eq!(scenario.iterations, Some(1));
    }

    #[test]
    fn test_zero_vus_rejected() {
        let mut value = base();
        value["vus"] = json!(0);
        let err = Scenario::from_config(&config(value)).unwrap_err();
        assert_eq!(err, ConfigError::NoVirtualUsers);
    }

    #[test]
    fn test_negative_duration_rejected() {
        let mut value = base();
        value["duration"] = json!("-5s");
        let err = Scenario::from_config(&config(value)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidDuration { ref field, .. } if field == "duration"));
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let mut value = base();
        value["iterations"] = json!(0);
        let err = Scenario::from_config(&config(value)).unwrap_err();
        assert_eq!(err, ConfigError::NoIterations);
    }

    #[test]
    fn test_empty_requests_rejected() {
        let mut value = base();
        value["requests"] = json!([]);
        let err = Scenario::from_config(&config(value)).unwrap_err();
        assert_eq!(err, ConfigError::NoRequests);
    }

    #[test]
    fn test_threshold_with_unknown_tag_rejected() {
        let mut value = base();
        value["thresholds"] = json!({"http_req_failed{req:negative}": ["rate<0.02"]});
        let err = Scenario::from_config(&config(value)).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownThresholdTag {
                key: "http_req_failed{req:negative}".to_string(),
                tag: "negative".to_string(),
            }
        );
    }

    #[test]
    fn test_thresholds_parsed() {
        let mut value = base();
        value["thresholds"] = json!({
            "http_req_duration": ["p(95)<1500"],
            "http_req_failed{req:positive}": "rate<0.02"
        });
        let scenario = Scenario::from_config(&config(value)).unwrap();
        assert_eq!(scenario.thresholds.len(), 2);
    }

    #[test]
    fn test_invalid_request_fields_rejected() {
        let mut value = base();
        value["requests"][0]["url"] = json!("ftp://example.com");
        assert!(matches!(
            Scenario::from_config(&config(value)),
            Err(ConfigError::InvalidUrl { .. })
        ));

        let mut value = base();
        value["requests"][0]["method"] = json!("GE T");
        assert!(matches!(
            Scenario::from_config(&config(value)),
            Err(ConfigError::InvalidMethod(_))
        ));

        let mut value = base();
        value["requests"][0]["headers"] = json!({"Bad Header": "x"});
        assert!(matches!(
            Scenario::from_config(&config(value)),
            Err(ConfigError::InvalidHeader { .. })
        ));

        let mut value = base();
        value["requests"][0]["tag"] = json!("  ");
        assert!(matches!(
            Scenario::from_config(&config(value)),
            Err(ConfigError::EmptyTag { .. })
        ));
    }

    #[test]
    fn test_expected_statuses() {
        let mut value = base();
        let scenario = Scenario::from_config(&config(value.clone())).unwrap();
        assert!(scenario.requests[0].is_expected_status(200));
        assert!(scenario.requests[0].is_expected_status(302));
        assert!(!scenario.requests[0].is_expected_status(400));
        assert!(!scenario.requests[0].is_expected_status(0));

        value["requests"][0]["expectedStatuses"] = json!([200, 400]);
        let scenario = Scenario::from_config(&config(value)).unwrap();
        assert!(scenario.requests[0].is_expected_status(400));
        assert!(!scenario.requests[0].is_expected_status(302));
    }
}
