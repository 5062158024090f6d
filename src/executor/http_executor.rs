//! 基于 reqwest 的请求执行器

use std::time::Instant;

use reqwest::Client;
use serde::Serialize;

use super::{RequestExecutor, ResponseRecord, TransportErrorKind};
use crate::common::body_preview;
use crate::model::scenario::{RequestBody, RequestSpec};

/// GraphQL 请求信封
#[derive(Serialize)]
struct GraphQlEnvelope<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<&'a serde_json::Value>,
}

/// HTTP 请求执行器（所有虚拟用户共享同一连接池）
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
}

impl HttpExecutor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn classify(e: &reqwest::Error) -> TransportErrorKind {
        if e.is_timeout() {
            TransportErrorKind::Timeout
        } else if e.is_connect() {
            TransportErrorKind::Connect
        } else if e.is_body() || e.is_decode() {
            TransportErrorKind::Body
        } else {
            TransportErrorKind::Other
        }
    }

    fn failure(spec: &RequestSpec, start: Instant, e: reqwest::Error) -> ResponseRecord {
        let kind = Self::classify(&e);
        tracing::warn!("请求失败 [{}] {}: {} ({})", spec.tag, spec.name, kind, e);
        ResponseRecord::transport_failure(spec.tag.clone(), start.elapsed(), kind, e.to_string())
    }
}

#[async_trait::async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, spec: &RequestSpec) -> ResponseRecord {
        let mut request = self
            .client
            .request(spec.method.clone(), spec.url.clone())
            .headers(spec.headers.clone())
            .timeout(spec.timeout);

        request = match &spec.body {
            RequestBody::Empty => request,
            RequestBody::Raw {
                bytes,
                content_type,
            } => {
                if let Some(content_type) = content_type {
                    request = request.header(reqwest::header::CONTENT_TYPE, content_type);
                }
                request.body(bytes.clone())
            }
            // json() 仅在未显式设置 Content-Type 时补充 application/json
            RequestBody::Json(value) => request.json(value),
            RequestBody::GraphQl { query, variables } => request.json(&GraphQlEnvelope {
                query,
                variables: variables.as_ref(),
            }),
        };

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return Self::failure(spec, start, e),
        };

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return Self::failure(spec, start, e),
        };
        let elapsed = start.elapsed();

        tracing::debug!(
            "[{}] {} -> {} ({}ms, {} bytes): {}",
            spec.tag,
            spec.name,
            status,
            elapsed.as_millis(),
            body.len(),
            body_preview(&body)
        );

        ResponseRecord {
            status,
            headers,
            body,
            elapsed,
            tag: spec.tag.clone(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::build_client;
    use crate::model::config::{ClientConfig, ScenarioConfig};
    use crate::model::scenario::Scenario;
    use crate::testing::spawn_mock_target;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use std::time::Duration;

    fn executor() -> HttpExecutor {
        HttpExecutor::new(build_client(&ClientConfig::default(), 4).unwrap())
    }

    fn spec(request: Value) -> RequestSpec {
        let config: ScenarioConfig =
            serde_json::from_value(json!({ "requests": [request] })).unwrap();
        Scenario::from_config(&config).unwrap().requests.remove(0)
    }

    #[tokio::test]
    async fn test_connection_refused_is_recorded_not_raised() {
        // 绑定后立即释放端口，确保无人监听
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let spec = spec(json!({"url": format!("http://{}/", addr), "tag": "positive"}));
        let record = executor().execute(&spec).await;

        assert!(record.is_transport_error());
        assert_eq!(record.status, 0);
        assert!(record.body.is_empty());
        assert_eq!(record.tag, "positive");
        assert_eq!(record.error.unwrap().kind, TransportErrorKind::Connect);
    }

    #[tokio::test]
    async fn test_timeout_is_recorded_not_raised() {
        let app = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                "late"
            }),
        );
        let addr = spawn_mock_target(app).await;

        let spec = spec(json!({"url": format!("http://{}/slow", addr), "timeout": "50ms"}));
        let record = executor().execute(&spec).await;

        assert!(record.is_transport_error());
        assert_eq!(record.status, 0);
        assert_eq!(record.error.unwrap().kind, TransportErrorKind::Timeout);
        assert!(record.elapsed < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_get_with_custom_headers_and_query() {
        let app = Router::new().route(
            "/all",
            get(
                |headers: HeaderMap, axum::extract::RawQuery(query): axum::extract::RawQuery| async move {
                    let accept = headers
                        .get("accept")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    let cache = headers
                        .get("cache-control")
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or_default()
                        .to_string();
                    axum::Json(json!({"accept": accept, "cache": cache, "query": query}))
                },
            ),
        );
        let addr = spawn_mock_target(app).await;

        let spec = spec(json!({
            "url": format!("http://{}/all", addr),
            "query": {"fields": "name"},
            "headers": {"Accept": "application/json", "Cache-Control": "no-cache"}
        }));
        let record = executor().execute(&spec).await;

        assert!(!record.is_transport_error());
        assert_eq!(record.status, 200);
        let body: Value = serde_json::from_slice(&record.body).unwrap();
        assert_eq!(body["accept"], "application/json");
        assert_eq!(body["cache"], "no-cache");
        assert_eq!(body["query"], "fields=name");
    }

    #[tokio::test]
    async fn test_graphql_envelope_posted_as_json() {
        let app = Router::new().route(
            "/graphql",
            post(|headers: HeaderMap, axum::Json(payload): axum::Json<Value>| async move {
                let content_type = headers
                    .get("content-type")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                (StatusCode::OK, axum::Json(json!({"echo": payload, "contentType": content_type})))
            }),
        );
        let addr = spawn_mock_target(app).await;

        let spec = spec(json!({
            "url": format!("http://{}/graphql", addr),
            "method": "POST",
            "body": {"type": "graphql", "query": "query ($page: Int!) { characters(page: $page) { results { name } } }", "variables": {"page": 1}}
        }));
        let record = executor().execute(&spec).await;

        assert_eq!(record.status, 200);
        let body: Value = serde_json::from_slice(&record.body).unwrap();
        assert_eq!(body["contentType"], "application/json");
        assert_eq!(body["echo"]["variables"]["page"], 1);
        assert!(body["echo"]["query"].as_str().unwrap().contains("characters"));
    }

    #[tokio::test]
    async fn test_error_status_is_a_normal_record() {
        let app = Router::new().route(
            "/graphql",
            post(|| async { (StatusCode::BAD_REQUEST, "bad query") }),
        );
        let addr = spawn_mock_target(app).await;

        let spec = spec(json!({
            "url": format!("http://{}/graphql", addr),
            "method": "POST",
            "body": {"type": "graphql", "query": "query { nopeField }"}
        }));
        let record = executor().execute(&spec).await;

        assert!(!record.is_transport_error());
        assert_eq!(record.status, 400);
        assert_eq!(&record.body[..], b"bad query");
    }
}
