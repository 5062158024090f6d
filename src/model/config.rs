use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::check::Check;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum TlsBackend {
    #[default]
    Rustls,
    NativeTls,
}

/// HTTP 客户端配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// HTTP 代理地址（可选）
    /// 支持格式: http://host:port, https://host:port, socks5://host:port
    #[serde(default)]
    pub proxy_url: Option<String>,

    #[serde(default)]
    pub tls_backend: TlsBackend,

    /// 默认 User-Agent（请求级 headers 可覆盖）
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// 阈值表达式，支持单个、列表或带选项的写法
///
/// ```json
/// "http_req_duration": "p(95)<1500"
/// "http_req_failed{req:positive}": ["rate<0.08"]
/// "http_req_duration{req:negative}": {"expressions": ["max<3000"], "requireSamples": false}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdExprs {
    One(String),
    Many(Vec<String>),
    Detailed {
        expressions: Vec<String>,
        #[serde(default = "default_require_samples", rename = "requireSamples")]
        require_samples: bool,
    },
}

impl ThresholdExprs {
    pub fn expressions(&self) -> Vec<&str> {
        match self {
            Self::One(e) => vec![e.as_str()],
            Self::Many(list) | Self::Detailed { expressions: list, .. } => {
                list.iter().map(String::as_str).collect()
            }
        }
    }

    pub fn require_samples(&self) -> bool {
        match self {
            Self::Detailed { require_samples, .. } => *require_samples,
            _ => default_require_samples(),
        }
    }
}

fn default_require_samples() -> bool {
    true
}

/// 请求体配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum BodyConfig {
    /// 原始文本
    Raw {
        content: String,
        #[serde(default)]
        content_type: Option<String>,
    },
    /// JSON 请求体
    Json { content: serde_json::Value },
    /// GraphQL 信封 `{query, variables}`
    Graphql {
        query: String,
        #[serde(default)]
        variables: Option<serde_json::Value>,
    },
}

/// 单个请求配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// 请求名称（用于日志，缺省时使用 `方法 URL`）
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default = "default_method")]
    pub method: String,

    pub url: String,

    /// 指标分桶标签
    #[serde(default = "default_tag")]
    pub tag: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// 追加到 URL 的查询参数
    #[serde(default)]
    pub query: BTreeMap<String, String>,

    #[serde(default)]
    pub body: Option<BodyConfig>,

    /// 单请求超时
    #[serde(default = "default_timeout")]
    pub timeout: String,

    /// 视为成功样本的状态码（未配置时为 200-399）
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_statuses: Option<Vec<u16>>,

    #[serde(default)]
    pub checks: Vec<Check>,
}

/// 场景配置文件
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,

    /// 虚拟用户数
    #[serde(default = "default_vus")]
    pub vus: u32,

    /// 运行时长（可选）
    #[serde(default)]
    pub duration: Option<String>,

    /// 每个虚拟用户的迭代次数（可选）
    #[serde(default)]
    pub iterations: Option<u64>,

    /// 迭代间隔
    #[serde(default = "default_think_time")]
    pub think_time: String,

    /// 阈值：指标键 -> 表达式
    #[serde(default)]
    pub thresholds: BTreeMap<String, ThresholdExprs>,

    #[serde(default)]
    pub requests: Vec<RequestConfig>,

    #[serde(default)]
    pub client: ClientConfig,

    /// 配置文件路径（运行时元数据，不写入 JSON）
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

fn default_name() -> String {
    "default".to_string()
}

fn default_vus() -> u32 {
    1
}

fn default_think_time() -> String {
    "0s".to_string()
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_tag() -> String {
    "default".to_string()
}

fn default_timeout() -> String {
    "60s".to_string()
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            vus: default_vus(),
            duration: None,
            iterations: None,
            think_time: default_think_time(),
            thresholds: BTreeMap::new(),
            requests: Vec::new(),
            client: ClientConfig::default(),
            config_path: None,
        }
    }
}

impl ScenarioConfig {
    /// 从文件加载场景配置
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取场景文件失败: {}", path.display()))?;
        let mut config: ScenarioConfig = serde_json::from_str(&content)
            .with_context(|| format!("解析场景文件失败: {}", path.display()))?;
        config.config_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// 获取配置文件路径（如果有）
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }
}
