//! 请求执行模块
//!
//! 每次调用发出一个请求并返回归一化的 `ResponseRecord`。
//! 传输失败是数据而非错误：记录带错误标记、状态码 0、空响应体。

mod http_executor;

pub use http_executor::HttpExecutor;

use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use http::HeaderMap;
use serde::Serialize;

use crate::model::scenario::RequestSpec;

/// 传输错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    Timeout,
    /// 连接被拒绝、DNS 失败、主机不可达
    Connect,
    /// 响应体读取失败或响应格式错误
    Body,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Body => "body",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// 传输错误
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

/// 归一化的响应记录
#[derive(Debug, Clone)]
pub struct ResponseRecord {
    /// 传输失败时为 0
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub elapsed: Duration,
    pub tag: String,
    pub error: Option<TransportError>,
}

impl ResponseRecord {
    /// 构造传输失败的记录
    pub fn transport_failure(
        tag: impl Into<String>,
        elapsed: Duration,
        kind: TransportErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status: 0,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            elapsed,
            tag: tag.into(),
            error: Some(TransportError {
                kind,
                message: message.into(),
            }),
        }
    }

    pub fn is_transport_error(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
impl ResponseRecord {
    /// 测试用：带 JSON Content-Type 的响应
    pub fn for_test(status: u16, body: &str) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json; charset=utf-8"),
        );
        Self {
            status,
            headers,
            body: Bytes::from(body.to_string()),
            elapsed: Duration::from_millis(10),
            tag: "test".to_string(),
            error: None,
        }
    }

    /// 测试用：连接失败的响应
    pub fn for_test_transport_error() -> Self {
        Self::transport_failure(
            "test",
            Duration::from_millis(1),
            TransportErrorKind::Connect,
            "connection refused",
        )
    }
}

/// 请求执行器
///
/// 实现方不得返回错误或 panic：任何失败都要折叠为带错误标记的记录。
#[async_trait::async_trait]
pub trait RequestExecutor: Send + Sync {
    async fn execute(&self, spec: &RequestSpec) -> ResponseRecord;
}
