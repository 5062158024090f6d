//! 负向请求的判定表
//!
//! 故意构造的非法请求被服务端正确拒绝，可能有两种信号：
//!
//! | 条件                                   | 结果              |
//! |----------------------------------------|-------------------|
//! | 传输层错误                             | `NotRejected`     |
//! | 状态码在预期的客户端错误列表中         | `RejectedByStatus`|
//! | 2xx 且响应体的错误字段为真值           | `ErrorPayload`    |
//! | 其他（含响应体无法解析）               | `NotRejected`     |

use serde::{Deserialize, Serialize};

use super::path::{is_truthy, lookup};
use super::{CheckContext, ParsedBody};

/// 判定结果（附带命中的分支）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptance {
    RejectedByStatus,
    ErrorPayload,
    NotRejected,
}

impl Acceptance {
    pub fn is_accepted(&self) -> bool {
        !matches!(self, Self::NotRejected)
    }
}

/// 负向请求规则
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectionRule {
    /// 视为"已拒绝"的状态码
    #[serde(default = "default_statuses")]
    pub statuses: Vec<u16>,
    /// 2xx 响应中承载错误的字段路径
    #[serde(default = "default_error_field")]
    pub error_field: String,
}

fn default_statuses() -> Vec<u16> {
    vec![400]
}

fn default_error_field() -> String {
    "errors".to_string()
}

impl Default for RejectionRule {
    fn default() -> Self {
        Self {
            statuses: default_statuses(),
            error_field: default_error_field(),
        }
    }
}

impl RejectionRule {
    pub fn decide(&self, ctx: &CheckContext<'_>) -> Acceptance {
        let record = ctx.record();
        if record.is_transport_error() {
            return Acceptance::NotRejected;
        }
        if self.statuses.contains(&record.status) {
            return Acceptance::RejectedByStatus;
        }
        if !(200..300).contains(&record.status) {
            return Acceptance::NotRejected;
        }

        match ctx.body() {
            ParsedBody::Json(value) => match lookup(value, &self.error_field) {
                Some(errors) if is_truthy(errors) => Acceptance::ErrorPayload,
                _ => Acceptance::NotRejected,
            },
            ParsedBody::Malformed => Acceptance::NotRejected,
        }
    }
}
