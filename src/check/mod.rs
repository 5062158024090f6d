//! 响应校验模块
//!
//! 检查项是具名的纯谓词，作用于响应记录或其解析后的响应体。
//! 响应体最多解析一次；解析失败得到 `ParsedBody::Malformed`，
//! 依赖响应体的检查项对其确定性地判为失败，而不是报错。

mod path;
mod rejection;

pub use path::{is_truthy, lookup};
pub use rejection::{Acceptance, RejectionRule};

use std::cell::OnceCell;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::executor::ResponseRecord;

/// 响应体解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(Value),
    /// 无响应体、传输失败或非 JSON
    Malformed,
}

impl ParsedBody {
    fn parse(record: &ResponseRecord) -> Self {
        if record.is_transport_error() || record.body.is_empty() {
            return Self::Malformed;
        }
        match serde_json::from_slice(&record.body) {
            Ok(value) => Self::Json(value),
            Err(e) => {
                tracing::trace!("响应体不是合法 JSON ({}): {}", record.tag, e);
                Self::Malformed
            }
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Malformed => None,
        }
    }
}

/// 单条响应的检查上下文（缓存解析结果）
pub struct CheckContext<'a> {
    record: &'a ResponseRecord,
    parsed: OnceCell<ParsedBody>,
}

impl<'a> CheckContext<'a> {
    pub fn new(record: &'a ResponseRecord) -> Self {
        Self {
            record,
            parsed: OnceCell::new(),
        }
    }

    pub fn record(&self) -> &'a ResponseRecord {
        self.record
    }

    /// 解析后的响应体（首次调用时解析）
    pub fn body(&self) -> &ParsedBody {
        self.parsed.get_or_init(|| ParsedBody::parse(self.record))
    }

    /// 按路径取 JSON 子值，响应体无法解析时为 None
    fn json_at(&self, path: &str) -> Option<&Value> {
        self.body().as_json().and_then(|value| lookup(value, path))
    }
}

/// 检查谓词
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CheckKind {
    /// 状态码等于给定值
    Status { equals: u16 },
    /// 响应头（大小写不敏感）包含子串
    HeaderContains { header: String, contains: String },
    /// 路径处是数组
    IsArray {
        #[serde(default)]
        path: String,
    },
    /// 路径处是长度不小于 `min` 的数组
    ArrayMinLen {
        #[serde(default)]
        path: String,
        min: usize,
    },
    /// 路径处数组中存在元素，其 `field` 等于 `any_of` 之一
    ArrayAnyEquals {
        #[serde(default)]
        path: String,
        #[serde(default)]
        field: String,
        any_of: Vec<Value>,
    },
    /// 路径存在且不为 null
    Exists { path: String },
    /// 负向请求被正确拒绝
    Rejected(RejectionRule),
}

impl CheckKind {
    pub fn evaluate(&self, ctx: &CheckContext<'_>) -> bool {
        let record = ctx.record();
        match self {
            Self::Status { equals } => !record.is_transport_error() && record.status == *equals,
            Self::HeaderContains { header, contains } => record
                .headers
                .get(header.as_str())
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.contains(contains.as_str())),
            Self::IsArray { path } => ctx.json_at(path).is_some_and(Value::is_array),
            Self::ArrayMinLen { path, min } => ctx
                .json_at(path)
                .and_then(Value::as_array)
                .is_some_and(|items| items.len() >= *min),
            Self::ArrayAnyEquals {
                path,
                field,
                any_of,
            } => ctx
                .json_at(path)
                .and_then(Value::as_array)
                .is_some_and(|items| {
                    items
                        .iter()
                        .filter_map(|item| lookup(item, field))
                        .any(|v| any_of.contains(v))
                }),
            Self::Exists { path } => ctx.json_at(path).is_some_and(|v| !v.is_null()),
            Self::Rejected(rule) => rule.decide(ctx).is_accepted(),
        }
    }
}

/// 具名检查项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    #[serde(flatten)]
    pub kind: CheckKind,
}

/// 检查结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub tag: String,
}

/// 按顺序对一条响应执行全部检查项
pub fn run_checks(record: &ResponseRecord, checks: &[Check]) -> Vec<CheckResult> {
    let ctx = CheckContext::new(record);
    checks
        .iter()
        .map(|check| CheckResult {
            name: check.name.clone(),
            passed: check.kind.evaluate(&ctx),
            tag: record.tag.clone(),
        })
        .collect()
}
