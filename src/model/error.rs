//! 配置错误
//!
//! 运行开始前检测，唯一会中止运行的错误类别。

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("虚拟用户数必须为正整数")]
    NoVirtualUsers,

    #[error("场景至少需要一个请求")]
    NoRequests,

    #[error("无效的时长 {field}: '{value}'")]
    InvalidDuration { field: String, value: String },

    #[error("迭代次数必须为正整数")]
    NoIterations,

    #[error("无效的 HTTP 方法: {0}")]
    InvalidMethod(String),

    #[error("无效的 URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("无效的请求头 '{name}'")]
    InvalidHeader { name: String },

    #[error("请求 '{request}' 的 tag 为空")]
    EmptyTag { request: String },

    #[error("阈值 '{key}' 引用了不存在的 tag '{tag}'")]
    UnknownThresholdTag { key: String, tag: String },

    #[error("无效的阈值表达式 {key}: '{expression}' ({reason})")]
    InvalidThreshold {
        key: String,
        expression: String,
        reason: String,
    },
}
