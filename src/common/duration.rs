//! k6 风格的时长字符串解析
//!
//! 支持 `500ms`、`10s`、`2m`、`1h`，以及不带单位的毫秒数。

use std::time::Duration;

/// 解析时长字符串
///
/// 负数、空串、未知单位均返回 `None`，由调用方转换为配置错误。
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() || s.starts_with('-') {
        return None;
    }

    let (number, unit_ms) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1_000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60_000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 3_600_000)
    } else {
        (s, 1)
    };

    let value: u64 = number.trim().parse().ok()?;
    value.checked_mul(unit_ms).map(Duration::from_millis)
}

/// 将时长格式化为简短字符串（用于日志和报告）
pub fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms == 0 {
        "0s".to_string()
    } else if ms % 3_600_000 == 0 {
        format!("{}h", ms / 3_600_000)
    } else if ms % 60_000 == 0 {
        format!("{}m", ms / 60_000)
    } else if ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{}ms", ms)
    }
}
