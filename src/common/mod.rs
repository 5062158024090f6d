//! 公共工具模块

pub mod duration;

use std::borrow::Cow;

/// 日志中响应体预览的最大字节数
pub const BODY_PREVIEW_BYTES: usize = 256;

/// 安全地截断 UTF-8 字符串，确保不会在多字节字符中间截断
///
/// 返回不超过 `max_bytes` 字节的最长有效 UTF-8 子串
pub fn truncate_str_safe(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }

    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }

    &s[..end]
}

/// 生成响应体的日志预览
///
/// 启用 `sensitive-logs` 特性时返回完整内容，否则截断并添加省略号。
/// 非 UTF-8 字节按有损方式替换。
pub fn body_preview(body: &[u8]) -> Cow<'_, str> {
    let text = String::from_utf8_lossy(body);
    if cfg!(feature = "sensitive-logs") || text.len() <= BODY_PREVIEW_BYTES {
        return text;
    }

    let truncated = truncate_str_safe(&text, BODY_PREVIEW_BYTES - 3);
    Cow::Owned(format!("{}...", truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_str_safe_respects_char_boundary() {
        // "Türkiye" 中 ü 占两个字节
        let s = "Türkiye";
        assert_eq!(truncate_str_safe(s, 2), "T");
        assert_eq!(truncate_str_safe(s, 3), "Tü");
        assert_eq!(truncate_str_safe(s, 100), s);
    }

    #[test]
    fn test_body_preview_short_body_untouched() {
        assert_eq!(body_preview(b"{\"ok\":true}"), "{\"ok\":true}");
    }

    #[cfg(not(feature = "sensitive-logs"))]
    #[test]
    fn test_body_preview_truncates_long_body() {
        let body = "x".repeat(BODY_PREVIEW_BYTES * 2);
        let preview = body_preview(body.as_bytes());
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), BODY_PREVIEW_BYTES);
    }
}
