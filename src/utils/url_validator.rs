//! URL 验证模块
//!
//! 目标 URL 必须是带主机名的绝对 URL，并阻止危险协议

use url::Url;

use crate::errors::{Result, ShortenerError};

/// 危险协议列表
const DANGEROUS_PROTOCOLS: &[&str] = &[
    "javascript:",
    "data:",
    "file:",
    "vbscript:",
    "about:",
    "blob:",
];

/// Percent-encode spaces, then validate.
///
/// Returns the URL exactly as it should be stored.
pub fn normalize_and_validate(raw: &str) -> Result<String> {
    let url = raw.trim().replace(' ', "%20");

    if url.is_empty() {
        return Err(ShortenerError::invalid_url("URL cannot be empty"));
    }

    let url_lower = url.to_lowercase();

    // 检查危险协议
    if let Some(proto) = DANGEROUS_PROTOCOLS.iter().find(|p| url_lower.starts_with(*p)) {
        return Err(ShortenerError::invalid_url(format!(
            "Dangerous protocol blocked: {}",
            proto
        )));
    }

    let parsed = Url::parse(&url)
        .map_err(|e| ShortenerError::invalid_url(format!("Invalid URL format: {}", e)))?;

    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(ShortenerError::invalid_url(format!(
            "URL has no host: {}",
            url
        )));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_urls() {
        assert!(normalize_and_validate("http://example.com").is_ok());
        assert!(normalize_and_validate("https://example.com/path?query=1").is_ok());
        assert!(normalize_and_validate("http://localhost:8080").is_ok());
        assert!(normalize_and_validate("ftp://files.example.com/a.txt").is_ok());
    }

    #[test]
    fn test_spaces_are_encoded() {
        assert_eq!(
            normalize_and_validate("https://example.com/a b/c d").unwrap(),
            "https://example.com/a%20b/c%20d"
        );
    }

    #[test]
    fn test_dangerous_protocols() {
        for url in [
            "javascript:alert(1)",
            "JAVASCRIPT:alert(1)",
            "data:text/html,<script>alert(1)</script>",
            "file:///etc/passwd",
            "vbscript:msgbox(1)",
        ] {
            assert!(
                matches!(normalize_and_validate(url), Err(ShortenerError::InvalidUrl(_))),
                "{}",
                url
            );
        }
    }

    #[test]
    fn test_not_absolute() {
        for url in ["", "   ", "example.com", "/relative/path", "mailto:test@example.com"] {
            assert!(
                matches!(normalize_and_validate(url), Err(ShortenerError::InvalidUrl(_))),
                "{}",
                url
            );
        }
    }
}
