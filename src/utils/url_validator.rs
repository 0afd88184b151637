//! 跳转目标校验
//!
//! 目标必须是带主机名的绝对 http/https 地址。先交给 `url` 解析，
//! 再按解析出的协议分类：脚本类和本地内容协议单独报告为 `BlockedScheme`，
//! 这样日志里可以把恶意输入和普通的格式错误区分开。

use url::{ParseError, Url};

use crate::errors::LinkpulseError;

/// 目标 URL 最大长度（字节）
pub const MAX_URL_LENGTH: usize = 8192;

/// 能执行脚本或读取本地内容的协议
const BLOCKED_SCHEMES: &[&str] = &["javascript", "vbscript", "data", "file", "blob", "about"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UrlValidationError {
    Empty,
    TooLong { len: usize },
    /// 相对路径或缺少协议
    NotAbsolute,
    Malformed(String),
    BlockedScheme(String),
    UnsupportedScheme(String),
    NoHost,
}

impl std::fmt::Display for UrlValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("destination URL is empty"),
            Self::TooLong { len } => write!(
                f,
                "destination URL has {} bytes, at most {} are allowed",
                len, MAX_URL_LENGTH
            ),
            Self::NotAbsolute => f.write_str("destination URL must be absolute (http:// or https://)"),
            Self::Malformed(reason) => write!(f, "destination URL is malformed: {}", reason),
            Self::BlockedScheme(scheme) => write!(f, "scheme '{}:' is not allowed", scheme),
            Self::UnsupportedScheme(scheme) => write!(
                f,
                "scheme '{}:' is not supported, use http:// or https://",
                scheme
            ),
            Self::NoHost => f.write_str("destination URL has no host"),
        }
    }
}

impl std::error::Error for UrlValidationError {}

impl From<UrlValidationError> for LinkpulseError {
    fn from(err: UrlValidationError) -> Self {
        LinkpulseError::invalid_url(err.to_string())
    }
}

/// 校验跳转目标，成功时返回去掉首尾空白的 URL
pub fn validate_url(raw: &str) -> Result<String, UrlValidationError> {
    let candidate = raw.trim();
    match candidate.len() {
        0 => return Err(UrlValidationError::Empty),
        len if len > MAX_URL_LENGTH => return Err(UrlValidationError::TooLong { len }),
        _ => {}
    }

    let parsed = Url::parse(candidate).map_err(|e| match e {
        ParseError::RelativeUrlWithoutBase => UrlValidationError::NotAbsolute,
        other => UrlValidationError::Malformed(other.to_string()),
    })?;

    // url 已将协议转为小写
    let scheme = parsed.scheme();
    if BLOCKED_SCHEMES.contains(&scheme) {
        return Err(UrlValidationError::BlockedScheme(scheme.to_string()));
    }
    if scheme != "http" && scheme != "https" {
        return Err(UrlValidationError::UnsupportedScheme(scheme.to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(UrlValidationError::NoHost);
    }

    Ok(candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_is_trimmed_but_not_rewritten() {
        assert_eq!(
            validate_url("\thttps://shop.example/sale?utm_source=mail \n").unwrap(),
            "https://shop.example/sale?utm_source=mail"
        );
        // 原样保留，不做规范化
        assert_eq!(
            validate_url("HTTP://Docs.Example:8443/A%20B").unwrap(),
            "HTTP://Docs.Example:8443/A%20B"
        );
        assert!(validate_url("http://127.0.0.1:3000/health").is_ok());
    }

    #[test]
    fn test_script_and_local_schemes_are_blocked() {
        for (input, scheme) in [
            ("javascript:void(document.cookie)", "javascript"),
            ("JavaScript:alert('x')", "javascript"),
            ("data:text/html;base64,PHNjcmlwdD4=", "data"),
            ("file:///home/user/.ssh/id_rsa", "file"),
            ("blob:https://shop.example/1f2e", "blob"),
        ] {
            assert_eq!(
                validate_url(input),
                Err(UrlValidationError::BlockedScheme(scheme.to_string())),
                "{}",
                input
            );
        }
    }

    #[test]
    fn test_other_schemes_and_relative_targets() {
        assert_eq!(
            validate_url("ftp://mirror.example/pub"),
            Err(UrlValidationError::UnsupportedScheme("ftp".into()))
        );
        assert_eq!(
            validate_url("mailto:ops@example.com"),
            Err(UrlValidationError::UnsupportedScheme("mailto".into()))
        );
        assert_eq!(validate_url("/landing/spring"), Err(UrlValidationError::NotAbsolute));
        assert_eq!(validate_url("shop.example/sale"), Err(UrlValidationError::NotAbsolute));
        assert!(matches!(
            validate_url("https://"),
            Err(UrlValidationError::Malformed(_))
        ));
    }

    #[test]
    fn test_length_limits() {
        assert_eq!(validate_url(" \t "), Err(UrlValidationError::Empty));

        let base = "https://shop.example/";
        let fits = format!("{}{}", base, "q".repeat(MAX_URL_LENGTH - base.len()));
        assert!(validate_url(&fits).is_ok());
        let over = format!("{}q", fits);
        assert_eq!(
            validate_url(&over),
            Err(UrlValidationError::TooLong {
                len: MAX_URL_LENGTH + 1
            })
        );
    }

    #[test]
    fn test_maps_to_invalid_url_error() {
        let err: LinkpulseError = validate_url("vbscript:msgbox").unwrap_err().into();
        assert_eq!(err.code(), "E001");
        assert!(err.to_string().contains("vbscript"));
    }
}
