//! Error types for image generation, normalization and persistence.

use std::time::Duration;

/// Errors that can occur while talking to the provider or handling images locally.
#[derive(Debug, thiserror::Error)]
pub enum CanvasGenError {
    /// API key missing or rejected.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Account has no remaining quota or billing is not set up.
    #[error("billing error: {0}")]
    Billing(String),

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters (rejected locally or by the provider).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Provider answered 2xx but the body was not what we expected.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Request exceeded the configured HTTP timeout.
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    /// Network or HTTP error while calling the provider.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Source image and mask have different dimensions.
    #[error(
        "mask dimensions {}x{} do not match source image {}x{}",
        .mask.0, .mask.1, .image.0, .image.1
    )]
    InputShape { image: (u32, u32), mask: (u32, u32) },

    /// A local image could not be read or decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// Result URL could not be downloaded.
    #[error("failed to fetch result: {0}")]
    Fetch(String),

    /// Result URL expired before download.
    #[error("result URL expired")]
    UrlExpired,

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse error classes, one per failure the caller has to react to differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid credential.
    Auth,
    /// The provider rejected or failed the request.
    Provider,
    /// Source and mask dimensions differ.
    InputShape,
    /// A local image is unreadable.
    Decode,
    /// A result URL is unreachable or expired.
    Fetch,
    /// Local filesystem failure.
    Io,
}

impl ErrorKind {
    /// Short lowercase name, used in machine-readable output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::Provider => "provider",
            Self::InputShape => "input_shape",
            Self::Decode => "decode",
            Self::Fetch => "fetch",
            Self::Io => "io",
        }
    }

    /// Process exit code used by the command-line interface. 2 is left to
    /// argument parsing errors.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Io => 1,
            Self::Auth => 3,
            Self::Provider => 4,
            Self::InputShape => 5,
            Self::Decode => 6,
            Self::Fetch => 7,
        }
    }
}

impl CanvasGenError {
    /// Returns the class this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) => ErrorKind::Auth,
            Self::Api { .. }
            | Self::RateLimited { .. }
            | Self::Billing(_)
            | Self::ContentBlocked(_)
            | Self::InvalidRequest(_)
            | Self::UnexpectedResponse(_)
            | Self::Timeout(_)
            | Self::Network(_) => ErrorKind::Provider,
            Self::InputShape { .. } => ErrorKind::InputShape,
            Self::Decode(_) => ErrorKind::Decode,
            Self::Fetch(_) | Self::UrlExpired => ErrorKind::Fetch,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Returns true if this error is likely transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns the suggested retry delay, if the provider sent one.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Parses the `Retry-After` header as a number of seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Redacts key-like tokens and truncates provider error bodies before they
/// end up in logs or error messages.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let redacted: Vec<String> = text
        .split(' ')
        .map(|word| {
            if word.starts_with("sk-") && word.len() > 8 {
                "sk-***".to_string()
            } else {
                word.to_string()
            }
        })
        .collect();
    let joined = redacted.join(" ");
    let trimmed = joined.trim();

    if trimmed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let cut: String = trimmed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{cut}...")
    } else {
        trimmed.to_string()
    }
}

/// Result type alias for canvasgen operations.
pub type Result<T> = std::result::Result<T, CanvasGenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_retryable() {
        assert!(CanvasGenError::RateLimited { retry_after: None }.is_retryable());
        assert!(CanvasGenError::Timeout(Duration::from_secs(30)).is_retryable());
        assert!(CanvasGenError::Api {
            status: 503,
            message: "overloaded".into()
        }
        .is_retryable());

        assert!(!CanvasGenError::Api {
            status: 400,
            message: "bad size".into()
        }
        .is_retryable());
        assert!(!CanvasGenError::Auth("bad key".into()).is_retryable());
        assert!(!CanvasGenError::InputShape {
            image: (256, 256),
            mask: (512, 512)
        }
        .is_retryable());
        assert!(!CanvasGenError::Decode("truncated".into()).is_retryable());
        assert!(!CanvasGenError::UrlExpired.is_retryable());
    }

    #[test]
    fn test_retry_after() {
        let rate_limited = CanvasGenError::RateLimited {
            retry_after: Some(Duration::from_secs(60)),
        };
        assert_eq!(rate_limited.retry_after(), Some(Duration::from_secs(60)));

        let rate_limited_no_hint = CanvasGenError::RateLimited { retry_after: None };
        assert_eq!(rate_limited_no_hint.retry_after(), None);

        let auth = CanvasGenError::Auth("bad".into());
        assert_eq!(auth.retry_after(), None);
    }

    #[test]
    fn test_kind_and_exit_codes() {
        assert_eq!(CanvasGenError::Auth("x".into()).kind(), ErrorKind::Auth);
        assert_eq!(
            CanvasGenError::InvalidRequest("size".into()).kind(),
            ErrorKind::Provider
        );
        assert_eq!(CanvasGenError::UrlExpired.kind(), ErrorKind::Fetch);
        assert_eq!(
            CanvasGenError::Fetch("timeout".into()).kind(),
            ErrorKind::Fetch
        );
        assert_eq!(CanvasGenError::Decode("x".into()).kind(), ErrorKind::Decode);

        assert_eq!(ErrorKind::Auth.exit_code(), 3);
        assert_eq!(ErrorKind::InputShape.exit_code(), 5);
        assert_ne!(ErrorKind::Io.exit_code(), 0);
    }

    #[test]
    fn test_error_display() {
        let err = CanvasGenError::Api {
            status: 404,
            message: "Not found".into(),
        };
        assert_eq!(err.to_string(), "API error: 404 - Not found");

        let err = CanvasGenError::InputShape {
            image: (256, 256),
            mask: (512, 512),
        };
        assert_eq!(
            err.to_string(),
            "mask dimensions 512x512 do not match source image 256x256"
        );
    }

    #[test]
    fn test_sanitize_redacts_keys() {
        let msg = sanitize_error_message("Incorrect API key provided: sk-abcdef123456 please");
        assert!(!msg.contains("abcdef"));
        assert!(msg.contains("sk-***"));
    }

    #[test]
    fn test_sanitize_truncates() {
        let long = "x".repeat(2000);
        let msg = sanitize_error_message(&long);
        assert_eq!(msg.chars().count(), MAX_ERROR_MESSAGE_LEN + 3);
        assert!(msg.ends_with("..."));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(12));
    }
}
