//! Backend-agnostic HTTP types shared by the session and water modules.

use std::fmt;

use anyhow::{Context, Result};
use serde_json::Value;

/// Standard User-Agent header for aqualog API requests.
pub const USER_AGENT: &str = concat!("aqualog/", env!("CARGO_PKG_VERSION"));

/// Default backend base URL (local development server).
pub const DEFAULT_BASE_URL: &str = "http://localhost:5001/api";

/// Environment variable overriding the backend base URL.
pub const BASE_URL_ENV_VAR: &str = "AQUALOG_BASE_URL";

/// Resolves the backend base URL with precedence: env > config > default.
///
/// # Errors
/// Returns an error if the resolved URL is malformed.
pub fn resolve_base_url(config_base_url: Option<&str>) -> Result<String> {
    if let Ok(env_url) = std::env::var(BASE_URL_ENV_VAR) {
        let trimmed = env_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    if let Some(config_url) = config_base_url {
        let trimmed = config_url.trim();
        if !trimmed.is_empty() {
            validate_url(trimmed)?;
            return Ok(trimmed.trim_end_matches('/').to_string());
        }
    }

    Ok(DEFAULT_BASE_URL.to_string())
}

fn validate_url(url: &str) -> Result<()> {
    url::Url::parse(url).with_context(|| format!("Invalid backend base URL: {url}"))?;
    Ok(())
}

/// Panics if the process is configured to block real backend traffic but the
/// resolved base URL still points at the default backend.
///
/// Test harnesses set `AQUALOG_BLOCK_REAL_API=1` so a missing mock-server
/// override fails loudly instead of making live requests.
///
/// # Panics
/// See above; never panics in normal operation.
pub fn guard_real_api(base_url: &str) {
    if std::env::var("AQUALOG_BLOCK_REAL_API").is_ok_and(|v| v == "1")
        && base_url == DEFAULT_BASE_URL
    {
        panic!(
            "AQUALOG_BLOCK_REAL_API=1 but the default backend URL is in use!\n\
             Set AQUALOG_BASE_URL to a mock server.\n\
             Found base_url: {base_url}"
        );
    }
}

/// Categories of backend errors for consistent handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Transport failure: no response at all (connect error, timeout, DNS).
    Network,
    /// The backend rejected the bearer token (HTTP 401).
    AuthRejected,
    /// Backend-reported 4xx carrying a human-readable message.
    Validation,
    /// Anything else (5xx, unparseable bodies, unexpected shapes).
    Unknown,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiErrorKind::Network => write!(f, "network"),
            ApiErrorKind::AuthRejected => write!(f, "auth_rejected"),
            ApiErrorKind::Validation => write!(f, "validation"),
            ApiErrorKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Structured backend error with kind and details.
#[derive(Debug, Clone)]
pub struct ApiError {
    /// Error category.
    pub kind: ApiErrorKind,
    /// One-line summary suitable for display.
    pub message: String,
    /// Optional raw response body.
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new error with no details.
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Classifies a transport-level reqwest failure.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        let kind = if err.is_connect() || err.is_timeout() || err.is_request() {
            ApiErrorKind::Network
        } else {
            ApiErrorKind::Unknown
        };
        Self::new(kind, err.to_string())
    }

    /// Classifies a non-success HTTP response.
    ///
    /// Pulls the backend's `{ "message": ... }` out of the body when present;
    /// `fallback` is used when the backend gives none.
    pub fn from_status(status: reqwest::StatusCode, body: &str, fallback: &str) -> Self {
        let backend_message = extract_message(body);

        let kind = if status == reqwest::StatusCode::UNAUTHORIZED {
            ApiErrorKind::AuthRejected
        } else if status.is_client_error() && backend_message.is_some() {
            ApiErrorKind::Validation
        } else {
            ApiErrorKind::Unknown
        };

        Self {
            kind,
            message: backend_message.unwrap_or_else(|| fallback.to_string()),
            details: (!body.is_empty()).then(|| body.to_string()),
        }
    }

    /// Creates a parse error for an unexpected response shape.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::Unknown, message)
    }
}

/// Extracts the backend's human-readable `message` field from an error body.
fn extract_message(body: &str) -> Option<String> {
    let json: Value = serde_json::from_str(body).ok()?;
    json.get("message")
        .and_then(Value::as_str)
        .map(std::string::ToString::to_string)
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for backend operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    /// Test: 401 responses classify as auth rejection.
    #[test]
    fn test_from_status_unauthorized() {
        let err = ApiError::from_status(
            reqwest::StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid token"}"#,
            "Request failed",
        );
        assert_eq!(err.kind, ApiErrorKind::AuthRejected);
        assert_eq!(err.message, "Invalid token");
    }

    /// Test: 4xx with a backend message classifies as validation.
    #[test]
    fn test_from_status_validation_message() {
        let err = ApiError::from_status(
            reqwest::StatusCode::BAD_REQUEST,
            r#"{"message":"Email already registered"}"#,
            "Registration failed",
        );
        assert_eq!(err.kind, ApiErrorKind::Validation);
        assert_eq!(err.message, "Email already registered");
        assert!(err.details.is_some());
    }

    /// Test: messageless bodies fall back to the caller's text.
    #[test]
    fn test_from_status_fallback_message() {
        let err = ApiError::from_status(
            reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            "oops",
            "Login failed",
        );
        assert_eq!(err.kind, ApiErrorKind::Unknown);
        assert_eq!(err.message, "Login failed");
    }

    /// Test: base URL resolution precedence (config > default; env is
    /// process-global so it is exercised by the CLI integration tests).
    #[test]
    fn test_resolve_base_url_config_over_default() {
        let resolved = resolve_base_url(Some("http://127.0.0.1:9999/api/")).unwrap();
        assert_eq!(resolved, "http://127.0.0.1:9999/api");
    }

    /// Test: malformed config URL is rejected.
    #[test]
    fn test_resolve_base_url_rejects_garbage() {
        assert!(resolve_base_url(Some("not a url")).is_err());
    }
}
