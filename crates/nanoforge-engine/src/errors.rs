use std::fmt;
use std::io;
use std::path::PathBuf;

use nanoforge_contracts::RequestError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiErrorKind {
    MalformedRequest,
    SafetyRejected,
    InvalidCredential,
    QuotaExceeded,
    AuthFailed,
    ServiceError,
    Unclassified,
}

impl ApiErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiErrorKind::MalformedRequest => "malformed_request",
            ApiErrorKind::SafetyRejected => "safety_rejected",
            ApiErrorKind::InvalidCredential => "invalid_credential",
            ApiErrorKind::QuotaExceeded => "quota_exceeded",
            ApiErrorKind::AuthFailed => "auth_failed",
            ApiErrorKind::ServiceError => "service_error",
            ApiErrorKind::Unclassified => "unclassified",
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub status: u16,
    pub message: String,
}

impl ApiError {
    /// Classifies a non-2xx response (or an embedded error object) by status
    /// code and message text. Matching is case-insensitive.
    pub fn classify(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        let lowered = message.to_ascii_lowercase();
        let kind = match status {
            400 if lowered.contains("safety") => ApiErrorKind::SafetyRejected,
            400 => ApiErrorKind::MalformedRequest,
            403 if INVALID_KEY_PATTERNS
                .iter()
                .any(|pattern| lowered.contains(pattern)) =>
            {
                ApiErrorKind::InvalidCredential
            }
            403 if lowered.contains("quota") => ApiErrorKind::QuotaExceeded,
            403 => ApiErrorKind::AuthFailed,
            500 => ApiErrorKind::ServiceError,
            _ => ApiErrorKind::Unclassified,
        };
        Self {
            kind,
            status,
            message,
        }
    }

    pub fn from_response_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|payload| embedded_error(&payload))
            .map(|(_, message)| message)
            .unwrap_or_else(|| body.to_string());
        Self::classify(status, message)
    }
}

const INVALID_KEY_PATTERNS: &[&str] = &["api key not valid", "invalid api key"];

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ApiErrorKind::MalformedRequest => write!(f, "malformed request: {}", self.message),
            ApiErrorKind::SafetyRejected => write!(
                f,
                "request rejected due to safety concerns: {}",
                self.message
            ),
            ApiErrorKind::InvalidCredential => write!(f, "invalid API key: {}", self.message),
            ApiErrorKind::QuotaExceeded => write!(f, "API quota exceeded: {}", self.message),
            ApiErrorKind::AuthFailed => write!(f, "authentication failed: {}", self.message),
            ApiErrorKind::ServiceError => write!(f, "service error: {}", self.message),
            ApiErrorKind::Unclassified => write!(f, "HTTP {}: {}", self.status, self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// `(code, message)` from a top-level `error` object, if the payload has one.
pub(crate) fn embedded_error(payload: &Value) -> Option<(u16, String)> {
    let error = payload.get("error").and_then(Value::as_object)?;
    let code = error
        .get("code")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .unwrap_or(0);
    let message = error
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            error
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_default();
    Some((code, message))
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("API key not found. Please set one of: {}", .checked.join(", "))]
    MissingCredential { checked: Vec<String> },
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("failed to build HTTP client")]
    HttpClient(#[source] reqwest::Error),
    #[error("failed to send request")]
    Transport(#[source] reqwest::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to parse response")]
    InvalidResponse(#[from] serde_json::Error),
    #[error("no image data found in response")]
    NoImageData,
}

impl GenerateError {
    pub fn api_kind(&self) -> Option<ApiErrorKind> {
        match self {
            GenerateError::Api(err) => Some(err.kind),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("image not found: {}", .path.display())]
    MissingInput { path: PathBuf },
    #[error("failed reading {}", .path.display())]
    ReadInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} already exists; pass --force to overwrite it", .path.display())]
    AlreadyExists { path: PathBuf },
    #[error("failed to decode image data for {}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: base64::DecodeError,
    },
    #[error("failed to create directory {}", .path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode source image for {}", .path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to encode {}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn quota_wins_over_generic_auth_failure() {
        let err = ApiError::classify(403, "Quota exceeded for this project");
        assert_eq!(err.kind, ApiErrorKind::QuotaExceeded);
        assert_eq!(err.status, 403);
        assert_eq!(err.message, "Quota exceeded for this project");
        assert_eq!(
            ApiError::classify(403, "QUOTA").kind,
            ApiErrorKind::QuotaExceeded
        );
    }

    #[test]
    fn status_400_splits_on_safety() {
        assert_eq!(
            ApiError::classify(400, "blocked by safety filters").kind,
            ApiErrorKind::SafetyRejected
        );
        assert_eq!(
            ApiError::classify(400, "Invalid JSON payload").kind,
            ApiErrorKind::MalformedRequest
        );
    }

    #[test]
    fn status_403_variants() {
        assert_eq!(
            ApiError::classify(403, "API key not valid. Please pass a valid API key.").kind,
            ApiErrorKind::InvalidCredential
        );
        assert_eq!(
            ApiError::classify(403, "Permission denied").kind,
            ApiErrorKind::AuthFailed
        );
    }

    #[test]
    fn other_statuses() {
        assert_eq!(
            ApiError::classify(500, "internal").kind,
            ApiErrorKind::ServiceError
        );
        let err = ApiError::classify(429, "slow down");
        assert_eq!(err.kind, ApiErrorKind::Unclassified);
        assert_eq!(err.to_string(), "HTTP 429: slow down");
    }

    #[test]
    fn response_body_prefers_embedded_message() {
        let body = json!({
            "error": {"code": 400, "message": "Unsupported safety setting", "status": "INVALID_ARGUMENT"}
        })
        .to_string();
        let err = ApiError::from_response_body(400, &body);
        assert_eq!(err.kind, ApiErrorKind::SafetyRejected);
        assert_eq!(err.message, "Unsupported safety setting");

        let raw = ApiError::from_response_body(502, "<html>bad gateway</html>");
        assert_eq!(raw.message, "<html>bad gateway</html>");
    }

    #[test]
    fn embedded_error_reads_code_and_falls_back_to_status() {
        let payload = json!({"error": {"code": 403, "status": "PERMISSION_DENIED"}});
        assert_eq!(
            embedded_error(&payload),
            Some((403, "PERMISSION_DENIED".to_string()))
        );
        assert_eq!(embedded_error(&json!({"candidates": []})), None);
    }
}
