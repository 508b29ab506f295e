//! Error types for compute API calls.

use std::fmt;

use thiserror::Error;

/// Classification of a compute API failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeErrorKind {
    /// The addressed resource does not exist (HTTP 404).
    NotFound,
    /// The resource already exists or is being modified (HTTP 409).
    Conflict,
    /// Credentials are missing or insufficient (HTTP 401/403).
    PermissionDenied,
    /// The request was rejected as malformed (HTTP 400).
    InvalidArgument,
    /// Quota or rate limit exceeded (HTTP 429).
    RateLimited,
    /// Server-side failure (HTTP 5xx).
    Unavailable,
    /// The request never produced an HTTP response.
    Transport,
    /// The response body could not be decoded.
    Decode,
    /// Any other status.
    Other,
}

impl ComputeErrorKind {
    /// Classify an HTTP status code.
    pub fn from_status(status: u16) -> Self {
        match status {
            400 => Self::InvalidArgument,
            401 | 403 => Self::PermissionDenied,
            404 => Self::NotFound,
            409 => Self::Conflict,
            429 => Self::RateLimited,
            500..=599 => Self::Unavailable,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::PermissionDenied => "permission_denied",
            Self::InvalidArgument => "invalid_argument",
            Self::RateLimited => "rate_limited",
            Self::Unavailable => "unavailable",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for ComputeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed compute API call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.status, .kind, .message))]
pub struct ComputeError {
    kind: ComputeErrorKind,
    status: Option<u16>,
    message: String,
}

impl ComputeError {
    pub fn new(kind: ComputeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Error for an HTTP response with a non-success status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ComputeErrorKind::from_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::from_status(404, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::from_status(409, message)
    }

    pub fn kind(&self) -> ComputeErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ComputeErrorKind::NotFound
    }
}

fn render(status: &Option<u16>, kind: &ComputeErrorKind, message: &str) -> String {
    match status {
        Some(status) => format!("googleapi: Error {status}: {message}"),
        None => format!("{kind}: {message}"),
    }
}

impl From<reqwest::Error> for ComputeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            return Self::new(ComputeErrorKind::Decode, err.to_string());
        }
        match err.status() {
            Some(status) => Self::from_status(status.as_u16(), err.to_string()),
            None => Self::new(ComputeErrorKind::Transport, err.to_string()),
        }
    }
}

impl From<serde_json::Error> for ComputeError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ComputeErrorKind::Decode, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(400, ComputeErrorKind::InvalidArgument)]
    #[case(401, ComputeErrorKind::PermissionDenied)]
    #[case(403, ComputeErrorKind::PermissionDenied)]
    #[case(404, ComputeErrorKind::NotFound)]
    #[case(409, ComputeErrorKind::Conflict)]
    #[case(429, ComputeErrorKind::RateLimited)]
    #[case(500, ComputeErrorKind::Unavailable)]
    #[case(503, ComputeErrorKind::Unavailable)]
    #[case(418, ComputeErrorKind::Other)]
    fn test_kind_from_status(#[case] status: u16, #[case] expected: ComputeErrorKind) {
        assert_eq!(ComputeErrorKind::from_status(status), expected);
    }

    #[test]
    fn test_only_404_is_not_found() {
        assert!(ComputeError::not_found("instance missing").is_not_found());
        assert!(!ComputeError::from_status(403, "forbidden").is_not_found());
        assert!(!ComputeError::new(ComputeErrorKind::Transport, "reset").is_not_found());
    }

    #[test]
    fn test_display_includes_status() {
        let err = ComputeError::from_status(404, "The resource 'x' was not found");
        assert_eq!(
            err.to_string(),
            "googleapi: Error 404: The resource 'x' was not found"
        );

        let err = ComputeError::new(ComputeErrorKind::Transport, "connection refused");
        assert_eq!(err.to_string(), "transport: connection refused");
    }

    #[test]
    fn test_boxes_as_std_error() {
        let err: Box<dyn std::error::Error + Send + Sync> =
            Box::new(ComputeError::from_status(503, "backend unavailable"));
        assert_eq!(err.to_string(), "googleapi: Error 503: backend unavailable");
        assert!(err.source().is_none());
    }
}
