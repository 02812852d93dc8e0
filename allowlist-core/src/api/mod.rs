//! Remote allowlist API contract and error classification

pub mod http;

use crate::entry::{AllowlistEntry, EntrySpec};
use async_trait::async_trait;
use std::fmt;

pub use http::AtlasClient;

/// Markers in error text that identify a transient server side failure
const TRANSIENT_MARKERS: &[&str] = &["500", "Unexpected error", "UNEXPECTED_ERROR"];

/// Error codes the service uses when an entry does not exist
const NOT_FOUND_CODES: &[&str] = &[
    "ATLAS_ALLOWLIST_NOT_FOUND",
    "ATLAS_NETWORK_PERMISSION_ENTRY_NOT_FOUND",
];

const UNEXPECTED_ERROR_CODE: &str = "UNEXPECTED_ERROR";

/// Error returned by a remote allowlist call
///
/// Classification uses the HTTP status and error code when the client
/// captured them, and falls back to matching markers in the message text
/// when it did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: Option<u16>,
    pub error_code: Option<String>,
    /// Connection level failure: no response was received
    pub transport: bool,
    pub message: String,
}

impl ApiError {
    /// Error from an HTTP response with a non-success status
    pub fn status(status: u16, error_code: Option<String>, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error_code,
            transport: false,
            message: message.into(),
        }
    }

    /// Error raised before any response arrived (connect failure, timeout)
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error_code: None,
            transport: true,
            message: message.into(),
        }
    }

    /// Error known only by its text
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            status: None,
            error_code: None,
            transport: false,
            message: message.into(),
        }
    }

    /// 500-class failure, or an error flagged as unexpected by the service
    pub fn is_transient(&self) -> bool {
        if self.transport {
            return true;
        }
        match self.status {
            Some(status) => {
                status >= 500 || self.error_code.as_deref() == Some(UNEXPECTED_ERROR_CODE)
            }
            None => TRANSIENT_MARKERS.iter().any(|m| self.message.contains(m)),
        }
    }

    /// 500-class failure only; reads do not retry on the "unexpected" markers
    pub fn is_server_error(&self) -> bool {
        if self.transport {
            return true;
        }
        match self.status {
            Some(status) => status >= 500,
            None => self.message.contains("500"),
        }
    }

    pub fn is_not_found(&self) -> bool {
        let code_match = self
            .error_code
            .as_deref()
            .map(|code| NOT_FOUND_CODES.contains(&code))
            .unwrap_or(false);
        match self.status {
            Some(status) => status == 404 || code_match,
            None => {
                self.message.contains("404")
                    || NOT_FOUND_CODES.iter().any(|c| self.message.contains(c))
            }
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

/// The three calls the reconciler needs from the remote service
///
/// `entry_key` is the raw discriminant value (CIDR block, IP address or
/// security group id), never the composite state id.
#[async_trait]
pub trait AllowlistApi: Send + Sync {
    /// Add entries to a project's allowlist
    ///
    /// Returns the entries the service reports back, which may be empty.
    async fn create(
        &self,
        project_id: &str,
        entries: &[EntrySpec],
    ) -> Result<Vec<AllowlistEntry>, ApiError>;

    async fn get(&self, project_id: &str, entry_key: &str) -> Result<AllowlistEntry, ApiError>;

    async fn delete(&self, project_id: &str, entry_key: &str) -> Result<(), ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        let err = ApiError::status(500, None, "POST x: 500");
        assert!(err.is_transient());
        assert!(err.is_server_error());
        assert!(!err.is_not_found());

        let err = ApiError::status(503, None, "GET x: 503");
        assert!(err.is_server_error());

        let err = ApiError::status(404, Some("ATLAS_NETWORK_PERMISSION_ENTRY_NOT_FOUND".into()), "gone");
        assert!(err.is_not_found());
        assert!(!err.is_transient());

        let err = ApiError::status(400, Some("ATLAS_ALLOWLIST_NOT_FOUND".into()), "gone");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_unexpected_error_code_is_transient_but_not_server_error() {
        let err = ApiError::status(
            400,
            Some("UNEXPECTED_ERROR".into()),
            "POST x: 400 (request \"UNEXPECTED_ERROR\") Unexpected error.",
        );
        assert!(err.is_transient());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_status_wins_over_text() {
        // An address containing "500" must not make a 400 look transient
        let err = ApiError::status(400, Some("INVALID_ATTRIBUTE".into()), "bad entry 10.0.0.500");
        assert!(!err.is_transient());
        assert!(!err.is_server_error());
    }

    #[test]
    fn test_text_fallback_markers() {
        assert!(ApiError::from_message("request failed: Unexpected error").is_transient());
        assert!(ApiError::from_message("code UNEXPECTED_ERROR").is_transient());
        assert!(ApiError::from_message("HTTP 500").is_server_error());
        assert!(ApiError::from_message("HTTP 404").is_not_found());
        assert!(ApiError::from_message("ATLAS_ALLOWLIST_NOT_FOUND").is_not_found());
        assert!(!ApiError::from_message("HTTP 401 unauthorized").is_transient());
    }

    #[test]
    fn test_transport_errors_are_transient() {
        let err = ApiError::transport("connection refused");
        assert!(err.is_transient());
        assert!(err.is_server_error());
        assert!(!err.is_not_found());
    }
}
