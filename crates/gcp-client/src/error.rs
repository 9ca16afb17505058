//! GCP client errors

use thiserror::Error;

/// Errors that can occur when interacting with the GCP APIs
#[derive(Debug, Error)]
pub enum GcpError {
    /// HTTP transport error (connection refused, timeout, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// GCP API returned a non-success status
    #[error("GCP API error: {message} (code: {code}, status: {status})")]
    Api {
        /// HTTP status code
        code: u16,
        /// Canonical status, e.g. "ALREADY_EXISTS"
        status: String,
        /// Server-provided message
        message: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No usable access token
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g., missing required fields)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl GcpError {
    /// HTTP status code, if the error came from the API
    pub fn status_code(&self) -> Option<u16> {
        match self {
            GcpError::Api { code, .. } => Some(*code),
            GcpError::NotFound(_) => Some(404),
            GcpError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The resource does not exist
    pub fn is_not_found(&self) -> bool {
        self.status_code() == Some(404)
    }

    /// The resource (or its name) already exists
    pub fn is_already_exists(&self) -> bool {
        match self {
            GcpError::Api { code, status, .. } => *code == 409 || status == "ALREADY_EXISTS",
            _ => false,
        }
    }

    /// The request may succeed if retried later
    pub fn is_transient(&self) -> bool {
        match self {
            GcpError::Http(_) => true,
            GcpError::Api { code, .. } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Credentials were rejected
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, GcpError::Authentication(_))
            || matches!(self.status_code(), Some(401 | 403))
    }
}
