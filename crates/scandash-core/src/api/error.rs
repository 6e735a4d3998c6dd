use serde::Deserialize;
use thiserror::Error;

use crate::auth::SessionError;

/// Why a request could not be given a usable access token.
///
/// Every variant is handled the same way (stored tokens are dropped and the
/// user must sign in again); they are kept apart so callers can report the
/// cause.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthFailure {
    #[error("no refresh token is stored")]
    MissingRefreshToken,

    #[error("token refresh rejected with status {0}")]
    RefreshRejected(u16),

    #[error("token refresh request failed: {0}")]
    RefreshTransport(String),

    #[error("token refresh response was malformed: {0}")]
    MalformedRefreshResponse(String),

    #[error("session store unavailable: {0}")]
    StoreUnavailable(String),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not authenticated: {0}")]
    NotAuthenticated(AuthFailure),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Request rejected: {0}")]
    BadRequest(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Failed to serialize request body: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body shape used by the remote API: `detail` is either a message or
/// a list of validation entries.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<ErrorDetail>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Entries(Vec<ErrorEntry>),
}

#[derive(Debug, Deserialize)]
struct ErrorEntry {
    msg: String,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Pull the human-readable message out of a remote error body, if any
    pub fn extract_detail(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail {
            Some(ErrorDetail::Message(msg)) => Some(msg),
            Some(ErrorDetail::Entries(entries)) => entries.into_iter().next().map(|e| e.msg),
            None => parsed.message,
        }
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::extract_detail(body).unwrap_or_else(|| Self::truncate_body(body));
        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            400 | 409 | 422 => ApiError::BadRequest(message),
            429 => ApiError::RateLimited,
            500..=599 => ApiError::ServerError(message),
            _ => ApiError::InvalidResponse(format!("Status {}: {}", status, message)),
        }
    }

    /// True when the user has to sign in again
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::NotAuthenticated(_) | ApiError::Unauthorized)
    }
}
