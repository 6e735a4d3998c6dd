use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;

use super::error::{ApiError, AuthFailure};

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Serialized to a JSON string and sent with `Content-Type: application/json`
    Json(serde_json::Value),
    /// Already serialized; sent unchanged with whatever headers the caller set
    Raw(String),
}

/// Method, headers and body of a request made through `ApiClient::request`.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl RequestOptions {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn get() -> Self {
        Self::new(Method::GET)
    }

    pub fn post() -> Self {
        Self::new(Method::POST)
    }

    pub fn put() -> Self {
        Self::new(Method::PUT)
    }

    pub fn delete() -> Self {
        Self::new(Method::DELETE)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn json_value(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Attach any serializable value as a JSON body
    pub fn json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self, ApiError> {
        Ok(self.json_value(serde_json::to_value(body)?))
    }

    pub fn raw(mut self, body: impl Into<String>) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self
    }
}

/// What a call through the authenticated wrapper produced.
///
/// Transport failures of the request itself are not represented here; they
/// surface as `Err(ApiError::NetworkError)` from `ApiClient::request`.
#[derive(Debug)]
pub enum RequestOutcome {
    /// Any status other than 404, untouched
    Response(Response),
    /// No usable credential and a refresh was impossible or failed
    NotAuthenticated(AuthFailure),
    /// The endpoint answered 404
    NotFound { status: u16, message: String },
}

impl RequestOutcome {
    pub(crate) fn not_found(url: &str) -> Self {
        RequestOutcome::NotFound {
            status: StatusCode::NOT_FOUND.as_u16(),
            message: format!("Endpoint not found: {}", url),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, RequestOutcome::Response(_))
    }

    /// Short machine-readable code for the two error outcomes
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            RequestOutcome::Response(_) => None,
            RequestOutcome::NotAuthenticated(_) => Some("not_authenticated"),
            RequestOutcome::NotFound { .. } => Some("not_found"),
        }
    }

    /// JSON form of the error outcomes, e.g. `{"error":"not_authenticated"}`
    pub fn sentinel(&self) -> Option<serde_json::Value> {
        match self {
            RequestOutcome::Response(_) => None,
            RequestOutcome::NotAuthenticated(_) => {
                Some(serde_json::json!({ "error": "not_authenticated" }))
            }
            RequestOutcome::NotFound { status, message } => Some(serde_json::json!({
                "error": "not_found",
                "status": status,
                "message": message,
            })),
        }
    }

    /// Unwrap the response, turning the error outcomes into `ApiError`s
    pub fn into_response(self) -> Result<Response, ApiError> {
        match self {
            RequestOutcome::Response(response) => Ok(response),
            RequestOutcome::NotAuthenticated(failure) => Err(ApiError::NotAuthenticated(failure)),
            RequestOutcome::NotFound { message, .. } => Err(ApiError::NotFound(message)),
        }
    }
}
