//! Authenticated API client for the remote scanning service.
//!
//! `ApiClient::request` is the single entry point for authenticated calls:
//! it checks the stored access token, refreshes it when needed, attaches
//! the bearer header, serializes the body and normalizes 404 responses.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::auth::{token_status, SessionKey, SessionStore};
use crate::config::Config;

use super::{ApiError, AuthFailure, RequestBody, RequestOptions, RequestOutcome};

// ============================================================================
// Constants
// ============================================================================

/// Path of the token refresh endpoint, relative to the API base URL
const REFRESH_PATH: &str = "/v1/auth/refresh";

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
}

/// API client for the scanning service.
/// Clone is cheap - clones share the connection pool, the session store and
/// the refresh gate.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: Arc<dyn SessionStore>,
    /// Held while a refresh is in flight so concurrent callers wait for its
    /// result instead of refreshing again
    refresh_gate: Arc<Mutex<()>>,
}

impl ApiClient {
    /// Create a new API client against `base_url`
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        session: Arc<dyn SessionStore>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            session,
            refresh_gate: Arc::new(Mutex::new(())),
        })
    }

    /// Create a client using the configured base URL and timeout
    pub fn from_config(config: &Config, session: Arc<dyn SessionStore>) -> Result<Self, ApiError> {
        Self::new(config.base_url(), config.request_timeout(), session)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for an API path such as `/v1/roles/list`
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn session(&self) -> &Arc<dyn SessionStore> {
        &self.session
    }

    /// The underlying HTTP client, for calls that must not carry a token
    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    /// Send an authenticated request.
    ///
    /// Returns `Ok(RequestOutcome::NotAuthenticated)` when no usable token
    /// could be obtained, `Ok(RequestOutcome::NotFound)` when the endpoint
    /// answers 404, and the raw response otherwise. Transport errors of the
    /// request itself are returned as `Err`.
    pub async fn request(
        &self,
        url: &str,
        options: RequestOptions,
    ) -> Result<RequestOutcome, ApiError> {
        let token = match self.ensure_access_token().await {
            Ok(token) => token,
            Err(failure) => return Ok(RequestOutcome::NotAuthenticated(failure)),
        };

        let RequestOptions {
            method,
            mut headers,
            body,
        } = options;

        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| ApiError::InvalidRequest(format!("access token is not a valid header value: {}", e)))?;
        headers.insert(header::AUTHORIZATION, bearer);

        let mut builder = self.client.request(method.clone(), url);
        match body {
            // A null JSON body means no body
            Some(RequestBody::Json(serde_json::Value::Null)) | None => {}
            Some(RequestBody::Json(value)) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/json"),
                );
                builder = builder.body(serde_json::to_string(&value)?);
            }
            Some(RequestBody::Raw(text)) => {
                builder = builder.body(text);
            }
        }

        debug!(method = %method, url = url, "Sending authenticated request");
        let response = builder.headers(headers).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(url = url, "Endpoint returned 404");
            return Ok(RequestOutcome::not_found(url));
        }
        Ok(RequestOutcome::Response(response))
    }

    /// Send an authenticated request to an API path and decode a JSON reply
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let url = self.endpoint(path);
        let response = self.request(&url, options).await?.into_response()?;
        let response = Self::check_response(response).await?;
        response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse JSON response from {}: {}", url, e))
        })
    }

    /// Send an authenticated request to an API path, ignoring the reply body
    pub async fn send_empty(&self, path: &str, options: RequestOptions) -> Result<(), ApiError> {
        let url = self.endpoint(path);
        let response = self.request(&url, options).await?.into_response()?;
        Self::check_response(response).await?;
        Ok(())
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: Response) -> Result<Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Return a usable access token, refreshing it if necessary.
    async fn ensure_access_token(&self) -> Result<String, AuthFailure> {
        if let Some(token) = self.usable_access_token() {
            return Ok(token);
        }

        let _gate = self.refresh_gate.lock().await;

        // Another request may have refreshed while we waited
        if let Some(token) = self.usable_access_token() {
            debug!("Access token was refreshed by a concurrent request");
            return Ok(token);
        }

        let refresh_token = match self
            .session
            .get(SessionKey::RefreshToken)
            .filter(|t| !t.is_empty())
        {
            Some(token) => token,
            None => return Err(self.fail_closed(AuthFailure::MissingRefreshToken)),
        };

        match self.refresh_access_token(&refresh_token).await {
            Ok(token) => Ok(token),
            Err(failure) => Err(self.fail_closed(failure)),
        }
    }

    fn usable_access_token(&self) -> Option<String> {
        let token = self.session.get(SessionKey::AccessToken);
        let status = token_status(token.as_deref());
        if status.is_usable() {
            token
        } else {
            debug!(?status, "Access token is not usable");
            None
        }
    }

    /// Exchange the refresh token for a new access token and store it.
    /// The refresh token itself is not rotated.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<String, AuthFailure> {
        info!("Refreshing access token");

        let response = self
            .client
            .post(self.endpoint(REFRESH_PATH))
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|e| AuthFailure::RefreshTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthFailure::RefreshRejected(status.as_u16()));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthFailure::MalformedRefreshResponse(e.to_string()))?;
        if body.access_token.is_empty() {
            return Err(AuthFailure::MalformedRefreshResponse(
                "empty access_token".to_string(),
            ));
        }

        self.session
            .set(SessionKey::AccessToken, &body.access_token)
            .map_err(|e| AuthFailure::StoreUnavailable(e.to_string()))?;

        debug!("Access token refreshed");
        Ok(body.access_token)
    }

    /// Drop both stored tokens and hand the failure back to the caller
    fn fail_closed(&self, failure: AuthFailure) -> AuthFailure {
        warn!(reason = %failure, "Authentication failed, clearing stored tokens");
        if let Err(e) = self.session.clear_tokens() {
            warn!(error = %e, "Failed to clear stored tokens");
        }
        failure
    }
}
