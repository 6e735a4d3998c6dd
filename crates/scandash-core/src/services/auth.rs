use reqwest::header;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError, RequestOptions, RequestOutcome};
use crate::auth::{SessionKey, SessionProfile};
use crate::models::LoginResponse;

const LOGIN_PATH: &str = "/v1/auth/login";
const LOGOUT_PATH: &str = "/v1/auth/logout";

#[derive(Debug, Serialize)]
struct LogoutRequest<'a> {
    refresh_token: &'a str,
}

/// Sign-in and sign-out against the remote auth API
pub struct AuthService<'a> {
    api: &'a ApiClient,
}

impl<'a> AuthService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Authenticate and store the new session.
    ///
    /// The login endpoint takes form-encoded credentials and is called
    /// without a bearer token.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let response = self
            .api
            .http()
            .post(self.api.endpoint(LOGIN_PATH))
            .header(header::ACCEPT, "application/json")
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let response = ApiClient::check_response(response).await?;
        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {}", e)))?;

        let session = self.api.session();
        session.clear()?;
        session.set(SessionKey::AccessToken, &login.access_token)?;
        session.set(SessionKey::RefreshToken, &login.refresh_token)?;
        session.set_profile(&SessionProfile {
            email: Some(login.user.email.clone()),
            username: Some(login.user.username.clone()),
            roles: login.user.role.iter().filter(|r| !r.is_empty()).cloned().collect(),
        })?;

        info!(username = %login.user.username, "Signed in");
        Ok(login)
    }

    /// End the session.
    ///
    /// The refresh token is revoked remotely while it is still stored, then
    /// every session value is removed whatever the remote outcome. Returns
    /// whether the remote revocation succeeded.
    pub async fn logout(&self) -> Result<bool, ApiError> {
        let session = self.api.session();
        let access_token = session.get(SessionKey::AccessToken);
        let refresh_token = session.get(SessionKey::RefreshToken);

        let revoked = match (access_token, refresh_token) {
            (Some(_), Some(refresh_token)) => self.revoke(&refresh_token).await,
            _ => {
                debug!("No stored tokens, skipping remote logout");
                false
            }
        };

        session.clear()?;
        info!(revoked, "Signed out");
        Ok(revoked)
    }

    async fn revoke(&self, refresh_token: &str) -> bool {
        let options = match RequestOptions::post().json(&LogoutRequest { refresh_token }) {
            Ok(options) => options,
            Err(e) => {
                warn!(error = %e, "Failed to build logout request");
                return false;
            }
        };

        match self.api.request(&self.api.endpoint(LOGOUT_PATH), options).await {
            Ok(RequestOutcome::Response(response)) if response.status().is_success() => true,
            Ok(RequestOutcome::Response(response)) => {
                warn!(status = %response.status(), "Logout request failed, signing out locally");
                false
            }
            Ok(outcome) => {
                warn!(error = ?outcome.error_code(), "Logout request failed, signing out locally");
                false
            }
            Err(e) => {
                warn!(error = %e, "Logout request failed, signing out locally");
                false
            }
        }
    }

    /// Display attributes cached at login
    pub fn profile(&self) -> SessionProfile {
        self.api.session().profile()
    }

    /// Whether a session exists that requests could use or refresh
    pub fn has_session(&self) -> bool {
        let session = self.api.session();
        session.get(SessionKey::AccessToken).is_some() || session.get(SessionKey::RefreshToken).is_some()
    }
}
