use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{ApiClient, ApiError, RequestOptions};
use crate::models::{NewUser, Role, RoleAssignment, UserDetail, UserSummary, UserUpdate};

#[derive(Debug, Serialize)]
struct ResetPasswordRequest<'a> {
    new_password: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: Option<String>,
}

/// User management endpoints
pub struct UserService<'a> {
    api: &'a ApiClient,
}

impl<'a> UserService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    /// Fetch every user together with their role names
    pub async fn list_with_roles(&self) -> Result<Vec<UserSummary>, ApiError> {
        self.api
            .send_json("/v1/users/list-with-roles", RequestOptions::get())
            .await
    }

    pub async fn get(&self, user_id: &str) -> Result<UserDetail, ApiError> {
        self.api
            .send_json(&format!("/v1/users/{}", user_id), RequestOptions::get())
            .await
    }

    pub async fn create(&self, user: &NewUser) -> Result<UserDetail, ApiError> {
        if let Some(field) = user.missing_field() {
            return Err(ApiError::InvalidRequest(format!("{} is required", field)));
        }
        let created: UserDetail = self
            .api
            .send_json("/v1/users/", RequestOptions::post().json(user)?)
            .await?;
        info!(username = %created.username, "User created");
        Ok(created)
    }

    /// Apply a partial update; an update with no fields is rejected locally
    pub async fn update(&self, user_id: &str, update: &UserUpdate) -> Result<UserDetail, ApiError> {
        if update.is_empty() {
            return Err(ApiError::InvalidRequest(
                "at least one field must change".to_string(),
            ));
        }
        self.api
            .send_json(
                &format!("/v1/users/update/{}", user_id),
                RequestOptions::put().json(update)?,
            )
            .await
    }

    /// Set a new password; returns the server's confirmation message
    pub async fn reset_password(&self, user_id: &str, new_password: &str) -> Result<String, ApiError> {
        if new_password.is_empty() {
            return Err(ApiError::InvalidRequest("new password is required".to_string()));
        }
        let reply: MessageResponse = self
            .api
            .send_json(
                &format!("/v1/users/reset-password/{}", user_id),
                RequestOptions::put().json(&ResetPasswordRequest { new_password })?,
            )
            .await?;
        Ok(reply
            .message
            .unwrap_or_else(|| "Password reset".to_string()))
    }

    pub async fn delete(&self, user_id: &str) -> Result<(), ApiError> {
        self.api
            .send_empty(&format!("/v1/users/delete/{}", user_id), RequestOptions::delete())
            .await?;
        info!(user_id, "User deleted");
        Ok(())
    }
}

/// Role catalogue and role assignment endpoints
pub struct RoleService<'a> {
    api: &'a ApiClient,
}

impl<'a> RoleService<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn list(&self) -> Result<Vec<Role>, ApiError> {
        self.api.send_json("/v1/roles/list", RequestOptions::get()).await
    }

    pub async fn assign(&self, user_id: &str, role_id: &str) -> Result<RoleAssignment, ApiError> {
        let body = RoleAssignment {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        };
        self.api
            .send_json("/v1/roles/assign", RequestOptions::post().json(&body)?)
            .await
    }

    pub async fn remove(&self, user_id: &str, role_id: &str) -> Result<(), ApiError> {
        let body = RoleAssignment {
            user_id: user_id.to_string(),
            role_id: role_id.to_string(),
        };
        self.api
            .send_empty("/v1/roles/remove", RequestOptions::delete().json(&body)?)
            .await
    }

    /// Look up a role by its display name
    pub async fn find_by_name(&self, role_name: &str) -> Result<Option<Role>, ApiError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|r| r.role_name.eq_ignore_ascii_case(role_name)))
    }
}
