//! Typed access to the remote endpoints the dashboard uses.
//!
//! Each service borrows an `ApiClient`; everything except login goes
//! through the authenticated request wrapper.

pub mod auth;
pub mod scans;
pub mod users;

pub use auth::AuthService;
pub use scans::ScanService;
pub use users::{RoleService, UserService};

use crate::api::ApiClient;

impl ApiClient {
    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    pub fn users(&self) -> UserService<'_> {
        UserService::new(self)
    }

    pub fn roles(&self) -> RoleService<'_> {
        RoleService::new(self)
    }

    pub fn scans(&self) -> ScanService<'_> {
        ScanService::new(self)
    }
}
