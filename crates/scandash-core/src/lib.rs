//! Core library for scandash.
//!
//! scandash is a client for a remote security-scanning service. The remote
//! side does every DNS, TLS, HTTP and CVE analysis; this crate holds the
//! session credentials, wraps each call in a token-refreshing request
//! pipeline, and exposes the remote endpoints as typed services.
//!
//! - `auth`: access-token validity and the session store
//! - `api`: the authenticated request wrapper and its error types
//! - `services`: typed auth, user, role and scan endpoints
//! - `models`: remote data shapes and the printable scan report
//! - `config`: on-disk configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod services;

pub use api::{ApiClient, ApiError, AuthFailure, RequestBody, RequestOptions, RequestOutcome};
pub use auth::{FileSessionStore, MemorySessionStore, SessionKey, SessionStore};
pub use config::Config;
