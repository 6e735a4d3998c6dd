//! REST API client module for the remote scanning service.
//!
//! Every call except login goes through `ApiClient::request`, which makes
//! sure a usable bearer token is attached first. An access token that is
//! missing or close to expiry is exchanged for a new one using the stored
//! refresh token; when that is impossible the call fails closed with
//! `RequestOutcome::NotAuthenticated` and the stored tokens are dropped.

pub mod client;
pub mod error;
pub mod request;

pub use client::ApiClient;
pub use error::{ApiError, AuthFailure};
pub use request::{RequestBody, RequestOptions, RequestOutcome};
