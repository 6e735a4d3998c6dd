//! Authentication module for access-token validity and session credentials.
//!
//! This module provides:
//! - `token`: decoding of the JWT expiry claim and the usability predicate
//! - `session`: the `SessionStore` trait with in-memory and on-disk stores
//!
//! An access token is usable only while its expiry is more than ten
//! minutes away.

pub mod session;
pub mod token;

pub use session::{
    FileSessionStore, MemorySessionStore, SessionChange, SessionError, SessionEvent, SessionKey,
    SessionProfile, SessionStore,
};
pub use token::{is_authenticated, token_status, token_status_at, TokenStatus};
