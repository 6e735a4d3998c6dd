#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;
use scandash_core::{ApiClient, MemorySessionStore, SessionKey, SessionStore};
use wiremock::MockServer;

/// Unsigned JWT expiring `secs_from_now` seconds from now
pub fn token_expiring_in(secs_from_now: i64) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = serde_json::json!({ "sub": "user-1", "exp": Utc::now().timestamp() + secs_from_now });
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

pub fn valid_token() -> String {
    token_expiring_in(3600)
}

pub fn expired_token() -> String {
    token_expiring_in(-60)
}

pub fn client_for(base_url: &str) -> ApiClient {
    ApiClient::new(
        base_url,
        Duration::from_secs(5),
        Arc::new(MemorySessionStore::new()),
    )
    .expect("client should build")
}

/// Client against the mock server with the given tokens stored
pub fn signed_in(server: &MockServer, access: Option<&str>, refresh: Option<&str>) -> ApiClient {
    let api = client_for(&server.uri());
    if let Some(token) = access {
        api.session().set(SessionKey::AccessToken, token).unwrap();
    }
    if let Some(token) = refresh {
        api.session().set(SessionKey::RefreshToken, token).unwrap();
    }
    api
}
