use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Safety margin before expiry in seconds.
/// A token closer than this to its `exp` is treated as unusable so the
/// refresh round-trip and in-flight requests still see a live credential.
pub const EXPIRY_MARGIN_SECS: i64 = 10 * 60;

/// Result of inspecting an access token without verifying its signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    /// No token, or an empty string
    Missing,
    /// The payload could not be decoded or carries no numeric `exp`
    Malformed(String),
    /// Decoded, but expires within the safety margin (or already expired)
    Expiring { seconds_left: i64 },
    /// Decoded and comfortably before expiry
    Valid { seconds_left: i64 },
}

impl TokenStatus {
    pub fn is_usable(&self) -> bool {
        matches!(self, TokenStatus::Valid { .. })
    }
}

/// Check whether an access token can be sent as-is.
pub fn is_authenticated(token: Option<&str>) -> bool {
    token_status(token).is_usable()
}

/// Inspect a token against the current wall clock.
pub fn token_status(token: Option<&str>) -> TokenStatus {
    token_status_at(token, Utc::now())
}

/// Inspect a token against an explicit clock reading.
pub fn token_status_at(token: Option<&str>, now: DateTime<Utc>) -> TokenStatus {
    let token = match token {
        Some(t) if !t.is_empty() => t,
        _ => return TokenStatus::Missing,
    };

    let exp = match decode_expiry(token) {
        Ok(exp) => exp,
        Err(reason) => {
            debug!(%reason, "Access token could not be decoded");
            return TokenStatus::Malformed(reason);
        }
    };

    let remaining = exp - now.timestamp() as f64;
    let seconds_left = remaining.floor() as i64;
    if remaining > EXPIRY_MARGIN_SECS as f64 {
        TokenStatus::Valid { seconds_left }
    } else {
        TokenStatus::Expiring { seconds_left }
    }
}

/// Read the `exp` claim from the payload segment of a JWT.
fn decode_expiry(token: &str) -> Result<f64, String> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| "missing payload segment".to_string())?;

    // Accept standard-alphabet and padded encodings as well as base64url
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .map_err(|e| format!("invalid payload base64: {}", e))?;

    let claims: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|e| format!("invalid payload JSON: {}", e))?;

    claims
        .get("exp")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| "missing 'exp' claim".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_token(claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_missing_token_is_invalid() {
        assert!(!is_authenticated(None));
        assert!(!is_authenticated(Some("")));
        assert_eq!(token_status_at(None, fixed_now()), TokenStatus::Missing);
    }

    #[test]
    fn test_expiry_margin_boundary() {
        let now = fixed_now();
        let just_over = make_token(serde_json::json!({ "exp": now.timestamp() + 601 }));
        let just_under = make_token(serde_json::json!({ "exp": now.timestamp() + 599 }));
        let exactly = make_token(serde_json::json!({ "exp": now.timestamp() + 600 }));

        assert_eq!(
            token_status_at(Some(&just_over), now),
            TokenStatus::Valid { seconds_left: 601 }
        );
        assert_eq!(
            token_status_at(Some(&just_under), now),
            TokenStatus::Expiring { seconds_left: 599 }
        );
        assert!(!token_status_at(Some(&exactly), now).is_usable());
    }

    #[test]
    fn test_already_expired() {
        let now = fixed_now();
        let token = make_token(serde_json::json!({ "exp": now.timestamp() - 30 }));
        assert_eq!(
            token_status_at(Some(&token), now),
            TokenStatus::Expiring { seconds_left: -30 }
        );
    }

    #[test]
    fn test_malformed_tokens_never_panic() {
        let now = fixed_now();
        for bad in ["not-a-jwt", "a.%%%.c", "a.bm90IGpzb24.c", "."] {
            assert!(
                matches!(token_status_at(Some(bad), now), TokenStatus::Malformed(_)),
                "expected malformed for {:?}",
                bad
            );
        }

        let no_exp = make_token(serde_json::json!({ "sub": "user-1" }));
        assert!(matches!(
            token_status_at(Some(&no_exp), now),
            TokenStatus::Malformed(_)
        ));

        let text_exp = make_token(serde_json::json!({ "exp": "tomorrow" }));
        assert!(!token_status_at(Some(&text_exp), now).is_usable());
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let now = fixed_now();
        let payload = base64::engine::general_purpose::URL_SAFE
            .encode(serde_json::json!({ "exp": now.timestamp() + 3600 }).to_string());
        let token = format!("header.{}.sig", payload);
        assert!(token_status_at(Some(&token), now).is_usable());
    }

    #[test]
    fn test_against_wall_clock() {
        let exp = Utc::now().timestamp() + 3600;
        let token = make_token(serde_json::json!({ "exp": exp }));
        assert!(is_authenticated(Some(&token)));
    }
}
