//! Identity derived from the bearer token.
//!
//! # Design
//! - The token payload is decoded offline; the signature is never checked here.
//! - Decoding never fails loudly: anything unreadable collapses to the neutral identity.
//! - Identity is a projection of the token and is recomputed rather than cached.

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Username/role pair derived from the current token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Subject claim of the token, when present.
    pub username: Option<String>,
    /// Admin role claim of the token; `false` when absent.
    pub is_admin: bool,
}

impl SessionIdentity {
    /// Identity used whenever no usable token is present.
    #[must_use]
    pub const fn neutral() -> Self {
        Self {
            username: None,
            is_admin: false,
        }
    }

    /// Derive the identity for a token string.
    ///
    /// Empty and malformed tokens yield [`SessionIdentity::neutral`].
    #[must_use]
    pub fn from_token(token: &str) -> Self {
        TokenClaims::decode(token).map_or_else(Self::neutral, |claims| Self {
            username: claims.subject,
            is_admin: claims.is_admin,
        })
    }

    /// Whether the identity carries a username.
    #[must_use]
    pub const fn is_signed_in(&self) -> bool {
        self.username.is_some()
    }
}

/// Claims read from a token payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenClaims {
    /// `sub` claim (empty strings are treated as missing).
    pub subject: Option<String>,
    /// `is_admin` (or legacy `admin`) claim.
    pub is_admin: bool,
    /// `exp` claim converted to a UTC timestamp.
    pub expires_at: Option<DateTime<Utc>>,
}

impl TokenClaims {
    /// Decode the payload segment of a `header.payload.signature` token.
    ///
    /// Returns `None` when the token is empty, has the wrong shape, or the
    /// payload is not a base64url-encoded JSON object.
    #[must_use]
    pub fn decode(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        let mut segments = token.split('.');
        let (Some(_header), Some(payload), Some(_signature), None) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        ) else {
            return None;
        };

        let bytes = general_purpose::URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let object = match serde_json::from_slice::<Value>(&bytes).ok()? {
            Value::Object(map) => map,
            _ => return None,
        };
        Some(Self::from_object(&object))
    }

    fn from_object(object: &Map<String, Value>) -> Self {
        let subject = object
            .get("sub")
            .and_then(Value::as_str)
            .filter(|sub| !sub.is_empty())
            .map(str::to_string);
        let is_admin = object
            .get("is_admin")
            .or_else(|| object.get("admin"))
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let expires_at = object
            .get("exp")
            .and_then(Value::as_i64)
            .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));
        Self {
            subject,
            is_admin,
            expires_at,
        }
    }

    /// Whether the `exp` claim lies in the past relative to `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn token_with(payload: &Value) -> String {
        let header = general_purpose::URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let body = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{header}.{body}.c2lnbmF0dXJl")
    }

    #[test]
    fn absent_and_malformed_tokens_are_neutral() {
        for token in [
            "",
            "   ",
            "not-a-token",
            "a.b",
            "a.b.c.d",
            "header.%%%.sig",
            "header.bm90IGpzb24.sig",
            "header.WzEsMiwzXQ.sig",
        ] {
            assert_eq!(
                SessionIdentity::from_token(token),
                SessionIdentity::neutral(),
                "token {token:?}"
            );
        }
    }

    #[test]
    fn subject_without_admin_claim_defaults_to_false() {
        let token = token_with(&json!({"sub": "alice"}));
        assert_eq!(
            SessionIdentity::from_token(&token),
            SessionIdentity {
                username: Some("alice".to_string()),
                is_admin: false,
            }
        );
    }

    #[test]
    fn admin_claim_is_read_from_either_name() {
        let modern = token_with(&json!({"sub": "root", "is_admin": true}));
        let legacy = token_with(&json!({"sub": "root", "admin": true}));
        assert!(SessionIdentity::from_token(&modern).is_admin);
        assert!(SessionIdentity::from_token(&legacy).is_admin);
    }

    #[test]
    fn wrongly_typed_claims_fall_back_to_defaults() {
        let token = token_with(&json!({"sub": 42, "is_admin": "yes"}));
        assert_eq!(
            SessionIdentity::from_token(&token),
            SessionIdentity::neutral()
        );
        let empty_sub = token_with(&json!({"sub": ""}));
        assert!(!SessionIdentity::from_token(&empty_sub).is_signed_in());
    }

    #[test]
    fn padded_payload_segments_decode() {
        let body = general_purpose::URL_SAFE.encode(br#"{"sub":"bob"}"#);
        let token = format!("h.{body}.s");
        assert_eq!(
            SessionIdentity::from_token(&token).username.as_deref(),
            Some("bob")
        );
    }

    #[test]
    fn expiry_claim_is_exposed() {
        let token = token_with(&json!({"sub": "alice", "exp": 1_700_000_000}));
        let claims = TokenClaims::decode(&token).expect("claims");
        let expires_at = claims.expires_at.expect("expiry");
        assert_eq!(expires_at.timestamp(), 1_700_000_000);
        assert!(claims.is_expired_at(expires_at));
        assert!(!claims.is_expired_at(expires_at - chrono::Duration::seconds(1)));
    }
}
