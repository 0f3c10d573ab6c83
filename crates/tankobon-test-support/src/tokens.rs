//! JWT-shaped tokens for tests. Signatures are placeholders; nothing here verifies them.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

const HEADER: &[u8] = br#"{"alg":"HS256","typ":"JWT"}"#;
const SIGNATURE: &str = "dGVzdC1zaWduYXR1cmU";

/// Encode `claims` as the payload of a three-segment token.
#[must_use]
pub fn mint_token(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(HEADER);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.{SIGNATURE}")
}

/// Token for a regular user that expires in an hour.
#[must_use]
pub fn token_for(username: &str) -> String {
    mint_token(&json!({
        "sub": username,
        "is_admin": false,
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
    }))
}

/// Token for an administrator that expires in an hour.
#[must_use]
pub fn admin_token_for(username: &str) -> String {
    mint_token(&json!({
        "sub": username,
        "is_admin": true,
        "exp": (Utc::now() + Duration::hours(1)).timestamp(),
    }))
}
