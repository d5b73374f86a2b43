use crate::core::errors::ExchangeError;
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};

/// Validity window of a WebSocket auth signature.
const AUTH_TTL_MS: u64 = 10_000;

/// Builds the `auth` request the private v5 WebSocket expects as its first
/// message: the signature covers the literal `GET/realtime{expires}`.
pub fn ws_auth_request(api_key: &str, secret_key: &str) -> Result<String, ExchangeError> {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ExchangeError::Other(format!("Failed to get timestamp: {}", e)))?
        .as_millis() as u64;
    let expires = now_ms + AUTH_TTL_MS;

    let payload = format!("GET/realtime{}", expires);
    let mut mac = Hmac::<Sha256>::new_from_slice(secret_key.as_bytes())
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(json!({
        "op": "auth",
        "args": [api_key, expires, signature],
    })
    .to_string())
}
