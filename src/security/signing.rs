//! HMAC request signing for upstream calls.
//!
//! The signature is `hex(HMAC-SHA256(path + "," + unix_timestamp))`, sent in
//! `Authorization` with the timestamp in `X-Authorization-Time`.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue, InvalidHeaderValue};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const X_AUTHORIZATION_TIME: HeaderName = HeaderName::from_static("x-authorization-time");

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("invalid HMAC key: {0}")]
    Key(#[from] hmac::digest::InvalidLength),

    #[error("signature is not a valid header value: {0}")]
    Header(#[from] InvalidHeaderValue),
}

/// Compute the hex-encoded signature for `path` at `timestamp`.
pub fn signature(secret: &str, path: &str, timestamp: u64) -> Result<String, SigningError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())?;
    mac.update(format!("{},{}", path, timestamp).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Seconds since the unix epoch.
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Insert signature headers for `path`, signed at the current time.
pub fn sign_headers(headers: &mut HeaderMap, secret: &str, path: &str) -> Result<(), SigningError> {
    let timestamp = unix_timestamp();
    let signature = signature(secret, path, timestamp)?;

    headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&signature)?);
    headers.insert(X_AUTHORIZATION_TIME, HeaderValue::from(timestamp));
    Ok(())
}
