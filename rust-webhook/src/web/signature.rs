//! Notification signature verification.
//!
//! Senders sign each notification with HMAC-SHA256 over the raw body followed
//! by the timestamp, and send `hash=<hex>, timestamp=<int>` in the
//! `X-Ghost-Signature` header. Ghost itself uses the keys `sha256` and `t`,
//! which are accepted as aliases.

use std::time::{SystemTime, UNIX_EPOCH};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::warn;

use crate::error::WebhookError;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-ghost-signature";

/// Timestamps above this are taken to be milliseconds.
const MILLIS_THRESHOLD: u64 = 100_000_000_000;

/// Why a signature was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature header missing")]
    Missing,
    #[error("signature header malformed")]
    Malformed,
    #[error("signature does not match")]
    Invalid,
    #[error("signature timestamp outside allowed window")]
    Stale,
}

impl From<SignatureError> for WebhookError {
    fn from(err: SignatureError) -> Self {
        match err {
            SignatureError::Missing => WebhookError::SignatureMissing,
            _ => WebhookError::SignatureInvalid,
        }
    }
}

/// Parsed signature header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureHeader<'a> {
    pub hash: &'a str,
    pub timestamp: &'a str,
}

/// Parse a `key=value, key=value` signature header.
///
/// Keys may come in any order. Unknown keys are ignored. Returns `None` when
/// either the hash or the timestamp is missing or empty.
pub fn parse_signature_header(header: &str) -> Option<SignatureHeader<'_>> {
    let mut hash = None;
    let mut timestamp = None;

    for pair in header.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "hash" | "sha256" => hash = Some(value),
            "timestamp" | "t" => timestamp = Some(value),
            _ => {}
        }
    }

    match (hash, timestamp) {
        (Some(hash), Some(timestamp)) if !hash.is_empty() && !timestamp.is_empty() => {
            Some(SignatureHeader { hash, timestamp })
        }
        _ => None,
    }
}

/// Compute the hex signature a trusted sender would produce.
pub fn compute_signature(secret: &str, body: &[u8], timestamp: &str) -> String {
    hex::encode(keyed_mac(secret, body, timestamp).finalize().into_bytes())
}

fn keyed_mac(secret: &str, body: &[u8], timestamp: &str) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(body);
    mac.update(timestamp.as_bytes());
    mac
}

/// Verify a notification signature.
///
/// Returns `true` only for a present, well-formed header whose hash matches
/// `HMAC-SHA256(secret, body || timestamp)`. The comparison is constant-time.
pub fn verify_signature(secret: &str, body: &[u8], header: Option<&str>) -> bool {
    check_signature(secret, body, header).is_ok()
}

/// Like [`verify_signature`] but reports why verification failed.
///
/// On success returns the signed timestamp.
pub fn check_signature<'a>(
    secret: &str,
    body: &[u8],
    header: Option<&'a str>,
) -> Result<&'a str, SignatureError> {
    let header = header.ok_or(SignatureError::Missing)?;
    let parsed = parse_signature_header(header).ok_or_else(|| {
        warn!(header_length = header.len(), "signature_header_malformed");
        SignatureError::Malformed
    })?;

    if secret.is_empty() {
        warn!("signature_secret_empty");
        return Err(SignatureError::Invalid);
    }

    let received = hex::decode(parsed.hash).map_err(|_| {
        warn!(actual_length = parsed.hash.len(), "signature_not_hex");
        SignatureError::Invalid
    })?;

    keyed_mac(secret, body, parsed.timestamp)
        .verify_slice(&received)
        .map_err(|_| {
            warn!(actual_length = parsed.hash.len(), "signature_mismatch");
            SignatureError::Invalid
        })?;

    Ok(parsed.timestamp)
}

/// Reject timestamps further than `max_age_seconds` from `now_seconds`.
pub fn check_timestamp_age(
    timestamp: &str,
    max_age_seconds: u64,
    now_seconds: u64,
) -> Result<(), SignatureError> {
    let raw: u64 = timestamp.parse().map_err(|_| {
        warn!(timestamp = %timestamp, "signature_invalid_timestamp");
        SignatureError::Malformed
    })?;

    let signed_at = if raw > MILLIS_THRESHOLD { raw / 1000 } else { raw };
    let age = now_seconds.abs_diff(signed_at);

    if age > max_age_seconds {
        warn!(
            signed_at = signed_at,
            current_time = now_seconds,
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "signature_stale"
        );
        return Err(SignatureError::Stale);
    }

    Ok(())
}

/// Full check used by the endpoint: signature, then the optional replay window.
pub fn verify_notification(
    secret: &str,
    body: &[u8],
    header: Option<&str>,
    max_age_seconds: Option<u64>,
) -> Result<(), SignatureError> {
    let timestamp = check_signature(secret, body, header)?;

    if let Some(max_age) = max_age_seconds {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        check_timestamp_age(timestamp, max_age, now)?;
    }

    Ok(())
}
