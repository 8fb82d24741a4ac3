use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tracing::debug;

pub const HEADER_TIMESTAMP: &str = "X-Slack-Request-Timestamp";
pub const HEADER_SIGNATURE: &str = "X-Slack-Signature";

/// Maximum tolerated distance, in seconds, between the request timestamp and now.
pub const REPLAY_WINDOW_SECS: u64 = 300;

const SIGNATURE_VERSION: &str = "v0";

/// Reasons a signed request is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("{0} header is required")]
    MissingHeader(&'static str),
    #[error("invalid request timestamp {0:?}")]
    InvalidTimestamp(String),
    #[error("stale request: timestamp is {skew_seconds}s away from now")]
    Stale { skew_seconds: u64 },
    #[error("signature must be of the form 'v0=<hex>'")]
    MalformedSignature,
    #[error("signature mismatch")]
    Mismatch,
    #[error("failed to initialize signature verifier")]
    InvalidKey,
}

/// Verifies the `v0` HMAC-SHA-256 signature Slack attaches to every request.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Arc<[u8]>,
}

impl SignatureVerifier {
    /// Creates a verifier keyed by the workspace signing secret.
    pub fn new(secret: Arc<[u8]>) -> Self {
        Self { secret }
    }

    /// Checks freshness and authenticity of a request.
    ///
    /// `timestamp` and `signature` are the raw header values, `body` the
    /// unparsed request body. The timestamp is fed into the signing string
    /// exactly as received.
    pub fn verify(
        &self,
        timestamp: Option<&str>,
        signature: Option<&str>,
        body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), SignatureError> {
        let timestamp_raw = timestamp.ok_or(SignatureError::MissingHeader(HEADER_TIMESTAMP))?;
        let signature = signature.ok_or(SignatureError::MissingHeader(HEADER_SIGNATURE))?;
        debug!(stage = "signature", timestamp = timestamp_raw, signature, "verifying request");

        let timestamp: i64 = timestamp_raw
            .parse()
            .map_err(|_| SignatureError::InvalidTimestamp(timestamp_raw.to_string()))?;

        let skew_seconds = now.timestamp().abs_diff(timestamp);
        if skew_seconds > REPLAY_WINDOW_SECS {
            return Err(SignatureError::Stale { skew_seconds });
        }

        let provided = signature
            .strip_prefix("v0=")
            .and_then(|hex_part| hex::decode(hex_part).ok())
            .ok_or(SignatureError::MalformedSignature)?;

        let expected = self.mac(timestamp_raw, body)?.finalize().into_bytes();
        debug!(
            stage = "signature",
            body_len = body.len(),
            computed = %format!("{SIGNATURE_VERSION}={}", hex::encode(&expected)),
            "computed signature"
        );

        let expected_bytes: &[u8] = expected.as_ref();
        if expected_bytes.ct_eq(provided.as_slice()).into() {
            Ok(())
        } else {
            Err(SignatureError::Mismatch)
        }
    }

    /// Returns the `v0=<hex>` signature for the given timestamp and body.
    pub fn compute_signature(&self, timestamp: &str, body: &[u8]) -> Result<String, SignatureError> {
        let digest = self.mac(timestamp, body)?.finalize().into_bytes();
        Ok(format!("{SIGNATURE_VERSION}={}", hex::encode(digest)))
    }

    fn mac(&self, timestamp: &str, body: &[u8]) -> Result<Hmac<Sha256>, SignatureError> {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(&self.secret).map_err(|_| SignatureError::InvalidKey)?;
        mac.update(SIGNATURE_VERSION.as_bytes());
        mac.update(b":");
        mac.update(timestamp.as_bytes());
        mac.update(b":");
        mac.update(body);
        Ok(mac)
    }
}
