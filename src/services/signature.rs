//! Webhook request authentication.
//!
//! Inbound webhooks are authenticated with an HMAC-SHA256 signature over
//! the raw request body, with a provider-issued static API key as a
//! fallback credential. Either check passing is sufficient.
//!
//! # Signature Header
//!
//! The primary format is the compound `t=<unix-ts>,v1=<digest>`. When the
//! header does not match that format, the whole header value is treated as
//! the digest itself, which keeps older providers working. Digests are
//! accepted hex- or base64-encoded, with an optional `sha256=` prefix.
//!
//! # Replay Protection
//!
//! When a timestamp is present, requests outside a 300 second window are
//! rejected. Providers that omit the timestamp only produce a warning;
//! rejecting them would break otherwise-valid integrations.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::config::Config;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age (or future skew) of a signed webhook before it's rejected.
const REPLAY_WINDOW_SECS: i64 = 300;

/// Verifies webhook authenticity against the configured credentials.
///
/// # Missing Secret
///
/// Without a configured secret the verifier fails closed in production and
/// fails open with a warning elsewhere. The open mode exists for local
/// development against gateway simulators and must never be deployed.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: Option<String>,
    api_key: Option<String>,
    fail_closed: bool,
}

impl SignatureVerifier {
    pub fn new(secret: Option<String>, api_key: Option<String>, fail_closed: bool) -> Self {
        Self {
            secret,
            api_key,
            fail_closed,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.webhook_secret.clone(),
            config.webhook_api_key.clone(),
            config.is_production(),
        )
    }

    /// Authenticate a webhook delivery.
    ///
    /// `signature` is the raw value of the signature header, if any;
    /// `api_key` the raw value of the `x-api-key` header. HMAC is checked
    /// first, the static key second; either success is enough.
    pub fn verify(&self, body: &[u8], signature: Option<&str>, api_key: Option<&str>) -> bool {
        if self.verify_hmac(body, signature) {
            return true;
        }
        self.verify_api_key(api_key)
    }

    fn verify_hmac(&self, body: &[u8], header: Option<&str>) -> bool {
        let Some(secret) = self.secret.as_deref() else {
            if self.fail_closed {
                tracing::error!("webhook secret not configured; rejecting delivery");
                return false;
            }
            tracing::warn!(
                "webhook secret not configured; accepting unverified delivery (development only)"
            );
            return true;
        };

        let Some(header) = header else {
            return false;
        };

        let (timestamp, digest) = parse_signature_header(header);

        match timestamp {
            Some(ts) => {
                let skew = (Utc::now().timestamp() - ts).abs();
                if skew > REPLAY_WINDOW_SECS {
                    tracing::warn!(skew, "webhook signature timestamp outside replay window");
                    return false;
                }
            }
            None => {
                tracing::warn!("webhook signature carries no timestamp; replay window not enforced");
            }
        }

        let Some(provided) = decode_digest(digest) else {
            tracing::warn!("webhook signature digest is neither hex nor base64");
            return false;
        };

        let mut mac =
            HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC key length is valid");
        mac.update(body);
        let expected = mac.finalize().into_bytes();

        // Length is not secret (always 32 bytes for SHA-256), so an early
        // length check before the constant-time comparison is fine.
        if expected.len() != provided.len() {
            return false;
        }

        expected.as_slice().ct_eq(provided.as_slice()).into()
    }

    fn verify_api_key(&self, provided: Option<&str>) -> bool {
        match (self.api_key.as_deref(), provided) {
            (Some(expected), Some(provided)) if !expected.is_empty() => {
                expected.as_bytes().ct_eq(provided.as_bytes()).into()
            }
            _ => false,
        }
    }
}

/// Split a signature header into (timestamp, digest).
///
/// Understands `t=<unix-ts>,v1=<digest>`; any header without a `v1` part is
/// returned whole as the digest with no timestamp.
fn parse_signature_header(header: &str) -> (Option<i64>, &str) {
    let mut timestamp = None;
    let mut digest = None;

    for part in header.split(',') {
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t.trim().parse::<i64>().ok();
        } else if let Some(d) = part.strip_prefix("v1=") {
            digest = Some(d.trim());
        }
    }

    match digest {
        Some(d) => (timestamp, d),
        None => (None, header),
    }
}

/// Decode a digest given as hex or base64, with an optional `sha256=`
/// prefix some senders add.
fn decode_digest(raw: &str) -> Option<Vec<u8>> {
    let raw = raw.strip_prefix("sha256=").unwrap_or(raw);
    if let Ok(bytes) = hex::decode(raw) {
        return Some(bytes);
    }
    BASE64_STANDARD.decode(raw).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test_secret";

    fn verifier() -> SignatureVerifier {
        SignatureVerifier::new(Some(SECRET.to_string()), None, false)
    }

    fn hmac_hex(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    fn compound_header(secret: &str, body: &[u8], timestamp: i64) -> String {
        format!("t={},v1={}", timestamp, hmac_hex(secret, body))
    }

    #[test]
    fn accepts_valid_compound_signature() {
        let body = br#"{"order_id":"R1","status":"SUCCESS"}"#;
        let header = compound_header(SECRET, body, Utc::now().timestamp());
        assert!(verifier().verify(body, Some(&header), None));
    }

    #[test]
    fn accepts_bare_hex_digest() {
        let body = b"payload";
        let header = hmac_hex(SECRET, body);
        assert!(verifier().verify(body, Some(&header), None));
    }

    #[test]
    fn accepts_base64_digest() {
        let body = b"payload";
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(body);
        let header = BASE64_STANDARD.encode(mac.finalize().into_bytes());
        assert!(verifier().verify(body, Some(&header), None));
    }

    #[test]
    fn accepts_sha256_prefixed_digest() {
        let body = b"payload";
        let header = format!("sha256={}", hmac_hex(SECRET, body));
        assert!(verifier().verify(body, Some(&header), None));
    }

    #[test]
    fn rejects_mutated_body() {
        let body = br#"{"order_id":"R1","status":"SUCCESS"}"#;
        let header = compound_header(SECRET, body, Utc::now().timestamp());
        let tampered = br#"{"order_id":"R2","status":"SUCCESS"}"#;
        assert!(!verifier().verify(tampered, Some(&header), None));
    }

    #[test]
    fn rejects_mutated_signature() {
        let body = b"payload";
        let mut header = hmac_hex(SECRET, body);
        // Flip the last hex character.
        let last = if header.ends_with('0') { "1" } else { "0" };
        header.truncate(header.len() - 1);
        header.push_str(last);
        assert!(!verifier().verify(body, Some(&header), None));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let body = b"payload";
        let stale = Utc::now().timestamp() - 301;
        let header = compound_header(SECRET, body, stale);
        assert!(!verifier().verify(body, Some(&header), None));
    }

    #[test]
    fn rejects_future_timestamp() {
        let body = b"payload";
        let future = Utc::now().timestamp() + 301;
        let header = compound_header(SECRET, body, future);
        assert!(!verifier().verify(body, Some(&header), None));
    }

    #[test]
    fn rejects_missing_header() {
        assert!(!verifier().verify(b"payload", None, None));
    }

    #[test]
    fn api_key_fallback_accepts_matching_key() {
        let verifier =
            SignatureVerifier::new(Some(SECRET.to_string()), Some("key_123".to_string()), false);
        assert!(verifier.verify(b"payload", Some("bogus"), Some("key_123")));
    }

    #[test]
    fn api_key_fallback_rejects_wrong_key() {
        let verifier =
            SignatureVerifier::new(Some(SECRET.to_string()), Some("key_123".to_string()), false);
        assert!(!verifier.verify(b"payload", Some("bogus"), Some("key_456")));
    }

    #[test]
    fn missing_secret_fails_open_in_development() {
        let verifier = SignatureVerifier::new(None, None, false);
        assert!(verifier.verify(b"payload", None, None));
    }

    #[test]
    fn missing_secret_fails_closed_in_production() {
        let verifier = SignatureVerifier::new(None, None, true);
        assert!(!verifier.verify(b"payload", None, None));
    }
}
