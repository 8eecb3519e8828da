//! Webhook signature verification.
//!
//! The provider signs every webhook delivery with an HMAC-SHA256 digest of
//! the exact raw request body, carried in the `X-Provider-Signature` header
//! as a hex string (a `sha256=` prefix is tolerated for providers that add
//! one). Verification failure means the request is rejected with 401 before
//! anything is persisted.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

type HmacSha256 = Hmac<Sha256>;

/// Shared webhook secret, wiped from memory on drop.
///
/// The secret arrives through configuration; holding it in a zeroizing
/// wrapper keeps it out of debug output and core dumps after the process
/// releases it.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WebhookSecret(String);

impl WebhookSecret {
    /// Wrap a raw secret value (not Base64 or hex-encoded).
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Borrow the raw secret bytes for HMAC keying.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// True when no secret has been configured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for WebhookSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("WebhookSecret").field(&"<REDACTED>").finish()
    }
}

/// Verify an inbound webhook signature.
///
/// Computes HMAC-SHA256 over `raw_body` with the configured secret and
/// compares it against the hex digest in `signature_header`. The comparison
/// is constant-time (via [`Mac::verify_slice`]).
///
/// Returns `false` (never an error) when:
/// - the signature header is absent,
/// - the secret is empty (unconfigured),
/// - the header is not valid hex,
/// - the digest does not match.
pub fn verify_signature(
    raw_body: &[u8],
    signature_header: Option<&str>,
    secret: &WebhookSecret,
) -> bool {
    let Some(header) = signature_header else {
        return false;
    };

    if secret.is_empty() {
        return false;
    }

    let hex_part = header.strip_prefix("sha256=").unwrap_or(header);
    let Ok(sig_bytes) = hex::decode(hex_part) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(raw_body);

    mac.verify_slice(&sig_bytes).is_ok()
}

/// Compute the hex signature for a payload.
///
/// Used by tests and by operators generating replay requests; the intake
/// path only ever verifies.
pub fn sign_payload(raw_body: &[u8], secret: &WebhookSecret) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(raw_body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
