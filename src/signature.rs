//! `X-Hub-Signature-256` verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature header")]
    Missing,
    #[error("Signature not signed with sha256 (e.g. sha256=123456)")]
    WrongScheme,
    #[error("Header signature and expected signature do not match")]
    Mismatch,
    #[error("signing secret is empty")]
    EmptySecret,
}

/// Check `header` (`sha256=<hex digest>`) against the HMAC-SHA256 of `body`.
///
/// The digest comparison is constant-time.
pub fn verify(secret: &str, header: &str, body: &[u8]) -> Result<(), SignatureError> {
    if secret.is_empty() {
        return Err(SignatureError::EmptySecret);
    }
    let (scheme, digest) = header
        .trim()
        .split_once('=')
        .ok_or(SignatureError::WrongScheme)?;
    if scheme != "sha256" {
        return Err(SignatureError::WrongScheme);
    }

    let expected = hex::decode(digest).map_err(|_| SignatureError::Mismatch)?;
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::EmptySecret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| SignatureError::Mismatch)
}

/// `sha256=<hex>` header value for `body`. Used by senders and tests.
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
