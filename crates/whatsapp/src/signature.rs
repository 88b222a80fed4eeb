use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Checks the `X-Hub-Signature-256` header against the raw request body.
/// No configured secret means verification is bypassed (development
/// mode); the caller is expected to log that state.
pub fn verify(app_secret: Option<&str>, signature_header: Option<&str>, body: &[u8]) -> bool {
    let Some(app_secret) = app_secret.filter(|secret| !secret.is_empty()) else {
        return true;
    };

    let signature = signature_header.unwrap_or("").trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature).trim();
    if signature.is_empty() {
        return false;
    }

    let Ok(signature_bytes) = hex::decode(signature) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature_bytes).is_ok()
}
