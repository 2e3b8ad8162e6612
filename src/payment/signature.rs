use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Lowercase hex HMAC-SHA256 of `"<order_id>|<payment_id>"` keyed by the gateway secret.
pub fn expected_signature(order_id: &str, payment_id: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(order_id.as_bytes());
    mac.update(b"|");
    mac.update(payment_id.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Checks a gateway payment signature. Never errors: anything but an exact match is `false`.
pub fn verify_signature(order_id: &str, payment_id: &str, signature: &str, secret: &str) -> bool {
    match expected_signature(order_id, payment_id, secret) {
        Some(expected) => expected.as_bytes().ct_eq(signature.as_bytes()).into(),
        None => false,
    }
}
