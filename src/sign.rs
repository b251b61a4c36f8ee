//! HMAC-SHA256 signatures for cookie payloads.
//!
//! A signed value has the form `payload.signature`, where the signature is the base64url
//! (unpadded) HMAC-SHA256 of `payload` keyed with the secret.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

fn mac(secret: &str) -> HmacSha256 {
    // HMAC accepts keys of any length.
    <HmacSha256 as Mac>::new_from_slice(secret.as_bytes()).expect("hmac accepts any key length")
}

/// Sign `value` with `secret`.
pub fn sign(value: &str, secret: &str) -> String {
    let mut mac = mac(secret);
    mac.update(value.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    format!("{value}.{signature}")
}

/// Verify a signed value against `secret`, returning the unsigned value when it matches.
pub fn unsign<'a>(signed: &'a str, secret: &str) -> Option<&'a str> {
    let (value, signature) = signed.rsplit_once('.')?;
    let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;

    let mut mac = mac(secret);
    mac.update(value.as_bytes());
    mac.verify_slice(&signature).ok()?;

    Some(value)
}

/// Verify a signed value against each secret in turn, accepting the first match.
pub fn unsign_any<'a, S: AsRef<str>>(signed: &'a str, secrets: &[S]) -> Option<&'a str> {
    secrets
        .iter()
        .find_map(|secret| unsign(signed, secret.as_ref()))
}
