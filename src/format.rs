//! Helpers for encoding/decoding cookie payloads.
//!
//! A payload is the JSON form of a value, base64url encoded without padding so it can be
//! placed in a cookie without further escaping. Signed cookies append a signature to this
//! string, see [`crate::sign`].
//!
//! This is primarily useful for testing and debugging.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{Error, Result};

/// Encode a value into a cookie payload.
pub fn encode_value<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let bytes = serde_json::to_vec(value).map_err(|err| Error::Encode(err.to_string()))?;

    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// Decode a cookie payload back into a value.
pub fn decode_value<T: DeserializeOwned>(payload: &str) -> Result<T> {
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.as_bytes())
        .map_err(|err| Error::Decode(err.to_string()))?;

    serde_json::from_slice(&bytes).map_err(|err| Error::Decode(err.to_string()))
}
