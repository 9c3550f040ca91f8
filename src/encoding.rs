// src/encoding.rs
//! Base64 at the transport boundary
//!
//! Binary fields (ciphertext, nonce, attachment bytes) travel as standard
//! padded base64. Nothing inside the crate stores base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub fn b64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn b64_decode(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(text.trim())
}

/// `#[serde(with = "crate::encoding::b64_bytes")]` for `Vec<u8>` fields
pub mod b64_bytes {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::b64_encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::b64_decode(&text).map_err(de::Error::custom)
    }
}
