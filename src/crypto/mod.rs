// src/crypto/mod.rs
//! Pure cryptographic operations, no I/O
//!
//! All functions work exclusively on in-memory buffers.
mod aead;
mod record;

pub use aead::{open, open_with_aad, seal, seal_with_aad, Nonce96};
pub use record::{decode_payload, encode_payload, open_payload, seal_payload};

use crate::aliases::{DataKey32, SecureRandomExt};

/// Generate a new random 256-bit data key
#[inline]
pub fn generate_key() -> DataKey32 {
    DataKey32::random()
}
