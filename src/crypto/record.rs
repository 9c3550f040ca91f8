// src/crypto/record.rs
//! Canonical byte encoding of the structured payload
//!
//! Serialization lives next to the cipher so no caller ever hand-rolls the
//! plaintext layout. Base64 for transit is a boundary concern (see `encoding`).

use crate::aliases::{DataKey32, PlainText};
use crate::error::{Result, VaultError};
use crate::submission::SubmissionPayload;

use super::aead::{open, seal, Nonce96};

/// Payload → canonical JSON bytes
pub fn encode_payload(payload: &SubmissionPayload) -> Result<PlainText> {
    if let Some(name) = payload.reserved_field() {
        return Err(VaultError::invalid_field(
            name,
            format!("{name} is reserved for submission metadata"),
        ));
    }
    Ok(PlainText::new(serde_json::to_vec(payload)?))
}

/// Verified plaintext → payload. Bytes that authenticated but do not parse are
/// `MalformedPayload`, never an authentication failure.
///
/// A payload carrying `id` or `submittedAt` is rejected as well: flattened
/// into a `DecryptedView` it would shadow the record's own metadata.
pub fn decode_payload(plaintext: &PlainText) -> Result<SubmissionPayload> {
    let payload: SubmissionPayload = serde_json::from_slice(plaintext.expose_secret())
        .map_err(|e| VaultError::MalformedPayload(format!("not a submission object ({e})")))?;
    if let Some(name) = payload.reserved_field() {
        return Err(VaultError::MalformedPayload(format!(
            "payload field {name:?} shadows submission metadata"
        )));
    }
    Ok(payload)
}

/// Serialize then seal in one step
pub fn seal_payload(payload: &SubmissionPayload, key: &DataKey32) -> Result<(Vec<u8>, Nonce96)> {
    let plaintext = encode_payload(payload)?;
    seal(plaintext.expose_secret(), key)
}

/// Open then deserialize in one step
pub fn open_payload(
    ciphertext: &[u8],
    nonce: &Nonce96,
    key: &DataKey32,
) -> Result<SubmissionPayload> {
    let plaintext = open(ciphertext, nonce, key)?;
    decode_payload(&plaintext)
}
