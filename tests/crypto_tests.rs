// tests/crypto_tests.rs
mod support;

use submission_vault::aliases::PlainText;
use submission_vault::crypto::*;
use submission_vault::error::VaultError;
use submission_vault::submission::{Attachment, SubmissionPayload};
use support::flip_bit;

fn is_auth_failure(result: &submission_vault::Result<PlainText>) -> bool {
    matches!(result, Err(VaultError::AuthenticationFailure))
}

#[test]
fn test_seal_open_roundtrip() {
    let key = generate_key();
    for message in [&b""[..], &b"x"[..], &b"Attack at dawn!"[..], &[0u8; 4096][..]] {
        let (ciphertext, nonce) = seal(message, &key).unwrap();
        assert_eq!(ciphertext.len(), message.len() + 16);
        let opened = open(&ciphertext, &nonce, &key).unwrap();
        assert_eq!(opened.expose_secret().as_slice(), message);
    }
}

#[test]
fn test_same_plaintext_twice_gives_distinct_nonce_and_ciphertext() {
    let key = generate_key();
    let (c1, n1) = seal(b"same message", &key).unwrap();
    let (c2, n2) = seal(b"same message", &key).unwrap();
    assert_ne!(n1, n2);
    assert_ne!(c1, c2);
}

#[test]
fn test_every_ciphertext_bit_flip_is_detected() {
    let key = generate_key();
    let (ciphertext, nonce) = seal(b"gpa=3.9", &key).unwrap();
    for bit in 0..ciphertext.len() * 8 {
        let mut tampered = ciphertext.clone();
        flip_bit(&mut tampered, bit);
        assert!(
            is_auth_failure(&open(&tampered, &nonce, &key)),
            "bit {bit} flip went unnoticed"
        );
    }
}

#[test]
fn test_every_nonce_bit_flip_is_detected() {
    let key = generate_key();
    let (ciphertext, nonce) = seal(b"gpa=3.9", &key).unwrap();
    for bit in 0..96 {
        let mut bytes = *nonce.as_bytes();
        flip_bit(&mut bytes, bit);
        let tampered = Nonce96::from_bytes(bytes);
        assert!(is_auth_failure(&open(&ciphertext, &tampered, &key)));
    }
}

#[test]
fn test_wrong_key_fails_authentication() {
    let (ciphertext, nonce) = seal(b"secret", &generate_key()).unwrap();
    assert!(is_auth_failure(&open(&ciphertext, &nonce, &generate_key())));
}

#[test]
fn test_truncated_ciphertext_fails_authentication() {
    let key = generate_key();
    let (ciphertext, nonce) = seal(b"secret", &key).unwrap();
    assert!(is_auth_failure(&open(&ciphertext[..10], &nonce, &key)));
    assert!(is_auth_failure(&open(&[], &nonce, &key)));
}

#[test]
fn test_aad_is_bound() {
    let key = generate_key();
    let (ciphertext, nonce) = seal_with_aad(b"secret", b"ctx-a", &key).unwrap();
    assert!(open_with_aad(&ciphertext, &nonce, b"ctx-a", &key).is_ok());
    assert!(is_auth_failure(&open_with_aad(&ciphertext, &nonce, b"ctx-b", &key)));
}

#[test]
fn test_nonce_wrong_length_is_validation_error() {
    match Nonce96::try_from(&[0u8; 11][..]) {
        Err(VaultError::Validation(errors)) => {
            assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["nonce"]);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn test_payload_roundtrip_keeps_fields_and_attachments() {
    let key = generate_key();
    let payload = SubmissionPayload::new()
        .with_field("name", "Ada")
        .with_field("gpa", "3.9")
        .with_field("essay", "Why I like engines")
        .with_attachment(Attachment {
            document_name: "transcript.pdf".into(),
            content_type: "application/pdf".into(),
            data: vec![0x25, 0x50, 0x44, 0x46],
        });

    let (ciphertext, nonce) = seal_payload(&payload, &key).unwrap();
    let opened = open_payload(&ciphertext, &nonce, &key).unwrap();

    assert_eq!(opened, payload);
    assert_eq!(opened.gpa(), Some(3.9));
}

#[test]
fn test_authentic_but_unparseable_plaintext_is_malformed_not_auth_failure() {
    let key = generate_key();
    let (ciphertext, nonce) = seal(b"definitely not json", &key).unwrap();
    assert!(matches!(
        open_payload(&ciphertext, &nonce, &key),
        Err(VaultError::MalformedPayload(_))
    ));

    let (ciphertext, nonce) = seal(b"[1,2,3]", &key).unwrap();
    assert!(matches!(
        open_payload(&ciphertext, &nonce, &key),
        Err(VaultError::MalformedPayload(_))
    ));
}

#[test]
fn test_metadata_keys_are_refused_in_payloads() {
    let key = generate_key();
    let (ciphertext, nonce) = seal(br#"{"name":"Ada","id":"someone-else"}"#, &key).unwrap();
    assert!(matches!(
        open_payload(&ciphertext, &nonce, &key),
        Err(VaultError::MalformedPayload(_))
    ));

    for field in ["id", "submittedAt", "attachments"] {
        let payload = SubmissionPayload::new().with_field(field, "x");
        match encode_payload(&payload) {
            Err(VaultError::Validation(errors)) => {
                assert_eq!(errors.fields().collect::<Vec<_>>(), [field]);
            }
            other => panic!("{field}: {:?}", other.map(|_| ())),
        }
    }
}
