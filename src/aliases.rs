// src/aliases.rs
//! Re-exports secure-gate's ergonomic secret types
//!
//! These are the canonical secret containers used throughout submission-vault.
//! Both zeroize on drop.

pub use secure_gate::{dynamic_alias, fixed_alias, SecureConversionsExt, SecureRandomExt};

// Fixed-size secrets
fixed_alias!(DataKey32, 32); // 256-bit AES-GCM submission key

// Dynamic secrets
dynamic_alias!(PlainText, Vec<u8>); // Recovered submission bytes
