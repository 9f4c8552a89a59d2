//! Cryptographic primitives behind a tamper-checked capability table.
//!
//! Provides the engine guard, key derivation and the AEAD envelope.

pub mod aead;
pub mod engine;
pub mod kdf;

pub use aead::{open_envelope, seal_envelope};
pub use engine::{Capabilities, Engine};
pub use kdf::KdfParams;

/// Length of the derivation salt (16 bytes).
pub const SALT_LEN: usize = 16;
/// Length of the AES-GCM nonce (12 bytes).
pub const NONCE_LEN: usize = 12;
/// Length of the AES-GCM authentication tag (16 bytes).
pub const TAG_LEN: usize = 16;
/// Length of the credential key (16 bytes / 128 bits).
pub const KEY_LEN: usize = 16;
