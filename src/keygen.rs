//! Key derivation and the credential proof.
//!
//! The proof is the known plaintext `0..=255` sealed under the credential
//! key. Re-entered credentials are accepted when their key opens the stored
//! proof and yields that plaintext again. Nothing derived from the key other
//! than this ciphertext is ever stored.

use tracing::debug;

use crate::context::CredentialKey;
use crate::credentials::CredentialStore;
use crate::crypto::kdf::credential_passphrase;
use crate::crypto::{Engine, KEY_LEN, KdfParams, SALT_LEN, open_envelope, seal_envelope};
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

fn known_plaintext() -> [u8; 256] {
    std::array::from_fn(|i| i as u8)
}

/// Returns the persisted salt, creating and persisting one on first use.
pub fn get_or_create_salt<S: KeyValueStore>(
    engine: &Engine,
    store: &CredentialStore<S>,
) -> Result<[u8; SALT_LEN]> {
    if let Some(salt) = store.salt()? {
        return Ok(salt);
    }

    let mut salt = [0u8; SALT_LEN];
    engine.fill_random(&mut salt)?;
    store.set_salt(&salt)?;
    debug!("created derivation salt");
    Ok(salt)
}

/// Derives the credential key for `(user_name, password)` under the stored salt.
pub fn derive_credential_key<S: KeyValueStore>(
    engine: &Engine,
    store: &CredentialStore<S>,
    kdf: &KdfParams,
    user_name: &str,
    password: &str,
) -> Result<CredentialKey> {
    let passphrase = credential_passphrase(user_name, password)?;
    let salt = get_or_create_salt(engine, store)?;

    let mut key = [0u8; KEY_LEN];
    engine.derive_key(&passphrase, &salt, kdf, &mut key)?;
    debug!(kdf = ?kdf, "derived credential key");

    Ok(CredentialKey::from_bytes(key))
}

/// Seals the known plaintext under `key` without persisting it.
pub fn create_proof(engine: &Engine, key: &CredentialKey) -> Result<Vec<u8>> {
    seal_envelope(engine, key, &known_plaintext())
}

/// Whether `proof` opens under `key` to the known plaintext.
///
/// Authentication failure is the ordinary outcome of wrong credentials and
/// comes back as `Ok(false)`. Engine faults still propagate.
pub fn proof_matches(engine: &Engine, key: &CredentialKey, proof: &[u8]) -> Result<bool> {
    match open_envelope(engine, key, proof) {
        Ok(plaintext) => Ok(plaintext.as_slice() == known_plaintext().as_slice()),
        Err(Error::DecryptionFailed) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Checks `key` against the stored proof, or stores a new proof on first use.
pub fn match_or_create_proof<S: KeyValueStore>(
    engine: &Engine,
    store: &CredentialStore<S>,
    key: &CredentialKey,
) -> Result<bool> {
    match store.proof()? {
        Some(proof) => proof_matches(engine, key, &proof),
        None => {
            let proof = create_proof(engine, key)?;
            store.set_proof(&proof)?;
            debug!("created credential proof");
            Ok(true)
        }
    }
}
