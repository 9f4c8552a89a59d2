//! Persistence of the derivation salt and the credential proof.

use base64::{Engine as _, engine::general_purpose::STANDARD};

use crate::crypto::SALT_LEN;
use crate::error::{Error, Result};
use crate::storage::KeyValueStore;

const KEY_PREFIX: &str = "atrest_keygen_";
pub const DERIVE_KEY_SALT: &str = "atrest_keygen_derive_key_salt";
pub const CREDENTIAL_PROOF: &str = "atrest_keygen_credential_proof";

/// Typed view over the two values the crate keeps in the application store.
#[derive(Debug)]
pub struct CredentialStore<S> {
    inner: S,
}

impl<S: KeyValueStore> CredentialStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn salt(&self) -> Result<Option<[u8; SALT_LEN]>> {
        let Some(encoded) = self.inner.get(DERIVE_KEY_SALT)? else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| Error::CorruptState("derivation salt is not base64"))?;
        let salt: [u8; SALT_LEN] = bytes
            .try_into()
            .map_err(|_| Error::CorruptState("derivation salt has the wrong length"))?;
        Ok(Some(salt))
    }

    pub fn set_salt(&self, salt: &[u8; SALT_LEN]) -> Result<()> {
        self.inner.set(DERIVE_KEY_SALT, &STANDARD.encode(salt))?;
        Ok(())
    }

    pub fn proof(&self) -> Result<Option<Vec<u8>>> {
        let Some(encoded) = self.inner.get(CREDENTIAL_PROOF)? else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|_| Error::CorruptState("credential proof is not base64"))?;
        Ok(Some(bytes))
    }

    pub fn has_proof(&self) -> Result<bool> {
        Ok(self.inner.get(CREDENTIAL_PROOF)?.is_some())
    }

    pub fn set_proof(&self, proof: &[u8]) -> Result<()> {
        self.inner.set(CREDENTIAL_PROOF, &STANDARD.encode(proof))?;
        Ok(())
    }

    /// Removes proof and salt. Everything encrypted so far becomes unreadable.
    pub fn clear(&self) -> Result<()> {
        self.inner.remove(CREDENTIAL_PROOF)?;
        self.inner.remove(DERIVE_KEY_SALT)?;
        Ok(())
    }
}
