//! Credential rotation.
//!
//! The new credential proof is the commit point. It is written only after the
//! application reports that every piece of its data was re-encrypted, so a
//! failed or refused callback leaves the old credentials and the old context
//! fully usable.

use tracing::{info, warn};

use crate::context::Context;
use crate::envelope::{decrypt_bytes, encrypt_bytes};
use crate::error::{BoxError, Error, Result};
use crate::keygen;
use crate::storage::KeyValueStore;
use crate::Keyring;

/// Moves single envelopes from one context to another.
pub struct ReEncryptor<'a> {
    old: &'a Context,
    new: &'a Context,
}

impl<'a> ReEncryptor<'a> {
    pub fn new(old: &'a Context, new: &'a Context) -> Result<Self> {
        if old.is_clear() || new.is_clear() {
            return Err(Error::ContextClosed);
        }
        Ok(Self { old, new })
    }

    /// Decrypts `envelope` under the old context and encrypts it under the new one.
    pub fn re_encrypt(&self, envelope: &str) -> Result<String> {
        let plaintext = decrypt_bytes(self.old, envelope)?;
        encrypt_bytes(self.new, &plaintext)
    }
}

impl<S: KeyValueStore> Keyring<S> {
    /// Derives a context for new credentials and lets the application move its
    /// data over.
    ///
    /// `on_re_encrypt` receives the old and the new context. It must
    /// re-encrypt and persist all application data, and return `Ok(true)` only
    /// once every write is durable. On `Ok(false)` or `Err` it must leave its
    /// storage as it was; this call then fails with
    /// [`Error::ReEncryptionFailed`] and changes nothing.
    ///
    /// On success `old` is cleared and the returned context is the only one
    /// that matches the stored credentials.
    pub fn change_credentials_and_re_encrypt<F, E>(
        &self,
        old: &mut Context,
        new_user_name: &str,
        new_password: &str,
        on_re_encrypt: F,
    ) -> Result<Context>
    where
        F: FnOnce(&Context, &Context) -> std::result::Result<bool, E>,
        E: Into<BoxError>,
    {
        if old.is_clear() {
            return Err(Error::ContextClosed);
        }

        let new_key = keygen::derive_credential_key(
            &self.engine,
            &self.credentials,
            &self.kdf,
            new_user_name,
            new_password,
        )?;
        let new_proof = keygen::create_proof(&self.engine, &new_key)?;
        let new_context = Context::new(new_key, new_user_name, self.engine.clone());

        match on_re_encrypt(old, &new_context) {
            Ok(true) => {}
            Ok(false) => {
                warn!("re-encryption declined; credentials unchanged");
                return Err(Error::ReEncryptionFailed { source: None });
            }
            Err(e) => {
                let source = e.into();
                warn!(error = %source, "re-encryption failed; credentials unchanged");
                return Err(Error::ReEncryptionFailed {
                    source: Some(source),
                });
            }
        }

        self.credentials.set_proof(&new_proof)?;
        old.clear();
        info!("credentials changed");

        Ok(new_context)
    }
}
