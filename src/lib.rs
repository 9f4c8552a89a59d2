//! Encryption at rest keyed by user credentials.
//!
//! A [`Keyring`] turns a user name and password into a [`Context`] holding an
//! AES-128-GCM key. Only a random salt and a credential proof are persisted;
//! the key itself lives in memory until the context is closed.
//!
//! ```
//! use atrest::{KdfParams, Keyring, MemoryStore, Value};
//!
//! let keyring = Keyring::with_kdf(MemoryStore::new(), KdfParams::pbkdf2(1_000)?);
//! let mut context = keyring.open("bubba", "unguessable")?.expect("first open");
//!
//! let envelope = atrest::encrypt_value(&context, &Value::from("I am terrified of clowns."), None)?;
//! let value = atrest::decrypt_value(&context, &envelope, None)?;
//! assert_eq!(value.as_str(), Some("I am terrified of clowns."));
//!
//! atrest::close(&mut context);
//! assert!(keyring.open("bubba", "wrong")?.is_none());
//! # Ok::<(), atrest::Error>(())
//! ```

mod context;
mod credentials;
pub mod crypto;
mod envelope;
mod error;
mod keygen;
mod rotation;
mod storage;
pub mod value;

use std::sync::Arc;

use tracing::{info, warn};

pub use crate::context::{Context, CredentialKey};
pub use crate::credentials::{CREDENTIAL_PROOF, DERIVE_KEY_SALT};
pub use crate::crypto::{Capabilities, Engine, KdfParams, SALT_LEN};
pub use crate::envelope::{
    decrypt_bytes, decrypt_object, decrypt_value, encrypt_bytes, encrypt_object, encrypt_value,
};
pub use crate::error::{BoxError, Error, Result, StorageError};
pub use crate::rotation::ReEncryptor;
pub use crate::storage::{FileStore, KeyValueStore, MemoryStore};
pub use crate::value::{Base64Fields, FieldTransform, Value};

use crate::credentials::CredentialStore;

/// Credential-keyed access to one key-value store.
pub struct Keyring<S: KeyValueStore> {
    credentials: CredentialStore<S>,
    engine: Arc<Engine>,
    kdf: KdfParams,
}

impl<S: KeyValueStore> Keyring<S> {
    /// Uses the default KDF (PBKDF2-SHA256, 1,000,000 iterations).
    pub fn new(store: S) -> Self {
        Self::with_kdf(store, KdfParams::default())
    }

    /// The same parameters must be used on every run against the same store.
    pub fn with_kdf(store: S, kdf: KdfParams) -> Self {
        Self {
            credentials: CredentialStore::new(store),
            engine: Engine::system(),
            kdf,
        }
    }

    pub fn with_engine(mut self, engine: Arc<Engine>) -> Self {
        self.engine = engine;
        self
    }

    /// The underlying store, for keeping application ciphertext next to the
    /// credential records.
    pub fn store(&self) -> &S {
        self.credentials.inner()
    }

    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }

    /// Whether a credential proof exists.
    pub fn is_initialized(&self) -> Result<bool> {
        self.credentials.has_proof()
    }

    /// Deletes the salt and the credential proof.
    ///
    /// Everything encrypted so far becomes permanently unreadable.
    pub fn dangerously_de_initialize(&self) -> Result<()> {
        self.credentials.clear()?;
        info!("credential records deleted");
        Ok(())
    }

    /// Opens a context for `(user_name, password)`.
    ///
    /// The first successful call stores the credential proof. Afterwards
    /// credentials that do not match it yield `Ok(None)`.
    pub fn open(&self, user_name: &str, password: &str) -> Result<Option<Context>> {
        let key = keygen::derive_credential_key(
            &self.engine,
            &self.credentials,
            &self.kdf,
            user_name,
            password,
        )?;

        if !keygen::match_or_create_proof(&self.engine, &self.credentials, &key)? {
            warn!("credentials rejected");
            return Ok(None);
        }

        Ok(Some(Context::new(key, user_name, self.engine.clone())))
    }

    pub fn get_or_create_salt(&self) -> Result<[u8; SALT_LEN]> {
        keygen::get_or_create_salt(&self.engine, &self.credentials)
    }
}

/// Clears `context`. Calling it again is a no-op.
pub fn close(context: &mut Context) {
    context.clear();
}
