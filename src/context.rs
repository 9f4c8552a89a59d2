//! In-memory handle to a credential key.
//!
//! SAFE USE OF A CONTEXT
//!
//! Keep a [`Context`] in memory only and hand it to the codec functions. It
//! deliberately implements neither `Clone` nor `serde::Serialize`: a context
//! cannot be copied into a second owner or written into a serialized struct.
//!
//! ```compile_fail
//! #[derive(serde::Serialize)]
//! struct Session {
//!     context: atrest::Context,
//! }
//! ```
//!
//! If a context gets lost (process restart, page reload), ask the user for
//! credentials again and call [`Keyring::open`](crate::Keyring::open). Never
//! persist the key to avoid that prompt.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroizing;

use crate::crypto::{Engine, KEY_LEN};
use crate::error::{Error, Result};

/// Symmetric key material derived from credentials.
///
/// The bytes are zeroized on drop and are only readable inside the crate.
pub struct CredentialKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl CredentialKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self {
            bytes: Zeroizing::new(bytes),
        }
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for CredentialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialKey(<redacted>)")
    }
}

#[cfg(test)]
impl PartialEq for CredentialKey {
    fn eq(&self, other: &Self) -> bool {
        *self.bytes == *other.bytes
    }
}

/// Owner of exactly one [`CredentialKey`] until cleared.
pub struct Context {
    key: Option<CredentialKey>,
    user_name: Option<String>,
    engine: Arc<Engine>,
}

impl Context {
    pub(crate) fn new(key: CredentialKey, user_name: &str, engine: Arc<Engine>) -> Self {
        Self {
            key: Some(key),
            user_name: Some(user_name.to_string()),
            engine,
        }
    }

    /// Drops the key. Irreversible; calling it again does nothing.
    pub fn clear(&mut self) {
        self.key = None;
        self.user_name = None;
    }

    pub fn is_clear(&self) -> bool {
        self.key.is_none()
    }

    /// User name the context was opened with, `None` once cleared.
    pub fn user_name(&self) -> Option<&str> {
        self.user_name.as_deref()
    }

    /// Exposes the key itself.
    ///
    /// This is the most sensitive call in the crate. Whatever holds the
    /// returned reference can decrypt every value encrypted under this
    /// context.
    pub fn dangerously_get_key(&self) -> Result<&CredentialKey> {
        self.key.as_ref().ok_or(Error::ContextClosed)
    }

    pub(crate) fn engine(&self) -> &Engine {
        &self.engine
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &if self.is_clear() { "cleared" } else { "active" })
            .field("user_name", &self.user_name)
            .finish_non_exhaustive()
    }
}
