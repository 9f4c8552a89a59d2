//! Guarded access to the cryptographic primitives.
//!
//! An [`Engine`] captures a trusted snapshot of its [`Capabilities`] when it is
//! built. Every primitive call first compares the currently bound table with
//! that snapshot by function address and refuses to run if anything was
//! removed or swapped out since.
//!
//! This is advisory. A substitution made before the snapshot was taken is
//! indistinguishable from the real thing.

use std::ptr;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::warn;

use super::kdf::{self, KdfParams};
use super::{KEY_LEN, NONCE_LEN, aead};
use crate::error::{Error, Result};

pub type FillRandomFn = fn(&mut [u8]) -> Result<()>;
pub type DeriveKeyFn = fn(&[u8], &[u8], &KdfParams, &mut [u8]) -> Result<()>;
pub type SealFn = fn(&[u8; KEY_LEN], &[u8; NONCE_LEN], &[u8]) -> Result<Vec<u8>>;
pub type OpenFn = fn(&[u8; KEY_LEN], &[u8; NONCE_LEN], &[u8]) -> Result<Vec<u8>>;

/// Table of primitive implementations an engine may call.
///
/// A `None` slot means the primitive is not available.
#[derive(Clone, Copy)]
pub struct Capabilities {
    pub fill_random: Option<FillRandomFn>,
    pub derive_key: Option<DeriveKeyFn>,
    pub seal: Option<SealFn>,
    pub open: Option<OpenFn>,
}

impl Capabilities {
    /// The built-in primitives: OS randomness, PBKDF2/Argon2id and AES-128-GCM.
    pub fn system() -> Self {
        Self {
            fill_random: Some(os_random),
            derive_key: Some(kdf::derive),
            seal: Some(aead::seal),
            open: Some(aead::open),
        }
    }

    fn is_complete(&self) -> bool {
        self.fill_random.is_some()
            && self.derive_key.is_some()
            && self.seal.is_some()
            && self.open.is_some()
    }
}

/// Fill buffer with cryptographically secure random bytes
fn os_random(buf: &mut [u8]) -> Result<()> {
    getrandom::fill(buf).map_err(|_| Error::Engine("OS random generator unavailable".to_string()))
}

struct Verified {
    fill_random: FillRandomFn,
    derive_key: DeriveKeyFn,
    seal: SealFn,
    open: OpenFn,
}

macro_rules! verified_slot {
    ($trusted:expr, $bound:expr, $slot:ident) => {
        match ($trusted.$slot, $bound.$slot) {
            (Some(trusted), Some(bound)) if ptr::fn_addr_eq(trusted, bound) => bound,
            _ => {
                warn!(capability = stringify!($slot), "engine capability was replaced");
                return Err(Error::TamperedEngine);
            }
        }
    };
}

pub struct Engine {
    trusted: Capabilities,
    bound: RwLock<Capabilities>,
}

impl Engine {
    /// Builds an engine and snapshots `capabilities` as the trusted table.
    pub fn new(capabilities: Capabilities) -> Self {
        Self {
            trusted: capabilities,
            bound: RwLock::new(capabilities),
        }
    }

    /// Process-wide engine over [`Capabilities::system`], captured on first use.
    pub fn system() -> Arc<Engine> {
        static SYSTEM: OnceLock<Arc<Engine>> = OnceLock::new();
        SYSTEM
            .get_or_init(|| Arc::new(Engine::new(Capabilities::system())))
            .clone()
    }

    /// Replaces the bound table. Calls keep failing with
    /// [`Error::TamperedEngine`] until the trusted table is bound again.
    pub fn rebind(&self, capabilities: Capabilities) {
        *self.bound.write().unwrap_or_else(PoisonError::into_inner) = capabilities;
    }

    fn verified(&self) -> Result<Verified> {
        if !self.trusted.is_complete() {
            return Err(Error::UnsupportedEngine);
        }
        let bound = *self.bound.read().unwrap_or_else(PoisonError::into_inner);

        Ok(Verified {
            fill_random: verified_slot!(self.trusted, bound, fill_random),
            derive_key: verified_slot!(self.trusted, bound, derive_key),
            seal: verified_slot!(self.trusted, bound, seal),
            open: verified_slot!(self.trusted, bound, open),
        })
    }

    pub fn fill_random(&self, buf: &mut [u8]) -> Result<()> {
        (self.verified()?.fill_random)(buf)
    }

    /// Returns `len` random bytes.
    pub fn random_bytes(&self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.fill_random(&mut buf)?;
        Ok(buf)
    }

    pub fn derive_key(
        &self,
        passphrase: &[u8],
        salt: &[u8],
        kdf: &KdfParams,
        out: &mut [u8],
    ) -> Result<()> {
        (self.verified()?.derive_key)(passphrase, salt, kdf, out)
    }

    pub fn seal(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        plaintext: &[u8],
    ) -> Result<Vec<u8>> {
        (self.verified()?.seal)(key, nonce, plaintext)
    }

    pub fn open(
        &self,
        key: &[u8; KEY_LEN],
        nonce: &[u8; NONCE_LEN],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        (self.verified()?.open)(key, nonce, ciphertext)
    }
}
