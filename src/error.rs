use std::io;

use thiserror::Error;

/// Boxed error returned by application callbacks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A bound engine capability is missing or differs from the trusted snapshot.
    #[error("cryptographic engine functions have been tampered with")]
    TamperedEngine,

    /// A required capability was never available.
    #[error("cryptographic engine does not implement the required primitives")]
    UnsupportedEngine,

    #[error("attempted to use a closed context")]
    ContextClosed,

    #[error("decryption failed: wrong key or corrupted data")]
    DecryptionFailed,

    #[error("re-encryption failed; credentials have not been changed")]
    ReEncryptionFailed {
        #[source]
        source: Option<BoxError>,
    },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid key derivation parameters: {0}")]
    InvalidKdfParams(String),

    #[error("user name must not contain a NUL character")]
    InvalidUserName,

    #[error("envelope is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("stored credential state is corrupt: {0}")]
    CorruptState(&'static str),

    #[error("cryptographic primitive failed: {0}")]
    Engine(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("storage file is malformed: {0}")]
    Format(#[from] serde_json::Error),

    #[error("unsupported storage file version: {0}")]
    UnsupportedVersion(u8),

    #[error("storage lock poisoned")]
    Poisoned,
}
