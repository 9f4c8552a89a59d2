use argon2::{Algorithm, Argon2, Params, Version};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Iterations used by the default PBKDF2-HMAC-SHA256 derivation.
pub const DEFAULT_PBKDF2_ITERATIONS: u32 = 1_000_000;

pub const DEFAULT_ARGON2_MEM_COST_KIB: u32 = 65_536;
pub const DEFAULT_ARGON2_TIME_COST: u32 = 3;
pub const DEFAULT_ARGON2_PARALLELISM: u32 = 1;

/// Separates user name and password inside the derivation passphrase.
const CREDENTIAL_SEPARATOR: u8 = 0;

/// Key derivation function and its cost parameters.
///
/// Parameters are configuration, not persisted state: deriving with different
/// parameters behaves exactly like deriving from different credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum KdfParams {
    Pbkdf2Sha256 {
        iterations: u32,
    },
    Argon2id {
        mem_cost_kib: u32,
        time_cost: u32,
        parallelism: u32,
    },
}

impl Default for KdfParams {
    fn default() -> Self {
        KdfParams::Pbkdf2Sha256 {
            iterations: DEFAULT_PBKDF2_ITERATIONS,
        }
    }
}

impl KdfParams {
    pub fn pbkdf2(iterations: u32) -> Result<Self> {
        let params = KdfParams::Pbkdf2Sha256 { iterations };
        params.validate()?;
        Ok(params)
    }

    pub fn argon2id(mem_cost_kib: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = KdfParams::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidKdfParams(msg.to_string()));
        match *self {
            KdfParams::Pbkdf2Sha256 { iterations } => {
                if iterations < 1 {
                    return invalid("pbkdf2 iterations must be >= 1");
                }
            }
            KdfParams::Argon2id {
                mem_cost_kib,
                time_cost,
                parallelism,
            } => {
                if mem_cost_kib < 8 {
                    return invalid("argon2 memory cost too low");
                }
                if time_cost < 1 {
                    return invalid("argon2 time cost must be >= 1");
                }
                if parallelism < 1 {
                    return invalid("argon2 parallelism must be >= 1");
                }
                if mem_cost_kib < 8 * parallelism {
                    return invalid("argon2 memory cost must be at least 8 * parallelism");
                }
            }
        }
        Ok(())
    }
}

/// Joins credentials into the single passphrase fed to the KDF.
///
/// The NUL separator keeps `("ab", "c")` and `("a", "bc")` apart, so user
/// names may not contain it.
pub fn credential_passphrase(user_name: &str, password: &str) -> Result<Zeroizing<Vec<u8>>> {
    if user_name.as_bytes().contains(&CREDENTIAL_SEPARATOR) {
        return Err(Error::InvalidUserName);
    }
    let mut passphrase = Zeroizing::new(Vec::with_capacity(user_name.len() + 1 + password.len()));
    passphrase.extend_from_slice(user_name.as_bytes());
    passphrase.push(CREDENTIAL_SEPARATOR);
    passphrase.extend_from_slice(password.as_bytes());
    Ok(passphrase)
}

/// Built-in key derivation capability.
pub fn derive(passphrase: &[u8], salt: &[u8], kdf: &KdfParams, out: &mut [u8]) -> Result<()> {
    kdf.validate()?;

    match *kdf {
        KdfParams::Pbkdf2Sha256 { iterations } => {
            pbkdf2_hmac::<Sha256>(passphrase, salt, iterations, out);
        }
        KdfParams::Argon2id {
            mem_cost_kib,
            time_cost,
            parallelism,
        } => {
            let params = Params::new(mem_cost_kib, time_cost, parallelism, Some(out.len()))
                .map_err(|e| Error::InvalidKdfParams(e.to_string()))?;
            Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
                .hash_password_into(passphrase, salt, out)
                .map_err(|e| Error::Engine(format!("argon2 key derivation failed: {e}")))?;
        }
    }
    Ok(())
}
