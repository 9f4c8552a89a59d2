use aes_gcm::{
    Aes128Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use zeroize::Zeroizing;

use super::engine::Engine;
use super::{KEY_LEN, NONCE_LEN, TAG_LEN};
use crate::context::CredentialKey;
use crate::error::{Error, Result};

/// Built-in AES-128-GCM encryption capability.
pub fn seal(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));

    cipher
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|_| Error::Engine("encryption failed".to_string()))
}

/// Built-in AES-128-GCM decryption capability.
pub fn open(key: &[u8; KEY_LEN], nonce: &[u8; NONCE_LEN], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::DecryptionFailed)
}

/// Encrypts `plaintext` into a `nonce ‖ ciphertext` envelope with a fresh nonce.
pub fn seal_envelope(engine: &Engine, key: &CredentialKey, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut nonce = [0u8; NONCE_LEN];
    engine.fill_random(&mut nonce)?;

    let ciphertext = engine.seal(key.bytes(), &nonce, plaintext)?;

    let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    envelope.extend_from_slice(&nonce);
    envelope.extend_from_slice(&ciphertext);
    Ok(envelope)
}

/// Reverses [`seal_envelope`].
pub fn open_envelope(
    engine: &Engine,
    key: &CredentialKey,
    envelope: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if envelope.len() < NONCE_LEN + TAG_LEN {
        return Err(Error::DecryptionFailed);
    }
    let (nonce, ciphertext) = envelope.split_at(NONCE_LEN);
    let nonce: &[u8; NONCE_LEN] = nonce.try_into().map_err(|_| Error::DecryptionFailed)?;

    let plaintext = engine.open(key.bytes(), nonce, ciphertext)?;
    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(fill: u8) -> CredentialKey {
        CredentialKey::from_bytes([fill; KEY_LEN])
    }

    #[test]
    fn envelope_roundtrip() {
        let engine = Engine::system();
        let envelope = seal_envelope(&engine, &key(1), b"secret data").unwrap();

        assert_eq!(envelope.len(), NONCE_LEN + b"secret data".len() + TAG_LEN);

        let plaintext = open_envelope(&engine, &key(1), &envelope).unwrap();
        assert_eq!(*plaintext, b"secret data".to_vec());
    }

    #[test]
    fn envelope_nonces_are_fresh() {
        let engine = Engine::system();
        let a = seal_envelope(&engine, &key(1), b"same").unwrap();
        let b = seal_envelope(&engine, &key(1), b"same").unwrap();

        assert_ne!(a[..NONCE_LEN], b[..NONCE_LEN]);
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let engine = Engine::system();
        let envelope = seal_envelope(&engine, &key(1), b"data").unwrap();

        assert!(matches!(
            open_envelope(&engine, &key(2), &envelope),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let engine = Engine::system();
        let mut envelope = seal_envelope(&engine, &key(1), b"data").unwrap();
        let last = envelope.len() - 1;
        envelope[last] ^= 0xFF;

        assert!(matches!(
            open_envelope(&engine, &key(1), &envelope),
            Err(Error::DecryptionFailed)
        ));
    }

    #[test]
    fn truncated_envelope_fails() {
        let engine = Engine::system();
        let envelope = seal_envelope(&engine, &key(1), b"").unwrap();

        assert!(matches!(
            open_envelope(&engine, &key(1), &envelope[..NONCE_LEN + TAG_LEN - 1]),
            Err(Error::DecryptionFailed)
        ));
        assert!(matches!(
            open_envelope(&engine, &key(1), &[]),
            Err(Error::DecryptionFailed)
        ));
    }
}
