//! Text envelopes for application data.
//!
//! An envelope is `base64(nonce ‖ ciphertext)`; the 12-byte nonce is the only
//! metadata it carries.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Serialize;
use serde::de::DeserializeOwned;
use zeroize::Zeroizing;

use crate::context::Context;
use crate::crypto::{open_envelope, seal_envelope};
use crate::error::Result;
use crate::value::{self, FieldTransform, Value};

/// Encrypts raw bytes under `context`. Every call draws a fresh nonce.
pub fn encrypt_bytes(context: &Context, plaintext: &[u8]) -> Result<String> {
    let key = context.dangerously_get_key()?;
    let envelope = seal_envelope(context.engine(), key, plaintext)?;
    Ok(STANDARD.encode(envelope))
}

/// Decrypts an envelope produced by [`encrypt_bytes`].
pub fn decrypt_bytes(context: &Context, envelope: &str) -> Result<Zeroizing<Vec<u8>>> {
    let key = context.dangerously_get_key()?;
    let envelope = STANDARD.decode(envelope)?;
    open_envelope(context.engine(), key, &envelope)
}

pub fn encrypt_value(
    context: &Context,
    value: &Value,
    transform: Option<&dyn FieldTransform>,
) -> Result<String> {
    context.dangerously_get_key()?;
    let plaintext = Zeroizing::new(value::to_bytes(value, transform)?);
    encrypt_bytes(context, &plaintext)
}

pub fn decrypt_value(
    context: &Context,
    envelope: &str,
    transform: Option<&dyn FieldTransform>,
) -> Result<Value> {
    let plaintext = decrypt_bytes(context, envelope)?;
    value::from_bytes(&plaintext, transform)
}

/// Encrypts any serde-serializable value.
pub fn encrypt_object<T: Serialize + ?Sized>(context: &Context, object: &T) -> Result<String> {
    let json = serde_json::to_value(object)?;
    encrypt_value(context, &Value::from(json), None)
}

/// Decrypts into `T`. Fails with a serialization error when the stored value
/// holds `Undefined` or a non-finite number, which `T` cannot receive.
pub fn decrypt_object<T: DeserializeOwned>(context: &Context, envelope: &str) -> Result<T> {
    let value = decrypt_value(context, envelope, None)?;
    let json = serde_json::Value::try_from(value)?;
    Ok(serde_json::from_value(json)?)
}
