use std::collections::BTreeSet;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::Value;
use crate::error::{Error, Result};

/// Per-field hook for domain types the generic encoding cannot express.
///
/// `key` is the field name inside an object, the index inside an array, or
/// `""` for the root value.
pub trait FieldTransform {
    fn encode(&self, key: &str, value: Value) -> Result<Value> {
        let _ = key;
        Ok(value)
    }

    fn decode(&self, key: &str, value: Value) -> Result<Value> {
        let _ = key;
        Ok(value)
    }
}

/// Stores the named byte-array fields as base64 text.
///
/// Fields must hold arrays built with [`Value::bytes`].
#[derive(Debug, Clone, Default)]
pub struct Base64Fields {
    fields: BTreeSet<String>,
}

impl Base64Fields {
    pub fn new<I, K>(fields: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl FieldTransform for Base64Fields {
    fn encode(&self, key: &str, value: Value) -> Result<Value> {
        if !self.fields.contains(key) {
            return Ok(value);
        }
        match value.as_bytes() {
            Some(bytes) => Ok(Value::String(STANDARD.encode(bytes))),
            None => Err(Error::Serialization(format!(
                "field {key:?} does not hold bytes"
            ))),
        }
    }

    fn decode(&self, key: &str, value: Value) -> Result<Value> {
        if !self.fields.contains(key) {
            return Ok(value);
        }
        let Value::String(text) = value else {
            return Err(Error::Serialization(format!(
                "field {key:?} is not base64 text"
            )));
        };
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| Error::Serialization(format!("field {key:?}: {e}")))?;
        Ok(Value::bytes(&bytes))
    }
}
