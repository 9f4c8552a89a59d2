use serde_json::Value as Json;

use super::{FieldTransform, Value};
use crate::error::{Error, Result};

/// Marks sentinel strings. Real strings starting with it are escaped by
/// doubling the marker.
const MARKER: char = '\u{0}';
const UNDEFINED: &str = "\u{0}undefined";
const NAN: &str = "\u{0}NaN";
const INFINITY: &str = "\u{0}Infinity";
const NEG_INFINITY: &str = "\u{0}-Infinity";

/// Deepest nesting of arrays and objects accepted on both encode and decode.
/// Stays below `serde_json`'s parser recursion limit of 128.
pub const MAX_DEPTH: usize = 100;

/// Serializes `value` to JSON bytes, substituting sentinels for special values.
///
/// `transform` sees every node before the substitution, parents before
/// children.
pub fn to_bytes(value: &Value, transform: Option<&dyn FieldTransform>) -> Result<Vec<u8>> {
    let json = encode_node("", value.clone(), transform, 0)?;
    Ok(serde_json::to_vec(&json)?)
}

/// Parses bytes produced by [`to_bytes`].
///
/// `transform` sees every node after the sentinels are revived, children
/// before parents.
pub fn from_bytes(bytes: &[u8], transform: Option<&dyn FieldTransform>) -> Result<Value> {
    let json: Json = serde_json::from_slice(bytes)?;
    decode_node("", json, transform, 0)
}

/// Depth of a container whose parent sits at `depth`.
fn enter(depth: usize) -> Result<usize> {
    let depth = depth + 1;
    if depth > MAX_DEPTH {
        return Err(Error::Serialization(format!(
            "value nested deeper than {MAX_DEPTH} levels"
        )));
    }
    Ok(depth)
}

fn encode_node(
    key: &str,
    value: Value,
    transform: Option<&dyn FieldTransform>,
    depth: usize,
) -> Result<Json> {
    let value = match transform {
        Some(t) => t.encode(key, value)?,
        None => value,
    };

    Ok(match value {
        Value::Undefined => Json::String(UNDEFINED.to_string()),
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(b),
        Value::Number(n) if n.is_nan() => Json::String(NAN.to_string()),
        Value::Number(n) if n == f64::INFINITY => Json::String(INFINITY.to_string()),
        Value::Number(n) if n == f64::NEG_INFINITY => Json::String(NEG_INFINITY.to_string()),
        Value::Number(n) => serde_json::Number::from_f64(n)
            .map(Json::Number)
            .ok_or_else(|| Error::Serialization(format!("cannot encode number {n}")))?,
        Value::String(s) if s.starts_with(MARKER) => Json::String(format!("{MARKER}{s}")),
        Value::String(s) => Json::String(s),
        Value::Array(items) => {
            let depth = enter(depth)?;
            Json::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| encode_node(&i.to_string(), item, transform, depth))
                    .collect::<Result<_>>()?,
            )
        }
        Value::Object(fields) => {
            let depth = enter(depth)?;
            Json::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| {
                        let json = encode_node(&k, v, transform, depth)?;
                        Ok((k, json))
                    })
                    .collect::<Result<_>>()?,
            )
        }
    })
}

fn decode_node(
    key: &str,
    json: Json,
    transform: Option<&dyn FieldTransform>,
    depth: usize,
) -> Result<Value> {
    let value = match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(b),
        Json::Number(n) => Value::Number(
            n.as_f64()
                .ok_or_else(|| Error::Serialization(format!("cannot decode number {n}")))?,
        ),
        Json::String(s) => decode_string(s)?,
        Json::Array(items) => {
            let depth = enter(depth)?;
            Value::Array(
                items
                    .into_iter()
                    .enumerate()
                    .map(|(i, item)| decode_node(&i.to_string(), item, transform, depth))
                    .collect::<Result<_>>()?,
            )
        }
        Json::Object(fields) => {
            let depth = enter(depth)?;
            Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| {
                        let value = decode_node(&k, v, transform, depth)?;
                        Ok((k, value))
                    })
                    .collect::<Result<_>>()?,
            )
        }
    };

    match transform {
        Some(t) => t.decode(key, value),
        None => Ok(value),
    }
}

fn decode_string(s: String) -> Result<Value> {
    let Some(rest) = s.strip_prefix(MARKER) else {
        return Ok(Value::String(s));
    };
    if rest.starts_with(MARKER) {
        return Ok(Value::String(rest.to_string()));
    }
    match s.as_str() {
        UNDEFINED => Ok(Value::Undefined),
        NAN => Ok(Value::Number(f64::NAN)),
        INFINITY => Ok(Value::Number(f64::INFINITY)),
        NEG_INFINITY => Ok(Value::Number(f64::NEG_INFINITY)),
        _ => Err(Error::Serialization(format!("unknown sentinel {rest:?}"))),
    }
}
