//! Parameter codec.
//!
//! Converts [`Value`]s to and from a tagged wire representation. The tag
//! always travels with the value, so decoding never sniffs JSON kinds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::DecodeError;
use crate::value::{ParamTag, ResourceHandle, Value};

const NAN: &str = "NaN";
const INFINITY: &str = "inf";
const NEG_INFINITY: &str = "-inf";

/// A wire value together with its type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedValue {
    /// Numeric [`ParamTag`].
    #[serde(rename = "t")]
    pub tag: u64,
    /// Wire value.
    #[serde(rename = "v")]
    pub value: serde_json::Value,
}

impl TaggedValue {
    /// Decode back into a [`Value`].
    pub fn decode(&self) -> Result<Value, DecodeError> {
        decode(self.tag, &self.value)
    }
}

/// Encode a value into its tag and wire value.
pub fn encode(value: &Value) -> TaggedValue {
    TaggedValue {
        tag: u64::from(value.tag().as_u8()),
        value: encode_wire(value),
    }
}

fn encode_wire(value: &Value) -> serde_json::Value {
    match value {
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::Number(Number::from(*i)),
        Value::Float(f) => encode_float(*f),
        Value::Map(map) => {
            let members = map
                .iter()
                .map(|(key, member)| (key.clone(), tagged_json(member)))
                .collect();
            serde_json::Value::Object(members)
        }
        Value::Resource(handle) => serde_json::Value::String(handle.key().to_string()),
    }
}

fn encode_float(f: f64) -> serde_json::Value {
    match Number::from_f64(f) {
        Some(n) => serde_json::Value::Number(n),
        None if f.is_nan() => serde_json::Value::String(NAN.to_string()),
        None if f.is_sign_positive() => serde_json::Value::String(INFINITY.to_string()),
        None => serde_json::Value::String(NEG_INFINITY.to_string()),
    }
}

/// Map members are tagged individually so nested values survive the trip.
fn tagged_json(value: &Value) -> serde_json::Value {
    serde_json::json!({
        "t": value.tag().as_u8(),
        "v": encode_wire(value),
    })
}

/// Decode a wire value carrying the given tag.
pub fn decode(tag: u64, wire: &serde_json::Value) -> Result<Value, DecodeError> {
    let tag = u8::try_from(tag)
        .ok()
        .and_then(ParamTag::from_u8)
        .ok_or(DecodeError::UnknownTag(tag))?;

    match tag {
        ParamTag::String => wire
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| DecodeError::type_mismatch(tag, wire)),
        ParamTag::Boolean => wire
            .as_bool()
            .map(Value::Boolean)
            .ok_or_else(|| DecodeError::type_mismatch(tag, wire)),
        ParamTag::Int => wire
            .as_i64()
            .map(Value::Integer)
            .ok_or_else(|| DecodeError::type_mismatch(tag, wire)),
        ParamTag::Float => decode_float(wire)
            .map(Value::Float)
            .ok_or_else(|| DecodeError::type_mismatch(tag, wire)),
        ParamTag::Map => decode_map(wire),
        ParamTag::Resource => wire
            .as_str()
            .map(|s| Value::Resource(ResourceHandle::new(s)))
            .ok_or_else(|| DecodeError::type_mismatch(tag, wire)),
    }
}

fn decode_float(wire: &serde_json::Value) -> Option<f64> {
    match wire {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => match s.as_str() {
            NAN => Some(f64::NAN),
            INFINITY => Some(f64::INFINITY),
            NEG_INFINITY => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

fn decode_map(wire: &serde_json::Value) -> Result<Value, DecodeError> {
    let members = wire
        .as_object()
        .ok_or_else(|| DecodeError::type_mismatch(ParamTag::Map, wire))?;

    let mut map = BTreeMap::new();
    for (key, member) in members {
        let tagged: TaggedValue = serde_json::from_value(member.clone())?;
        map.insert(key.clone(), tagged.decode()?);
    }
    Ok(Value::Map(map))
}

/// Encode a positional parameter list, keeping absent entries absent.
pub fn encode_params(params: &[Option<Value>]) -> Vec<Option<TaggedValue>> {
    params.iter().map(|p| p.as_ref().map(encode)).collect()
}

/// Decode a positional parameter list.
pub fn decode_params(params: &[Option<TaggedValue>]) -> Result<Vec<Option<Value>>, DecodeError> {
    params
        .iter()
        .map(|p| p.as_ref().map(TaggedValue::decode).transpose())
        .collect()
}
