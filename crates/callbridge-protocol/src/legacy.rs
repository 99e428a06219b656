//! Flat field-map batch format.
//!
//! Older peers ship a batch as a flat map of synthesized field names:
//!
//! | Field | Meaning |
//! |---|---|
//! | `_init` | peer requests initialization |
//! | `c_<callIndex>_<methodName>` = N | call with N declared parameters |
//! | `p_<callIndex>_<paramIndex>` | raw parameter value |
//!
//! The call index is all digits up to the first separator, so method names
//! may themselves contain `_`. Raw values carry no type tag; they are tagged
//! here by JSON kind, and `null` marks an absent parameter.

use std::collections::BTreeMap;

use serde_json::{Map, Value as Json};

use crate::codec::TaggedValue;
use crate::error::{json_kind, DecodeError};
use crate::inbound::{InboundBatch, InboundCall};
use crate::names::INIT_REQUEST;
use crate::value::ParamTag;
use crate::MAX_PARAM_COUNT;

const CALL_PREFIX: &str = "c_";
const PARAM_PREFIX: &str = "p_";
const SEPARATOR: char = '_';

struct PendingCall {
    method: String,
    declared: Option<usize>,
    params: BTreeMap<usize, Option<TaggedValue>>,
}

/// Convert a flat field map into a structured batch.
///
/// Calls are ordered by call index.
pub fn from_fields(fields: &Map<String, Json>) -> Result<InboundBatch, DecodeError> {
    let mut calls: BTreeMap<u64, PendingCall> = BTreeMap::new();
    let mut params: Vec<(u64, usize, Option<TaggedValue>)> = Vec::new();

    for (name, value) in fields {
        if let Some(rest) = name.strip_prefix(CALL_PREFIX) {
            let (index, method) = split_index(name, rest)?;
            if method.is_empty() {
                return Err(DecodeError::MalformedField(name.clone()));
            }
            let declared = value.as_u64().map(|n| usize::try_from(n).unwrap_or(usize::MAX));
            if let Some(count) = declared.filter(|&count| count > MAX_PARAM_COUNT) {
                return Err(DecodeError::too_many_params(method, count));
            }
            let previous = calls.insert(
                index,
                PendingCall {
                    method: method.to_string(),
                    declared,
                    params: BTreeMap::new(),
                },
            );
            if previous.is_some() {
                return Err(DecodeError::MalformedField(name.clone()));
            }
        } else if let Some(rest) = name.strip_prefix(PARAM_PREFIX) {
            let (index, param) = split_index(name, rest)?;
            let position: usize = param
                .parse()
                .map_err(|_| DecodeError::MalformedField(name.clone()))?;
            params.push((index, position, tag_raw(value)?));
        }
    }

    // Without a declared count, every position below the last one needs its
    // own field, so a position past the field count cannot be laid out.
    let undeclared_limit = fields.len().min(MAX_PARAM_COUNT);

    for (index, position, value) in params {
        let field = || format!("{}{}{}{}", PARAM_PREFIX, index, SEPARATOR, position);
        let call = calls
            .get_mut(&index)
            .ok_or_else(|| DecodeError::MalformedField(field()))?;
        match call.declared {
            Some(declared) if position >= declared => {
                return Err(DecodeError::CountMismatch {
                    method: call.method.clone(),
                    declared,
                    found: position.saturating_add(1),
                });
            }
            None if position >= undeclared_limit => {
                return Err(DecodeError::MalformedField(field()));
            }
            _ => {}
        }
        call.params.insert(position, value);
    }

    let calls = calls.into_values().map(into_inbound_call).collect();

    Ok(InboundBatch {
        init: fields.contains_key(INIT_REQUEST),
        calls,
    })
}

/// Split `<digits>_<rest>` into the index and the rest.
fn split_index<'a>(field: &str, rest: &'a str) -> Result<(u64, &'a str), DecodeError> {
    let (digits, tail) = rest
        .split_once(SEPARATOR)
        .ok_or_else(|| DecodeError::MalformedField(field.to_string()))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DecodeError::MalformedField(field.to_string()));
    }
    let index = digits
        .parse()
        .map_err(|_| DecodeError::MalformedField(field.to_string()))?;
    Ok((index, tail))
}

/// Lay the collected parameters out positionally.
///
/// Every position is already below the declared count. Without a declared
/// count, the list ends at the first missing index.
fn into_inbound_call(call: PendingCall) -> InboundCall {
    let PendingCall {
        method,
        declared,
        mut params,
    } = call;

    let len = match declared {
        Some(count) => count,
        None => (0..).take_while(|i| params.contains_key(i)).count(),
    };

    let laid_out = (0..len).map(|i| params.remove(&i).flatten()).collect();

    InboundCall {
        method,
        param_count: declared.unwrap_or(len),
        params: laid_out,
    }
}

/// Tag an untyped value by its JSON kind.
fn tag_raw(value: &Json) -> Result<Option<TaggedValue>, DecodeError> {
    let tag = match value {
        Json::Null => return Ok(None),
        Json::String(_) => ParamTag::String,
        Json::Bool(_) => ParamTag::Boolean,
        Json::Number(n) if n.is_f64() => ParamTag::Float,
        Json::Number(_) => ParamTag::Int,
        Json::Object(members) => {
            let mut tagged = Map::new();
            for (key, member) in members {
                let member = tag_raw(member)?.ok_or_else(|| {
                    DecodeError::MalformedField(format!("null map member '{}'", key))
                })?;
                tagged.insert(key.clone(), serde_json::to_value(member)?);
            }
            return Ok(Some(TaggedValue {
                tag: u64::from(ParamTag::Map.as_u8()),
                value: Json::Object(tagged),
            }));
        }
        Json::Array(_) => {
            return Err(DecodeError::MalformedField(format!(
                "unsupported parameter kind {}",
                json_kind(value)
            )))
        }
    };

    Ok(Some(TaggedValue {
        tag: u64::from(tag.as_u8()),
        value: value.clone(),
    }))
}
