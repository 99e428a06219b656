//! Receiving-peer view of an outbound batch.
//!
//! Turns the envelope written by a proxy back into the init record, the
//! "init already sent" marker and the ordered call records.

use crate::codec::decode;
use crate::envelope::Element;
use crate::error::{json_kind, DecodeError};
use crate::names;
use crate::value::{CallRecord, Value};
use crate::{INIT_METHOD, MAX_PARAM_COUNT};

/// Decoded contents of one outbound batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedBatch {
    /// The sender says a previous init remains authoritative.
    pub init_already_sent: bool,
    /// Init parameters, when this batch carries an init record.
    pub init: Option<Vec<Option<Value>>>,
    /// Calls other than init, in emission order.
    pub calls: Vec<CallRecord>,
}

/// Decode an outbound envelope.
pub fn decode_outbound(root: &Element) -> Result<DecodedBatch, DecodeError> {
    let init_already_sent = root
        .attr(names::INIT_ALREADY_SENT)
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let list = root
        .child(names::CALL_LIST)
        .ok_or_else(|| DecodeError::MissingElement {
            parent: root.tag.clone(),
            element: names::CALL_LIST.to_string(),
        })?;

    let mut batch = DecodedBatch {
        init_already_sent,
        ..DecodedBatch::default()
    };

    for entry in list.children_named(names::CALL) {
        let record = decode_entry(entry)?;
        if record.method == INIT_METHOD {
            batch.init = Some(record.params);
        } else {
            batch.calls.push(record);
        }
    }

    Ok(batch)
}

fn decode_entry(entry: &Element) -> Result<CallRecord, DecodeError> {
    let method = entry.require_attr(names::METHOD)?;
    let method = method
        .as_str()
        .ok_or_else(|| {
            DecodeError::MalformedField(format!("{} is a {}", names::METHOD, json_kind(method)))
        })?
        .to_string();

    let count = entry.require_attr(names::PARAM_COUNT)?;
    let count = count
        .as_u64()
        .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
        .ok_or_else(|| {
            DecodeError::MalformedField(format!("{} is a {}", names::PARAM_COUNT, json_kind(count)))
        })?;

    if count > MAX_PARAM_COUNT {
        return Err(DecodeError::too_many_params(&method, count));
    }

    let mut params = Vec::with_capacity(count.min(entry.attrs.len()));
    for i in 0..count {
        let value_name = names::param_value(i);
        let type_name = names::param_type(i);
        let param = match (entry.attr(&value_name), entry.attr(&type_name)) {
            (None, None) => None,
            (Some(wire), Some(tag)) => {
                let tag = tag
                    .as_u64()
                    .ok_or_else(|| DecodeError::MalformedField(type_name.clone()))?;
                Some(decode(tag, wire)?)
            }
            (Some(_), None) => return Err(DecodeError::missing(&entry.tag, &type_name)),
            (None, Some(_)) => return Err(DecodeError::missing(&entry.tag, &value_name)),
        };
        params.push(param);
    }

    Ok(CallRecord::new(method, params))
}
