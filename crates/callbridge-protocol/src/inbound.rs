//! Inbound batch records.
//!
//! One inbound batch carries everything a peer accumulated since the last
//! exchange: an optional init request and the calls it queued, in order.

use serde::{Deserialize, Serialize};

use crate::codec::{decode_params, encode_params, TaggedValue};
use crate::error::DecodeError;
use crate::legacy;
use crate::value::CallRecord;
use crate::MAX_PARAM_COUNT;

/// Batch received from the peer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundBatch {
    /// Peer requests initialization.
    #[serde(rename = "_init", default, skip_serializing_if = "std::ops::Not::not")]
    pub init: bool,
    /// Calls in the order the peer queued them.
    #[serde(default)]
    pub calls: Vec<InboundCall>,
}

/// One call inside an inbound batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundCall {
    /// Method name.
    #[serde(rename = "n")]
    pub method: String,
    /// Declared parameter count.
    #[serde(rename = "pc")]
    pub param_count: usize,
    /// Positional parameters; `null` marks an absent parameter.
    #[serde(rename = "p", default)]
    pub params: Vec<Option<TaggedValue>>,
}

impl InboundCall {
    /// Build the wire form of a call record.
    pub fn from_record(record: &CallRecord) -> Self {
        Self {
            method: record.method.clone(),
            param_count: record.param_count(),
            params: encode_params(&record.params),
        }
    }

    /// Decode into a call record.
    ///
    /// With `strict_count`, a parameter list whose length differs from the
    /// declared count is rejected. Otherwise the carried list is taken as is.
    pub fn decode(&self, strict_count: bool) -> Result<CallRecord, DecodeError> {
        if self.param_count > MAX_PARAM_COUNT || self.params.len() > MAX_PARAM_COUNT {
            return Err(DecodeError::too_many_params(
                &self.method,
                self.param_count.max(self.params.len()),
            ));
        }
        if strict_count && self.params.len() != self.param_count {
            return Err(DecodeError::CountMismatch {
                method: self.method.clone(),
                declared: self.param_count,
                found: self.params.len(),
            });
        }
        Ok(CallRecord::new(self.method.clone(), decode_params(&self.params)?))
    }
}

impl InboundBatch {
    /// Batch carrying only an init request.
    pub fn init_request() -> Self {
        Self {
            init: true,
            calls: Vec::new(),
        }
    }

    /// Batch carrying the given calls, in order.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a CallRecord>) -> Self {
        Self {
            init: false,
            calls: records.into_iter().map(InboundCall::from_record).collect(),
        }
    }

    /// Append a call.
    pub fn with_call(mut self, record: &CallRecord) -> Self {
        self.calls.push(InboundCall::from_record(record));
        self
    }

    /// Returns true if the batch requests nothing.
    pub fn is_empty(&self) -> bool {
        !self.init && self.calls.is_empty()
    }

    /// Parse a batch from JSON.
    ///
    /// An object with a `calls` member is read as a structured batch; any
    /// other object is read as a flat legacy field map.
    pub fn from_json(value: serde_json::Value) -> Result<Self, DecodeError> {
        match value {
            serde_json::Value::Object(fields) if fields.contains_key("calls") => {
                Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
            }
            serde_json::Value::Object(fields) => legacy::from_fields(&fields),
            other => Err(DecodeError::MalformedField(format!(
                "expected a JSON object, got {}",
                crate::error::json_kind(&other)
            ))),
        }
    }

    /// Parse a batch from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self, DecodeError> {
        Self::from_json(serde_json::from_str(s)?)
    }

    /// Parse a flat legacy field map (`_init`, `c_<i>_<name>`, `p_<i>_<j>`).
    pub fn from_fields(
        fields: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, DecodeError> {
        legacy::from_fields(fields)
    }
}
