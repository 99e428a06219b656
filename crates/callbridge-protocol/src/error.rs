//! Error types for decoding batches.

use crate::value::ParamTag;

/// Failure to decode an inbound batch or a parameter value.
///
/// A decode error aborts the remaining calls of the batch being processed,
/// never the session.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown parameter type tag {0}")]
    UnknownTag(u64),

    #[error("wire value for {tag} parameter is not a {tag}: {found}")]
    TypeMismatch { tag: ParamTag, found: String },

    #[error("call '{method}' declares {declared} parameters but carries {found}")]
    CountMismatch {
        method: String,
        declared: usize,
        found: usize,
    },

    #[error("call '{method}' declares {count} parameters, limit is {limit}")]
    TooManyParams {
        method: String,
        count: usize,
        limit: usize,
    },

    #[error("missing attribute '{attribute}' on <{element}>")]
    MissingAttribute { element: String, attribute: String },

    #[error("missing <{element}> inside <{parent}>")]
    MissingElement { parent: String, element: String },

    #[error("malformed field '{0}'")]
    MalformedField(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DecodeError {
    pub(crate) fn type_mismatch(tag: ParamTag, found: &serde_json::Value) -> Self {
        Self::TypeMismatch {
            tag,
            found: json_kind(found).to_string(),
        }
    }

    pub(crate) fn too_many_params(method: &str, count: usize) -> Self {
        Self::TooManyParams {
            method: method.to_string(),
            count,
            limit: crate::MAX_PARAM_COUNT,
        }
    }

    pub(crate) fn missing(element: &str, attribute: &str) -> Self {
        Self::MissingAttribute {
            element: element.to_string(),
            attribute: attribute.to_string(),
        }
    }
}

/// Short name of a JSON value's kind.
pub(crate) fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(n) if n.is_f64() => "float",
        serde_json::Value::Number(_) => "integer",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
