//! Callbridge Protocol Types
//!
//! Defines the value model, the tagged parameter codec and the batch records
//! exchanged between the two peers of a callbridge session.

pub mod codec;
pub mod envelope;
pub mod error;
pub mod inbound;
pub mod legacy;
pub mod peer;
pub mod value;

pub use codec::{decode, decode_params, encode, encode_params, TaggedValue};
pub use envelope::Element;
pub use error::DecodeError;
pub use inbound::{InboundBatch, InboundCall};
pub use peer::{decode_outbound, DecodedBatch};
pub use value::{CallRecord, IntoParam, ParamTag, ResourceHandle, Value};

/// Reserved method name carrying the init parameters.
pub const INIT_METHOD: &str = "_init";

/// Largest parameter count a decoder accepts for one call.
pub const MAX_PARAM_COUNT: usize = 1024;

/// Field names used in the outbound envelope.
pub mod names {
    /// Container holding every call entry of one exchange.
    pub const CALL_LIST: &str = "cl";
    /// One call entry.
    pub const CALL: &str = "c";
    /// Method name attribute of a call entry.
    pub const METHOD: &str = "n";
    /// Parameter count attribute of a call entry.
    pub const PARAM_COUNT: &str = "pc";
    /// Prefix of the i-th parameter value attribute.
    pub const PARAM_VALUE_PREFIX: &str = "p";
    /// Prefix of the i-th parameter type tag attribute.
    pub const PARAM_TYPE_PREFIX: &str = "pt";
    /// Root attribute set when a previous init remains authoritative.
    pub const INIT_ALREADY_SENT: &str = "_si";
    /// Inbound field requesting initialization.
    pub const INIT_REQUEST: &str = "_init";

    /// Attribute name for the i-th parameter value.
    pub fn param_value(index: usize) -> String {
        format!("{}{}", PARAM_VALUE_PREFIX, index)
    }

    /// Attribute name for the i-th parameter type tag.
    pub fn param_type(index: usize) -> String {
        format!("{}{}", PARAM_TYPE_PREFIX, index)
    }
}

/// Builds a positional parameter list from anything implementing [`IntoParam`].
///
/// ```
/// use callbridge_protocol::{params, Value};
///
/// let p = params!["x", true, 42, 3.5, None::<i64>];
/// assert_eq!(p.len(), 5);
/// assert_eq!(p[2], Some(Value::Integer(42)));
/// assert_eq!(p[4], None);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<::std::option::Option<$crate::Value>>::new()
    };
    ($($param:expr),+ $(,)?) => {
        vec![$($crate::IntoParam::into_param($param)),+]
    };
}
