//! Parameter value model.
//!
//! Every parameter crossing the bridge is one of a closed set of kinds, each
//! with a stable wire tag.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Wire type tag of a parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ParamTag {
    String = 0,
    Boolean = 1,
    Int = 2,
    Float = 3,
    Map = 4,
    Resource = 5,
}

impl ParamTag {
    /// Returns the numeric tag written on the wire.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Parse a numeric wire tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::String),
            1 => Some(Self::Boolean),
            2 => Some(Self::Int),
            3 => Some(Self::Float),
            4 => Some(Self::Map),
            5 => Some(Self::Resource),
            _ => None,
        }
    }

    /// Returns the lowercase kind name used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Boolean => "boolean",
            Self::Int => "int",
            Self::Float => "float",
            Self::Map => "map",
            Self::Resource => "resource",
        }
    }
}

impl fmt::Display for ParamTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque handle naming a resource the hosting environment can resolve.
///
/// The bridge never looks inside the key; it only carries it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceHandle(String);

impl ResourceHandle {
    /// Create a handle from its key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The resource key.
    pub fn key(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A parameter value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Map(BTreeMap<String, Value>),
    Resource(ResourceHandle),
}

impl Value {
    /// The wire tag for this value.
    pub fn tag(&self) -> ParamTag {
        match self {
            Value::String(_) => ParamTag::String,
            Value::Boolean(_) => ParamTag::Boolean,
            Value::Integer(_) => ParamTag::Int,
            Value::Float(_) => ParamTag::Float,
            Value::Map(_) => ParamTag::Map,
            Value::Resource(_) => ParamTag::Resource,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_resource(&self) -> Option<&ResourceHandle> {
        match self {
            Value::Resource(r) => Some(r),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Integer(i64::from(i))
    }
}

impl From<f32> for Value {
    fn from(f: f32) -> Self {
        Value::Float(f64::from(f))
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(m: BTreeMap<String, Value>) -> Self {
        Value::Map(m)
    }
}

impl From<ResourceHandle> for Value {
    fn from(r: ResourceHandle) -> Self {
        Value::Resource(r)
    }
}

/// Conversion into a positional parameter.
///
/// `None` marks an absent parameter: it still counts toward the declared
/// parameter count but no value/tag pair is written for it.
pub trait IntoParam {
    fn into_param(self) -> Option<Value>;
}

macro_rules! impl_into_param {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoParam for $ty {
                fn into_param(self) -> Option<Value> {
                    Some(Value::from(self))
                }
            }

            impl IntoParam for Option<$ty> {
                fn into_param(self) -> Option<Value> {
                    self.map(Value::from)
                }
            }
        )*
    };
}

impl_into_param!(
    &str,
    String,
    bool,
    i32,
    i64,
    u32,
    f32,
    f64,
    BTreeMap<String, Value>,
    ResourceHandle,
);

impl IntoParam for Value {
    fn into_param(self) -> Option<Value> {
        Some(self)
    }
}

impl IntoParam for Option<Value> {
    fn into_param(self) -> Option<Value> {
        self
    }
}

/// A named call with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    /// Method to invoke on the receiving side.
    pub method: String,
    /// Positional parameters; `None` entries are absent.
    pub params: Vec<Option<Value>>,
}

impl CallRecord {
    /// Create a call record.
    pub fn new(method: impl Into<String>, params: Vec<Option<Value>>) -> Self {
        Self {
            method: method.into(),
            params,
        }
    }

    /// Declared parameter count, absent entries included.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}
