//! Method registry.
//!
//! Maps method names to the handlers that run them on the receiving side.
//! Names that are not registered fall through to the session's default
//! handler.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use callbridge_protocol::{ResourceHandle, Value};

use crate::error::HandlerError;

/// Positional parameters of a received call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<Option<Value>>);

impl Params {
    pub fn new(params: Vec<Option<Value>>) -> Self {
        Self(params)
    }

    /// Declared parameter count, absent entries included.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The value at `index`, if present.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).and_then(Option::as_ref)
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&Value>> {
        self.0.iter().map(Option::as_ref)
    }

    pub fn as_slice(&self) -> &[Option<Value>] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Option<Value>> {
        self.0
    }

    fn require(&self, index: usize) -> Result<&Value, HandlerError> {
        self.get(index)
            .ok_or_else(|| HandlerError::bad_parameter(index, "missing"))
    }

    fn expected(index: usize, expected: &str, found: &Value) -> HandlerError {
        HandlerError::bad_parameter(index, format!("expected {}, got {}", expected, found.tag()))
    }

    pub fn str(&self, index: usize) -> Result<&str, HandlerError> {
        let value = self.require(index)?;
        value.as_str().ok_or_else(|| Self::expected(index, "string", value))
    }

    pub fn bool(&self, index: usize) -> Result<bool, HandlerError> {
        let value = self.require(index)?;
        value.as_bool().ok_or_else(|| Self::expected(index, "boolean", value))
    }

    pub fn int(&self, index: usize) -> Result<i64, HandlerError> {
        let value = self.require(index)?;
        value.as_i64().ok_or_else(|| Self::expected(index, "int", value))
    }

    pub fn float(&self, index: usize) -> Result<f64, HandlerError> {
        let value = self.require(index)?;
        value.as_f64().ok_or_else(|| Self::expected(index, "float", value))
    }

    pub fn map(&self, index: usize) -> Result<&BTreeMap<String, Value>, HandlerError> {
        let value = self.require(index)?;
        value.as_map().ok_or_else(|| Self::expected(index, "map", value))
    }

    pub fn resource(&self, index: usize) -> Result<&ResourceHandle, HandlerError> {
        let value = self.require(index)?;
        value
            .as_resource()
            .ok_or_else(|| Self::expected(index, "resource", value))
    }
}

impl From<Vec<Option<Value>>> for Params {
    fn from(params: Vec<Option<Value>>) -> Self {
        Self(params)
    }
}

/// Handler for a remotely invoked method.
///
/// Handlers run synchronously while an inbound batch is processed, so they
/// should not block for long. They may enqueue outbound calls.
pub trait Method: Send + Sync {
    fn invoke(&self, method: &str, params: &Params) -> Result<(), HandlerError>;
}

impl<F> Method for F
where
    F: Fn(&str, &Params) -> Result<(), HandlerError> + Send + Sync,
{
    fn invoke(&self, method: &str, params: &Params) -> Result<(), HandlerError> {
        self(method, params)
    }
}

/// Name-keyed method handlers.
#[derive(Default, Clone)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn Method>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handler`, replacing any previous binding.
    ///
    /// Returns the replaced handler.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: impl Method + 'static,
    ) -> Option<Arc<dyn Method>> {
        self.methods.insert(name.into(), Arc::new(handler))
    }

    /// Bind `name` to a closure.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, handler: F) -> Option<Arc<dyn Method>>
    where
        F: Fn(&str, &Params) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(name, handler)
    }

    /// The handler bound to `name`.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Method>> {
        self.methods.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Run the handler bound to `name`.
    ///
    /// Returns `Ok(false)` when nothing is registered under `name`.
    pub fn dispatch(&self, name: &str, params: &Params) -> Result<bool, HandlerError> {
        match self.methods.get(name) {
            Some(handler) => handler.invoke(name, params).map(|()| true),
            None => Ok(false),
        }
    }
}

impl fmt::Debug for MethodRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodRegistry")
            .field("methods", &self.names())
            .finish()
    }
}
