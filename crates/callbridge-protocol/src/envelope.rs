//! Outbound envelope model.
//!
//! The outbound batch is a small tree of tagged elements with attributes,
//! the shape any attribute/tag container can carry. It serializes to JSON as
//! `{"tag": ..., "attrs": {...}, "children": [...]}`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json};

use crate::error::DecodeError;

/// One element of the outbound envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attrs: Map<String, Json>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Element>,
}

impl Element {
    /// Create an empty element.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: Map::new(),
            children: Vec::new(),
        }
    }

    /// Look up an attribute.
    pub fn attr(&self, name: &str) -> Option<&Json> {
        self.attrs.get(name)
    }

    /// Look up a required attribute.
    pub fn require_attr(&self, name: &str) -> Result<&Json, DecodeError> {
        self.attr(name)
            .ok_or_else(|| DecodeError::missing(&self.tag, name))
    }

    /// First child with the given tag.
    pub fn child(&self, tag: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// All children with the given tag, in order.
    pub fn children_named<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.tag == tag)
    }
}
