//! Outbound batch sinks.
//!
//! Abstracts the envelope writer so the proxy does not depend on a concrete
//! wire encoding. Provides:
//! - BatchSink trait: tag/attribute writer the proxy emits into
//! - ElementSink: in-memory writer producing an [`Element`] tree

use std::io;

use callbridge_protocol::Element;
use serde_json::Value as Json;

/// Writer for one outbound batch.
pub trait BatchSink {
    /// Open a child element.
    fn start_tag(&mut self, tag: &str) -> Result<(), SinkError>;

    /// Set an attribute on the innermost open element.
    fn add_attribute(&mut self, name: &str, value: Json) -> Result<(), SinkError>;

    /// Close the innermost open element, which must be `tag`.
    fn end_tag(&mut self, tag: &str) -> Result<(), SinkError>;
}

/// Sink errors
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("sink rejected write: {0}")]
    Rejected(String),

    #[error("unbalanced envelope: expected </{expected}>, got </{actual}>")]
    Unbalanced { expected: String, actual: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tag of the root element produced by [`ElementSink`].
pub const ROOT_TAG: &str = "batch";

/// Builds the batch as an [`Element`] tree in memory.
#[derive(Debug)]
pub struct ElementSink {
    root: Element,
    open: Vec<Element>,
}

impl ElementSink {
    pub fn new() -> Self {
        Self {
            root: Element::new(ROOT_TAG),
            open: Vec::new(),
        }
    }

    fn current(&mut self) -> &mut Element {
        self.open.last_mut().unwrap_or(&mut self.root)
    }

    /// Finish writing and return the root element.
    pub fn finish(self) -> Result<Element, SinkError> {
        match self.open.last() {
            Some(unclosed) => Err(SinkError::Unbalanced {
                expected: unclosed.tag.clone(),
                actual: ROOT_TAG.to_string(),
            }),
            None => Ok(self.root),
        }
    }

    /// Finish writing and serialize the root element to a JSON line.
    pub fn finish_json(self) -> Result<String, SinkError> {
        let root = self.finish()?;
        Ok(serde_json::to_string(&root)?)
    }
}

impl Default for ElementSink {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchSink for ElementSink {
    fn start_tag(&mut self, tag: &str) -> Result<(), SinkError> {
        self.open.push(Element::new(tag));
        Ok(())
    }

    fn add_attribute(&mut self, name: &str, value: Json) -> Result<(), SinkError> {
        self.current().attrs.insert(name.to_string(), value);
        Ok(())
    }

    fn end_tag(&mut self, tag: &str) -> Result<(), SinkError> {
        let element = self.open.pop().ok_or_else(|| SinkError::Unbalanced {
            expected: ROOT_TAG.to_string(),
            actual: tag.to_string(),
        })?;
        if element.tag != tag {
            let expected = element.tag.clone();
            self.open.push(element);
            return Err(SinkError::Unbalanced {
                expected,
                actual: tag.to_string(),
            });
        }
        self.current().children.push(element);
        Ok(())
    }
}
