//! Sink with injected write failures

use callbridge_protocol::Element;
use serde_json::Value as Json;

use crate::sink::{BatchSink, ElementSink, SinkError};

/// [`ElementSink`] that rejects every write after the first `limit`.
#[derive(Debug)]
pub struct FailingSink {
    inner: ElementSink,
    limit: usize,
    writes: usize,
}

impl FailingSink {
    /// Accept `limit` writes, then fail.
    pub fn after(limit: usize) -> Self {
        Self {
            inner: ElementSink::new(),
            limit,
            writes: 0,
        }
    }

    /// Writes attempted so far, including rejected ones.
    pub fn writes(&self) -> usize {
        self.writes
    }

    /// Whatever was written, with unclosed elements left out.
    pub fn into_partial(self) -> Result<Element, SinkError> {
        self.inner.finish()
    }

    fn admit(&mut self, what: &str) -> Result<(), SinkError> {
        self.writes += 1;
        if self.writes > self.limit {
            return Err(SinkError::Rejected(format!(
                "write {} ({}) past limit {}",
                self.writes, what, self.limit
            )));
        }
        Ok(())
    }
}

impl BatchSink for FailingSink {
    fn start_tag(&mut self, tag: &str) -> Result<(), SinkError> {
        self.admit(tag)?;
        self.inner.start_tag(tag)
    }

    fn add_attribute(&mut self, name: &str, value: Json) -> Result<(), SinkError> {
        self.admit(name)?;
        self.inner.add_attribute(name, value)
    }

    fn end_tag(&mut self, tag: &str) -> Result<(), SinkError> {
        self.admit(tag)?;
        self.inner.end_tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fails_after_limit() {
        let mut sink = FailingSink::after(2);
        sink.start_tag("cl").unwrap();
        sink.start_tag("c").unwrap();
        let err = sink.add_attribute("n", Json::from("x")).unwrap_err();
        assert!(matches!(err, SinkError::Rejected(_)));
        assert!(sink.end_tag("c").is_err());
        assert_eq!(sink.writes(), 4);
    }
}
