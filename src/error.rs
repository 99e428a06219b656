//! Error types for the proxy.

use callbridge_protocol::DecodeError;

use crate::sink::SinkError;

/// Failure raised by a method handler.
///
/// Handler failures are isolated per call: the proxy logs them and keeps
/// processing the rest of the batch.
#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    #[error("parameter {index}: {reason}")]
    BadParameter { index: usize, reason: String },

    #[error("{0}")]
    Failed(String),
}

impl HandlerError {
    /// Create a generic handler failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    pub(crate) fn bad_parameter(index: usize, reason: impl Into<String>) -> Self {
        Self::BadParameter {
            index,
            reason: reason.into(),
        }
    }
}

/// Errors surfaced to whatever layer drives an exchange.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// A call in the inbound batch could not be decoded. Calls before
    /// `index` were already dispatched; the rest of the batch was skipped.
    #[error("inbound call {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: DecodeError,
    },

    /// Writing the outbound batch failed. Calls written before the failure
    /// count as delivered; the rest stay queued.
    #[error("transport write failed: {0}")]
    Transport(#[from] SinkError),
}

/// Result type for proxy operations
pub type ProxyResult<T> = Result<T, ProxyError>;
