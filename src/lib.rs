//! Callbridge - batched RPC bridge between two peers
//!
//! Each side of a session owns a [`Proxy`]. Calls queued with
//! [`Proxy::call`] and [`Proxy::call_once`] travel to the peer in the next
//! outbound batch; calls received from the peer are dispatched to registered
//! [`Method`] handlers or to the session's default handler. The first batch
//! of a session carries an init record fetched from the [`SessionHandler`].
//!
//! Wire types and the parameter codec live in [`callbridge_protocol`].

pub mod config;
pub mod error;
pub mod handshake;
pub mod mock;
pub mod proxy;
pub mod queue;
pub mod registry;
pub mod session;
pub mod sink;

pub use config::{ConfigError, ProxyConfig};
pub use error::{HandlerError, ProxyError, ProxyResult};
pub use handshake::{InitController, InitEmission, InitPhase};
pub use proxy::{Caller, InboundReport, OutboundReport, Proxy};
pub use queue::{CallId, CallQueue, QueuedCall};
pub use registry::{Method, MethodRegistry, Params};
pub use session::SessionHandler;
pub use sink::{BatchSink, ElementSink, SinkError};

pub use callbridge_protocol::{
    decode_outbound, params, CallRecord, DecodeError, DecodedBatch, Element, InboundBatch,
    ParamTag, ResourceHandle, Value,
};
