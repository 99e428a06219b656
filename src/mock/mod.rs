//! Mock collaborators
//!
//! In-process stand-ins for the host side of a session, for tests and the
//! CLI:
//!
//! - `MockHandler`: recording [`SessionHandler`](crate::SessionHandler) with
//!   configurable init params and per-method failure injection
//! - `FailingSink`: [`BatchSink`](crate::BatchSink) that fails after a set
//!   number of writes

mod failure;
mod handler;
mod sink;

pub use failure::{FailureConfig, FailureInjector};
pub use handler::MockHandler;
pub use sink::FailingSink;
