//! Recording session handler

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use callbridge_protocol::{CallRecord, Value};

use super::failure::{FailureConfig, FailureInjector};
use crate::error::HandlerError;
use crate::registry::Params;
use crate::session::SessionHandler;

#[derive(Debug, Default)]
struct MockState {
    init_params: Vec<Option<Value>>,
    default_calls: Vec<CallRecord>,
    failures: FailureInjector,
}

/// Session handler that records everything the proxy asks of it.
#[derive(Debug, Default)]
pub struct MockHandler {
    state: Mutex<MockState>,
    fetches: AtomicUsize,
    notifications: AtomicUsize,
}

impl MockHandler {
    /// Create a handler whose init params are empty.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a handler returning `params` from every init fetch.
    pub fn with_init_params(params: Vec<Option<Value>>) -> Self {
        let handler = Self::new();
        handler.set_init_params(params);
        handler
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the params returned by later init fetches.
    pub fn set_init_params(&self, params: Vec<Option<Value>>) {
        self.lock().init_params = params;
    }

    /// Make the default handler fail for `method`.
    pub fn inject_failure(&self, method: impl Into<String>, config: FailureConfig) {
        self.lock().failures.inject(method, config);
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Number of init fetches so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Number of exchange notifications so far.
    pub fn notifications(&self) -> usize {
        self.notifications.load(Ordering::SeqCst)
    }

    /// Calls that reached the default handler, in order.
    pub fn default_calls(&self) -> Vec<CallRecord> {
        self.lock().default_calls.clone()
    }
}

impl SessionHandler for MockHandler {
    fn fetch_init_params(&self) -> Vec<Option<Value>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.lock().init_params.clone()
    }

    fn notify_exchange_needed(&self) {
        self.notifications.fetch_add(1, Ordering::SeqCst);
    }

    fn default_call_handler(&self, method: &str, params: &Params) -> Result<(), HandlerError> {
        let mut state = self.lock();
        state
            .default_calls
            .push(CallRecord::new(method, params.as_slice().to_vec()));
        match state.failures.check(method) {
            Some(failure) => Err(failure.to_error()),
            None => Ok(()),
        }
    }
}
