//! Exchange orchestrator.
//!
//! A [`Proxy`] is one side of a callbridge session. The host feeds it every
//! inbound batch through [`Proxy::receive_inbound`] and asks it for the next
//! outbound batch through [`Proxy::produce_outbound`]. Application code
//! queues calls for the peer with [`Proxy::call`] and [`Proxy::call_once`],
//! from any thread.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use callbridge_protocol::{encode, names, CallRecord, InboundBatch, Value, INIT_METHOD};
use serde_json::Value as Json;
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;
use crate::error::{HandlerError, ProxyError, ProxyResult};
use crate::handshake::{InitController, InitEmission, InitPhase};
use crate::queue::{CallId, CallQueue};
use crate::registry::{Method, MethodRegistry, Params};
use crate::session::SessionHandler;
use crate::sink::{BatchSink, SinkError};

/// Outcome of processing one inbound batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InboundReport {
    /// The batch asked for init.
    pub init_requested: bool,
    /// Calls run by a registered handler.
    pub dispatched: usize,
    /// Calls passed to the session's default handler.
    pub defaulted: usize,
    /// Calls whose handler failed.
    pub failed: usize,
}

/// Outcome of producing one outbound batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutboundReport {
    /// The batch carries an init record.
    pub init_sent: bool,
    /// The batch carries the "init already sent" marker.
    pub already_sent_marker: bool,
    /// Queued calls written.
    pub calls_sent: usize,
    /// Queued calls left for a later exchange.
    pub deferred: usize,
}

/// Cloneable handle for queueing calls to the peer.
///
/// Handlers and background threads hold a `Caller` instead of the proxy.
/// Calls queued while an inbound batch is processed go out with the next
/// outbound batch.
#[derive(Clone)]
pub struct Caller {
    queue: Arc<CallQueue>,
    handler: Arc<dyn SessionHandler>,
}

impl Caller {
    /// Queue a call. Every call is delivered.
    pub fn call(&self, method: impl Into<String>, params: Vec<Option<Value>>) -> CallId {
        let record = CallRecord::new(method, params);
        debug!(method = %record.method, params = record.param_count(), "queueing call");
        let id = self.queue.enqueue(record);
        self.handler.notify_exchange_needed();
        id
    }

    /// Queue a call, dropping any undelivered call to the same method.
    ///
    /// For calls that carry the latest state, where older values are useless.
    pub fn call_once(&self, method: impl Into<String>, params: Vec<Option<Value>>) -> CallId {
        let record = CallRecord::new(method, params);
        let method = record.method.clone();
        let (id, superseded) = self.queue.supersede_and_enqueue(&method, record);
        debug!(%method, superseded, "queueing call once");
        self.handler.notify_exchange_needed();
        id
    }
}

/// One side of a callbridge session.
pub struct Proxy {
    config: ProxyConfig,
    handler: Arc<dyn SessionHandler>,
    queue: Arc<CallQueue>,
    init: InitController,
    registry: RwLock<MethodRegistry>,
    /// Serializes outbound batch production.
    exchange: Mutex<()>,
}

impl Proxy {
    /// Create a proxy with default configuration.
    pub fn new(handler: Arc<dyn SessionHandler>) -> Self {
        Self::with_config(handler, ProxyConfig::default())
    }

    /// Create a proxy with custom configuration.
    pub fn with_config(handler: Arc<dyn SessionHandler>, config: ProxyConfig) -> Self {
        Self {
            config,
            handler,
            queue: Arc::new(CallQueue::new()),
            init: InitController::new(),
            registry: RwLock::new(MethodRegistry::new()),
            exchange: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Register a handler for calls from the peer.
    ///
    /// Returns true if an earlier handler for `name` was replaced.
    pub fn register(&self, name: impl Into<String>, handler: impl Method + 'static) -> bool {
        self.registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .register(name, handler)
            .is_some()
    }

    /// Register a closure for calls from the peer.
    pub fn register_fn<F>(&self, name: impl Into<String>, handler: F) -> bool
    where
        F: Fn(&str, &Params) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register(name, handler)
    }

    /// A handle for queueing calls without borrowing the proxy.
    pub fn caller(&self) -> Caller {
        Caller {
            queue: Arc::clone(&self.queue),
            handler: Arc::clone(&self.handler),
        }
    }

    /// Queue a call to the peer.
    pub fn call(&self, method: impl Into<String>, params: Vec<Option<Value>>) -> CallId {
        self.caller().call(method, params)
    }

    /// Queue a call to the peer, superseding undelivered calls to `method`.
    pub fn call_once(&self, method: impl Into<String>, params: Vec<Option<Value>>) -> CallId {
        self.caller().call_once(method, params)
    }

    /// Ask for the peer to be initialized again at the next exchange.
    pub fn request_client_side_init(&self) {
        self.init.request_reinit();
        self.handler.notify_exchange_needed();
    }

    pub fn init_phase(&self) -> InitPhase {
        self.init.phase()
    }

    /// The outbound call queue.
    pub fn queue(&self) -> &CallQueue {
        &self.queue
    }

    /// Number of calls waiting for the next exchange.
    pub fn pending_calls(&self) -> usize {
        self.queue.len()
    }

    /// Process a batch received from the peer.
    ///
    /// Calls run in batch order. A handler failure is logged and counted and
    /// processing continues. A decode failure stops the batch: calls before
    /// it have run, the rest are skipped, and the error is returned.
    pub fn receive_inbound(&self, batch: &InboundBatch) -> ProxyResult<InboundReport> {
        let mut report = InboundReport::default();

        if batch.init {
            report.init_requested = true;
            if self.init.on_peer_request(|| self.handler.fetch_init_params()) {
                self.handler.notify_exchange_needed();
            }
        }

        for (index, call) in batch.calls.iter().enumerate() {
            let record = call
                .decode(self.config.strict_param_count)
                .map_err(|source| {
                    warn!(index, method = %call.method, error = %source, "aborting inbound batch");
                    ProxyError::Decode { index, source }
                })?;

            let params = Params::from(record.params);
            match self.dispatch(&record.method, &params) {
                Ok(true) => report.dispatched += 1,
                Ok(false) => report.defaulted += 1,
                Err(error) => {
                    warn!(index, method = %record.method, %error, "call handler failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            dispatched = report.dispatched,
            defaulted = report.defaulted,
            failed = report.failed,
            "inbound batch processed"
        );
        Ok(report)
    }

    /// Run the registered handler for `method`, or the default handler.
    ///
    /// Returns `Ok(true)` if a registered handler ran.
    fn dispatch(&self, method: &str, params: &Params) -> Result<bool, HandlerError> {
        // Handlers may register methods themselves, so the lock is released
        // before they run.
        let registered = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(method);

        match registered {
            Some(handler) => handler.invoke(method, params).map(|()| true),
            None => self
                .handler
                .default_call_handler(method, params)
                .map(|()| false),
        }
    }

    /// Write the next outbound batch into `sink`.
    ///
    /// The init record, when pending, comes first; then queued calls in
    /// order. Each queued call leaves the queue once its entry is fully
    /// written, so a failed write leaves the unwritten calls queued for the
    /// next exchange.
    pub fn produce_outbound(&self, sink: &mut dyn BatchSink) -> ProxyResult<OutboundReport> {
        let report = {
            let _exchange = self.exchange.lock().unwrap_or_else(PoisonError::into_inner);

            let emission = self
                .init
                .prepare(self.config.eager_init, || self.handler.fetch_init_params());

            let mut report = OutboundReport {
                already_sent_marker: emission.already_sent,
                ..OutboundReport::default()
            };

            if emission.already_sent {
                sink.add_attribute(names::INIT_ALREADY_SENT, Json::Bool(true))?;
            }

            sink.start_tag(names::CALL_LIST)?;
            let written = self.write_calls(sink, &emission, &mut report);
            let closed = sink.end_tag(names::CALL_LIST);

            if let Err(error) = written.and(closed) {
                warn!(
                    %error,
                    calls_sent = report.calls_sent,
                    still_queued = self.queue.len(),
                    "outbound batch failed"
                );
                return Err(error.into());
            }
            report
        };

        if report.deferred > 0 {
            self.handler.notify_exchange_needed();
        }

        debug!(
            init_sent = report.init_sent,
            calls_sent = report.calls_sent,
            deferred = report.deferred,
            "outbound batch produced"
        );
        Ok(report)
    }

    fn write_calls(
        &self,
        sink: &mut dyn BatchSink,
        emission: &InitEmission,
        report: &mut OutboundReport,
    ) -> Result<(), SinkError> {
        if let Some(params) = &emission.params {
            write_entry(sink, INIT_METHOD, params)?;
            self.init.commit(emission.epoch);
            report.init_sent = true;
            info!(params = params.len(), "init record sent");
        }

        let pending = self.queue.snapshot();
        let limit = self.config.max_calls_per_exchange.unwrap_or(usize::MAX);

        for queued in pending.iter().take(limit) {
            write_entry(sink, &queued.record.method, &queued.record.params)?;
            if !self.queue.acknowledge(queued.id) {
                debug!(id = %queued.id, method = %queued.record.method, "call superseded while being written");
            }
            report.calls_sent += 1;
        }
        report.deferred = pending.len().saturating_sub(limit);
        Ok(())
    }
}

/// Write one call entry: method name, parameter count, then a value/tag pair
/// for every present parameter.
fn write_entry(
    sink: &mut dyn BatchSink,
    method: &str,
    params: &[Option<Value>],
) -> Result<(), SinkError> {
    sink.start_tag(names::CALL)?;
    sink.add_attribute(names::METHOD, Json::String(method.to_string()))?;
    sink.add_attribute(names::PARAM_COUNT, Json::from(params.len()))?;
    for (index, param) in params.iter().enumerate() {
        if let Some(value) = param {
            let tagged = encode(value);
            sink.add_attribute(&names::param_value(index), tagged.value)?;
            sink.add_attribute(&names::param_type(index), Json::from(tagged.tag))?;
        }
    }
    sink.end_tag(names::CALL)
}
