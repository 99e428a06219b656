//! Integration tests: full exchange cycles
//!
//! Drives a proxy through inbound/outbound exchanges and reads every
//! outbound batch back the way the receiving peer would.

use std::sync::{Arc, Mutex};

use callbridge::mock::{FailureConfig, MockHandler};
use callbridge::{
    decode_outbound, params, BatchSink, CallRecord, DecodeError, DecodedBatch, ElementSink,
    HandlerError, InboundBatch, InitPhase, Params, Proxy, ProxyConfig, ProxyError, SinkError,
    Value,
};
use serde_json::{json, Value as Json};

fn exchange(proxy: &Proxy) -> DecodedBatch {
    let mut sink = ElementSink::new();
    proxy.produce_outbound(&mut sink).unwrap();
    decode_outbound(&sink.finish().unwrap()).unwrap()
}

fn lazy_proxy(handler: Arc<MockHandler>) -> Proxy {
    let config = ProxyConfig {
        eager_init: false,
        ..ProxyConfig::default()
    };
    Proxy::with_config(handler, config)
}

// === Init Handshake ===

#[test]
fn test_first_exchange_sends_init_before_calls() {
    let handler = Arc::new(MockHandler::with_init_params(params!["dark", 3]));
    let proxy = Proxy::new(handler.clone());
    proxy.call("log", params!["hello"]);

    let first = exchange(&proxy);
    assert_eq!(first.init, Some(params!["dark", 3]));
    assert!(!first.init_already_sent);
    assert_eq!(first.calls, vec![CallRecord::new("log", params!["hello"])]);
    assert_eq!(proxy.init_phase(), InitPhase::Sent);

    let second = exchange(&proxy);
    assert_eq!(second.init, None);
    assert!(second.init_already_sent);
    assert!(second.calls.is_empty());
    assert_eq!(handler.fetch_count(), 1);
}

#[test]
fn test_init_entry_is_first_in_call_list() {
    let proxy = Proxy::new(Arc::new(MockHandler::with_init_params(params![true])));
    proxy.call("a", params![]);

    let mut sink = ElementSink::new();
    proxy.produce_outbound(&mut sink).unwrap();
    let root = sink.finish().unwrap();
    let names: Vec<_> = root
        .child("cl")
        .unwrap()
        .children_named("c")
        .map(|c| c.attr("n").unwrap().as_str().unwrap().to_string())
        .collect();
    assert_eq!(names, vec!["_init", "a"]);
    assert!(root.attr("_si").is_none());
}

#[test]
fn test_peer_init_request_is_answered_first() {
    let handler = Arc::new(MockHandler::with_init_params(params!["cfg"]));
    let proxy = lazy_proxy(handler.clone());
    proxy.call("status", params![1]);

    let report = proxy.receive_inbound(&InboundBatch::init_request()).unwrap();
    assert!(report.init_requested);
    assert_eq!(handler.fetch_count(), 1);
    assert_eq!(proxy.init_phase(), InitPhase::PendingSend);

    let batch = exchange(&proxy);
    assert_eq!(batch.init, Some(params!["cfg"]));
    assert_eq!(batch.calls, vec![CallRecord::new("status", params![1])]);
}

#[test]
fn test_lazy_session_sends_no_init_unprompted() {
    let handler = Arc::new(MockHandler::new());
    let proxy = lazy_proxy(handler.clone());
    proxy.call("a", params![]);

    let batch = exchange(&proxy);
    assert_eq!(batch.init, None);
    assert!(!batch.init_already_sent);
    assert_eq!(batch.calls.len(), 1);
    assert_eq!(handler.fetch_count(), 0);
    assert_eq!(proxy.init_phase(), InitPhase::Idle);
}

#[test]
fn test_request_client_side_init_refetches_once() {
    let handler = Arc::new(MockHandler::with_init_params(params!["v1"]));
    let proxy = Proxy::new(handler.clone());
    exchange(&proxy);

    handler.set_init_params(params!["v2"]);
    let before = handler.notifications();
    proxy.request_client_side_init();
    assert_eq!(handler.notifications(), before + 1);
    assert_eq!(proxy.init_phase(), InitPhase::PendingSend);

    let batch = exchange(&proxy);
    assert_eq!(batch.init, Some(params!["v2"]));
    assert!(!batch.init_already_sent);
    assert_eq!(handler.fetch_count(), 2);

    let after = exchange(&proxy);
    assert_eq!(after.init, None);
    assert!(after.init_already_sent);
    assert_eq!(handler.fetch_count(), 2);
}

/// Sink that asks for a re-init while the init entry is being written.
struct ReinitMidSend<'a> {
    proxy: &'a Proxy,
    inner: ElementSink,
    fired: bool,
}

impl BatchSink for ReinitMidSend<'_> {
    fn start_tag(&mut self, tag: &str) -> Result<(), SinkError> {
        self.inner.start_tag(tag)
    }

    fn add_attribute(&mut self, name: &str, value: Json) -> Result<(), SinkError> {
        if !self.fired && name == "n" && value == json!("_init") {
            self.fired = true;
            self.proxy.request_client_side_init();
        }
        self.inner.add_attribute(name, value)
    }

    fn end_tag(&mut self, tag: &str) -> Result<(), SinkError> {
        self.inner.end_tag(tag)
    }
}

#[test]
fn test_reinit_requested_during_send_is_not_lost() {
    let handler = Arc::new(MockHandler::with_init_params(params!["v1"]));
    let proxy = Proxy::new(handler.clone());

    let mut sink = ReinitMidSend {
        proxy: &proxy,
        inner: ElementSink::new(),
        fired: false,
    };
    let report = proxy.produce_outbound(&mut sink).unwrap();
    assert!(sink.fired);
    assert!(report.init_sent);
    assert_eq!(proxy.init_phase(), InitPhase::PendingSend);
    assert_eq!(handler.fetch_count(), 1);

    handler.set_init_params(params!["v2"]);
    let resent = exchange(&proxy);
    assert_eq!(resent.init, Some(params!["v2"]));
    assert!(!resent.init_already_sent);
    assert_eq!(handler.fetch_count(), 2);
    assert_eq!(proxy.init_phase(), InitPhase::Sent);

    let settled = exchange(&proxy);
    assert_eq!(settled.init, None);
    assert!(settled.init_already_sent);
}

#[test]
fn test_repeated_peer_requests_fetch_once_per_exchange() {
    let handler = Arc::new(MockHandler::new());
    let proxy = lazy_proxy(handler.clone());

    proxy.receive_inbound(&InboundBatch::init_request()).unwrap();
    proxy.receive_inbound(&InboundBatch::init_request()).unwrap();
    assert_eq!(handler.fetch_count(), 1);

    exchange(&proxy);
    proxy.receive_inbound(&InboundBatch::init_request()).unwrap();
    assert_eq!(handler.fetch_count(), 2);
    assert!(exchange(&proxy).init.is_some());
}

// === Outbound Calls ===

#[test]
fn test_call_once_supersedes_pending_only() {
    let proxy = Proxy::new(Arc::new(MockHandler::new()));
    proxy.call("log", params!["a"]);
    proxy.call("log", params!["b"]);
    proxy.call_once("cursor", params![5]);
    proxy.call_once("cursor", params![9]);

    let batch = exchange(&proxy);
    assert_eq!(
        batch.calls,
        vec![
            CallRecord::new("log", params!["a"]),
            CallRecord::new("log", params!["b"]),
            CallRecord::new("cursor", params![9]),
        ]
    );

    // Already delivered calls are out of reach.
    proxy.call_once("cursor", params![10]);
    assert_eq!(
        exchange(&proxy).calls,
        vec![CallRecord::new("cursor", params![10])]
    );
}

#[test]
fn test_every_kind_reaches_peer() {
    let proxy = Proxy::new(Arc::new(MockHandler::new()));
    let mut map = std::collections::BTreeMap::new();
    map.insert("w".to_string(), Value::Integer(640));
    map.insert("scale".to_string(), Value::Float(1.5));
    let handle = callbridge::ResourceHandle::new("img/logo.png");

    let sent = params!["x", true, 42, 2.5, map, handle, None::<String>];
    proxy.call("everything", sent.clone());

    let batch = exchange(&proxy);
    assert_eq!(batch.calls, vec![CallRecord::new("everything", sent)]);
}

#[test]
fn test_empty_exchange_still_writes_call_list() {
    let proxy = Proxy::new(Arc::new(MockHandler::new()));
    exchange(&proxy);

    let mut sink = ElementSink::new();
    let report = proxy.produce_outbound(&mut sink).unwrap();
    assert_eq!(report.calls_sent, 0);
    assert!(report.already_sent_marker);
    let root = sink.finish().unwrap();
    assert!(root.child("cl").unwrap().children.is_empty());
}

// === Inbound Dispatch ===

#[test]
fn test_registered_and_default_dispatch() {
    let handler = Arc::new(MockHandler::new());
    let proxy = Proxy::new(handler.clone());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    proxy.register_fn("resize", move |_: &str, params: &Params| {
        sink.lock().unwrap().push((params.int(0)?, params.int(1)?));
        Ok(())
    });

    let batch = InboundBatch::default()
        .with_call(&CallRecord::new("resize", params![800, 600]))
        .with_call(&CallRecord::new("unknown", params!["?"]));
    let report = proxy.receive_inbound(&batch).unwrap();

    assert_eq!(report.dispatched, 1);
    assert_eq!(report.defaulted, 1);
    assert_eq!(*seen.lock().unwrap(), vec![(800, 600)]);
    assert_eq!(
        handler.default_calls(),
        vec![CallRecord::new("unknown", params!["?"])]
    );
}

#[test]
fn test_handler_failure_does_not_stop_batch() {
    let handler = Arc::new(MockHandler::new());
    handler.inject_failure("b", FailureConfig::error("boom"));
    let proxy = Proxy::new(handler.clone());
    proxy.register_fn("typed", |_: &str, params: &Params| params.str(0).map(|_| ()));

    let batch = InboundBatch::default()
        .with_call(&CallRecord::new("a", params![]))
        .with_call(&CallRecord::new("b", params![]))
        .with_call(&CallRecord::new("typed", params![7]))
        .with_call(&CallRecord::new("c", params![]));
    let report = proxy.receive_inbound(&batch).unwrap();

    assert_eq!(report.failed, 2);
    assert_eq!(report.defaulted, 2);
    let methods: Vec<_> = handler.default_calls().into_iter().map(|c| c.method).collect();
    assert_eq!(methods, vec!["a", "b", "c"]);
}

#[test]
fn test_bad_parameter_reports_index() {
    let params = Params::from(params!["x", None::<bool>]);
    let err = params.int(0).unwrap_err();
    assert!(matches!(err, HandlerError::BadParameter { index: 0, .. }));
    assert!(params.bool(1).is_err());
}

#[test]
fn test_decode_failure_aborts_rest_of_batch() {
    let handler = Arc::new(MockHandler::new());
    let proxy = Proxy::new(handler.clone());

    let batch = InboundBatch::from_json(json!({
        "calls": [
            {"n": "a", "pc": 0, "p": []},
            {"n": "b", "pc": 1, "p": [{"t": 9, "v": 1}]},
            {"n": "c", "pc": 0, "p": []}
        ]
    }))
    .unwrap();

    let err = proxy.receive_inbound(&batch).unwrap_err();
    assert!(matches!(
        err,
        ProxyError::Decode {
            index: 1,
            source: DecodeError::UnknownTag(9)
        }
    ));
    let methods: Vec<_> = handler.default_calls().into_iter().map(|c| c.method).collect();
    assert_eq!(methods, vec!["a"]);
}

#[test]
fn test_param_count_strictness() {
    let batch = InboundBatch::from_json(json!({
        "calls": [{"n": "short", "pc": 2, "p": [{"t": 0, "v": "only"}]}]
    }))
    .unwrap();

    let strict = Proxy::new(Arc::new(MockHandler::new()));
    assert!(matches!(
        strict.receive_inbound(&batch),
        Err(ProxyError::Decode {
            source: DecodeError::CountMismatch { declared: 2, found: 1, .. },
            ..
        })
    ));

    let handler = Arc::new(MockHandler::new());
    let lenient = Proxy::with_config(
        handler.clone(),
        ProxyConfig {
            strict_param_count: false,
            ..ProxyConfig::default()
        },
    );
    lenient.receive_inbound(&batch).unwrap();
    assert_eq!(
        handler.default_calls(),
        vec![CallRecord::new("short", params!["only"])]
    );
}

#[test]
fn test_reentrant_call_goes_out_next_exchange() {
    let handler = Arc::new(MockHandler::new());
    let proxy = Proxy::new(handler);
    let caller = proxy.caller();
    proxy.register_fn("ping", move |_: &str, params: &Params| {
        caller.call("pong", params.as_slice().to_vec());
        Ok(())
    });
    exchange(&proxy);

    let inbound = InboundBatch::default().with_call(&CallRecord::new("ping", params![17]));
    proxy.receive_inbound(&inbound).unwrap();
    assert_eq!(proxy.pending_calls(), 1);

    let batch = exchange(&proxy);
    assert_eq!(batch.calls, vec![CallRecord::new("pong", params![17])]);
}

// === Legacy Inbound Form ===

#[test]
fn test_legacy_fields_end_to_end() {
    let handler = Arc::new(MockHandler::with_init_params(params!["boot"]));
    let proxy = lazy_proxy(handler.clone());

    let batch = InboundBatch::from_json_str(
        r#"{
            "_init": true,
            "c_1_set_title": 1,
            "p_1_0": "Inbox",
            "c_0_resize": 2,
            "p_0_0": 1024,
            "p_0_1": 768
        }"#,
    )
    .unwrap();
    let report = proxy.receive_inbound(&batch).unwrap();
    assert!(report.init_requested);
    assert_eq!(report.defaulted, 2);

    assert_eq!(
        handler.default_calls(),
        vec![
            CallRecord::new("resize", params![1024, 768]),
            CallRecord::new("set_title", params!["Inbox"]),
        ]
    );
    assert_eq!(exchange(&proxy).init, Some(params!["boot"]));
}
