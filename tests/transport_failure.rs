//! Integration tests: sink failures mid-batch
//!
//! A failed write must leave the proxy consistent: calls fully written are
//! gone, everything else is still queued, and an unconfirmed init record is
//! sent again.

use std::sync::Arc;

use callbridge::mock::{FailingSink, MockHandler};
use callbridge::{
    decode_outbound, params, CallRecord, DecodedBatch, ElementSink, InitPhase, Proxy, ProxyError,
    SinkError,
};

fn exchange(proxy: &Proxy) -> DecodedBatch {
    let mut sink = ElementSink::new();
    proxy.produce_outbound(&mut sink).unwrap();
    decode_outbound(&sink.finish().unwrap()).unwrap()
}

/// Proxy with empty init params and two queued calls.
///
/// Write sequence of the first exchange:
/// 1 `<cl>`, 2-5 init entry, 6-11 `a` entry, 12-15 `b` entry, 16 `</cl>`.
fn proxy_with_two_calls() -> (Arc<MockHandler>, Proxy) {
    let handler = Arc::new(MockHandler::new());
    let proxy = Proxy::new(handler.clone());
    proxy.call("a", params![1]);
    proxy.call("b", params![]);
    (handler, proxy)
}

// === Failure Points ===

#[test]
fn test_failure_before_anything_written() {
    let (handler, proxy) = proxy_with_two_calls();

    let mut sink = FailingSink::after(0);
    let err = proxy.produce_outbound(&mut sink).unwrap_err();
    assert!(matches!(err, ProxyError::Transport(SinkError::Rejected(_))));
    assert_eq!(proxy.pending_calls(), 2);
    assert_eq!(proxy.init_phase(), InitPhase::PendingSend);

    let retry = exchange(&proxy);
    assert!(retry.init.is_some());
    assert_eq!(retry.calls.len(), 2);
    assert_eq!(handler.fetch_count(), 1);
}

#[test]
fn test_failure_inside_init_entry_resends_init() {
    let (handler, proxy) = proxy_with_two_calls();

    let mut sink = FailingSink::after(3);
    assert!(proxy.produce_outbound(&mut sink).is_err());
    assert_eq!(proxy.init_phase(), InitPhase::PendingSend);
    assert_eq!(proxy.pending_calls(), 2);

    let retry = exchange(&proxy);
    assert_eq!(retry.init, Some(params![]));
    assert!(!retry.init_already_sent);
    assert_eq!(
        retry.calls,
        vec![
            CallRecord::new("a", params![1]),
            CallRecord::new("b", params![]),
        ]
    );
    assert_eq!(handler.fetch_count(), 1);
}

#[test]
fn test_failure_between_calls_keeps_unwritten() {
    let (_, proxy) = proxy_with_two_calls();

    let mut sink = FailingSink::after(11);
    assert!(proxy.produce_outbound(&mut sink).is_err());
    assert_eq!(proxy.init_phase(), InitPhase::Sent);
    assert_eq!(proxy.queue().pending_methods(), vec!["b".to_string()]);

    let retry = exchange(&proxy);
    assert_eq!(retry.init, None);
    assert!(retry.init_already_sent);
    assert_eq!(retry.calls, vec![CallRecord::new("b", params![])]);
}

#[test]
fn test_failure_inside_call_entry_keeps_that_call() {
    let (_, proxy) = proxy_with_two_calls();

    // Fails on the `pt0` attribute of `a`.
    let mut sink = FailingSink::after(9);
    assert!(proxy.produce_outbound(&mut sink).is_err());
    assert_eq!(proxy.pending_calls(), 2);
    assert_eq!(exchange(&proxy).calls.len(), 2);
}

#[test]
fn test_failure_on_closing_tag_after_all_calls() {
    let (_, proxy) = proxy_with_two_calls();

    let mut sink = FailingSink::after(15);
    let err = proxy.produce_outbound(&mut sink).unwrap_err();
    assert!(matches!(err, ProxyError::Transport(_)));
    assert_eq!(sink.writes(), 16);
    assert_eq!(proxy.pending_calls(), 0);
}

#[test]
fn test_calls_enqueued_after_failure_follow_survivors() {
    let (_, proxy) = proxy_with_two_calls();

    let mut sink = FailingSink::after(11);
    assert!(proxy.produce_outbound(&mut sink).is_err());
    proxy.call("c", params!["late"]);

    let methods: Vec<_> = exchange(&proxy).calls.into_iter().map(|c| c.method).collect();
    assert_eq!(methods, vec!["b", "c"]);
}
