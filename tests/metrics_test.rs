//! Tests for metrics integration.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

mod common;

use std::sync::Arc;
use std::time::Duration;

use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};
use serde_json::json;

use bifrost::{
    BifrostError, Dispatcher, HistoryLedger, InferenceResponse, ProviderRegistry, RetryConfig,
    Usage, telemetry,
};
use common::MockProvider;

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    counter_where(snapshot, name, |_| true)
}

/// Sum counters matching a name and a label predicate.
fn counter_where(
    snapshot: &SnapshotVec,
    name: &str,
    labels: impl Fn(&metrics::Key) -> bool,
) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| {
            key.kind() == MetricKind::Counter && key.key().name() == name && labels(key.key())
        })
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

fn has_label(key: &metrics::Key, label: &str, value: &str) -> bool {
    key.labels().any(|l| l.key() == label && l.value() == value)
}

fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

fn dispatcher(provider: MockProvider) -> Dispatcher {
    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(provider));
    Dispatcher::new(Arc::new(registry), Arc::new(HistoryLedger::in_memory(10)))
        .with_retry_config(RetryConfig::new().initial_delay(Duration::from_millis(1)))
}

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
fn capture<F: std::future::Future>(recorder: &DebuggingRecorder, fut: F) -> F::Output {
    metrics::with_local_recorder(recorder, || {
        tokio::task::block_in_place(|| tokio::runtime::Handle::current().block_on(fut))
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_invoke_records_request_and_tokens() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let provider = MockProvider::new("p").handler(|_, req| {
        Ok(InferenceResponse::new("ok", &req.model).with_usage(Usage::from_counts(Some(5), Some(7))))
    });
    let dispatcher = dispatcher(provider);
    let result = capture(
        &recorder,
        dispatcher.call_tool("use_p", &json!({"model": "m1", "prompt": "hi"})),
    );
    assert!(!result.unwrap().is_error);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_where(&snapshot, telemetry::REQUESTS_TOTAL, |k| {
            has_label(k, "status", "ok") && has_label(k, "operation", "invoke")
        }),
        1
    );
    assert!(has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS));
    assert_eq!(
        counter_where(&snapshot, telemetry::TOKENS_TOTAL, |k| {
            has_label(k, "direction", "prompt")
        }),
        5
    );
    assert_eq!(
        counter_where(&snapshot, telemetry::TOKENS_TOTAL, |k| {
            has_label(k, "direction", "completion")
        }),
        7
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let provider = MockProvider::new("p")
        .max_retries(2)
        .fail_with(|| BifrostError::RateLimit {
            retry_after: Some(Duration::from_millis(1)),
        });
    let dispatcher = dispatcher(provider);
    let result = capture(
        &recorder,
        dispatcher.call_tool("use_p", &json!({"model": "m1", "prompt": "hi"})),
    );
    assert!(result.unwrap().is_error);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 2);
    assert_eq!(
        counter_where(&snapshot, telemetry::REQUESTS_TOTAL, |k| {
            has_label(k, "status", "error")
        }),
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn history_write_failures_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");
    let ledger = HistoryLedger::open(bifrost::HistoryConfig {
        enabled: true,
        max_entries: 10,
        path: Some(path.clone()),
    })
    .await
    .unwrap();
    // a directory at the file path makes every append fail
    std::fs::create_dir(&path).unwrap();

    let mut registry = ProviderRegistry::new();
    registry.register(Arc::new(MockProvider::new("p")));
    let dispatcher = Dispatcher::new(Arc::new(registry), Arc::new(ledger));
    let result = capture(
        &recorder,
        dispatcher.call_tool("use_p", &json!({"model": "m1", "prompt": "hi"})),
    );
    assert!(!result.unwrap().is_error);

    let snapshot = snapshotter.snapshot().into_vec();
    assert_eq!(
        counter_total(&snapshot, telemetry::HISTORY_WRITE_FAILURES_TOTAL),
        1
    );
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    let dispatcher = dispatcher(MockProvider::new("p"));
    let result = dispatcher
        .call_tool("use_p", &json!({"model": "m1", "prompt": "hi"}))
        .await
        .unwrap();
    assert!(!result.is_error);
}
