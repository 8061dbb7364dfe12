//! End-to-end scenarios from the design doc: proxy reports flow through the [`Reducer`] and the
//! [`Dispatcher`] publishes heartbeats through a recording [`MessageStream`] test double.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::{Context as LayerContext, Layer};
use tracing_subscriber::prelude::*;

use timetick_coordinator::{
    ChannelRegistry, DdlBarrier, Dispatcher, Family, MessagePack, MessageStream, Reducer,
    TickOutcome, TickReport,
};

#[derive(Default)]
struct RecordingStream {
    sent: Mutex<Vec<(String, MessagePack)>>,
}

impl RecordingStream {
    fn snapshot(&self) -> Vec<(String, MessagePack)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageStream for RecordingStream {
    async fn send(&self, channel: &str, pack: &MessagePack) -> Result<(), String> {
        self.sent
            .lock()
            .unwrap()
            .push((channel.to_string(), pack.clone()));
        Ok(())
    }
}

fn tick(source_id: u64, channel: &str, ts: u64, default_ts: u64) -> TickReport {
    TickReport {
        source_id,
        channel_names: vec![channel.to_string()],
        timestamps: vec![ts],
        default_ts,
    }
}

fn empty_tick(source_id: u64, default_ts: u64) -> TickReport {
    TickReport {
        source_id,
        channel_names: vec![],
        timestamps: vec![],
        default_ts,
    }
}

fn min_ts_of(pack: &MessagePack) -> u64 {
    match pack {
        MessagePack::TimeTick(msg) => msg.timestamp,
    }
}

async fn wait_until(mut predicate: impl FnMut() -> bool, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !predicate() {
        if tokio::time::Instant::now() >= deadline {
            panic!("condition did not become true within {timeout:?}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

struct Harness {
    reducer: Arc<Reducer>,
    stream: Arc<RecordingStream>,
    cancel: CancellationToken,
    dispatcher_handle: tokio::task::JoinHandle<()>,
}

async fn start_harness(coordinator_id: u64, channels: &[&str], queue_capacity: usize) -> Harness {
    let stream = Arc::new(RecordingStream::default());
    let registry = Arc::new(ChannelRegistry::new(stream.clone()));
    registry.add_channels(Family::Dml, channels.iter().copied());

    let ddl_barrier = Arc::new(DdlBarrier::new());
    let (reducer, receiver) = Reducer::new(coordinator_id, ddl_barrier, queue_capacity);
    let reducer = Arc::new(reducer);

    let (watchdog, _watchdog_handle) = timetick_coordinator::watchdog::spawn(
        Duration::from_secs(120),
        false,
    );

    let dispatcher = Dispatcher::new(
        receiver,
        registry,
        coordinator_id,
        Duration::from_millis(200),
        watchdog,
    );

    let cancel = CancellationToken::new();
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    Harness {
        reducer,
        stream,
        cancel,
        dispatcher_handle,
    }
}

impl Harness {
    async fn shutdown(self) {
        self.cancel.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), self.dispatcher_handle).await;
    }
}

/// Scenario A: single proxy, single channel.
#[tokio::test]
async fn scenario_a_single_proxy_single_channel() {
    let harness = start_harness(1, &["c0"], 16).await;
    harness.reducer.add_proxy(1);

    harness
        .reducer
        .submit_tick(tick(1, "c0", 100, 100));

    wait_until(|| harness.stream.snapshot().len() == 1, Duration::from_secs(2)).await;

    let sent = harness.stream.snapshot();
    assert_eq!(sent[0].0, "c0");
    assert_eq!(min_ts_of(&sent[0].1), 100);

    harness.shutdown().await;
}

/// Scenario B: two proxies converge on the smaller timestamp.
#[tokio::test]
async fn scenario_b_two_proxies_converge_on_minimum() {
    let harness = start_harness(1, &["c0"], 16).await;
    harness.reducer.add_proxy(1);
    harness.reducer.add_proxy(2);

    harness.reducer.submit_tick(tick(1, "c0", 200, 200));
    harness.reducer.submit_tick(tick(2, "c0", 150, 150));

    wait_until(|| harness.stream.snapshot().len() == 1, Duration::from_secs(2)).await;

    let sent = harness.stream.snapshot();
    assert_eq!(min_ts_of(&sent[0].1), 150);

    harness.shutdown().await;
}

/// Scenario C: an outstanding DDL blocks the round until it is removed.
#[tokio::test]
async fn scenario_c_ddl_barrier_blocks_then_releases() {
    let stream = Arc::new(RecordingStream::default());
    let registry = Arc::new(ChannelRegistry::new(stream.clone()));
    registry.add_channels(Family::Dml, ["c0"]);

    let ddl_barrier = Arc::new(DdlBarrier::new());
    ddl_barrier.add(500, "add-column");

    let (reducer, receiver) = Reducer::new(1, ddl_barrier.clone(), 16);
    reducer.add_proxy(1);

    let (watchdog, _handle) = timetick_coordinator::watchdog::spawn(Duration::from_secs(120), false);
    let dispatcher = Dispatcher::new(receiver, registry, 1, Duration::from_millis(200), watchdog);
    let cancel = CancellationToken::new();
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    let outcome = reducer.submit_tick(empty_tick(1, 600));
    assert_eq!(outcome, TickOutcome::Blocked);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(stream.snapshot().is_empty(), "blocked tick must not broadcast");

    ddl_barrier.remove(500, "add-column");
    let outcome = reducer.submit_tick(empty_tick(1, 600));
    assert_eq!(outcome, TickOutcome::Accepted { round_ready: true });

    wait_until(|| stream.snapshot().len() == 1, Duration::from_secs(2)).await;
    assert_eq!(min_ts_of(&stream.snapshot()[0].1), 600);

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), dispatcher_handle).await;
}

/// Scenario D: the coordinator may never regress its own `default_ts`.
#[tokio::test]
async fn scenario_d_coordinator_regression_is_rejected() {
    let harness = start_harness(1, &["c0"], 16).await;
    harness.reducer.add_proxy(1);

    let accepted = harness.reducer.submit_tick(tick(1, "c0", 300, 300));
    assert_eq!(accepted, TickOutcome::Accepted { round_ready: true });

    wait_until(|| harness.stream.snapshot().len() == 1, Duration::from_secs(2)).await;

    let regressed = harness.reducer.submit_tick(tick(1, "c0", 250, 250));
    assert_eq!(regressed, TickOutcome::Regressed);

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(
        harness.stream.snapshot().len(),
        1,
        "a regressed tick must not produce a second broadcast"
    );

    harness.shutdown().await;
}

struct IdleWarningCounter {
    count: Arc<AtomicUsize>,
}

impl<S: tracing::Subscriber> Layer<S> for IdleWarningCounter {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }

        struct MessageVisitor(bool);
        impl tracing::field::Visit for MessageVisitor {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" && format!("{value:?}").contains("idle") {
                    self.0 = true;
                }
            }
        }

        let mut visitor = MessageVisitor(false);
        event.record(&mut visitor);
        if visitor.0 {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Scenario E: one laggard proxy among two throttles the idle warning to once per ten rounds,
/// and never produces a broadcast because the round never completes.
#[tokio::test]
async fn scenario_e_idle_proxy_throttled_warning() {
    let count = Arc::new(AtomicUsize::new(0));
    let subscriber = tracing_subscriber::registry().with(IdleWarningCounter {
        count: count.clone(),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let harness = start_harness(1, &["c0"], 16).await;
    harness.reducer.add_proxy(1);
    harness.reducer.add_proxy(2);

    for i in 1..=30u64 {
        let outcome = harness.reducer.submit_tick(tick(1, "c0", i, i));
        assert_eq!(outcome, TickOutcome::Accepted { round_ready: false });
    }

    assert_eq!(count.load(Ordering::SeqCst), 3, "one warning per ten blocked rounds");
    assert!(harness.stream.snapshot().is_empty(), "round 2 never ticked");

    harness.shutdown().await;
}

/// Scenario F: a saturated queue drops snapshots instead of blocking, and once the dispatcher
/// resumes the surviving heartbeats are still non-decreasing.
#[tokio::test]
async fn scenario_f_queue_overflow_then_recovery() {
    let stream = Arc::new(RecordingStream::default());
    let registry = Arc::new(ChannelRegistry::new(stream.clone()));
    registry.add_channels(Family::Dml, ["c0"]);

    let ddl_barrier = Arc::new(DdlBarrier::new());
    let (reducer, receiver) = Reducer::new(1, ddl_barrier, 16);
    reducer.add_proxy(1);

    // Twenty complete rounds before the dispatcher ever drains the queue: capacity 16 means 4
    // are dropped, but the table is nulled after every drain so rounds keep completing.
    for i in 1..=20u64 {
        let outcome = reducer.submit_tick(tick(1, "c0", i * 10, i * 10));
        assert_eq!(outcome, TickOutcome::Accepted { round_ready: true });
    }

    let (watchdog, _handle) = timetick_coordinator::watchdog::spawn(Duration::from_secs(120), false);
    let dispatcher = Dispatcher::new(receiver, registry, 1, Duration::from_millis(200), watchdog);
    let cancel = CancellationToken::new();
    let dispatcher_handle = tokio::spawn(dispatcher.run(cancel.clone()));

    wait_until(|| stream.snapshot().len() == 16, Duration::from_secs(2)).await;

    let sent = stream.snapshot();
    let timestamps: Vec<u64> = sent.iter().map(|(_, pack)| min_ts_of(pack)).collect();
    let mut sorted = timestamps.clone();
    sorted.sort_unstable();
    assert_eq!(timestamps, sorted, "surviving heartbeats are non-decreasing");

    cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), dispatcher_handle).await;
}
