//! Background agent that consumes the reducer's queue, fans out per-channel minima, honours the
//! DDL barrier (indirectly, via `submit_tick` refusing blocked reports before a snapshot is ever
//! built), and drives the liveness watchdog.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::message::{MessagePack, TimeTickMsg};
use crate::model::ProxyId;
use crate::registry::{ChannelRegistry, Family};
use crate::ticktable::Snapshot;
use crate::watchdog::Watchdog;
use tokio::sync::mpsc;

/// The Dispatcher's two states: consuming from the queue, or stopped for good. Transition out of
/// `Running` is terminal for a given instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Running,
    Stopped,
}

pub struct Dispatcher {
    receiver: mpsc::Receiver<Snapshot>,
    registry: Arc<ChannelRegistry>,
    coordinator_id: ProxyId,
    tick_interval: Duration,
    watchdog: Watchdog,
    state: DispatcherState,
}

impl Dispatcher {
    pub fn new(
        receiver: mpsc::Receiver<Snapshot>,
        registry: Arc<ChannelRegistry>,
        coordinator_id: ProxyId,
        tick_interval: Duration,
        watchdog: Watchdog,
    ) -> Self {
        Self {
            receiver,
            registry,
            coordinator_id,
            tick_interval,
            watchdog,
            state: DispatcherState::Running,
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    /// Run until the reducer's queue closes or `cancel` fires. Cancellation mid-iteration is
    /// best-effort: any in-flight per-channel workers are allowed to finish first.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            let snapshot = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("dispatcher cancellation observed, shutting down");
                    self.receiver.close();
                    break;
                }
                received = self.receiver.recv() => {
                    match received {
                        Some(snapshot) => snapshot,
                        None => {
                            tracing::info!("reducer queue closed, dispatcher stopping");
                            break;
                        }
                    }
                }
            };

            self.dispatch_once(snapshot).await;
        }

        self.state = DispatcherState::Stopped;
    }

    async fn dispatch_once(&self, snapshot: Snapshot) {
        let start = Instant::now();

        if !snapshot.contains_key(&self.coordinator_id) {
            tracing::warn!(
                coordinator_id = self.coordinator_id,
                "snapshot is missing the coordinator's own report"
            );
            return;
        }

        // Fan out over every registered DML channel, not just the ones a report happened to name:
        // a coordinator report with an empty `chan_ts` still carries a `default_ts` that must be
        // published everywhere (`ProxyEntry::ts_for` falls back to it).
        let channels = self.registry.list_channels(Family::Dml);
        let channel_count = channels.len();
        let snapshot = Arc::new(snapshot);

        let mut handles = Vec::with_capacity(channel_count);
        for channel in channels {
            let snapshot = snapshot.clone();
            let registry = self.registry.clone();
            let coordinator_id = self.coordinator_id;

            handles.push(tokio::spawn(async move {
                let min_ts = snapshot
                    .values()
                    .map(|entry| entry.ts_for(&channel))
                    .min()
                    .unwrap_or(0);

                let pack = MessagePack::TimeTick(TimeTickMsg::heartbeat(coordinator_id, min_ts));

                if let Err(err) = registry
                    .broadcast(std::slice::from_ref(&channel), &pack)
                    .await
                {
                    tracing::error!(channel = %channel, error = %err, "failed to broadcast heartbeat");
                }
            }));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "per-channel broadcast worker panicked");
            }
        }

        let elapsed = start.elapsed();
        if elapsed > self.tick_interval {
            tracing::warn!(
                channel_count,
                elapsed_ms = elapsed.as_millis() as u64,
                "dispatcher iteration exceeded the expected tick interval"
            );
        }

        self.watchdog.poke();
    }
}
