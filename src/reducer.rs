//! The transition function from [`ProxyTickTable`] to a drained [`Snapshot`], handed to the
//! Dispatcher over a bounded queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::barrier::DdlBarrier;
use crate::model::ProxyId;
use crate::ticktable::{ProxyTickTable, Snapshot, TickOutcome, TickReport};

/// Fuses `submit_tick` admission, the round-complete predicate, and the drain into one
/// lock-guarded transition, then fans the result out to the Dispatcher.
pub struct Reducer {
    table: Mutex<ProxyTickTable>,
    ddl_barrier: Arc<DdlBarrier>,
    sender: mpsc::Sender<Snapshot>,
}

impl Reducer {
    /// `queue_capacity` bounds the channel to the Dispatcher; a full queue causes the oldest
    /// slot to stay put and the newest drain to be dropped (see [`Self::try_drain_locked`]).
    pub fn new(
        coordinator_id: ProxyId,
        ddl_barrier: Arc<DdlBarrier>,
        queue_capacity: usize,
    ) -> (Self, mpsc::Receiver<Snapshot>) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        (
            Self {
                table: Mutex::new(ProxyTickTable::new(coordinator_id)),
                ddl_barrier,
                sender,
            },
            receiver,
        )
    }

    pub fn add_proxy(&self, id: ProxyId) {
        self.table.lock().add_proxy(id);
    }

    pub fn remove_proxy(&self, id: ProxyId) {
        let mut table = self.table.lock();
        if table.remove_proxy(id) {
            self.try_drain_locked(&mut table);
        }
    }

    pub fn reset_many(&self, ids: impl IntoIterator<Item = ProxyId>) {
        self.table.lock().reset_many(ids);
    }

    /// Admit `report`. Reads the DDL barrier *before* taking the table lock, matching the fixed
    /// `ddlLock` → `tickLock` order that avoids a nested-lock deadlock.
    pub fn submit_tick(&self, report: TickReport) -> TickOutcome {
        let barrier_min = self.ddl_barrier.min();

        let mut table = self.table.lock();
        let outcome = table.submit_tick(report, barrier_min);

        if matches!(outcome, TickOutcome::Accepted { .. }) {
            self.try_drain_locked(&mut table);
        }

        outcome
    }

    /// Attempt to drain under the lock already held by the caller. Aborts silently unless every
    /// entry is non-null; when it aborts, throttles an idle-proxy warning to once per ten
    /// blocked rounds (tracked via `max(cnt) % 10 == 0`, suppressing the spurious `cnt == 0`
    /// firing on startup).
    fn try_drain_locked(&self, table: &mut ProxyTickTable) {
        let idle = table.idle_proxies();
        if !idle.is_empty() {
            let max_cnt = table.max_cnt();
            if max_cnt > 0 && max_cnt % 10 == 0 {
                tracing::warn!(?idle, max_cnt, "proxies idle this round");
            }
            return;
        }

        let Some(snapshot) = table.drain() else {
            return;
        };

        if let Err(mpsc::error::TrySendError::Full(_)) = self.sender.try_send(snapshot) {
            tracing::info!("reducer queue is full, dropping drained snapshot");
        }
    }
}
