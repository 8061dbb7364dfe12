//! Per-proxy table of last-known per-channel timestamps.
//!
//! Entries are `Option<ProxyEntry>`: `None` is the null sentinel for "has not reported this
//! round". The reducer's "every entry is non-null and the table is non-empty" predicate is the
//! round-complete signal; see [`crate::reducer::Reducer`].

use std::collections::HashMap;

use crate::error::RejectReason;
use crate::model::{ProxyId, Timestamp};

/// One proxy's report, installed into the table on a successful `submit_tick`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    pub chan_ts: HashMap<String, Timestamp>,
    pub default_ts: Timestamp,
    pub cnt: u64,
}

impl ProxyEntry {
    /// `chan_ts[channel]` if present, else `default_ts`.
    pub fn ts_for(&self, channel: &str) -> Timestamp {
        self.chan_ts.get(channel).copied().unwrap_or(self.default_ts)
    }
}

/// The RPC-shaped report a proxy submits: parallel `channel_names`/`timestamps` arrays plus a
/// fallback `default_ts`.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub source_id: ProxyId,
    pub channel_names: Vec<String>,
    pub timestamps: Vec<Timestamp>,
    pub default_ts: Timestamp,
}

/// The result of [`ProxyTickTable::submit_tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Rejected(RejectReason),
    Blocked,
    Regressed,
    Accepted { round_ready: bool },
}

/// A drained snapshot: every non-null entry at the moment of drain, keyed by proxy.
pub type Snapshot = HashMap<ProxyId, ProxyEntry>;

/// The per-proxy table itself. Not internally synchronized — callers (the [`crate::reducer`])
/// hold a single mutex across `submit_tick` and the drain so the two never interleave.
pub struct ProxyTickTable {
    entries: HashMap<ProxyId, Option<ProxyEntry>>,
    coordinator_id: ProxyId,
}

impl ProxyTickTable {
    pub fn new(coordinator_id: ProxyId) -> Self {
        Self {
            entries: HashMap::new(),
            coordinator_id,
        }
    }

    /// Insert `(id, null)`. A no-op if `id` is already present.
    pub fn add_proxy(&mut self, id: ProxyId) {
        self.entries.entry(id).or_insert(None);
    }

    /// Drop `id`. Returns whether a drain should now be attempted: true iff the removal leaves
    /// every remaining entry non-null and the table non-empty. A no-op (returning `false`) if
    /// `id` was absent.
    pub fn remove_proxy(&mut self, id: ProxyId) -> bool {
        if self.entries.remove(&id).is_none() {
            return false;
        }
        self.is_round_ready()
    }

    /// Set each listed entry back to `null`.
    pub fn reset_many(&mut self, ids: impl IntoIterator<Item = ProxyId>) {
        for id in ids {
            if let Some(slot) = self.entries.get_mut(&id) {
                *slot = None;
            }
        }
    }

    fn is_round_ready(&self) -> bool {
        !self.entries.is_empty() && self.entries.values().all(Option::is_some)
    }

    /// Proxies that have not yet reported this round.
    pub fn idle_proxies(&self) -> Vec<ProxyId> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_none())
            .map(|(id, _)| *id)
            .collect()
    }

    /// The largest `cnt` among proxies that *have* reported this round. `0` if none have.
    pub fn max_cnt(&self) -> u64 {
        self.entries
            .values()
            .filter_map(|e| e.as_ref().map(|e| e.cnt))
            .max()
            .unwrap_or(0)
    }

    /// Admit `report` for `report.source_id`. See [`TickOutcome`] for the decision tree.
    ///
    /// `barrier_min` is read by the caller *before* the table lock is taken (the fixed lock
    /// order that prevents deadlock between `tickLock` and `ddlLock`).
    pub fn submit_tick(&mut self, report: TickReport, barrier_min: Timestamp) -> TickOutcome {
        let Some(slot) = self.entries.get(&report.source_id) else {
            return TickOutcome::Rejected(RejectReason::UnknownProxy);
        };

        if report.channel_names.len() != report.timestamps.len()
            || (report.channel_names.is_empty() && report.default_ts == 0)
        {
            return TickOutcome::Rejected(RejectReason::Malformed);
        }

        if report.default_ts > barrier_min {
            return TickOutcome::Blocked;
        }

        let previous = slot.clone();

        if report.source_id == self.coordinator_id {
            if let Some(previous) = &previous {
                if report.default_ts <= previous.default_ts {
                    return TickOutcome::Regressed;
                }
            }
        }

        let cnt = previous.as_ref().map(|p| p.cnt + 1).unwrap_or(1);
        let chan_ts = report
            .channel_names
            .into_iter()
            .zip(report.timestamps)
            .collect();

        let entry = ProxyEntry {
            chan_ts,
            default_ts: report.default_ts,
            cnt,
        };

        self.entries.insert(report.source_id, Some(entry));

        TickOutcome::Accepted {
            round_ready: self.is_round_ready(),
        }
    }

    /// Move every non-null entry out into a fresh snapshot, leaving `null` behind. Returns
    /// `None` (without mutating anything) if any entry is still null.
    pub fn drain(&mut self) -> Option<Snapshot> {
        if !self.is_round_ready() {
            return None;
        }

        let mut snapshot = Snapshot::with_capacity(self.entries.len());
        for (id, slot) in self.entries.iter_mut() {
            if let Some(entry) = slot.take() {
                snapshot.insert(*id, entry);
            }
        }
        Some(snapshot)
    }
}
