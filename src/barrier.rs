//! Tracks the set of in-flight DDL timestamps and reports their minimum.
//!
//! `min()` is the sole contract the Dispatcher (via `ProxyTickTable::submit_tick`) observes: it
//! never returns a value smaller than the smallest currently-outstanding DDL timestamp, and it
//! returns [`NO_BARRIER`] iff the set is empty.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::model::{Timestamp, NO_BARRIER};

struct Inner {
    /// Outstanding timestamps, counted so that two DDLs landing on the same HLC value don't
    /// clobber each other's `remove`.
    outstanding: BTreeMap<Timestamp, u32>,
    cached_min: Timestamp,
}

/// Guards the outstanding-DDL set and its cached minimum behind a single mutex.
pub struct DdlBarrier {
    inner: Mutex<Inner>,
}

impl Default for DdlBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl DdlBarrier {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                outstanding: BTreeMap::new(),
                cached_min: NO_BARRIER,
            }),
        }
    }

    /// Insert `ts` as outstanding. `reason` is retained only for the diagnostic log line.
    pub fn add(&self, ts: Timestamp, reason: &str) {
        let mut inner = self.inner.lock();
        *inner.outstanding.entry(ts).or_insert(0) += 1;
        if ts < inner.cached_min {
            inner.cached_min = ts;
        }
        tracing::debug!(ts, reason, "DDL barrier added");
    }

    /// Remove `ts`. Recomputes the cached minimum by full scan only when the removed value was
    /// the minimum, keeping the common case O(1).
    pub fn remove(&self, ts: Timestamp, reason: &str) {
        let mut inner = self.inner.lock();

        let Some(count) = inner.outstanding.get_mut(&ts) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            inner.outstanding.remove(&ts);
        }

        if inner.outstanding.is_empty() {
            inner.cached_min = NO_BARRIER;
        } else if ts == inner.cached_min {
            inner.cached_min = *inner
                .outstanding
                .keys()
                .next()
                .expect("just checked non-empty");
        }

        tracing::debug!(ts, reason, "DDL barrier removed");
    }

    /// Constant-time read of the cached minimum, or [`NO_BARRIER`] if nothing is outstanding.
    pub fn min(&self) -> Timestamp {
        self.inner.lock().cached_min
    }
}
