//! Liveness watchdog: warns once if the Dispatcher goes quiet for too long.

use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Handle the Dispatcher pokes on every completed iteration.
#[derive(Clone)]
pub struct Watchdog {
    last_poke: watch::Sender<Instant>,
}

impl Watchdog {
    pub fn poke(&self) {
        let _ = self.last_poke.send(Instant::now());
    }
}

/// Spawn the background timer. If `enabled` is false the task exits immediately and `poke` is a
/// harmless no-op for the lifetime of the program.
pub fn spawn(interval: Duration, enabled: bool) -> (Watchdog, JoinHandle<()>) {
    let (last_poke, mut rx) = watch::channel(Instant::now());
    let watchdog = Watchdog { last_poke };

    let handle = tokio::spawn(async move {
        if !enabled {
            return;
        }

        // Edge-triggered: once we've warned about a stall we don't warn again until a fresh
        // poke arrives, even if the silence continues past another interval.
        let mut warned = false;
        loop {
            match tokio::time::timeout(interval, rx.changed()).await {
                Ok(Ok(())) => warned = false,
                Ok(Err(_)) => break, // sender dropped, coordinator is shutting down
                Err(_) => {
                    if !warned {
                        let silence = rx.borrow().elapsed();
                        tracing::warn!(?silence, "time-tick dispatcher has been silent");
                        warned = true;
                    }
                }
            }
        }
    });

    (watchdog, handle)
}
