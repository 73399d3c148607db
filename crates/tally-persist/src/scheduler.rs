//! PersistenceScheduler — startup restore and the periodic dump loop.
//!
//! The scheduler owns the only background timer. Ticks are serialized: a
//! dump that overruns the interval delays the next tick rather than running
//! alongside it. When shutdown is signalled the loop flushes once more
//! before returning.

use std::sync::Arc;
use std::time::Duration;

use tally_store::MetricStore;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::error::PersistResult;

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Dump period. Zero disables periodic dumps.
    pub interval: Duration,
    /// Load the backend's snapshot at startup.
    pub restore: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            restore: true,
        }
    }
}

/// Drives restore and periodic dumps against one backend.
pub struct PersistenceScheduler {
    backend: Arc<Backend>,
    config: SchedulerConfig,
}

impl PersistenceScheduler {
    pub fn new(backend: Arc<Backend>, config: SchedulerConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    /// Startup phase. Returns whether a snapshot was loaded.
    ///
    /// Never fails: a backend error is logged and the store keeps its
    /// current (empty) contents.
    pub async fn restore(&self, store: &MetricStore) -> bool {
        if !self.config.restore {
            debug!("restore disabled");
            return false;
        }

        match self.backend.restore().await {
            Ok(Some(snapshot)) => {
                info!(
                    backend = self.backend.kind(),
                    counters = snapshot.counters().len(),
                    gauges = snapshot.gauges().len(),
                    "metrics restored"
                );
                store.load_snapshot(snapshot);
                true
            }
            Ok(None) => {
                info!(backend = self.backend.kind(), "nothing to restore");
                false
            }
            Err(e) => {
                warn!(
                    backend = self.backend.kind(),
                    error = %e,
                    "restore failed, starting with an empty store"
                );
                false
            }
        }
    }

    /// One tick: copy the store, then write the copy.
    ///
    /// The store lock is released before any backend I/O starts.
    pub async fn dump_once(&self, store: &MetricStore) -> PersistResult<()> {
        let snapshot = store.snapshot();
        self.backend.dump(&snapshot).await?;
        debug!(
            backend = self.backend.kind(),
            entries = snapshot.len(),
            "metrics dumped"
        );
        Ok(())
    }

    /// Steady-state loop. Returns after the shutdown signal and a final flush.
    pub async fn run(&self, store: MetricStore, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = self.ticker();
        info!(
            backend = self.backend.kind(),
            interval_secs = self.config.interval.as_secs(),
            periodic = ticker.is_some(),
            "persistence scheduler started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = next_tick(&mut ticker) => {
                    if let Err(e) = self.dump_once(&store).await {
                        error!(backend = self.backend.kind(), error = %e, "metrics dump failed");
                    }
                }
                changed = shutdown.changed() => {
                    // A dropped sender means nobody can signal anymore.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!("persistence scheduler shutting down");
        if !self.backend.is_null() {
            if let Err(e) = self.dump_once(&store).await {
                error!(backend = self.backend.kind(), error = %e, "final metrics dump failed");
            }
        }
    }

    fn ticker(&self) -> Option<Interval> {
        if self.config.interval.is_zero() {
            return None;
        }
        let period = self.config.interval;
        // First tick one period after start, not immediately.
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Some(ticker)
    }
}

/// Wait for the next tick, or forever when periodic dumps are disabled.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
