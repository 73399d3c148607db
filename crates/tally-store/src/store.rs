//! MetricStore — the lock-protected home of all counters and gauges.
//!
//! Every operation is a plain map access under a single `RwLock`. Nothing in
//! here performs I/O, so critical sections stay at map-access length and
//! persistence always works on a [`Snapshot`] copy taken outside the lock.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::debug;

use crate::error::RejectReason;
use crate::types::*;

#[derive(Debug, Default)]
struct Maps {
    counters: HashMap<MetricName, i64>,
    gauges: HashMap<MetricName, f64>,
}

/// Thread-safe metric store.
///
/// `Clone` hands out another handle to the same maps, so one store can be
/// shared between the API layer and the persistence scheduler.
#[derive(Debug, Clone, Default)]
pub struct MetricStore {
    inner: Arc<RwLock<Maps>>,
}

/// A batch entry that was not applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejected {
    /// Position of the entry in the submitted batch.
    pub index: usize,
    pub id: MetricName,
    pub reason: RejectReason,
}

/// Result of [`MetricStore::apply_batch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub applied: usize,
    pub rejected: Vec<Rejected>,
}

impl MetricStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // A writer can only panic between map operations, never halfway through
    // one, so a poisoned lock still guards consistent maps.
    fn read(&self) -> RwLockReadGuard<'_, Maps> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Maps> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Updates ────────────────────────────────────────────────────

    /// Add `delta` to the named counter, creating it at zero first.
    ///
    /// Negative deltas are accepted. Overflow wraps. Returns the new total,
    /// read under the same write lock as the update.
    pub fn update_counter(&self, name: &str, delta: i64) -> i64 {
        let mut maps = self.write();
        match maps.counters.get_mut(name) {
            Some(current) => {
                *current = current.wrapping_add(delta);
                *current
            }
            None => {
                maps.counters.insert(name.to_string(), delta);
                delta
            }
        }
    }

    /// Overwrite the named gauge. Non-finite values are stored as given.
    pub fn update_gauge(&self, name: &str, value: f64) -> f64 {
        let mut maps = self.write();
        match maps.gauges.get_mut(name) {
            Some(current) => *current = value,
            None => {
                maps.gauges.insert(name.to_string(), value);
            }
        }
        value
    }

    /// Apply one typed update and return the entry as stored.
    pub fn apply(&self, update: &MetricUpdate) -> Metric {
        match update {
            MetricUpdate::Counter { name, delta } => {
                Metric::counter(name.clone(), self.update_counter(name, *delta))
            }
            MetricUpdate::Gauge { name, value } => {
                Metric::gauge(name.clone(), self.update_gauge(name, *value))
            }
        }
    }

    /// Apply a batch of structured entries.
    ///
    /// Each entry takes the lock on its own, so readers may observe a
    /// partially applied batch. Invalid entries are skipped and reported;
    /// they never abort the rest of the batch.
    pub fn apply_batch(&self, entries: &[Metric]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for (index, entry) in entries.iter().enumerate() {
            match entry.to_update() {
                Ok(update) => {
                    self.apply(&update);
                    outcome.applied += 1;
                }
                Err(reason) => outcome.rejected.push(Rejected {
                    index,
                    id: entry.id.clone(),
                    reason,
                }),
            }
        }
        debug!(
            applied = outcome.applied,
            rejected = outcome.rejected.len(),
            "batch applied"
        );
        outcome
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// Current counter value, or `None` if the name was never updated.
    pub fn get_counter(&self, name: &str) -> Option<i64> {
        self.read().counters.get(name).copied()
    }

    /// Current gauge value, or `None` if the name was never updated.
    pub fn get_gauge(&self, name: &str) -> Option<f64> {
        self.read().gauges.get(name).copied()
    }

    /// Number of entries across both namespaces.
    pub fn len(&self) -> usize {
        let maps = self.read();
        maps.counters.len() + maps.gauges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ── Snapshots ──────────────────────────────────────────────────

    /// Copy every entry into an independent [`Snapshot`].
    ///
    /// The read lock is held only for the copy.
    pub fn snapshot(&self) -> Snapshot {
        let maps = self.read();
        let counters = maps
            .counters
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        let gauges = maps.gauges.iter().map(|(k, v)| (k.clone(), *v)).collect();
        drop(maps);
        Snapshot::new(counters, gauges)
    }

    /// Replace the entire contents of the store.
    ///
    /// Meant for the startup restore, before the API accepts traffic.
    pub fn load_snapshot(&self, snapshot: Snapshot) {
        let (counters, gauges) = snapshot.into_parts();
        let loaded = Maps {
            counters: counters.into_iter().collect(),
            gauges: gauges.into_iter().collect(),
        };
        let (n_counters, n_gauges) = (loaded.counters.len(), loaded.gauges.len());
        *self.write() = loaded;
        debug!(counters = n_counters, gauges = n_gauges, "store contents replaced");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_accumulates_deltas() {
        let store = MetricStore::new();
        for _ in 0..3 {
            store.update_counter("PollCount", 1);
        }
        assert_eq!(store.get_counter("PollCount"), Some(3));
    }

    #[test]
    fn counter_sums_mixed_deltas() {
        let store = MetricStore::new();
        let deltas = [5, -2, 10, 0, -20, 7];
        for d in deltas {
            store.update_counter("c", d);
        }
        assert_eq!(store.get_counter("c"), Some(deltas.iter().sum()));
    }

    #[test]
    fn counter_is_not_idempotent() {
        let store = MetricStore::new();
        store.update_counter("c", 4);
        let once = store.get_counter("c").unwrap();
        store.update_counter("c", 4);
        assert_eq!(store.get_counter("c"), Some(once * 2));
    }

    #[test]
    fn counter_overflow_wraps() {
        let store = MetricStore::new();
        store.update_counter("c", i64::MAX);
        store.update_counter("c", 1);
        assert_eq!(store.get_counter("c"), Some(i64::MIN));
    }

    #[test]
    fn updates_return_stored_value() {
        let store = MetricStore::new();
        assert_eq!(store.update_counter("c", 4), 4);
        assert_eq!(store.update_counter("c", -1), 3);
        assert_eq!(store.update_gauge("g", 2.5), 2.5);

        let stored = store.apply(&MetricUpdate::Counter {
            name: "c".into(),
            delta: 10,
        });
        assert_eq!(stored, Metric::counter("c", 13));
        let stored = store.apply(&MetricUpdate::Gauge {
            name: "g".into(),
            value: 7.0,
        });
        assert_eq!(stored, Metric::gauge("g", 7.0));
    }

    #[test]
    fn concurrent_applies_return_distinct_totals() {
        // Every caller sees the total its own update produced, so the
        // returned totals are exactly 1..=N with no repeats.
        const THREADS: usize = 8;
        const PER_THREAD: usize = 500;

        let store = MetricStore::new();
        let mut totals: Vec<i64> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..THREADS)
                .map(|_| {
                    let store = store.clone();
                    s.spawn(move || {
                        (0..PER_THREAD)
                            .map(|_| store.update_counter("hits", 1))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        totals.sort_unstable();
        let expected: Vec<i64> = (1..=(THREADS * PER_THREAD) as i64).collect();
        assert_eq!(totals, expected);
    }

    #[test]
    fn gauge_last_write_wins() {
        let store = MetricStore::new();
        store.update_gauge("Alloc", 100.5);
        store.update_gauge("Alloc", 250.25);
        assert_eq!(store.get_gauge("Alloc"), Some(250.25));
    }

    #[test]
    fn gauge_is_idempotent() {
        let store = MetricStore::new();
        store.update_gauge("g", 3.5);
        store.update_gauge("g", 3.5);
        assert_eq!(store.get_gauge("g"), Some(3.5));
    }

    #[test]
    fn gauge_accepts_non_finite() {
        let store = MetricStore::new();
        store.update_gauge("nan", f64::NAN);
        store.update_gauge("inf", f64::INFINITY);
        assert!(store.get_gauge("nan").unwrap().is_nan());
        assert_eq!(store.get_gauge("inf"), Some(f64::INFINITY));
    }

    #[test]
    fn missing_names_are_absent() {
        let store = MetricStore::new();
        assert_eq!(store.get_counter("nope"), None);
        assert_eq!(store.get_gauge("nope"), None);
        assert!(store.is_empty());
    }

    #[test]
    fn namespaces_are_independent() {
        let store = MetricStore::new();
        store.update_counter("shared", 2);
        store.update_gauge("shared", 9.75);
        assert_eq!(store.get_counter("shared"), Some(2));
        assert_eq!(store.get_gauge("shared"), Some(9.75));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn batch_rejects_bad_entries_individually() {
        let store = MetricStore::new();
        let batch = vec![
            Metric::counter("X", 5),
            Metric::gauge("Y", 1.0),
            Metric {
                id: "Z".into(),
                mtype: "bogus".into(),
                delta: Some(1),
                value: None,
            },
        ];

        let outcome = store.apply_batch(&batch);

        assert_eq!(store.get_counter("X"), Some(5));
        assert_eq!(store.get_gauge("Y"), Some(1.0));
        assert_eq!(store.get_counter("Z"), None);
        assert_eq!(outcome.applied, 2);
        assert_eq!(
            outcome.rejected,
            vec![Rejected {
                index: 2,
                id: "Z".into(),
                reason: RejectReason::UnknownType("bogus".into()),
            }]
        );
    }

    #[test]
    fn batch_applies_entries_in_order() {
        let store = MetricStore::new();
        let batch = vec![
            Metric::gauge("g", 1.0),
            Metric::counter("c", 1),
            Metric::gauge("g", 2.0),
            Metric::counter("c", 1),
        ];
        let outcome = store.apply_batch(&batch);
        assert_eq!(outcome.applied, 4);
        assert!(outcome.rejected.is_empty());
        assert_eq!(store.get_gauge("g"), Some(2.0));
        assert_eq!(store.get_counter("c"), Some(2));
    }

    #[test]
    fn snapshot_is_independent_of_later_updates() {
        let store = MetricStore::new();
        store.update_counter("c", 1);
        store.update_gauge("g", 1.0);

        let snap = store.snapshot();
        store.update_counter("c", 1);
        store.update_gauge("g", 2.0);
        store.update_counter("new", 1);

        assert_eq!(snap.counter("c"), Some(1));
        assert_eq!(snap.gauge("g"), Some(1.0));
        assert_eq!(snap.counter("new"), None);
        assert_eq!(snap.len(), 2);
    }

    #[test]
    fn load_snapshot_replaces_contents() {
        let store = MetricStore::new();
        store.update_counter("old", 10);

        let source = MetricStore::new();
        source.update_counter("c", 42);
        source.update_gauge("g", 0.5);

        store.load_snapshot(source.snapshot());

        assert_eq!(store.get_counter("old"), None);
        assert_eq!(store.get_counter("c"), Some(42));
        assert_eq!(store.get_gauge("g"), Some(0.5));
        assert_eq!(store.snapshot(), source.snapshot());
    }

    #[test]
    fn clones_share_state() {
        let store = MetricStore::new();
        let handle = store.clone();
        handle.update_counter("c", 3);
        assert_eq!(store.get_counter("c"), Some(3));
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 1_000;

        let store = MetricStore::new();
        std::thread::scope(|s| {
            for _ in 0..THREADS {
                let store = store.clone();
                s.spawn(move || {
                    for _ in 0..PER_THREAD {
                        store.update_counter("hits", 1);
                    }
                });
            }
        });

        assert_eq!(store.get_counter("hits"), Some((THREADS * PER_THREAD) as i64));
    }

    #[test]
    fn snapshots_never_see_torn_batches_of_one() {
        // Each update is fully present or absent in any snapshot: the counter
        // seen by a concurrent snapshot is always a whole number of +2 steps.
        let store = MetricStore::new();
        std::thread::scope(|s| {
            let writer = store.clone();
            s.spawn(move || {
                for _ in 0..2_000 {
                    writer.update_counter("even", 2);
                }
            });
            let reader = store.clone();
            s.spawn(move || {
                for _ in 0..200 {
                    let v = reader.snapshot().counter("even").unwrap_or(0);
                    assert_eq!(v % 2, 0);
                }
            });
        });
        assert_eq!(store.get_counter("even"), Some(4_000));
    }
}
