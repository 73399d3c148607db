//! tally-store — the in-memory metric store for the tally server.
//!
//! Holds every known counter and gauge behind a single lock and hands out
//! independent [`Snapshot`] copies for listing and persistence.
//!
//! # Architecture
//!
//! ```text
//! MetricStore (Clone, Arc<RwLock<Maps>>)
//!   ├── update_counter() / update_gauge()  ← API layer, per request
//!   ├── apply_batch()                      ← API layer, /updates/
//!   ├── get_counter() / get_gauge()        ← API layer, value queries
//!   ├── snapshot()                         → persistence scheduler, listings
//!   └── load_snapshot()                    ← startup restore
//! ```
//!
//! Counters and gauges live in independent namespaces: a counter and a gauge
//! may share a name.

pub mod error;
pub mod store;
pub mod types;

pub use error::{ParseKindError, RejectReason};
pub use store::{BatchOutcome, MetricStore, Rejected};
pub use types::*;
