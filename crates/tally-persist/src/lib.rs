//! tally-persist — durable snapshots for the tally metric store.
//!
//! A [`Backend`] writes and reads a full [`tally_store::Snapshot`]. Exactly
//! one backend is active per process, chosen once at startup by
//! [`Backend::select`]:
//!
//! 1. a database DSN selects the Postgres [`DatabaseBackend`];
//! 2. otherwise a file path selects the JSON [`FileBackend`];
//! 3. otherwise the no-op `Backend::Null` is used.
//!
//! # Architecture
//!
//! ```text
//! PersistenceScheduler
//!   ├── restore()   → one-shot, before the API accepts traffic
//!   ├── dump_once() → store.snapshot() then backend.dump(), lock-free I/O
//!   └── run()       → periodic dump loop + final flush on shutdown
//! ```
//!
//! Backend failures never propagate past the scheduler: a failed dump skips
//! the tick, a failed restore starts the store empty.

pub mod backend;
pub mod database;
pub mod error;
pub mod file;
pub mod scheduler;

pub use backend::{Backend, BackendConfig};
pub use database::DatabaseBackend;
pub use error::{PersistError, PersistResult};
pub use file::FileBackend;
pub use scheduler::{PersistenceScheduler, SchedulerConfig};
