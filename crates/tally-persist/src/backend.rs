//! Backend selection and dispatch.

use std::path::PathBuf;

use tally_store::Snapshot;
use tracing::info;

use crate::database::DatabaseBackend;
use crate::error::{PersistError, PersistResult};
use crate::file::FileBackend;

/// Durable paths the operator configured. Empty strings count as unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackendConfig {
    pub file_path: Option<PathBuf>,
    pub database_dsn: Option<String>,
}

/// The single active persistence backend.
#[derive(Debug)]
pub enum Backend {
    /// No durable path configured: dump and restore do nothing.
    Null,
    File(FileBackend),
    Database(DatabaseBackend),
}

impl Backend {
    /// Pick the backend by priority: database, then file, then null.
    pub fn select(config: &BackendConfig) -> PersistResult<Self> {
        let dsn = config.database_dsn.as_deref().filter(|d| !d.trim().is_empty());
        let path = config
            .file_path
            .as_ref()
            .filter(|p| !p.as_os_str().is_empty());

        let backend = match (dsn, path) {
            (Some(dsn), _) => Backend::Database(DatabaseBackend::connect_lazy(dsn)?),
            (None, Some(path)) => Backend::File(FileBackend::new(path)),
            (None, None) => Backend::Null,
        };
        info!(backend = backend.kind(), "persistence backend selected");
        Ok(backend)
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Null => "null",
            Backend::File(_) => "file",
            Backend::Database(_) => "database",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Backend::Null)
    }

    /// Durably write a full snapshot.
    pub async fn dump(&self, snapshot: &Snapshot) -> PersistResult<()> {
        match self {
            Backend::Null => Ok(()),
            Backend::File(file) => file.dump(snapshot).await,
            Backend::Database(db) => db.dump(snapshot).await,
        }
    }

    /// Read the last durable snapshot. `Ok(None)` means nothing was dumped yet.
    pub async fn restore(&self) -> PersistResult<Option<Snapshot>> {
        match self {
            Backend::Null => Ok(None),
            Backend::File(file) => file.restore().await,
            Backend::Database(db) => db.restore().await,
        }
    }

    /// Check database connectivity. Fails with `NotConfigured` when no
    /// database backend is active.
    pub async fn probe(&self) -> PersistResult<()> {
        match self {
            Backend::Database(db) => db.probe().await,
            Backend::Null | Backend::File(_) => Err(PersistError::NotConfigured),
        }
    }
}
