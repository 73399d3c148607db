//! FileBackend — JSON snapshot file on local disk.
//!
//! Dumps go to a sibling `*.tmp` file which is then renamed over the target,
//! so a reader sees either the previous snapshot or the new one, never a
//! half-written file.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tally_store::Snapshot;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{PersistError, PersistResult, map_err};

/// Snapshot persistence to a single JSON file.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the whole snapshot, replacing any previous file.
    pub async fn dump(&self, snapshot: &Snapshot) -> PersistResult<()> {
        let data = serde_json::to_vec_pretty(snapshot).map_err(map_err!(Serialize))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.map_err(map_err!(Io))?;
        }

        let tmp = self.temp_path();
        let mut file = tokio::fs::File::create(&tmp).await.map_err(map_err!(Io))?;
        file.write_all(&data).await.map_err(map_err!(Io))?;
        file.sync_all().await.map_err(map_err!(Io))?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(map_err!(Io))?;

        debug!(path = ?self.path, bytes = data.len(), "snapshot file written");
        Ok(())
    }

    /// Read the snapshot back.
    ///
    /// A missing or empty file means nothing was dumped yet and yields
    /// `Ok(None)`. Unparsable content is an error.
    pub async fn restore(&self) -> PersistResult<Option<Snapshot>> {
        let data = match tokio::fs::read(&self.path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = ?self.path, "no snapshot file");
                return Ok(None);
            }
            Err(e) => return Err(PersistError::Io(e.to_string())),
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            debug!(path = ?self.path, "snapshot file is empty");
            return Ok(None);
        }

        let snapshot: Snapshot = serde_json::from_slice(&data).map_err(map_err!(Deserialize))?;
        Ok(Some(snapshot))
    }
}
