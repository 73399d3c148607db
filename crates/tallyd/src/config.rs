//! Command-line and environment configuration.
//!
//! Every flag can also be supplied through its environment variable. An
//! explicit flag beats the environment, which beats the default.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Parser};
use tally_persist::{BackendConfig, SchedulerConfig};

#[derive(Debug, Parser)]
#[command(name = "tallyd", about = "Tally metrics server", version)]
pub struct Config {
    /// Address and port to listen on.
    #[arg(short = 'a', long, env = "ADDRESS", default_value = "localhost:8080")]
    pub address: String,

    /// Snapshot interval in seconds. 0 disables periodic dumps.
    #[arg(short = 'i', long, env = "STORE_INTERVAL", default_value_t = 300)]
    pub store_interval: u64,

    /// Snapshot file path. An empty value disables the file backend.
    #[arg(
        short = 'f',
        long,
        env = "FILE_STORAGE_PATH",
        default_value = "/tmp/metrics-db.json"
    )]
    pub file_storage_path: String,

    /// Load the last snapshot at startup.
    #[arg(short = 'r', long, env = "RESTORE", default_value_t = true, action = ArgAction::Set)]
    pub restore: bool,

    /// Postgres connection string. Takes precedence over the file backend.
    #[arg(short = 'd', long, env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,
}

impl Config {
    pub fn backend_config(&self) -> BackendConfig {
        BackendConfig {
            file_path: Some(PathBuf::from(&self.file_storage_path))
                .filter(|p| !p.as_os_str().is_empty()),
            database_dsn: self.database_dsn.clone().filter(|d| !d.is_empty()),
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.store_interval),
            restore: self.restore,
        }
    }
}
