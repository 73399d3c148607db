//! DatabaseBackend — Postgres tables, one per metric type.
//!
//! ```text
//! counter_metrics(name TEXT PRIMARY KEY, value BIGINT NOT NULL)
//! gauge_metrics  (name TEXT PRIMARY KEY, value DOUBLE PRECISION NOT NULL)
//! ```
//!
//! A dump truncates both tables and re-inserts every row inside one
//! transaction. Rows go in through bound `UNNEST` arrays; names and values
//! never end up in SQL text.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tally_store::Snapshot;
use tracing::debug;

use crate::error::{PersistResult, map_err};

const CREATE_COUNTERS: &str = "CREATE TABLE IF NOT EXISTS counter_metrics (\
     name TEXT PRIMARY KEY, value BIGINT NOT NULL)";
const CREATE_GAUGES: &str = "CREATE TABLE IF NOT EXISTS gauge_metrics (\
     name TEXT PRIMARY KEY, value DOUBLE PRECISION NOT NULL)";

const INSERT_COUNTERS: &str = "INSERT INTO counter_metrics (name, value) \
     SELECT * FROM UNNEST($1::text[], $2::bigint[])";
const INSERT_GAUGES: &str = "INSERT INTO gauge_metrics (name, value) \
     SELECT * FROM UNNEST($1::text[], $2::float8[])";

/// Snapshot persistence to Postgres.
#[derive(Debug)]
pub struct DatabaseBackend {
    pool: PgPool,
    schema_ready: AtomicBool,
}

impl DatabaseBackend {
    /// Build a lazily connecting pool.
    ///
    /// Only a malformed DSN fails here; an unreachable server surfaces on
    /// the first restore, dump, or probe.
    pub fn connect_lazy(dsn: &str) -> PersistResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .acquire_timeout(Duration::from_secs(5))
            .connect_lazy(dsn)
            .map_err(map_err!(Database))?;
        Ok(Self {
            pool,
            schema_ready: AtomicBool::new(false),
        })
    }

    /// Create both tables if they don't exist yet.
    async fn ensure_schema(&self) -> PersistResult<()> {
        if self.schema_ready.load(Ordering::Acquire) {
            return Ok(());
        }
        sqlx::query(CREATE_COUNTERS)
            .execute(&self.pool)
            .await
            .map_err(map_err!(Database))?;
        sqlx::query(CREATE_GAUGES)
            .execute(&self.pool)
            .await
            .map_err(map_err!(Database))?;
        self.schema_ready.store(true, Ordering::Release);
        debug!("metric tables ensured");
        Ok(())
    }

    /// Replace both tables with the snapshot contents.
    pub async fn dump(&self, snapshot: &Snapshot) -> PersistResult<()> {
        self.ensure_schema().await?;

        let (counter_names, counter_values): (Vec<String>, Vec<i64>) = snapshot
            .counters()
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .unzip();
        let (gauge_names, gauge_values): (Vec<String>, Vec<f64>) = snapshot
            .gauges()
            .iter()
            .map(|(name, value)| (name.clone(), *value))
            .unzip();

        let mut tx = self.pool.begin().await.map_err(map_err!(Database))?;

        sqlx::query("TRUNCATE counter_metrics, gauge_metrics")
            .execute(&mut *tx)
            .await
            .map_err(map_err!(Database))?;

        if !counter_names.is_empty() {
            sqlx::query(INSERT_COUNTERS)
                .bind(counter_names)
                .bind(counter_values)
                .execute(&mut *tx)
                .await
                .map_err(map_err!(Database))?;
        }
        if !gauge_names.is_empty() {
            sqlx::query(INSERT_GAUGES)
                .bind(gauge_names)
                .bind(gauge_values)
                .execute(&mut *tx)
                .await
                .map_err(map_err!(Database))?;
        }

        tx.commit().await.map_err(map_err!(Database))?;
        debug!(
            counters = snapshot.counters().len(),
            gauges = snapshot.gauges().len(),
            "snapshot written to database"
        );
        Ok(())
    }

    /// Read both tables. Empty tables mean nothing was dumped yet.
    pub async fn restore(&self) -> PersistResult<Option<Snapshot>> {
        self.ensure_schema().await?;

        let counters: Vec<(String, i64)> =
            sqlx::query_as("SELECT name, value FROM counter_metrics")
                .fetch_all(&self.pool)
                .await
                .map_err(map_err!(Database))?;
        let gauges: Vec<(String, f64)> = sqlx::query_as("SELECT name, value FROM gauge_metrics")
            .fetch_all(&self.pool)
            .await
            .map_err(map_err!(Database))?;

        if counters.is_empty() && gauges.is_empty() {
            return Ok(None);
        }
        Ok(Some(Snapshot::new(
            counters.into_iter().collect(),
            gauges.into_iter().collect(),
        )))
    }

    /// Round-trip a trivial query to check connectivity.
    pub async fn probe(&self) -> PersistResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_err!(Database))?;
        Ok(())
    }
}
