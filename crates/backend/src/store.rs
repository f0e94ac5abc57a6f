//! Prediction history storage
//!
//! Each successful prediction is appended to a single `predictions` table.
//! The table is append-only: rows are never updated or deleted.
//!
//! `SqlitePredictionStore` opens a fresh connection for every operation on a
//! blocking worker thread. The connection is owned by that closure and is
//! closed when it returns, whether the operation succeeded or failed.

use crate::features::FeatureRecord;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Busy timeout applied to every connection
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CREATE_PREDICTIONS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS predictions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    input_data TEXT NOT NULL,
    prediction REAL NOT NULL
);
";

/// Errors raised by the prediction store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot open database {}: {source}", path.display())]
    Connection {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("cannot encode input data: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("storage task failed: {0}")]
    Task(String),
}

/// One persisted (input, prediction) pair
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredPrediction {
    /// Identity assigned by the store, increasing with insertion order
    pub id: i64,
    /// JSON object holding the eight input columns
    pub input_data: String,
    pub prediction: f64,
}

impl StoredPrediction {
    /// Decodes the stored input payload back into a feature record
    pub fn record(&self) -> Result<FeatureRecord, serde_json::Error> {
        serde_json::from_str(&self.input_data)
    }
}

/// Append-only store of predictions
#[async_trait]
pub trait PredictionRepository: Send + Sync {
    /// Creates the backing table if it does not exist yet
    ///
    /// Safe to call on every startup; existing rows are left untouched.
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Appends one prediction and returns it with its assigned identity
    async fn append(
        &self,
        record: &FeatureRecord,
        prediction: f64,
    ) -> Result<StoredPrediction, StoreError>;

    /// Every stored prediction, ordered by identity
    async fn list_all(&self) -> Result<Vec<StoredPrediction>, StoreError>;
}

/// SQLite-backed prediction store
#[derive(Debug, Clone)]
pub struct SqlitePredictionStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqlitePredictionStore {
    /// Creates a store for the database file at `path`
    ///
    /// No connection is opened until the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Overrides how long a connection waits on a locked database
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Runs `op` on a fresh connection on the blocking thread pool
    async fn with_connection<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;

        tokio::task::spawn_blocking(move || {
            let conn = Connection::open(&path).map_err(|source| StoreError::Connection {
                path: path.clone(),
                source,
            })?;
            conn.busy_timeout(busy_timeout)?;
            op(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl PredictionRepository for SqlitePredictionStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.with_connection(|conn| {
            conn.execute_batch(CREATE_PREDICTIONS_TABLE)?;
            Ok(())
        })
        .await?;

        info!(path = %self.path.display(), "Table 'predictions' created or already exists");
        Ok(())
    }

    async fn append(
        &self,
        record: &FeatureRecord,
        prediction: f64,
    ) -> Result<StoredPrediction, StoreError> {
        let input_data = record.to_json()?;

        let stored = self
            .with_connection(move |conn| {
                conn.execute(
                    "INSERT INTO predictions (input_data, prediction) VALUES (?1, ?2)",
                    params![input_data, prediction],
                )?;
                Ok(StoredPrediction {
                    id: conn.last_insert_rowid(),
                    input_data,
                    prediction,
                })
            })
            .await?;

        debug!(id = stored.id, prediction, "Prediction stored");
        Ok(stored)
    }

    async fn list_all(&self) -> Result<Vec<StoredPrediction>, StoreError> {
        let rows = self
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, input_data, prediction FROM predictions ORDER BY id ASC",
                )?;
                let rows = stmt
                    .query_map([], |row| {
                        Ok(StoredPrediction {
                            id: row.get(0)?,
                            input_data: row.get(1)?,
                            prediction: row.get(2)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            })
            .await?;

        debug!(count = rows.len(), "Fetched predictions");
        Ok(rows)
    }
}
