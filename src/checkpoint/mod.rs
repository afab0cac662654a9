//! Checkpoint persistence layer
//!
//! One record per transition, keyed by session id. `get` after a successful
//! `put` returns the most recently written record for that id.

use crate::error::OrchestrationError;
use crate::models::{CheckpointRecord, SessionState};
use crate::Result;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};

/// Trait for checkpoint persistence
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn put(&self, record: CheckpointRecord) -> Result<()>;
    async fn get(&self, session_id: &str) -> Result<Option<CheckpointRecord>>;
    async fn delete(&self, session_id: &str) -> Result<()>;
}

/// Capture a snapshot of the session at the current transition.
pub fn snapshot(state: &SessionState) -> CheckpointRecord {
    CheckpointRecord {
        session_id: state.session_id.clone(),
        machine_state: state.machine_state,
        iteration_count: state.iteration_count,
        state_hash: compute_state_hash(state),
        state: state.clone(),
        timestamp: Utc::now(),
    }
}

/// Whether a record's snapshot still matches its recorded hash.
pub fn verify_integrity(record: &CheckpointRecord) -> bool {
    compute_state_hash(&record.state) == record.state_hash
}

/// Compute SHA256 hash of a session snapshot
/// Uses zero-copy streaming serialization into hasher
pub fn compute_state_hash(state: &SessionState) -> String {
    let mut hasher = Sha256::new();

    // Stream JSON directly into hasher (no intermediate String)
    if serde_json::to_writer(&mut HashWriter(&mut hasher), state).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

//
// ================= In-memory store =================
//

/// In-memory checkpoint store for development and tests
pub struct InMemoryCheckpointStore {
    records: Arc<RwLock<HashMap<String, CheckpointRecord>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryCheckpointStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn put(&self, record: CheckpointRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records.insert(record.session_id.clone(), record);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        let records = self.records.read().await;
        Ok(records.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut records = self.records.write().await;
        records.remove(session_id);
        Ok(())
    }
}

//
// ================= Postgres store =================
//

/// Durable checkpoint store backed by Postgres
pub struct PostgresCheckpointStore {
    pool: PgPool,
    schema_ready: Arc<OnceCell<()>>,
}

impl PostgresCheckpointStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema_ready: Arc::new(OnceCell::new()),
        }
    }

    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| {
                OrchestrationError::CheckpointError(format!("Connection failed: {}", e))
            })?;

        Ok(Self::new(pool))
    }

    async fn ensure_schema(&self) -> Result<()> {
        self.schema_ready
            .get_or_try_init(|| async {
                sqlx::query(
                    r#"
                    CREATE TABLE IF NOT EXISTS session_checkpoints (
                      session_id TEXT PRIMARY KEY,
                      machine_state TEXT NOT NULL,
                      state TEXT NOT NULL,
                      iteration_count INTEGER NOT NULL,
                      state_hash TEXT NOT NULL,
                      updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                    );
                    "#,
                )
                .execute(&self.pool)
                .await?;

                Ok::<(), sqlx::Error>(())
            })
            .await
            .map_err(|e| OrchestrationError::CheckpointError(format!("Schema bootstrap: {}", e)))?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl CheckpointStore for PostgresCheckpointStore {
    async fn put(&self, record: CheckpointRecord) -> Result<()> {
        self.ensure_schema().await?;

        let state = serde_json::to_string(&record.state)?;

        sqlx::query(
            r#"
            INSERT INTO session_checkpoints
              (session_id, machine_state, state, iteration_count, state_hash, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (session_id) DO UPDATE SET
              machine_state = EXCLUDED.machine_state,
              state = EXCLUDED.state,
              iteration_count = EXCLUDED.iteration_count,
              state_hash = EXCLUDED.state_hash,
              updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.session_id)
        .bind(record.machine_state.to_string())
        .bind(state)
        .bind(record.iteration_count as i32)
        .bind(&record.state_hash)
        .bind(record.timestamp)
        .execute(&self.pool)
        .await
        .map_err(|e| OrchestrationError::CheckpointError(format!("Write failed: {}", e)))?;

        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        self.ensure_schema().await?;

        let row = sqlx::query(
            r#"
            SELECT state, state_hash, updated_at
            FROM session_checkpoints
            WHERE session_id = $1
            "#,
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| OrchestrationError::CheckpointError(format!("Read failed: {}", e)))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row
            .try_get("state")
            .map_err(|e| OrchestrationError::CheckpointError(format!("Read failed: {}", e)))?;
        let state_hash: String = row
            .try_get("state_hash")
            .map_err(|e| OrchestrationError::CheckpointError(format!("Read failed: {}", e)))?;
        let timestamp: DateTime<Utc> = row
            .try_get("updated_at")
            .map_err(|e| OrchestrationError::CheckpointError(format!("Read failed: {}", e)))?;

        let state: SessionState = serde_json::from_str(&raw)?;

        Ok(Some(CheckpointRecord {
            session_id: state.session_id.clone(),
            machine_state: state.machine_state,
            iteration_count: state.iteration_count,
            state_hash,
            state,
            timestamp,
        }))
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query("DELETE FROM session_checkpoints WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| OrchestrationError::CheckpointError(format!("Delete failed: {}", e)))?;

        Ok(())
    }
}
