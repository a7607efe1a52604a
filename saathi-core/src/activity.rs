//! Activity audit log.
//!
//! Every generation (live or demo) leaves one row in `activities`. Rows are
//! append-only from the pipeline's point of view. The HTTP layer talks to the
//! log through [`ActivitySink`] so handlers can be exercised without Postgres.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::VecDeque;
use std::sync::Mutex;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub id: Uuid,
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub activity_type: String,
    pub title: String,
    pub description: String,
    pub agent_type: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for [`ActivitySink::record`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub title: String,
    pub description: String,
    pub agent_type: String,
}

#[derive(Error, Debug)]
pub enum ActivityError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Activity log unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn record(&self, activity: NewActivity) -> Result<ActivityRecord, ActivityError>;

    /// Most recent records first.
    async fn recent(&self, limit: u32) -> Result<Vec<ActivityRecord>, ActivityError>;

    /// Backend version string, used by `/health`.
    async fn health(&self) -> Result<String, ActivityError>;
}

/// Write an activity row, swallowing any failure.
///
/// The generated content has already been produced at this point; a broken
/// audit log must not turn a successful generation into an error response.
pub async fn record_best_effort(sink: &dyn ActivitySink, activity: NewActivity) -> Option<ActivityRecord> {
    let agent_type = activity.agent_type.clone();
    match sink.record(activity).await {
        Ok(record) => {
            tracing::debug!(id = %record.id, agent = %agent_type, "Activity recorded");
            Some(record)
        }
        Err(e) => {
            tracing::warn!(agent = %agent_type, error = %e, "Failed to record activity");
            None
        }
    }
}

// ============================================================================
// Postgres implementation
// ============================================================================

#[derive(Clone)]
pub struct PgActivityLog {
    pool: PgPool,
}

impl PgActivityLog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivitySink for PgActivityLog {
    async fn record(&self, activity: NewActivity) -> Result<ActivityRecord, ActivityError> {
        let record: ActivityRecord = sqlx::query_as(
            r#"
            INSERT INTO activities (type, title, description, agent_type)
            VALUES ($1, $2, $3, $4)
            RETURNING id, type, title, description, agent_type, created_at
            "#,
        )
        .bind(&activity.activity_type)
        .bind(&activity.title)
        .bind(&activity.description)
        .bind(&activity.agent_type)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ActivityRecord>, ActivityError> {
        let rows: Vec<ActivityRecord> = sqlx::query_as(
            "SELECT id, type, title, description, agent_type, created_at
             FROM activities ORDER BY created_at DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn health(&self) -> Result<String, ActivityError> {
        Ok(crate::db::health_check(&self.pool).await?)
    }
}

// ============================================================================
// In-memory implementation
// ============================================================================

/// Records kept by [`MemoryActivityLog`]; the oldest is evicted first.
pub const MEMORY_LOG_CAPACITY: usize = 500;

/// Process-local log for running without Postgres. Records are lost on restart.
pub struct MemoryActivityLog {
    records: Mutex<VecDeque<ActivityRecord>>,
}

impl Default for MemoryActivityLog {
    fn default() -> Self {
        Self {
            records: Mutex::new(VecDeque::with_capacity(MEMORY_LOG_CAPACITY)),
        }
    }
}

impl MemoryActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ActivitySink for MemoryActivityLog {
    async fn record(&self, activity: NewActivity) -> Result<ActivityRecord, ActivityError> {
        let record = ActivityRecord {
            id: Uuid::new_v4(),
            activity_type: activity.activity_type,
            title: activity.title,
            description: activity.description,
            agent_type: activity.agent_type,
            created_at: Utc::now(),
        };
        let mut records = self
            .records
            .lock()
            .map_err(|_| ActivityError::Unavailable("activity buffer poisoned".to_string()))?;
        if records.len() == MEMORY_LOG_CAPACITY {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(record)
    }

    async fn recent(&self, limit: u32) -> Result<Vec<ActivityRecord>, ActivityError> {
        let records = self
            .records
            .lock()
            .map_err(|_| ActivityError::Unavailable("activity buffer poisoned".to_string()))?;
        Ok(records.iter().rev().take(limit as usize).cloned().collect())
    }

    async fn health(&self) -> Result<String, ActivityError> {
        Ok("in-memory".to_string())
    }
}
