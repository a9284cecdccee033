//! SQLite-backed execution store with connection pooling.
//!
//! WAL mode, foreign keys on, and a small r2d2 pool so the status command can
//! read while an investigation is persisting.

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use super::{ExecutionSummary, ResultStore};
use crate::types::{
    AnalysisArtifact, AttemptOutcome, ExecutionFailure, ExecutionStatus, ProbeError, ReasoningMode,
    Result, ResultExt, RetryAttempt, WorkflowExecution,
};

const SCHEMA: &str = include_str!("schema.sql");
const SCHEMA_VERSION: u32 = 1;

pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    /// Open (and initialize) the store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let manager =
            SqliteConnectionManager::file(path.as_ref()).with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(Duration::from_secs(30))
            .build(manager)
            .map_err(|e| ProbeError::Storage(format!("failed to create connection pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    /// In-memory store for tests. Single connection so every handle sees the
    /// same database.
    pub fn open_in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory().with_init(Self::configure_connection);

        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| ProbeError::Storage(format!("failed to create in-memory pool: {}", e)))?;

        let db = Self { pool };
        db.initialize()?;
        Ok(db)
    }

    fn configure_connection(conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| ProbeError::Storage(format!("failed to acquire connection: {}", e)))
    }

    fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA)
            .with_context("failed to initialize schema")?;
        conn.pragma_update(None, "user_version", SCHEMA_VERSION)
            .with_context("failed to set schema version")?;
        Ok(())
    }
}

impl ResultStore for Database {
    fn persist(&self, execution: &WorkflowExecution) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let failure_json = execution
            .failure
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            "INSERT INTO executions (id, target, status, failure, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 failure = excluded.failure,
                 finished_at = excluded.finished_at",
            params![
                execution.id.to_string(),
                execution.target,
                serde_json::to_string(&execution.status)?,
                failure_json,
                execution.started_at.to_rfc3339(),
                execution.finished_at.map(|t| t.to_rfc3339()),
            ],
        )?;

        // Rewrite child rows so a retried persist cannot duplicate them.
        tx.execute(
            "DELETE FROM artifacts WHERE execution_id = ?1",
            params![execution.id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM attempts WHERE execution_id = ?1",
            params![execution.id.to_string()],
        )?;

        for (position, artifact) in execution.artifacts.iter().enumerate() {
            tx.execute(
                "INSERT INTO artifacts
                     (execution_id, position, stage_id, raw_output, produced_at, source_mode)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    execution.id.to_string(),
                    position as i64,
                    artifact.stage_id,
                    artifact.raw_output,
                    artifact.produced_at.to_rfc3339(),
                    artifact.source_mode.to_string(),
                ],
            )?;
        }

        for (seq, attempt) in execution.attempts.iter().enumerate() {
            tx.execute(
                "INSERT INTO attempts
                     (execution_id, seq, activity, attempt, outcome, elapsed_ms)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    execution.id.to_string(),
                    seq as i64,
                    attempt.activity,
                    attempt.attempt,
                    serde_json::to_string(&attempt.outcome)?,
                    attempt.elapsed.as_millis() as i64,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn fetch(&self, id: &Uuid) -> Result<Option<WorkflowExecution>> {
        let conn = self.conn()?;

        let row = conn
            .query_row(
                "SELECT target, status, failure, started_at, finished_at
                 FROM executions WHERE id = ?1",
                params![id.to_string()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((target, status_json, failure_json, started_at, finished_at)) = row else {
            return Ok(None);
        };

        let status: ExecutionStatus = serde_json::from_str(&status_json)?;
        let failure: Option<ExecutionFailure> =
            failure_json.map(|f| serde_json::from_str(&f)).transpose()?;

        let mut artifacts = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT stage_id, raw_output, produced_at, source_mode
             FROM artifacts WHERE execution_id = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        for row in rows {
            let (stage_id, raw_output, produced_at, source_mode) = row?;
            artifacts.push(AnalysisArtifact {
                stage_id,
                raw_output,
                produced_at: parse_timestamp(&produced_at)?,
                source_mode: parse_mode(&source_mode)?,
            });
        }

        let mut attempts = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT activity, attempt, outcome, elapsed_ms
             FROM attempts WHERE execution_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, u32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;
        for row in rows {
            let (activity, attempt, outcome_json, elapsed_ms) = row?;
            let outcome: AttemptOutcome = serde_json::from_str(&outcome_json)?;
            attempts.push(RetryAttempt {
                activity,
                attempt,
                outcome,
                elapsed: Duration::from_millis(elapsed_ms.max(0) as u64),
            });
        }

        Ok(Some(WorkflowExecution {
            id: *id,
            target,
            status,
            artifacts,
            attempts,
            failure,
            started_at: parse_timestamp(&started_at)?,
            finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
        }))
    }

    fn list_recent(&self, limit: u32) -> Result<Vec<ExecutionSummary>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT e.id, e.target, e.status, e.started_at, e.finished_at,
                    (SELECT COUNT(*) FROM artifacts a WHERE a.execution_id = e.id)
             FROM executions e
             ORDER BY e.started_at DESC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut summaries = Vec::new();
        for row in rows {
            let (id, target, status_json, started_at, finished_at, artifact_count) = row?;
            summaries.push(ExecutionSummary {
                id: Uuid::parse_str(&id)
                    .map_err(|e| ProbeError::Storage(format!("corrupt execution id: {}", e)))?,
                target,
                status: serde_json::from_str(&status_json)?,
                artifact_count: artifact_count.max(0) as usize,
                started_at: parse_timestamp(&started_at)?,
                finished_at: finished_at.as_deref().map(parse_timestamp).transpose()?,
            });
        }
        Ok(summaries)
    }
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&chrono::Utc))
        .map_err(|e| ProbeError::Storage(format!("corrupt timestamp '{}': {}", raw, e)))
}

fn parse_mode(raw: &str) -> Result<ReasoningMode> {
    raw.parse()
        .map_err(|_| ProbeError::Storage(format!("corrupt source_mode '{}'", raw)))
}
