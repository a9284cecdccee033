//! Result Storage
//!
//! Durable store for finished executions plus the markdown report writer.
//! Persistence happens once per execution, after aggregation; a retried
//! persist rewrites the same rows.

pub mod database;
pub mod report;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{ExecutionStatus, Result, WorkflowExecution};

pub use database::Database;

/// Row-level view of an execution for listings.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    pub id: Uuid,
    pub target: String,
    pub status: ExecutionStatus,
    pub artifact_count: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Durable execution store.
pub trait ResultStore: Send + Sync {
    /// Write the execution, its artifacts, and its attempt log. Idempotent:
    /// persisting the same execution twice leaves one copy.
    fn persist(&self, execution: &WorkflowExecution) -> Result<()>;

    /// Load a full execution by id.
    fn fetch(&self, id: &Uuid) -> Result<Option<WorkflowExecution>>;

    /// Most recent executions, newest first.
    fn list_recent(&self, limit: u32) -> Result<Vec<ExecutionSummary>>;
}
