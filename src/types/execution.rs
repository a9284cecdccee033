//! Workflow Execution State
//!
//! One `WorkflowExecution` per accepted request. The orchestrator is the only
//! writer; everything else sees immutable snapshots. Artifacts keep their
//! insertion order, which is exactly the stage execution order.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ReasoningMode;

// =============================================================================
// Status State Machine
// =============================================================================

/// Execution states, driven exclusively by classified activity outcomes.
///
/// ```text
/// Pending → Acquiring → Acquired → Analyzing(0..n) → Aggregating
///              ↓                        ↓                  ↓
///         AcquireFailed              Failed ← ← ← ←  Persisting → Completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Acquiring,
    AcquireFailed,
    Acquired,
    /// Running the stage at this index of the requested stage list.
    Analyzing(usize),
    Aggregating,
    Persisting,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Terminal states admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AcquireFailed | Self::Completed | Self::Failed)
    }

    /// Legal transitions of the state machine. Retryable outcomes re-enter
    /// the same state, which is always allowed.
    pub fn can_transition_to(&self, next: ExecutionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        if *self == next {
            return true;
        }
        match (*self, next) {
            (Self::Pending, Self::Acquiring) => true,
            (Self::Acquiring, Self::Acquired | Self::AcquireFailed | Self::Failed) => true,
            (Self::Acquired, Self::Analyzing(0) | Self::Failed) => true,
            (Self::Analyzing(i), Self::Analyzing(j)) => j == i + 1,
            (Self::Analyzing(_), Self::Aggregating | Self::Failed) => true,
            (Self::Aggregating, Self::Persisting | Self::Failed) => true,
            (Self::Persisting, Self::Completed | Self::Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Acquiring => write!(f, "acquiring"),
            Self::AcquireFailed => write!(f, "acquire_failed"),
            Self::Acquired => write!(f, "acquired"),
            Self::Analyzing(i) => write!(f, "analyzing[{}]", i),
            Self::Aggregating => write!(f, "aggregating"),
            Self::Persisting => write!(f, "persisting"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

// =============================================================================
// Artifacts and Attempts
// =============================================================================

/// Output of one analysis stage. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisArtifact {
    /// Stage identifier from the request's ordered list.
    pub stage_id: String,
    /// Raw completion text, stored verbatim.
    pub raw_output: String,
    pub produced_at: DateTime<Utc>,
    /// Transport that produced this artifact, recorded for audit.
    pub source_mode: ReasoningMode,
}

impl AnalysisArtifact {
    pub fn new(stage_id: impl Into<String>, raw_output: String, mode: ReasoningMode) -> Self {
        Self {
            stage_id: stage_id.into(),
            raw_output,
            produced_at: Utc::now(),
            source_mode: mode,
        }
    }
}

/// Outcome of one activity attempt, as seen by the retry engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    TransientFailure,
    TerminalFailure,
}

/// Audit record of one activity attempt. Transient: kept on the execution for
/// inspection, never persisted past the retention of the execution itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// Activity identifier, e.g. `acquire` or `reasoning:hl_overview`.
    pub activity: String,
    /// 1-based attempt number within this activity.
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    pub elapsed: Duration,
}

// =============================================================================
// Execution
// =============================================================================

/// Terminal failure detail surfaced to the caller alongside partial results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionFailure {
    /// Stage or activity that triggered the failure.
    pub activity: String,
    pub message: String,
    /// Attempts made before giving up.
    pub attempts: u32,
}

/// One execution of the investigation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub target: String,
    pub status: ExecutionStatus,
    /// Stage results in execution order.
    pub artifacts: Vec<AnalysisArtifact>,
    /// Per-attempt audit log across all activities.
    pub attempts: Vec<RetryAttempt>,
    pub failure: Option<ExecutionFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target: target.into(),
            status: ExecutionStatus::Pending,
            artifacts: Vec::new(),
            attempts: Vec::new(),
            failure: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Look up a stage result by id.
    pub fn artifact(&self, stage_id: &str) -> Option<&AnalysisArtifact> {
        self.artifacts.iter().find(|a| a.stage_id == stage_id)
    }

    /// Attempt records for one activity, in order.
    pub fn attempts_for(&self, activity: &str) -> Vec<&RetryAttempt> {
        self.attempts
            .iter()
            .filter(|a| a.activity == activity)
            .collect()
    }

    /// Move to a new state. Illegal transitions indicate an orchestrator bug
    /// and are surfaced as storage-level corruption rather than silently
    /// accepted.
    pub fn transition(&mut self, next: ExecutionStatus) -> crate::types::Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(crate::types::ProbeError::Storage(format!(
                "illegal state transition: {} -> {}",
                self.status, next
            )));
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::AcquireFailed.is_terminal());
        assert!(!ExecutionStatus::Analyzing(2).is_terminal());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut exec = WorkflowExecution::new("https://example.com/repo");
        for next in [
            ExecutionStatus::Acquiring,
            ExecutionStatus::Acquired,
            ExecutionStatus::Analyzing(0),
            ExecutionStatus::Analyzing(1),
            ExecutionStatus::Aggregating,
            ExecutionStatus::Persisting,
            ExecutionStatus::Completed,
        ] {
            exec.transition(next).unwrap();
        }
        assert!(exec.finished_at.is_some());
    }

    #[test]
    fn test_retry_reenters_same_state() {
        assert!(ExecutionStatus::Acquiring.can_transition_to(ExecutionStatus::Acquiring));
        assert!(ExecutionStatus::Analyzing(1).can_transition_to(ExecutionStatus::Analyzing(1)));
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        assert!(!ExecutionStatus::Pending.can_transition_to(ExecutionStatus::Analyzing(0)));
        assert!(!ExecutionStatus::Analyzing(0).can_transition_to(ExecutionStatus::Analyzing(2)));
        assert!(!ExecutionStatus::Completed.can_transition_to(ExecutionStatus::Pending));

        let mut exec = WorkflowExecution::new("x");
        assert!(exec.transition(ExecutionStatus::Completed).is_err());
    }

    #[test]
    fn test_artifact_lookup_preserves_order() {
        let mut exec = WorkflowExecution::new("x");
        exec.artifacts.push(AnalysisArtifact::new(
            "first",
            "a".into(),
            ReasoningMode::Api,
        ));
        exec.artifacts.push(AnalysisArtifact::new(
            "second",
            "b".into(),
            ReasoningMode::Api,
        ));

        assert_eq!(exec.artifacts[0].stage_id, "first");
        assert_eq!(exec.artifact("second").unwrap().raw_output, "b");
        assert!(exec.artifact("third").is_none());
    }

    #[test]
    fn test_attempts_for_filters_by_activity() {
        let mut exec = WorkflowExecution::new("x");
        for (activity, attempt) in [("acquire", 1), ("reasoning:a", 1), ("reasoning:a", 2)] {
            exec.attempts.push(RetryAttempt {
                activity: activity.into(),
                attempt,
                outcome: AttemptOutcome::TransientFailure,
                elapsed: Duration::from_millis(5),
            });
        }
        assert_eq!(exec.attempts_for("reasoning:a").len(), 2);
        assert_eq!(exec.attempts_for("acquire").len(), 1);
    }
}
