//! Investigation Workflow
//!
//! Drives one execution through the state machine: acquire, analyze each
//! stage in order, aggregate, persist. Partial results survive failures: an
//! execution that dies at stage N is persisted with the N-1 artifacts it
//! produced, alongside the failure detail.
//!
//! The working copy lives on the stack of `run`, so its temporary directory
//! is removed on every exit path, including early returns and panics.

pub mod runner;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use tracing::{info, warn};

use crate::acquire::{Acquirer, WorkingCopy, structure};
use crate::prompts::{self, PromptSource, PromptStage};
use crate::reasoning::ReasoningClient;
use crate::retry::{ActivityKind, Disposition, RetryPolicyEngine, random_jitter};
use crate::storage::{ResultStore, report};
use crate::timeout::with_timeout;
use crate::types::{
    AnalysisArtifact, AttemptOutcome, ExecutionFailure, ExecutionStatus, InvestigationRequest,
    Result, RetryAttempt, ValidationError, WorkflowExecution,
};

const ACQUIRE_ACTIVITY: &str = "acquire";
const PERSIST_ACTIVITY: &str = "persist";
const EMPTY_CONTEXT: &str = "(no earlier findings)";

/// Cooperative cancellation, checked at state boundaries only. A reasoning
/// call in flight runs to completion; the execution stops before the next
/// transition.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct InvestigationWorkflow {
    acquirer: Arc<dyn Acquirer>,
    reasoning: Arc<dyn ReasoningClient>,
    prompts: Arc<dyn PromptSource>,
    store: Arc<dyn ResultStore>,
    engine: RetryPolicyEngine,
    report_dir: Option<PathBuf>,
}

impl InvestigationWorkflow {
    pub fn new(
        acquirer: Arc<dyn Acquirer>,
        reasoning: Arc<dyn ReasoningClient>,
        prompts: Arc<dyn PromptSource>,
        store: Arc<dyn ResultStore>,
        engine: RetryPolicyEngine,
    ) -> Self {
        Self {
            acquirer,
            reasoning,
            prompts,
            store,
            engine,
            report_dir: None,
        }
    }

    /// Also write an aggregated markdown report for completed executions.
    pub fn with_report_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.report_dir = Some(dir.into());
        self
    }

    /// Run one investigation to a terminal state.
    ///
    /// Validation and prompt-loading failures return `Err` without creating
    /// any execution state. Everything after that is reported through the
    /// returned execution's terminal status and `failure` field.
    pub async fn run(&self, request: &InvestigationRequest) -> Result<WorkflowExecution> {
        self.run_cancellable(request, CancelFlag::new()).await
    }

    pub async fn run_cancellable(
        &self,
        request: &InvestigationRequest,
        cancel: CancelFlag,
    ) -> Result<WorkflowExecution> {
        request.validate()?;
        // The request's transport must be the one this workflow was built
        // with; transports are never substituted behind the caller's back.
        if request.reasoning_mode != self.reasoning.mode() {
            return Err(ValidationError::ModeMismatch {
                requested: request.reasoning_mode,
                configured: self.reasoning.mode(),
            }
            .into());
        }
        let stages = self.prompts.select(&request.stages)?;

        let mut execution = WorkflowExecution::new(&request.target);
        info!(
            id = %execution.id,
            target = %request.target,
            stages = stages.len(),
            mode = %self.reasoning.mode(),
            "Investigation started"
        );

        execution.transition(ExecutionStatus::Acquiring)?;
        if cancel.is_cancelled() {
            return self.finish_cancelled(execution, ACQUIRE_ACTIVITY).await;
        }

        let acquisition = self.acquirer.acquire(&request.target, &request.budget).await;
        // Every clone attempt lands in the audit log, including a failed full
        // attempt that preceded the shallow fallback.
        for (index, clone_attempt) in acquisition.attempts.iter().enumerate() {
            execution.attempts.push(RetryAttempt {
                activity: ACQUIRE_ACTIVITY.into(),
                attempt: index as u32 + 1,
                outcome: clone_attempt.outcome,
                elapsed: clone_attempt.elapsed,
            });
        }
        let clone_attempts = acquisition.attempts.len() as u32;

        let working_copy = match acquisition.outcome {
            Ok(copy) => {
                info!(id = %execution.id, mode = %copy.mode, "Working copy acquired");
                copy
            }
            Err(err) => {
                execution.failure = Some(ExecutionFailure {
                    activity: ACQUIRE_ACTIVITY.into(),
                    message: err.to_string(),
                    attempts: clone_attempts,
                });
                execution.transition(ExecutionStatus::AcquireFailed)?;
                warn!(id = %execution.id, error = %err, "Acquisition failed");
                self.persist_best_effort(&mut execution).await;
                return Ok(execution);
            }
        };
        execution.transition(ExecutionStatus::Acquired)?;

        let repo_structure = match structure::summarize(working_copy.path()) {
            Ok(summary) => summary,
            Err(err) => {
                warn!(id = %execution.id, error = %err, "Structure scan failed");
                "(structure unavailable)".to_string()
            }
        };

        let mut previous_context = String::new();
        for (index, stage) in stages.iter().enumerate() {
            if cancel.is_cancelled() {
                drop(working_copy);
                return self
                    .finish_cancelled(execution, &reasoning_activity(stage))
                    .await;
            }
            execution.transition(ExecutionStatus::Analyzing(index))?;

            let context = if previous_context.is_empty() {
                EMPTY_CONTEXT
            } else {
                previous_context.as_str()
            };
            let prompt = prompts::render(&stage.template, &repo_structure, context);

            match self.complete_stage(&mut execution, stage, &prompt).await {
                Ok(text) => {
                    previous_context.push_str(&format!("## {}\n\n{}\n\n", stage.title, text));
                    execution.artifacts.push(AnalysisArtifact::new(
                        &stage.id,
                        text,
                        self.reasoning.mode(),
                    ));
                }
                Err(failure) => {
                    execution.failure = Some(failure);
                    execution.transition(ExecutionStatus::Failed)?;
                    drop(working_copy);
                    self.persist_best_effort(&mut execution).await;
                    return Ok(execution);
                }
            }
        }

        // Analysis is done with the checkout; remove it before the slower
        // aggregation and persistence phases.
        drop(working_copy);

        if cancel.is_cancelled() {
            return self.finish_cancelled(execution, "aggregate").await;
        }
        execution.transition(ExecutionStatus::Aggregating)?;

        if let Some(dir) = &self.report_dir
            && let Err(err) = report::write(dir, &execution, &stages)
        {
            execution.failure = Some(ExecutionFailure {
                activity: "aggregate".into(),
                message: err.to_string(),
                attempts: 1,
            });
            execution.transition(ExecutionStatus::Failed)?;
            self.persist_best_effort(&mut execution).await;
            return Ok(execution);
        }

        execution.transition(ExecutionStatus::Persisting)?;
        match self.persist_final(&mut execution).await {
            Ok(()) => {
                info!(
                    id = %execution.id,
                    artifacts = execution.artifacts.len(),
                    "Investigation completed"
                );
            }
            Err(failure) => {
                execution.failure = Some(failure);
                execution.transition(ExecutionStatus::Failed)?;
                warn!(id = %execution.id, "Persistence failed terminally");
            }
        }

        Ok(execution)
    }

    /// Run one stage's reasoning call under the retry policy. Every attempt
    /// is recorded on the execution, success or not.
    async fn complete_stage(
        &self,
        execution: &mut WorkflowExecution,
        stage: &PromptStage,
        prompt: &str,
    ) -> std::result::Result<String, ExecutionFailure> {
        let activity = reasoning_activity(stage);
        let attempt_timeout = self.engine.policy(ActivityKind::Reasoning).attempt_timeout;
        let mut attempt = 1u32;

        loop {
            let start = Instant::now();
            match with_timeout(attempt_timeout, self.reasoning.complete(prompt), &activity).await {
                Ok(completion) => {
                    execution.attempts.push(RetryAttempt {
                        activity: activity.clone(),
                        attempt,
                        outcome: AttemptOutcome::Success,
                        elapsed: start.elapsed(),
                    });
                    return Ok(completion.text);
                }
                Err(err) => {
                    match self.engine.classify(ActivityKind::Reasoning, &err, attempt) {
                        Disposition::Retry { delay } => {
                            execution.attempts.push(RetryAttempt {
                                activity: activity.clone(),
                                attempt,
                                outcome: AttemptOutcome::TransientFailure,
                                elapsed: start.elapsed(),
                            });
                            let sleep_for = delay + random_jitter(delay);
                            warn!(
                                id = %execution.id,
                                stage = %stage.id,
                                attempt,
                                error = %err,
                                delay = ?sleep_for,
                                "Stage attempt failed, retrying"
                            );
                            tokio::time::sleep(sleep_for).await;
                            attempt += 1;
                        }
                        Disposition::Terminal => {
                            execution.attempts.push(RetryAttempt {
                                activity: activity.clone(),
                                attempt,
                                outcome: AttemptOutcome::TerminalFailure,
                                elapsed: start.elapsed(),
                            });
                            return Err(ExecutionFailure {
                                activity,
                                message: err.to_string(),
                                attempts: attempt,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Single durable write on the success path. The stored row already
    /// carries the `Completed` status; the in-memory execution transitions
    /// only once the write succeeds, so a terminal persist failure can still
    /// end the execution as `Failed`.
    async fn persist_final(
        &self,
        execution: &mut WorkflowExecution,
    ) -> std::result::Result<(), ExecutionFailure> {
        let mut row = execution.clone();
        row.transition(ExecutionStatus::Completed)
            .map_err(|e| ExecutionFailure {
                activity: PERSIST_ACTIVITY.into(),
                message: e.to_string(),
                attempts: 0,
            })?;

        self.persist_row_with_retry(execution, &row).await?;

        execution
            .transition(ExecutionStatus::Completed)
            .map_err(|e| ExecutionFailure {
                activity: PERSIST_ACTIVITY.into(),
                message: e.to_string(),
                attempts: 0,
            })?;
        execution.finished_at = row.finished_at;
        Ok(())
    }

    /// Write `row` under the persistence retry policy, recording each attempt
    /// on `execution`. The stored attempt log cannot include the very write
    /// that stores it, so persist attempts live only on the returned snapshot.
    async fn persist_row_with_retry(
        &self,
        execution: &mut WorkflowExecution,
        row: &WorkflowExecution,
    ) -> std::result::Result<(), ExecutionFailure> {
        let mut attempt = 1u32;
        loop {
            let start = Instant::now();
            match self.store.persist(row) {
                Ok(()) => {
                    execution.attempts.push(RetryAttempt {
                        activity: PERSIST_ACTIVITY.into(),
                        attempt,
                        outcome: AttemptOutcome::Success,
                        elapsed: start.elapsed(),
                    });
                    return Ok(());
                }
                Err(err) => {
                    match self
                        .engine
                        .classify(ActivityKind::Persistence, &err, attempt)
                    {
                        Disposition::Retry { delay } => {
                            execution.attempts.push(RetryAttempt {
                                activity: PERSIST_ACTIVITY.into(),
                                attempt,
                                outcome: AttemptOutcome::TransientFailure,
                                elapsed: start.elapsed(),
                            });
                            warn!(id = %execution.id, attempt, error = %err, "Persist retry");
                            tokio::time::sleep(delay + random_jitter(delay)).await;
                            attempt += 1;
                        }
                        Disposition::Terminal => {
                            execution.attempts.push(RetryAttempt {
                                activity: PERSIST_ACTIVITY.into(),
                                attempt,
                                outcome: AttemptOutcome::TerminalFailure,
                                elapsed: start.elapsed(),
                            });
                            return Err(ExecutionFailure {
                                activity: PERSIST_ACTIVITY.into(),
                                message: err.to_string(),
                                attempts: attempt,
                            });
                        }
                    }
                }
            }
        }
    }

    /// Keep partial results of a failed execution if the store allows it.
    async fn persist_best_effort(&self, execution: &mut WorkflowExecution) {
        let row = execution.clone();
        if let Err(failure) = self.persist_row_with_retry(execution, &row).await {
            warn!(
                id = %execution.id,
                error = %failure.message,
                "Could not persist failed execution"
            );
        }
    }

    async fn finish_cancelled(
        &self,
        mut execution: WorkflowExecution,
        activity: &str,
    ) -> Result<WorkflowExecution> {
        execution.failure = Some(ExecutionFailure {
            activity: activity.to_string(),
            message: "cancelled".to_string(),
            attempts: 0,
        });
        execution.transition(ExecutionStatus::Failed)?;
        info!(id = %execution.id, at = activity, "Investigation cancelled");
        self.persist_best_effort(&mut execution).await;
        Ok(execution)
    }
}

fn reasoning_activity(stage: &PromptStage) -> String {
    format!("reasoning:{}", stage.id)
}

// =============================================================================
// Tests
// =============================================================================
