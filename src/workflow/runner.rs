//! Concurrent workflow runner.
//!
//! Executes a batch of investigation requests with bounded concurrency.
//! Executions share nothing but the clients and the store; each one owns its
//! request, so a failing target never disturbs the others.

use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use tracing::info;

use super::InvestigationWorkflow;
use crate::types::{ExecutionStatus, InvestigationRequest, ProbeError, WorkflowExecution};

/// Batch outcome: terminal executions plus the requests that never produced
/// execution state (validation or prompt-loading failures).
#[derive(Debug, Default)]
pub struct BatchReport {
    pub executions: Vec<WorkflowExecution>,
    pub rejected: Vec<(String, ProbeError)>,
}

impl BatchReport {
    pub fn completed(&self) -> usize {
        self.executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .count()
    }

    pub fn failed(&self) -> usize {
        self.executions.len() - self.completed() + self.rejected.len()
    }
}

pub struct WorkflowRunner {
    workflow: Arc<InvestigationWorkflow>,
    concurrency: usize,
    /// Live view of in-flight and finished targets, readable while a batch
    /// runs.
    statuses: Arc<DashMap<String, ExecutionStatus>>,
}

impl WorkflowRunner {
    pub fn new(workflow: Arc<InvestigationWorkflow>, concurrency: usize) -> Self {
        Self {
            workflow,
            concurrency: concurrency.max(1),
            statuses: Arc::new(DashMap::new()),
        }
    }

    /// Current status per target.
    pub fn statuses(&self) -> Vec<(String, ExecutionStatus)> {
        self.statuses
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Run every request to a terminal state, at most `concurrency` at once.
    pub async fn run_batch(&self, requests: Vec<InvestigationRequest>) -> BatchReport {
        info!(
            requests = requests.len(),
            concurrency = self.concurrency,
            "Starting investigation batch"
        );

        let results: Vec<_> = stream::iter(requests)
            .map(|request| {
                let workflow = Arc::clone(&self.workflow);
                let statuses = Arc::clone(&self.statuses);
                async move {
                    let target = request.target.clone();
                    statuses.insert(target.clone(), ExecutionStatus::Pending);
                    let outcome = workflow.run(&request).await;
                    if let Ok(execution) = &outcome {
                        statuses.insert(target.clone(), execution.status);
                    }
                    (target, outcome)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport::default();
        for (target, outcome) in results {
            match outcome {
                Ok(execution) => report.executions.push(execution),
                Err(err) => report.rejected.push((target, err)),
            }
        }

        info!(
            completed = report.completed(),
            failed = report.failed(),
            "Batch finished"
        );
        report
    }
}
