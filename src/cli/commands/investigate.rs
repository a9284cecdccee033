//! Investigate Command
//!
//! Runs the full pipeline for one or more targets: acquire, analyze every
//! requested stage, aggregate, persist.

use std::path::PathBuf;
use std::sync::Arc;

use console::style;

use crate::acquire::GitAcquirer;
use crate::config::{Config, ConfigLoader};
use crate::prompts::{DirPromptSource, PromptSource};
use crate::reasoning;
use crate::retry::RetryPolicyEngine;
use crate::storage::Database;
use crate::types::{
    ExecutionStatus, InvestigationRequest, ProbeError, ReasoningMode, Result, WorkflowExecution,
};
use crate::workflow::runner::WorkflowRunner;
use crate::workflow::InvestigationWorkflow;

/// Command-line overrides layered on top of the loaded configuration.
#[derive(Debug, Default)]
pub struct InvestigateOptions {
    pub config_file: Option<PathBuf>,
    pub stages: Vec<String>,
    pub mode: Option<ReasoningMode>,
    pub model: Option<String>,
    pub max_bytes: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub concurrency: usize,
}

pub async fn run(targets: Vec<String>, options: InvestigateOptions) -> Result<()> {
    if targets.is_empty() {
        return Err(ProbeError::Config("no targets given".to_string()));
    }

    let mut config = match &options.config_file {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    apply_overrides(&mut config, &options);

    let engine = RetryPolicyEngine::default();
    let prompts: Arc<dyn PromptSource> = Arc::new(DirPromptSource::new(&config.prompts_dir));

    let stages = if options.stages.is_empty() {
        prompts.load_all()?.into_iter().map(|s| s.id).collect()
    } else {
        options.stages.clone()
    };

    println!(
        "{} {} target(s), {} stage(s), {} transport",
        style("Investigating").bold(),
        targets.len(),
        stages.len(),
        config.reasoning.mode
    );

    let client = reasoning::build_client(&config.reasoning).await?;
    let store = Arc::new(Database::open(&config.storage.database_path)?);

    let workflow = Arc::new(
        InvestigationWorkflow::new(
            Arc::new(GitAcquirer::new(engine.clone())),
            Arc::from(client),
            prompts,
            store,
            engine,
        )
        .with_report_dir(&config.report_dir),
    );

    let budget = config.acquisition.budget();
    let mode = config.reasoning.mode;
    let requests: Vec<InvestigationRequest> = targets
        .iter()
        .map(|target| {
            InvestigationRequest::new(target, stages.clone())
                .with_budget(budget)
                .with_mode(mode)
        })
        .collect();

    let runner = WorkflowRunner::new(workflow, options.concurrency.max(1));
    let report = runner.run_batch(requests).await;

    for execution in &report.executions {
        print_outcome(execution);
    }
    for (target, err) in &report.rejected {
        println!("{} {}: {}", style("✗").red(), target, err);
    }

    println!();
    println!(
        "{} completed, {} failed",
        style(report.completed()).green(),
        style(report.failed()).red()
    );

    if report.failed() > 0 {
        return Err(ProbeError::Storage(format!(
            "{} of {} investigations did not complete",
            report.failed(),
            targets.len()
        )));
    }
    Ok(())
}

fn apply_overrides(config: &mut Config, options: &InvestigateOptions) {
    if let Some(mode) = options.mode {
        config.reasoning.mode = mode;
    }
    if let Some(model) = &options.model {
        config.reasoning.model = model.clone();
    }
    if let Some(max_bytes) = options.max_bytes {
        config.acquisition.max_bytes = max_bytes;
    }
    if let Some(timeout_secs) = options.timeout_secs {
        config.acquisition.timeout_secs = timeout_secs;
    }
}

fn print_outcome(execution: &WorkflowExecution) {
    match execution.status {
        ExecutionStatus::Completed => {
            println!(
                "{} {} ({} artifacts, id {})",
                style("✓").green(),
                execution.target,
                execution.artifacts.len(),
                execution.id
            );
        }
        _ => {
            let detail = execution
                .failure
                .as_ref()
                .map(|f| format!("{}: {}", f.activity, f.message))
                .unwrap_or_else(|| execution.status.to_string());
            println!(
                "{} {} ({}, {} partial artifacts kept)",
                style("✗").red(),
                execution.target,
                detail,
                execution.artifacts.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_applied() {
        let mut config = Config::default();
        apply_overrides(
            &mut config,
            &InvestigateOptions {
                mode: Some(ReasoningMode::Cli),
                model: Some("claude-opus-4".into()),
                max_bytes: Some(1024),
                timeout_secs: Some(60),
                ..InvestigateOptions::default()
            },
        );
        assert_eq!(config.reasoning.mode, ReasoningMode::Cli);
        assert_eq!(config.reasoning.model, "claude-opus-4");
        assert_eq!(config.acquisition.max_bytes, 1024);
        assert_eq!(config.acquisition.timeout_secs, 60);
    }

    #[tokio::test]
    async fn test_no_targets_rejected() {
        let result = run(vec![], InvestigateOptions::default()).await;
        assert!(matches!(result, Err(ProbeError::Config(_))));
    }
}
