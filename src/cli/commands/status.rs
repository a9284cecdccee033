//! Status Command
//!
//! Inspect stored executions: a recent listing, or one execution in detail.

use console::style;
use uuid::Uuid;

use crate::config::ConfigLoader;
use crate::storage::{Database, ResultStore};
use crate::types::{ExecutionStatus, ProbeError, Result};

pub fn run(id: Option<String>, limit: u32, json: bool) -> Result<()> {
    let config = ConfigLoader::load()?;
    if !config.storage.database_path.exists() {
        if json {
            println!("{{\"executions\": []}}");
        } else {
            println!("No investigations recorded yet.");
        }
        return Ok(());
    }
    let db = Database::open(&config.storage.database_path)?;

    match id {
        Some(raw) => {
            let id = Uuid::parse_str(&raw)
                .map_err(|e| ProbeError::Config(format!("invalid execution id '{}': {}", raw, e)))?;
            show_one(&db, &id, json)
        }
        None => list(&db, limit, json),
    }
}

fn show_one(db: &Database, id: &Uuid, json: bool) -> Result<()> {
    let Some(execution) = db.fetch(id)? else {
        return Err(ProbeError::Storage(format!("no execution with id {}", id)));
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&execution)?);
        return Ok(());
    }

    println!("{} {}", style("Execution").bold(), execution.id);
    println!("  Target:  {}", execution.target);
    println!("  Status:  {}", styled_status(execution.status));
    println!("  Started: {}", execution.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let Some(finished) = execution.finished_at {
        println!("  Finished: {}", finished.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(failure) = &execution.failure {
        println!(
            "  Failure: {} after {} attempt(s): {}",
            failure.activity, failure.attempts, failure.message
        );
    }

    println!("\n{}", style("Artifacts").bold());
    if execution.artifacts.is_empty() {
        println!("  (none)");
    }
    for artifact in &execution.artifacts {
        println!(
            "  {} ({} chars, {} transport)",
            artifact.stage_id,
            artifact.raw_output.len(),
            artifact.source_mode
        );
    }

    println!("\n{}", style("Attempts").bold());
    for attempt in &execution.attempts {
        println!(
            "  {} #{} {:?} ({:?})",
            attempt.activity, attempt.attempt, attempt.outcome, attempt.elapsed
        );
    }

    Ok(())
}

fn list(db: &Database, limit: u32, json: bool) -> Result<()> {
    let summaries = db.list_recent(limit)?;

    if json {
        let entries: Vec<_> = summaries
            .iter()
            .map(|s| {
                serde_json::json!({
                    "id": s.id.to_string(),
                    "target": s.target,
                    "status": s.status,
                    "artifacts": s.artifact_count,
                    "started_at": s.started_at.to_rfc3339(),
                    "finished_at": s.finished_at.map(|t| t.to_rfc3339()),
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "executions": entries }))?
        );
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No investigations recorded yet.");
        return Ok(());
    }

    println!("{}", style("Recent investigations").bold());
    for summary in summaries {
        println!(
            "  {} {} {} ({} artifacts, {})",
            styled_status(summary.status),
            summary.id,
            summary.target,
            summary.artifact_count,
            summary.started_at.format("%Y-%m-%d %H:%M")
        );
    }
    Ok(())
}

fn styled_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Completed => style(status.to_string()).green().to_string(),
        ExecutionStatus::Failed | ExecutionStatus::AcquireFailed => {
            style(status.to_string()).red().to_string()
        }
        _ => style(status.to_string()).yellow().to_string(),
    }
}
