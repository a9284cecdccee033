//! Markdown report aggregation.
//!
//! Joins the stage artifacts of an execution into one architecture document.
//! The document takes its name from a `[[name]]` marker in the first stage's
//! output when the model emitted one, falling back to the last path segment
//! of the target.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::info;

use crate::prompts::PromptStage;
use crate::types::{Result, WorkflowExecution};

static NAME_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([A-Za-z0-9._\- ]+)\]\]").expect("valid name marker regex"));

/// Derive the document name for an execution.
pub fn repo_name(execution: &WorkflowExecution) -> String {
    if let Some(first) = execution.artifacts.first()
        && let Some(captures) = NAME_MARKER.captures(&first.raw_output)
    {
        return captures[1].trim().replace(' ', "-");
    }
    target_slug(&execution.target)
}

/// Last path segment of the target, stripped of `.git`.
fn target_slug(target: &str) -> String {
    let trimmed = target.trim_end_matches('/');
    let segment = trimmed
        .rsplit(['/', ':'])
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("repository");
    segment.trim_end_matches(".git").to_string()
}

/// Render the aggregated markdown document.
///
/// Stage order follows the execution's artifact order. Titles come from the
/// stage definitions when available, falling back to the stage id.
pub fn render(execution: &WorkflowExecution, stages: &[PromptStage]) -> String {
    let name = repo_name(execution);
    let mut doc = String::new();

    doc.push_str(&format!("# Architecture: {}\n\n", name));
    doc.push_str(&format!("- Target: {}\n", execution.target));
    doc.push_str(&format!(
        "- Generated: {}\n",
        execution.started_at.format("%Y-%m-%d %H:%M UTC")
    ));
    doc.push_str(&format!("- Stages: {}\n\n", execution.artifacts.len()));

    for artifact in &execution.artifacts {
        let title = stages
            .iter()
            .find(|s| s.id == artifact.stage_id)
            .map(|s| s.title.as_str())
            .unwrap_or(artifact.stage_id.as_str());
        doc.push_str(&format!("## {}\n\n", title));
        doc.push_str(artifact.raw_output.trim());
        doc.push_str("\n\n");
    }

    doc
}

/// Write the rendered document into `dir` as `<name>.md`.
pub fn write(dir: &Path, execution: &WorkflowExecution, stages: &[PromptStage]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}.md", repo_name(execution)));
    std::fs::write(&path, render(execution, stages))?;
    info!(path = %path.display(), "Report written");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AnalysisArtifact, ReasoningMode};

    fn execution_with(outputs: &[(&str, &str)]) -> WorkflowExecution {
        let mut exec = WorkflowExecution::new("https://example.com/org/widget.git");
        for (stage, output) in outputs {
            exec.artifacts.push(AnalysisArtifact::new(
                *stage,
                output.to_string(),
                ReasoningMode::Cli,
            ));
        }
        exec
    }

    #[test]
    fn test_repo_name_from_marker() {
        let exec = execution_with(&[(
            "overview",
            "The project is called [[widget core]].\nIt does things.",
        )]);
        assert_eq!(repo_name(&exec), "widget-core");
    }

    #[test]
    fn test_repo_name_falls_back_to_target_slug() {
        let exec = execution_with(&[("overview", "no marker here")]);
        assert_eq!(repo_name(&exec), "widget");

        let empty = execution_with(&[]);
        assert_eq!(repo_name(&empty), "widget");
    }

    #[test]
    fn test_target_slug_variants() {
        assert_eq!(target_slug("https://example.com/a/b.git"), "b");
        assert_eq!(target_slug("git@example.com:org/thing.git"), "thing");
        assert_eq!(target_slug("/local/path/repo/"), "repo");
    }

    #[test]
    fn test_render_uses_stage_titles_in_artifact_order() {
        let exec = execution_with(&[("overview", "first body"), ("deps", "second body")]);
        let stages = vec![
            PromptStage {
                id: "overview".into(),
                title: "High-level overview".into(),
                template: String::new(),
            },
            PromptStage {
                id: "deps".into(),
                title: "Dependencies".into(),
                template: String::new(),
            },
        ];

        let doc = render(&exec, &stages);
        let overview_pos = doc.find("## High-level overview").unwrap();
        let deps_pos = doc.find("## Dependencies").unwrap();
        assert!(overview_pos < deps_pos);
        assert!(doc.contains("first body"));
        assert!(doc.contains("second body"));
    }

    #[test]
    fn test_write_creates_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let exec = execution_with(&[("overview", "[[gadget]] overview text")]);

        let path = write(dir.path(), &exec, &[]).unwrap();
        assert_eq!(path.file_name().unwrap(), "gadget.md");
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with("# Architecture: gadget"));
    }
}
