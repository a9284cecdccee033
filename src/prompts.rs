//! Prompt Stages
//!
//! Analysis prompts live on disk next to a `prompts.json` manifest whose
//! `processing_order` fixes the stage sequence. Templates may carry a leading
//! `version:` line (stripped before use) and two placeholders filled at
//! execution time: `{repo_structure}` and `{previous_context}`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::types::{ProbeError, Result};

pub const MANIFEST_FILE: &str = "prompts.json";

/// One loadable analysis stage: an id, a human title, a cleaned template.
#[derive(Debug, Clone)]
pub struct PromptStage {
    pub id: String,
    pub title: String,
    pub template: String,
}

#[derive(Debug, Deserialize)]
struct Manifest {
    processing_order: Vec<ManifestEntry>,
}

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    id: String,
    file: String,
    #[serde(default)]
    title: Option<String>,
}

/// Where prompt templates come from.
pub trait PromptSource: Send + Sync {
    /// All stages, in manifest order.
    fn load_all(&self) -> Result<Vec<PromptStage>>;

    /// The named stages, in the caller's order. The requested order is the
    /// execution order, whatever the manifest says. Unknown ids fail.
    fn select(&self, stage_ids: &[String]) -> Result<Vec<PromptStage>> {
        let all = self.load_all()?;
        let known: HashMap<&str, &PromptStage> =
            all.iter().map(|s| (s.id.as_str(), s)).collect();

        stage_ids
            .iter()
            .map(|id| match known.get(id.as_str()) {
                Some(stage) => Ok((*stage).clone()),
                None => Err(ProbeError::prompt(
                    id,
                    format!("unknown stage, manifest defines: {}", ids_csv(&all)),
                )),
            })
            .collect()
    }
}

fn ids_csv(stages: &[PromptStage]) -> String {
    stages
        .iter()
        .map(|s| s.id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Directory-backed prompt source.
pub struct DirPromptSource {
    root: PathBuf,
}

impl DirPromptSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl PromptSource for DirPromptSource {
    fn load_all(&self) -> Result<Vec<PromptStage>> {
        let manifest_path = self.root.join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&manifest_path).map_err(|e| {
            ProbeError::Config(format!(
                "cannot read prompt manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;
        let manifest: Manifest = serde_json::from_str(&raw).map_err(|e| {
            ProbeError::Config(format!(
                "invalid prompt manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let mut stages = Vec::with_capacity(manifest.processing_order.len());
        for entry in manifest.processing_order {
            let path = self.root.join(&entry.file);
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                ProbeError::prompt(&entry.id, format!("cannot read {}: {}", path.display(), e))
            })?;
            let template = strip_version_line(&raw).to_string();
            if template.trim().is_empty() {
                return Err(ProbeError::prompt(&entry.id, "template is empty"));
            }

            stages.push(PromptStage {
                title: entry.title.unwrap_or_else(|| entry.id.clone()),
                id: entry.id,
                template,
            });
        }

        debug!(count = stages.len(), root = %self.root.display(), "Loaded prompt stages");
        Ok(stages)
    }
}

/// Drop a leading `version: ...` line if the template carries one.
fn strip_version_line(raw: &str) -> &str {
    let Some((first, rest)) = raw.split_once('\n') else {
        return raw;
    };
    if first.trim_start().to_lowercase().starts_with("version:") {
        rest.trim_start_matches('\n')
    } else {
        raw
    }
}

/// Fill the execution-time placeholders of a stage template.
pub fn render(template: &str, repo_structure: &str, previous_context: &str) -> String {
    template
        .replace("{repo_structure}", repo_structure)
        .replace("{previous_context}", previous_context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_fixture(dir: &Path) {
        fs::write(
            dir.join(MANIFEST_FILE),
            r#"{
                "processing_order": [
                    {"id": "overview", "file": "overview.md", "title": "High-level overview"},
                    {"id": "deps", "file": "deps.md"}
                ]
            }"#,
        )
        .unwrap();
        fs::write(
            dir.join("overview.md"),
            "version: 3\n\nDescribe the purpose of this repository.\n\n{repo_structure}\n",
        )
        .unwrap();
        fs::write(
            dir.join("deps.md"),
            "List the dependencies.\n\nContext so far:\n{previous_context}\n",
        )
        .unwrap();
    }

    #[test]
    fn test_load_all_in_manifest_order() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let stages = DirPromptSource::new(dir.path()).load_all().unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].id, "overview");
        assert_eq!(stages[0].title, "High-level overview");
        assert_eq!(stages[1].id, "deps");
        assert_eq!(stages[1].title, "deps"); // falls back to id
    }

    #[test]
    fn test_version_line_stripped() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let stages = DirPromptSource::new(dir.path()).load_all().unwrap();
        assert!(!stages[0].template.contains("version:"));
        assert!(stages[0].template.starts_with("Describe the purpose"));
        // A template without a version line is untouched.
        assert!(stages[1].template.starts_with("List the dependencies."));
    }

    #[test]
    fn test_select_follows_caller_order() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let source = DirPromptSource::new(dir.path());
        // The manifest lists overview before deps; the caller's order wins.
        let stages = source
            .select(&["deps".to_string(), "overview".to_string()])
            .unwrap();
        assert_eq!(stages[0].id, "deps");
        assert_eq!(stages[1].id, "overview");

        let manifest_order = source
            .select(&["overview".to_string(), "deps".to_string()])
            .unwrap();
        assert_eq!(manifest_order[0].id, "overview");
        assert_eq!(manifest_order[1].id, "deps");
    }

    #[test]
    fn test_select_unknown_stage_fails() {
        let dir = tempfile::tempdir().unwrap();
        write_fixture(dir.path());

        let err = DirPromptSource::new(dir.path())
            .select(&["security".to_string()])
            .unwrap_err();
        assert!(err.to_string().contains("security"));
    }

    #[test]
    fn test_render_fills_placeholders() {
        let rendered = render(
            "Tree:\n{repo_structure}\n\nEarlier findings:\n{previous_context}",
            "src/\n  main.rs",
            "stage one said hello",
        );
        assert!(rendered.contains("src/\n  main.rs"));
        assert!(rendered.contains("stage one said hello"));
        assert!(!rendered.contains('{'));
    }

    #[test]
    fn test_missing_manifest_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DirPromptSource::new(dir.path()).load_all().unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }
}
