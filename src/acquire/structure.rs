//! Repository structure summary.
//!
//! Walks the working copy and renders an indented directory tree that gets
//! injected into analysis prompts. Respects `.gitignore`, skips `.git`, and
//! caps both depth and entry count so enormous repositories stay within a
//! predictable prompt size.

use std::path::Path;

use ignore::WalkBuilder;
use tracing::debug;

use crate::constants::structure::{MAX_TREE_DEPTH, MAX_TREE_ENTRIES};
use crate::types::Result;

/// Render an indented tree of the checkout, truncated at the configured
/// depth/entry caps. The walk is sorted by name so the output is stable
/// across runs.
pub fn summarize(root: &Path) -> Result<String> {
    let walker = WalkBuilder::new(root)
        .hidden(false)
        .git_ignore(true)
        .require_git(false)
        .git_global(false)
        .git_exclude(false)
        .max_depth(Some(MAX_TREE_DEPTH))
        .filter_entry(|e| e.file_name() != std::ffi::OsStr::new(".git"))
        .sort_by_file_name(std::cmp::Ord::cmp)
        .build();

    let mut lines = Vec::new();
    let mut truncated = false;

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable entry during structure walk");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue; // the root itself
        }
        if lines.len() >= MAX_TREE_ENTRIES {
            truncated = true;
            break;
        }

        let indent = "  ".repeat(entry.depth() - 1);
        let name = entry.file_name().to_string_lossy();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir {
            lines.push(format!("{}{}/", indent, name));
        } else {
            lines.push(format!("{}{}", indent, name));
        }
    }

    if truncated {
        lines.push(format!("... (truncated at {} entries)", MAX_TREE_ENTRIES));
    }

    Ok(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_summarize_nested_tree() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/nested")).unwrap();
        fs::write(dir.path().join("README.md"), "hi").unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("src/nested/mod.rs"), "").unwrap();

        let summary = summarize(dir.path()).unwrap();
        assert!(summary.contains("README.md"));
        assert!(summary.contains("src/"));
        assert!(summary.contains("  main.rs"));
        assert!(summary.contains("    mod.rs"));
    }

    #[test]
    fn test_summarize_skips_git_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".git/objects")).unwrap();
        fs::write(dir.path().join(".git/HEAD"), "ref: refs/heads/main").unwrap();
        fs::write(dir.path().join("lib.rs"), "").unwrap();

        let summary = summarize(dir.path()).unwrap();
        assert!(summary.contains("lib.rs"));
        assert!(!summary.contains(".git"));
        assert!(!summary.contains("HEAD"));
    }

    #[test]
    fn test_summarize_respects_gitignore() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".gitignore"), "target/\n").unwrap();
        fs::create_dir_all(dir.path().join("target/debug")).unwrap();
        fs::write(dir.path().join("target/debug/artifact"), "x").unwrap();
        fs::write(dir.path().join("keep.txt"), "x").unwrap();

        let summary = summarize(dir.path()).unwrap();
        assert!(summary.contains("keep.txt"));
        assert!(!summary.contains("artifact"));
    }
}
