//! Scoped Working Copy
//!
//! The acquired clone lives in a temporary directory owned by the
//! `WorkingCopy` value. Dropping the value deletes the directory, so teardown
//! happens on every path out of the workflow, including cancellation and
//! panics during a stage.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// How the working copy was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloneMode {
    /// Complete history fetch.
    Full,
    /// Depth 1, single branch, no tag objects.
    Shallow,
}

impl std::fmt::Display for CloneMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloneMode::Full => write!(f, "full"),
            CloneMode::Shallow => write!(f, "shallow"),
        }
    }
}

/// Local working copy of the target repository.
///
/// Owned exclusively by one execution; the directory is never shared.
/// Invariant: `mode == Shallow` implies `commit_count == 1`.
#[derive(Debug)]
pub struct WorkingCopy {
    dir: TempDir,
    checkout: PathBuf,
    pub mode: CloneMode,
    pub commit_count: u64,
    pub size_bytes: u64,
}

impl WorkingCopy {
    pub fn new(dir: TempDir, checkout: PathBuf, mode: CloneMode, commit_count: u64, size_bytes: u64) -> Self {
        debug_assert!(mode != CloneMode::Shallow || commit_count == 1);
        Self {
            dir,
            checkout,
            mode,
            commit_count,
            size_bytes,
        }
    }

    /// Path of the checked-out tree.
    pub fn path(&self) -> &Path {
        &self.checkout
    }

    /// Root of the owned temporary directory.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Delete the directory now instead of waiting for drop.
    pub fn teardown(self) -> std::io::Result<()> {
        self.dir.close()
    }
}

/// Total on-disk size of a directory tree in bytes.
///
/// Counts everything including `.git`, since the byte budget is about disk
/// and memory pressure, not tree content.
pub fn dir_size_bytes(path: &Path) -> std::io::Result<u64> {
    let mut total = 0u64;
    let mut stack = vec![path.to_path_buf()];

    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let meta = entry.metadata()?;
            if meta.is_dir() {
                stack.push(entry.path());
            } else {
                total += meta.len();
            }
        }
    }

    Ok(total)
}
