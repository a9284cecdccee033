//! Repository acquisition: clone policy, working-copy lifecycle, and the
//! structure summary fed to analysis prompts.

pub mod git;
pub mod structure;
pub mod working_copy;

pub use git::{Acquirer, Acquisition, CloneAttempt, GitAcquirer};
pub use working_copy::{CloneMode, WorkingCopy};
