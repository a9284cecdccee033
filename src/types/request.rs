//! Investigation Request Types
//!
//! The immutable input to one pipeline execution. Created by the caller,
//! validated once, never mutated afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{Result, ValidationError};

/// Which transport the reasoning client uses for the whole execution.
///
/// Resolved once when the request is built; never re-read per call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningMode {
    /// Direct network API.
    #[default]
    Api,
    /// Local executable invoked as a subprocess.
    Cli,
}

impl std::fmt::Display for ReasoningMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReasoningMode::Api => write!(f, "api"),
            ReasoningMode::Cli => write!(f, "cli"),
        }
    }
}

impl std::str::FromStr for ReasoningMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(ReasoningMode::Api),
            "cli" => Ok(ReasoningMode::Cli),
            _ => Err(format!(
                "Unknown reasoning mode: {}. Valid values: api, cli",
                s
            )),
        }
    }
}

/// Hard limits for one acquisition: how much disk and wall-clock time a clone
/// may consume before the attempt is treated as a budget failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionBudget {
    /// Maximum on-disk size of the clone in bytes.
    pub max_bytes: u64,
    /// Maximum wall-clock time for one clone attempt in seconds.
    pub timeout_secs: u64,
}

impl Default for AcquisitionBudget {
    fn default() -> Self {
        Self {
            max_bytes: crate::constants::acquisition::DEFAULT_MAX_BYTES,
            timeout_secs: crate::constants::acquisition::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AcquisitionBudget {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Reject zero budgets before any execution state exists.
    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(ValidationError::InvalidBudget("max_bytes is zero".into()).into());
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::InvalidBudget("timeout_secs is zero".into()).into());
        }
        Ok(())
    }
}

/// One request to investigate a repository end-to-end.
///
/// Immutable: the workflow reads it, never writes it. Concurrent executions
/// each own their request, so there is no shared mutable configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestigationRequest {
    /// Clone target: URL or local filesystem path, treated as opaque.
    pub target: String,
    /// Ordered stage identifiers; execution order is exactly this order.
    pub stages: Vec<String>,
    /// Acquisition limits for the clone.
    pub budget: AcquisitionBudget,
    /// Which reasoning transport serves every call of this execution.
    pub reasoning_mode: ReasoningMode,
}

impl InvestigationRequest {
    pub fn new(target: impl Into<String>, stages: Vec<String>) -> Self {
        Self {
            target: target.into(),
            stages,
            budget: AcquisitionBudget::default(),
            reasoning_mode: ReasoningMode::default(),
        }
    }

    pub fn with_budget(mut self, budget: AcquisitionBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_mode(mut self, mode: ReasoningMode) -> Self {
        self.reasoning_mode = mode;
        self
    }

    /// Fail fast before any state transition: an empty stage list or a
    /// degenerate budget never creates an execution.
    pub fn validate(&self) -> Result<()> {
        if self.stages.is_empty() {
            return Err(ValidationError::EmptyStageList.into());
        }
        self.budget.validate()
    }
}
