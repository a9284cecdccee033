//! Unified Error Type System
//!
//! Centralized error types for the entire pipeline.
//! Failures are structured so the retry engine can classify them without
//! string matching at the decision point.
//!
//! ## Error Families
//!
//! - **Acquisition**: clone failures; only memory/budget failures may fall
//!   back to a shallow acquisition
//! - **Reasoning**: completion-service failures; rate limits and timeouts
//!   retry, construction failures never do
//! - **Validation**: request rejected before any state transition

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Acquisition Errors
// =============================================================================

/// Failure while acquiring a working copy of the target repository.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    /// The clone process was killed by the kernel for memory pressure.
    #[error("clone of {target} killed by out-of-memory signal")]
    OutOfMemory { target: String },

    /// The clone exceeded its byte or wall-clock budget.
    #[error("clone of {target} exceeded acquisition budget: {detail}")]
    BudgetExceeded { target: String, detail: String },

    /// Network-level failure reaching the remote.
    #[error("cannot reach {target}: {detail}")]
    Unreachable { target: String, detail: String },

    /// The remote rejected our credentials.
    #[error("authentication rejected for {target}")]
    Unauthorized { target: String },

    /// The target repository does not exist.
    #[error("repository not found: {target}")]
    NotFound { target: String },
}

impl AcquisitionError {
    /// Whether this failure is mitigated by a shallow re-attempt.
    ///
    /// Only memory/budget pressure qualifies; connectivity and permission
    /// failures would fail identically on a shallow clone.
    pub fn allows_shallow_fallback(&self) -> bool {
        matches!(
            self,
            Self::OutOfMemory { .. } | Self::BudgetExceeded { .. }
        )
    }
}

// =============================================================================
// Reasoning Errors
// =============================================================================

/// Failure from the reasoning service, either transport.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReasoningError {
    /// The service throttled us. Carries a server-suggested wait if present.
    #[error("reasoning service rate limited")]
    RateLimited { retry_after: Option<Duration> },

    /// The service is temporarily unable to serve requests.
    #[error("reasoning service unavailable: {0}")]
    Unavailable(String),

    /// Credentials were rejected.
    #[error("reasoning service rejected credentials: {0}")]
    Unauthorized(String),

    /// The response could not be parsed into a completion.
    #[error("malformed reasoning output: {0}")]
    MalformedOutput(String),

    /// The CLI executable was not found or failed its version probe.
    /// Raised at construction, never at call time.
    #[error("reasoning CLI binary unusable: {0}")]
    BinaryMissing(String),

    /// A single call exceeded its attempt timeout.
    #[error("reasoning call timed out after {0:?}")]
    Timeout(Duration),
}

// =============================================================================
// Validation Errors
// =============================================================================

/// Request rejected before any execution state is created.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("requested stage list is empty")]
    EmptyStageList,

    #[error("invalid acquisition budget: {0}")]
    InvalidBudget(String),

    /// The request names one transport but the workflow was built with the
    /// other. Transports are never substituted, so this is a caller error.
    #[error("request asks for the {requested} reasoning transport but the client is {configured}")]
    ModeMismatch {
        requested: super::ReasoningMode,
        configured: super::ReasoningMode,
    },
}

// =============================================================================
// Application Error
// =============================================================================

#[derive(Debug, Error)]
pub enum ProbeError {
    // -------------------------------------------------------------------------
    // System Errors (auto From impl)
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // -------------------------------------------------------------------------
    // Pipeline Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Operation timeout with context
    #[error("timeout after {duration:?}: {operation}")]
    Timeout {
        operation: String,
        duration: Duration,
    },

    // -------------------------------------------------------------------------
    // Domain Errors
    // -------------------------------------------------------------------------
    #[error("prompt error for stage '{stage}': {message}")]
    Prompt { stage: String, message: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl ProbeError {
    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a prompt error for a stage
    pub fn prompt(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Prompt {
            stage: stage.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ProbeError>;

/// Context extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> ResultExt<T> for std::result::Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> Result<T> {
        self.map_err(|e| ProbeError::Storage(format!("{}: {}", context.into(), e)))
    }
}

// =============================================================================
// Tests
// =============================================================================
