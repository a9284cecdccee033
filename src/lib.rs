//! repoprobe - Automated Repository Investigation Pipeline
//!
//! Clones a target repository under memory and time budgets, runs an ordered
//! series of analysis prompts through an LLM reasoning service, and persists
//! the findings as durable execution records plus an aggregated markdown
//! report.
//!
//! ## Core Pieces
//!
//! - **Acquisition**: full-history clone with a one-shot shallow fallback
//!   when the full attempt hits memory or budget pressure
//! - **Reasoning**: exactly one transport per execution, network API or local
//!   CLI subprocess, chosen at construction with no silent substitution
//! - **Retry policy**: pure classification of failures into retry-with-backoff
//!   or terminal, shared by every activity
//! - **Workflow**: durable state machine with partial-failure retention and
//!   guaranteed working-copy teardown
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use repoprobe::acquire::GitAcquirer;
//! use repoprobe::prompts::DirPromptSource;
//! use repoprobe::retry::RetryPolicyEngine;
//! use repoprobe::storage::Database;
//! use repoprobe::types::InvestigationRequest;
//! use repoprobe::workflow::InvestigationWorkflow;
//!
//! let engine = RetryPolicyEngine::default();
//! let client = repoprobe::reasoning::build_client(&config.reasoning).await?;
//! let workflow = InvestigationWorkflow::new(
//!     Arc::new(GitAcquirer::new(engine.clone())),
//!     Arc::from(client),
//!     Arc::new(DirPromptSource::new("prompts")),
//!     Arc::new(Database::open("repoprobe.db")?),
//!     engine,
//! );
//! let execution = workflow
//!     .run(&InvestigationRequest::new(url, stages))
//!     .await?;
//! ```

pub mod acquire;
pub mod cli;
pub mod config;
pub mod constants;
pub mod prompts;
pub mod reasoning;
pub mod retry;
pub mod storage;
pub mod timeout;
pub mod types;
pub mod workflow;

// =============================================================================
// Core Re-exports
// =============================================================================

// Configuration
pub use config::{Config, ConfigLoader};

// Error Types
pub use types::error::{ProbeError, Result, ResultExt};

// Requests and Execution State
pub use types::{
    AcquisitionBudget, AnalysisArtifact, ExecutionStatus, InvestigationRequest, ReasoningMode,
    WorkflowExecution,
};

// =============================================================================
// Pipeline Re-exports
// =============================================================================

pub use acquire::{Acquirer, Acquisition, CloneAttempt, CloneMode, GitAcquirer, WorkingCopy};
pub use reasoning::{Completion, ReasoningClient, build_client};
pub use retry::{ActivityKind, Disposition, RetryPolicyEngine};
pub use storage::{Database, ResultStore};
pub use workflow::{CancelFlag, InvestigationWorkflow};
