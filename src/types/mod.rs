pub mod error;
pub mod execution;
pub mod request;

pub use error::{
    AcquisitionError, ProbeError, ReasoningError, Result, ResultExt, ValidationError,
};
pub use execution::{
    AnalysisArtifact, AttemptOutcome, ExecutionFailure, ExecutionStatus, RetryAttempt,
    WorkflowExecution,
};
pub use request::{AcquisitionBudget, InvestigationRequest, ReasoningMode};
