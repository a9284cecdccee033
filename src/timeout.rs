//! Activity Timeout Helpers
//!
//! Every activity attempt (clone, reasoning call, persistence call) runs under
//! a wall-clock timeout; expiry is a distinct failure class fed to the retry
//! engine like any other outcome.

use std::future::Future;
use std::time::Duration;

use crate::types::{ProbeError, Result};

/// Execute an async operation with a timeout.
///
/// Returns `ProbeError::Timeout` naming the operation if it does not complete
/// within `timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, future: F, operation_name: &str) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(ProbeError::timeout(operation_name, timeout)),
    }
}
