//! Reasoning Clients
//!
//! Two transports to the reasoning service: a network API client and a local
//! CLI subprocess client. A client is built for exactly one transport; there
//! is no chain and no silent substitution. If the chosen transport cannot be
//! constructed (missing key, missing binary), construction fails and the
//! caller decides what to do.

pub mod api;
pub mod cli;

use std::time::Duration;

use async_trait::async_trait;

use crate::config::ReasoningConfig;
use crate::constants::reasoning as constants;
use crate::types::{ProbeError, ReasoningMode, Result};

pub use api::ApiReasoningClient;
pub use cli::CliReasoningClient;

/// Limits applied to every completion through a client.
#[derive(Debug, Clone)]
pub struct CompletionConstraints {
    pub model: String,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for CompletionConstraints {
    fn default() -> Self {
        Self {
            model: constants::DEFAULT_MODEL.to_string(),
            max_output_tokens: constants::DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: Duration::from_secs(constants::DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl CompletionConstraints {
    pub fn from_config(config: &ReasoningConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_output_tokens: config.max_output_tokens,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

/// A single successful completion.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub elapsed: Duration,
}

/// One transport to the reasoning service.
#[async_trait]
pub trait ReasoningClient: Send + Sync {
    /// Send one prompt and return the model's text output.
    async fn complete(&self, prompt: &str) -> Result<Completion>;

    /// The transport this client was constructed for.
    fn mode(&self) -> ReasoningMode;

    /// Human-readable identity for logs.
    fn describe(&self) -> String;
}

/// Construct the client for the requested transport, or fail.
///
/// `Cli` mode probes the binary before returning, so an unusable
/// installation surfaces here rather than mid-investigation.
pub async fn build_client(config: &ReasoningConfig) -> Result<Box<dyn ReasoningClient>> {
    let constraints = CompletionConstraints::from_config(config);
    match config.mode {
        ReasoningMode::Api => {
            let client = ApiReasoningClient::new(config, constraints)?;
            Ok(Box::new(client))
        }
        ReasoningMode::Cli => {
            let client = CliReasoningClient::new(config, constraints).await?;
            Ok(Box::new(client))
        }
    }
}

/// Reject a blank prompt before it reaches a transport.
fn check_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(ProbeError::Config("empty prompt".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_constraints() {
        let c = CompletionConstraints::default();
        assert_eq!(c.model, constants::DEFAULT_MODEL);
        assert_eq!(c.max_output_tokens, constants::DEFAULT_MAX_OUTPUT_TOKENS);
        assert_eq!(c.timeout, Duration::from_secs(constants::DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn test_check_prompt_rejects_blank() {
        assert!(check_prompt("   \n").is_err());
        assert!(check_prompt("describe the build system").is_ok());
    }

    #[tokio::test]
    async fn test_build_client_api_requires_key() {
        let config = ReasoningConfig {
            mode: ReasoningMode::Api,
            api_key: None,
            ..ReasoningConfig::default()
        };
        // No silent substitution: missing credentials fail construction
        // instead of handing back a CLI client.
        let result = build_client(&config).await;
        assert!(result.is_err());
    }
}
