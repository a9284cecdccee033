//! Configuration types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{acquisition, reasoning};
use crate::types::{AcquisitionBudget, ReasoningMode, Result, ValidationError};

/// Effective configuration, assembled from defaults, config files, and
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub reasoning: ReasoningConfig,
    pub acquisition: AcquisitionConfig,
    pub storage: StorageConfig,
    /// Directory holding `prompts.json` and the stage templates.
    pub prompts_dir: PathBuf,
    /// Directory that aggregated reports are written into.
    pub report_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reasoning: ReasoningConfig::default(),
            acquisition: AcquisitionConfig::default(),
            storage: StorageConfig::default(),
            prompts_dir: PathBuf::from("prompts"),
            report_dir: PathBuf::from("reports"),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        self.acquisition.budget().validate()?;
        if self.reasoning.timeout_secs == 0 {
            return Err(ValidationError::InvalidBudget(
                "reasoning timeout must be positive".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

/// Reasoning transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// Transport selected at construction. Never substituted at runtime.
    pub mode: ReasoningMode,
    pub model: String,
    pub max_output_tokens: u32,
    pub timeout_secs: u64,
    /// API transport only.
    pub api_key: Option<String>,
    pub api_base: Option<String>,
    /// CLI transport only; defaults to `claude` on PATH.
    pub cli_binary: Option<String>,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            mode: ReasoningMode::default(),
            model: reasoning::DEFAULT_MODEL.to_string(),
            max_output_tokens: reasoning::DEFAULT_MAX_OUTPUT_TOKENS,
            timeout_secs: reasoning::DEFAULT_TIMEOUT_SECS,
            api_key: None,
            api_base: None,
            cli_binary: None,
        }
    }
}

/// Clone budget settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub max_bytes: u64,
    pub timeout_secs: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            max_bytes: acquisition::DEFAULT_MAX_BYTES,
            timeout_secs: acquisition::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl AcquisitionConfig {
    pub fn budget(&self) -> AcquisitionBudget {
        AcquisitionBudget {
            max_bytes: self.max_bytes,
            timeout_secs: self.timeout_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("repoprobe.db"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn test_zero_budget_rejected() {
        let mut config = Config::default();
        config.acquisition.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_mode_is_api() {
        assert_eq!(ReasoningConfig::default().mode, ReasoningMode::Api);
    }
}
