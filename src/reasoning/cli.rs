//! CLI Reasoning Client
//!
//! Subprocess transport: invokes a locally installed reasoning CLI, writes
//! the prompt on stdin, and reads the completion from stdout. Construction
//! probes the binary with `--version` so a missing or broken installation
//! fails before any investigation starts.

use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info};

use super::{Completion, CompletionConstraints, ReasoningClient, check_prompt};
use crate::config::ReasoningConfig;
use crate::constants::reasoning as constants;
use crate::types::{ReasoningError, ReasoningMode, Result};

pub struct CliReasoningClient {
    binary: String,
    constraints: CompletionConstraints,
}

impl CliReasoningClient {
    /// Probe the binary, then return a client bound to it.
    pub async fn new(config: &ReasoningConfig, constraints: CompletionConstraints) -> Result<Self> {
        let binary = config
            .cli_binary
            .clone()
            .unwrap_or_else(|| constants::DEFAULT_CLI_BINARY.to_string());

        probe_binary(&binary).await?;

        Ok(Self { binary, constraints })
    }

    #[cfg(test)]
    fn unprobed(binary: String, constraints: CompletionConstraints) -> Self {
        Self { binary, constraints }
    }
}

#[async_trait]
impl ReasoningClient for CliReasoningClient {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        check_prompt(prompt)?;

        info!(binary = %self.binary, model = %self.constraints.model, "Invoking reasoning CLI");
        let start = Instant::now();

        let mut child = Command::new(&self.binary)
            .arg("prompt")
            .arg("--model")
            .arg(&self.constraints.model)
            .arg("--max-output")
            .arg(self.constraints.max_output_tokens.to_string())
            .arg("--format")
            .arg("json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ReasoningError::BinaryMissing(format!("{}: {}", self.binary, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| ReasoningError::Unavailable(format!("stdin write failed: {}", e)))?;
            drop(stdin); // close so the CLI sees EOF
        }

        let output = timeout(self.constraints.timeout, child.wait_with_output())
            .await
            .map_err(|_| ReasoningError::Timeout(self.constraints.timeout))?
            .map_err(|e| ReasoningError::Unavailable(format!("CLI execution failed: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(classify_cli_failure(&stderr).into());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let text = extract_response_text(&stdout)?;

        debug!(chars = text.len(), elapsed = ?start.elapsed(), "CLI completion received");

        Ok(Completion {
            text,
            model: self.constraints.model.clone(),
            elapsed: start.elapsed(),
        })
    }

    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Cli
    }

    fn describe(&self) -> String {
        format!("cli ({}, {})", self.binary, self.constraints.model)
    }
}

/// `<binary> --version` under a short timeout, run once at construction.
async fn probe_binary(binary: &str) -> Result<()> {
    let probe = Command::new(binary)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .output();

    let output = timeout(
        Duration::from_secs(constants::VERSION_PROBE_TIMEOUT_SECS),
        probe,
    )
    .await
    .map_err(|_| ReasoningError::BinaryMissing(format!("{}: version probe timed out", binary)))?
    .map_err(|e| ReasoningError::BinaryMissing(format!("{}: {}", binary, e)))?;

    if !output.status.success() {
        return Err(ReasoningError::BinaryMissing(format!(
            "{}: version probe exited with {}",
            binary, output.status
        ))
        .into());
    }

    let version = String::from_utf8_lossy(&output.stdout);
    info!(binary = %binary, version = %version.trim(), "Reasoning CLI available");
    Ok(())
}

/// Accept either the structured form `{"response": "..."}` or raw text.
fn extract_response_text(stdout: &str) -> Result<String> {
    if let Ok(value) = serde_json::from_str::<Value>(stdout)
        && let Some(response) = value.get("response").and_then(|v| v.as_str())
    {
        if response.trim().is_empty() {
            return Err(
                ReasoningError::MalformedOutput("empty response field".to_string()).into(),
            );
        }
        return Ok(response.to_string());
    }

    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(ReasoningError::MalformedOutput("CLI produced no output".to_string()).into());
    }
    Ok(trimmed.to_string())
}

fn classify_cli_failure(stderr: &str) -> ReasoningError {
    let lower = stderr.to_lowercase();
    if lower.contains("rate limit") || lower.contains("429") {
        ReasoningError::RateLimited { retry_after: None }
    } else if lower.contains("unauthorized") || lower.contains("not logged in") {
        ReasoningError::Unauthorized(stderr.trim().to_string())
    } else {
        ReasoningError::Unavailable(stderr.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_response_text_structured() {
        let out = r#"{"response": "the repo uses a cargo workspace"}"#;
        assert_eq!(
            extract_response_text(out).unwrap(),
            "the repo uses a cargo workspace"
        );
    }

    #[test]
    fn test_extract_response_text_raw() {
        assert_eq!(extract_response_text("plain answer\n").unwrap(), "plain answer");
    }

    #[test]
    fn test_extract_response_text_empty_is_malformed() {
        assert!(extract_response_text("   \n").is_err());
        assert!(extract_response_text(r#"{"response": ""}"#).is_err());
    }

    #[test]
    fn test_classify_cli_failure() {
        assert_eq!(
            classify_cli_failure("error: rate limit exceeded"),
            ReasoningError::RateLimited { retry_after: None }
        );
        assert!(matches!(
            classify_cli_failure("error: not logged in"),
            ReasoningError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_cli_failure("error: upstream unavailable"),
            ReasoningError::Unavailable(_)
        ));
    }

    #[tokio::test]
    async fn test_probe_missing_binary() {
        let err = probe_binary("repoprobe-definitely-missing-binary").await.unwrap_err();
        assert!(matches!(
            err,
            crate::types::ProbeError::Reasoning(ReasoningError::BinaryMissing(_))
        ));
    }

    #[cfg(unix)]
    mod fake_cli {
        use super::*;
        use std::os::unix::fs::PermissionsExt;
        use std::path::Path;

        fn install_fake(dir: &Path, script: &str) -> String {
            let path = dir.join("fake-reasoner");
            std::fs::write(&path, script).unwrap();
            let mut perms = std::fs::metadata(&path).unwrap().permissions();
            perms.set_mode(0o755);
            std::fs::set_permissions(&path, perms).unwrap();
            path.to_string_lossy().into_owned()
        }

        fn config_for(binary: String) -> ReasoningConfig {
            ReasoningConfig {
                mode: ReasoningMode::Cli,
                cli_binary: Some(binary),
                ..ReasoningConfig::default()
            }
        }

        #[tokio::test]
        async fn test_complete_parses_json_response() {
            let dir = tempfile::tempdir().unwrap();
            let binary = install_fake(
                dir.path(),
                "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 1.0.0; exit 0; fi\n\
                 cat > /dev/null\necho '{\"response\": \"stdin consumed\"}'\n",
            );

            let client = CliReasoningClient::new(
                &config_for(binary),
                CompletionConstraints::default(),
            )
            .await
            .unwrap();

            let completion = client.complete("what does this repo do").await.unwrap();
            assert_eq!(completion.text, "stdin consumed");
            assert_eq!(client.mode(), ReasoningMode::Cli);
        }

        #[tokio::test]
        async fn test_nonzero_exit_classified_from_stderr() {
            let dir = tempfile::tempdir().unwrap();
            let binary = install_fake(
                dir.path(),
                "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 1.0.0; exit 0; fi\n\
                 cat > /dev/null\necho 'rate limit exceeded' >&2\nexit 1\n",
            );

            let client = CliReasoningClient::new(
                &config_for(binary),
                CompletionConstraints::default(),
            )
            .await
            .unwrap();

            let err = client.complete("prompt").await.unwrap_err();
            assert!(matches!(
                err,
                crate::types::ProbeError::Reasoning(ReasoningError::RateLimited { .. })
            ));
        }

        #[tokio::test]
        async fn test_construction_fails_on_broken_probe() {
            let dir = tempfile::tempdir().unwrap();
            let binary = install_fake(dir.path(), "#!/bin/sh\nexit 3\n");

            let result =
                CliReasoningClient::new(&config_for(binary), CompletionConstraints::default())
                    .await;
            assert!(result.is_err());
        }

        #[tokio::test]
        async fn test_slow_cli_times_out() {
            let dir = tempfile::tempdir().unwrap();
            let binary = install_fake(
                dir.path(),
                "#!/bin/sh\nif [ \"$1\" = \"--version\" ]; then echo 1.0.0; exit 0; fi\n\
                 cat > /dev/null\nsleep 5\necho done\n",
            );

            let constraints = CompletionConstraints {
                timeout: Duration::from_millis(200),
                ..CompletionConstraints::default()
            };
            let client = CliReasoningClient::unprobed(binary, constraints);

            let err = client.complete("prompt").await.unwrap_err();
            assert!(matches!(
                err,
                crate::types::ProbeError::Reasoning(ReasoningError::Timeout(_))
            ));
        }
    }
}
