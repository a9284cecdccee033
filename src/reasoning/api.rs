//! API Reasoning Client
//!
//! Network transport: Anthropic-style messages endpoint over HTTPS. The API
//! key is held in a `SecretString` and never appears in logs or debug output.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Completion, CompletionConstraints, ReasoningClient, check_prompt};
use crate::config::ReasoningConfig;
use crate::types::{ProbeError, ReasoningError, ReasoningMode, Result};

const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

pub struct ApiReasoningClient {
    api_key: SecretString,
    api_base: String,
    constraints: CompletionConstraints,
    client: reqwest::Client,
}

impl std::fmt::Debug for ApiReasoningClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiReasoningClient")
            .field("api_key", &"[REDACTED]")
            .field("api_base", &self.api_base)
            .field("model", &self.constraints.model)
            .finish()
    }
}

impl ApiReasoningClient {
    pub fn new(config: &ReasoningConfig, constraints: CompletionConstraints) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProbeError::Config(
                "API reasoning mode needs an API key. Set REPOPROBE_REASONING__API_KEY or \
                 reasoning.api_key in the config file"
                    .to_string(),
            )
        })?;

        let api_base = config
            .api_base
            .clone()
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        let client = reqwest::Client::builder()
            .timeout(constraints.timeout)
            .build()
            .map_err(|e| ProbeError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key: SecretString::from(api_key),
            api_base,
            constraints,
            client,
        })
    }

    fn build_request(&self, prompt: &str) -> MessagesRequest {
        MessagesRequest {
            model: self.constraints.model.clone(),
            max_tokens: self.constraints.max_output_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        }
    }
}

#[async_trait]
impl ReasoningClient for ApiReasoningClient {
    async fn complete(&self, prompt: &str) -> Result<Completion> {
        check_prompt(prompt)?;

        info!(model = %self.constraints.model, "Sending API completion request");
        let start = Instant::now();
        let url = format!("{}/v1/messages", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&self.build_request(prompt))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ReasoningError::Timeout(self.constraints.timeout)
                } else {
                    ReasoningError::Unavailable(format!("request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs);
            let body = response.text().await.unwrap_or_default();
            return Err(classify_http_failure(status, retry_after, &body).into());
        }

        let body: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ReasoningError::MalformedOutput(format!("invalid response body: {}", e)))?;

        let text: String = body
            .content
            .iter()
            .filter(|block| block.block_type == "text")
            .map(|block| block.text.as_str())
            .collect();

        if text.trim().is_empty() {
            return Err(
                ReasoningError::MalformedOutput("response contained no text content".to_string())
                    .into(),
            );
        }

        debug!(chars = text.len(), elapsed = ?start.elapsed(), "API completion received");

        Ok(Completion {
            text,
            model: body.model,
            elapsed: start.elapsed(),
        })
    }

    fn mode(&self) -> ReasoningMode {
        ReasoningMode::Api
    }

    fn describe(&self) -> String {
        format!("api ({}, {})", self.api_base, self.constraints.model)
    }
}

fn classify_http_failure(
    status: reqwest::StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> ReasoningError {
    use reqwest::StatusCode;
    match status {
        StatusCode::TOO_MANY_REQUESTS => ReasoningError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            ReasoningError::Unauthorized(format!("{}: {}", status, truncate(body, 200)))
        }
        s if s.is_server_error() => {
            ReasoningError::Unavailable(format!("{}: {}", status, truncate(body, 200)))
        }
        _ => ReasoningError::MalformedOutput(format!(
            "unexpected status {}: {}",
            status,
            truncate(body, 200)
        )),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// Wire types for the messages endpoint.

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiReasoningClient {
        let config = ReasoningConfig {
            mode: ReasoningMode::Api,
            api_key: Some("test-key".to_string()),
            ..ReasoningConfig::default()
        };
        ApiReasoningClient::new(&config, CompletionConstraints::default()).unwrap()
    }

    #[test]
    fn test_new_rejects_missing_key() {
        let config = ReasoningConfig {
            mode: ReasoningMode::Api,
            api_key: None,
            ..ReasoningConfig::default()
        };
        assert!(ApiReasoningClient::new(&config, CompletionConstraints::default()).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let rendered = format!("{:?}", client());
        assert!(rendered.contains("[REDACTED]"));
        assert!(!rendered.contains("test-key"));
    }

    #[test]
    fn test_classify_rate_limit_keeps_server_hint() {
        let err = classify_http_failure(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(17)),
            "",
        );
        assert_eq!(
            err,
            ReasoningError::RateLimited {
                retry_after: Some(Duration::from_secs(17))
            }
        );
    }

    #[test]
    fn test_classify_auth_and_server_errors() {
        assert!(matches!(
            classify_http_failure(reqwest::StatusCode::UNAUTHORIZED, None, "bad key"),
            ReasoningError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_http_failure(reqwest::StatusCode::SERVICE_UNAVAILABLE, None, "overloaded"),
            ReasoningError::Unavailable(_)
        ));
    }

    #[test]
    fn test_response_parsing_joins_text_blocks() {
        let raw = serde_json::json!({
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "part one "},
                {"type": "tool_use", "id": "x", "name": "y", "input": {}},
                {"type": "text", "text": "part two"}
            ]
        });
        let parsed: MessagesResponse = serde_json::from_value(raw).unwrap();
        let text: String = parsed
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect();
        assert_eq!(text, "part one part two");
    }

    #[test]
    fn test_mode_is_api() {
        assert_eq!(client().mode(), ReasoningMode::Api);
    }
}
