//! Azure OpenAI chat-completions transport
//!
//! Features:
//! - Explicit configuration (read from the environment only at the edge)
//! - Retry with exponential backoff on transient failures
//! - Deterministic sampling (`temperature = 0`)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::fmt;
use std::time::Duration;
use tokio::time::sleep;

use super::{ChatMessage, Oracle, OracleError};

pub const ENV_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const ENV_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";

pub const DEFAULT_API_VERSION: &str = "2024-06-01";

/// Connection settings for an Azure OpenAI deployment
#[derive(Clone)]
pub struct OracleConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    pub endpoint: String,
    pub api_key: String,
    pub deployment: String,
    pub api_version: String,

    /// Per-request HTTP timeout in seconds
    pub request_timeout_secs: u64,

    /// Maximum retry attempts
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    pub max_backoff_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl fmt::Debug for OracleConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OracleConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .field("deployment", &self.deployment)
            .field("api_version", &self.api_version)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl OracleConfig {
    /// Builder starting from defaults
    pub fn builder() -> OracleConfigBuilder {
        OracleConfigBuilder::default()
    }

    /// Read `AZURE_OPENAI_*` variables.
    ///
    /// Fails with `NotConfigured` naming every missing variable.
    pub fn from_env() -> Result<Self, OracleError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as `from_env` over an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, OracleError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let mut builder = Self::builder();
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            builder = builder.endpoint(endpoint);
        }
        if let Some(key) = get(ENV_API_KEY) {
            builder = builder.api_key(key);
        }
        if let Some(deployment) = get(ENV_DEPLOYMENT) {
            builder = builder.deployment(deployment);
        }
        if let Some(version) = get(ENV_API_VERSION) {
            builder = builder.api_version(version);
        }
        builder.build()
    }

    /// Full chat-completions URL for this deployment
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

/// Builder for `OracleConfig`
#[derive(Debug, Clone)]
pub struct OracleConfigBuilder {
    endpoint: Option<String>,
    api_key: Option<String>,
    deployment: Option<String>,
    api_version: String,
    request_timeout_secs: u64,
    max_retries: u32,
    initial_backoff_ms: u64,
    max_backoff_ms: u64,
    backoff_multiplier: f64,
}

impl Default for OracleConfigBuilder {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            deployment: None,
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout_secs: 60,
            max_retries: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 8000,
            backoff_multiplier: 2.0,
        }
    }
}

impl OracleConfigBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    /// Set retry configuration
    pub fn retry_config(mut self, max_retries: u32, initial_backoff_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.initial_backoff_ms = initial_backoff_ms;
        self
    }

    pub fn max_backoff_ms(mut self, backoff: u64) -> Self {
        self.max_backoff_ms = backoff;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Build the config; endpoint, key and deployment are required
    pub fn build(self) -> Result<OracleConfig, OracleError> {
        let mut missing = Vec::new();
        if self.endpoint.is_none() {
            missing.push(ENV_ENDPOINT);
        }
        if self.api_key.is_none() {
            missing.push(ENV_API_KEY);
        }
        if self.deployment.is_none() {
            missing.push(ENV_DEPLOYMENT);
        }

        match (self.endpoint, self.api_key, self.deployment) {
            (Some(endpoint), Some(api_key), Some(deployment)) => Ok(OracleConfig {
                endpoint,
                api_key,
                deployment,
                api_version: self.api_version,
                request_timeout_secs: self.request_timeout_secs,
                max_retries: self.max_retries,
                initial_backoff_ms: self.initial_backoff_ms,
                max_backoff_ms: self.max_backoff_ms,
                backoff_multiplier: self.backoff_multiplier,
            }),
            _ => Err(OracleError::NotConfigured(missing.join(", "))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

/// Oracle backed by an Azure OpenAI deployment
pub struct AzureOpenAiOracle {
    client: Client,
    config: OracleConfig,
}

impl AzureOpenAiOracle {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &OracleConfig {
        &self.config
    }

    async fn send_once(&self, url: &str, payload: &serde_json::Value) -> Result<String, OracleError> {
        let response = self
            .client
            .post(url)
            .header("api-key", &self.config.api_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout(self.config.request_timeout_secs)
                } else {
                    OracleError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body: truncate(&body, 320),
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| OracleError::MalformedResponse(format!("invalid completion body: {}", e)))?;

        let text = body
            .choices
            .first()
            .map(|choice| extract_text(&choice.message.content))
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(OracleError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl Oracle for AzureOpenAiOracle {
    fn name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        let url = self.config.completions_url();
        let payload = json!({
            "messages": messages,
            "temperature": 0,
        });

        let mut last_error = None;
        let mut backoff_ms = self.config.initial_backoff_ms;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tracing::debug!(attempt, backoff_ms, "Retrying oracle request");
                sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms as f64 * self.config.backoff_multiplier) as u64;
                backoff_ms = backoff_ms.min(self.config.max_backoff_ms);
            }

            match self.send_once(&url, &payload).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "Oracle request failed");
                    let permanent = e.is_permanent();
                    last_error = Some(e);
                    if permanent {
                        break;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(OracleError::EmptyResponse))
    }
}

fn extract_text(content: &serde_json::Value) -> String {
    match content {
        serde_json::Value::String(text) => text.clone(),
        serde_json::Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(serde_json::Value::as_str))
            .collect::<Vec<_>>()
            .join("\n"),
        _ => String::new(),
    }
}

fn truncate(value: &str, max_chars: usize) -> String {
    let mut chars = value.chars();
    let truncated: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{}...", truncated)
    } else {
        truncated
    }
}
