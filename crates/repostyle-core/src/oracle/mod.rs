//! Language-model oracle
//!
//! The oracle is the only non-deterministic collaborator of the engine. It is
//! modelled as a capability: given chat messages it returns text, and the
//! provided `propose_rules` turns that text into rule candidates. Tests swap
//! the network transport for fixed-response fakes.
//!
//! # Response format
//!
//! The model is asked for a strict JSON array of rule objects. In practice
//! models also wrap the array in Markdown code fences or in an object with a
//! `rules` key; both forms are accepted. Anything else is malformed.

pub mod azure;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::contracts::{is_valid_rule_id, Autofix, LineRange, Severity};

pub use azure::{AzureOpenAiOracle, OracleConfig, OracleConfigBuilder};

/// Oracle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Oracle not configured: missing {0}")]
    NotConfigured(String),

    #[error("Oracle transport error: {0}")]
    Transport(String),

    #[error("Oracle returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Oracle call timed out after {0}s")]
    Timeout(u64),

    #[error("Oracle response had no content")]
    EmptyResponse,

    #[error("Malformed oracle response: {0}")]
    MalformedResponse(String),

    #[error("Invalid rule candidate: {0}")]
    InvalidCandidate(String),
}

impl OracleError {
    /// Whether retrying the same request cannot succeed
    pub fn is_permanent(&self) -> bool {
        match self {
            OracleError::Status { status, .. } => {
                matches!(status, 400 | 401 | 403 | 404 | 422)
            }
            OracleError::NotConfigured(_)
            | OracleError::MalformedResponse(_)
            | OracleError::InvalidCandidate(_) => true,
            OracleError::Transport(_) | OracleError::Timeout(_) | OracleError::EmptyResponse => {
                false
            }
        }
    }
}

/// Chat message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Evidence as proposed by the model; the hash is recomputed locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateEvidence {
    pub path: String,
    pub lines: LineRange,
}

/// A rule proposed by the oracle, before defaults are filled in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCandidate {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub statement: String,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub scope: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    pub severity: Severity,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<CandidateEvidence>,
    #[serde(default)]
    pub autofix: Option<Autofix>,
    #[serde(default)]
    pub related_rules: Vec<String>,
}

impl RuleCandidate {
    fn check(&self, index: usize) -> Result<(), OracleError> {
        if self.id.trim().is_empty() {
            return Err(OracleError::InvalidCandidate(format!(
                "rule {} has an empty id",
                index
            )));
        }
        if !is_valid_rule_id(&self.id) {
            return Err(OracleError::InvalidCandidate(format!(
                "rule id '{}' is not a code like PY-LOG-001",
                self.id
            )));
        }
        if self.statement.trim().is_empty() {
            return Err(OracleError::InvalidCandidate(format!(
                "rule '{}' has an empty statement",
                self.id
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(OracleError::InvalidCandidate(format!(
                "rule '{}' has confidence {} outside [0, 1]",
                self.id, self.confidence
            )));
        }
        Ok(())
    }
}

/// Text-completion capability used by the extractor
#[async_trait]
pub trait Oracle: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &str;

    /// Complete a chat and return the assistant's text
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError>;

    /// Complete a chat and parse the reply as rule candidates
    async fn propose_rules(
        &self,
        messages: &[ChatMessage],
    ) -> Result<Vec<RuleCandidate>, OracleError> {
        let text = self.complete(messages).await?;
        parse_rule_candidates(&text)
    }
}

/// Parse a model reply into candidates.
///
/// One schema-violating entry rejects the whole reply.
pub fn parse_rule_candidates(text: &str) -> Result<Vec<RuleCandidate>, OracleError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(OracleError::EmptyResponse);
    }

    let document: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| OracleError::MalformedResponse(format!("not JSON: {}", e)))?;

    let items = match document {
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map) => match map.remove("rules") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(OracleError::MalformedResponse(
                    "expected a JSON array of rules".to_string(),
                ))
            }
        },
        _ => {
            return Err(OracleError::MalformedResponse(
                "expected a JSON array of rules".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let candidate: RuleCandidate = serde_json::from_value(item).map_err(|e| {
                OracleError::InvalidCandidate(format!("rule {}: {}", index, e))
            })?;
            candidate.check(index)?;
            Ok(candidate)
        })
        .collect()
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. ```json) up to the first newline.
    let rest = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
