//! Contract definitions for repostyle
//!
//! This module defines the data model shared by every stage of synthesis:
//! the raw `Signal` observations emitted by scanners, the `Rule` records the
//! engine produces, and the versioned `Contract` that is persisted and later
//! re-loaded read-only by the check, suggest and report surfaces.
//!
//! # Design Principles
//!
//! - **Provenance**: every rule carries at least one `Evidence` citation
//! - **Stable identity**: rule ids are fixed codes, never content hashes
//! - **Wholesale replacement**: a contract is never patched in place

pub mod builder;
pub mod schema;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

pub use builder::ContractBuilder;
pub use schema::{ContractSchema, Violation};

/// Schema version stamped on every contract
pub const SCHEMA_VERSION: &str = "1.0";

/// Inclusive 1-based line range `(start, end)`
pub type LineRange = (u32, u32);

/// Where a signal was observed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSource {
    /// Repository-relative path, `/`-separated
    pub path: String,
    /// Line range the observation covers
    pub lines: LineRange,
}

/// An atomic, typed observation about a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Dotted taxonomy key, e.g. `config.black.lineLength`
    pub kind: String,
    /// Scalar value of the observation
    pub value: serde_json::Value,
    /// Provenance of the observation
    pub source: SignalSource,
    /// Source-assigned weight
    pub weight: f64,
}

impl Signal {
    /// Create a new signal
    pub fn new(
        kind: impl Into<String>,
        value: impl Into<serde_json::Value>,
        path: impl Into<String>,
        lines: LineRange,
        weight: f64,
    ) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
            source: SignalSource {
                path: path.into(),
                lines,
            },
            weight,
        }
    }

    /// Evidence citing this signal's source
    pub fn evidence(&self) -> Evidence {
        Evidence::at(&self.source.path, self.source.lines)
    }
}

/// A path + line-range citation backing a rule
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub path: String,
    pub lines: LineRange,
    /// Stable hash of `path:start-end`; identifies where, not what
    pub snippet_hash: String,
}

impl Evidence {
    /// Build evidence for a location, computing its snippet hash
    pub fn at(path: impl Into<String>, lines: LineRange) -> Self {
        let path = path.into();
        let snippet_hash = snippet_hash(&path, lines);
        Self {
            path,
            lines,
            snippet_hash,
        }
    }
}

/// Stable location hash: first 16 hex chars of SHA-256 over `path:start-end`
pub fn snippet_hash(path: &str, lines: LineRange) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}-{}", path, lines.0, lines.1).as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Closed severity enum for rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational convention
    Info,
    /// Should be followed
    Warn,
    /// Must be followed
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warn => write!(f, "warn"),
            Severity::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "info" => Ok(Severity::Info),
            "warn" | "warning" => Ok(Severity::Warn),
            "error" => Ok(Severity::Error),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// Autofix payload attached to a rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Autofix {
    /// Kind of fix; `command` means `details` is a literal shell command
    pub kind: String,
    pub details: String,
}

impl Autofix {
    /// A literally executable command
    pub fn command(details: impl Into<String>) -> Self {
        Self {
            kind: "command".to_string(),
            details: details.into(),
        }
    }
}

/// A synthesized, citable coding-convention statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    /// Unique prefixed code, e.g. `PY-FMT-001`
    pub id: String,
    pub title: String,
    /// Single testable MUST/SHOULD sentence
    pub statement: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Glob patterns the rule applies to
    pub scope: Vec<String>,
    pub languages: Vec<String>,
    pub severity: Severity,
    /// Confidence in [0, 1]
    pub confidence: f64,
    /// Non-empty list of citations
    pub evidence: Vec<Evidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autofix: Option<Autofix>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_rules: Vec<String>,
}

impl Rule {
    /// Create a rule with empty scope, languages and evidence
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        statement: impl Into<String>,
        severity: Severity,
        confidence: f64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            statement: statement.into(),
            rationale: None,
            scope: Vec::new(),
            languages: Vec::new(),
            severity,
            confidence,
            evidence: Vec::new(),
            autofix: None,
            related_rules: Vec::new(),
        }
    }

    pub fn with_scope<I, S>(mut self, scope: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = scope.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_evidence(mut self, evidence: Evidence) -> Self {
        self.evidence.push(evidence);
        self
    }

    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    pub fn with_autofix(mut self, autofix: Autofix) -> Self {
        self.autofix = Some(autofix);
        self
    }

    pub fn with_related(mut self, id: impl Into<String>) -> Self {
        self.related_rules.push(id.into());
        self
    }

    /// Check the per-rule invariants, returning every breach.
    ///
    /// Mirrors the `rule` definition of the bundled schema so a single rule
    /// can be rejected before it reaches contract assembly.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.id.trim().is_empty() {
            problems.push("id must not be empty".to_string());
        } else if !is_valid_rule_id(&self.id) {
            problems.push(format!(
                "{}: id must match ^[A-Za-z0-9][A-Za-z0-9_-]*$",
                self.id
            ));
        }
        if self.title.trim().is_empty() {
            problems.push(format!("{}: title must not be empty", self.id));
        }
        if self.statement.trim().is_empty() {
            problems.push(format!("{}: statement must not be empty", self.id));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            problems.push(format!(
                "{}: confidence {} is outside [0, 1]",
                self.id, self.confidence
            ));
        }
        if self.evidence.is_empty() {
            problems.push(format!("{}: evidence must not be empty", self.id));
        }
        if self
            .evidence
            .iter()
            .any(|e| e.path.is_empty() || e.snippet_hash.is_empty())
        {
            problems.push(format!("{}: evidence needs a path and a snippet hash", self.id));
        }
        if self.scope.is_empty() {
            problems.push(format!("{}: scope must not be empty", self.id));
        }
        if self.scope.iter().any(String::is_empty) {
            problems.push(format!("{}: scope patterns must not be empty", self.id));
        }
        if let Some(autofix) = &self.autofix {
            if autofix.kind.is_empty() || autofix.details.is_empty() {
                problems.push(format!("{}: autofix needs a kind and details", self.id));
            }
        }
        problems
    }

    /// Path of the first evidence entry
    pub fn primary_path(&self) -> Option<&str> {
        self.evidence.first().map(|e| e.path.as_str())
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({:.2}): {}",
            self.severity, self.id, self.confidence, self.statement
        )
    }
}

/// Rule ids are ASCII codes such as `PY-LOG-001`
pub fn is_valid_rule_id(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        }
        _ => false,
    }
}

/// Identity of the scanned repository snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
    pub sha: String,
}

impl RepoIdentity {
    pub fn local(sha: impl Into<String>) -> Self {
        Self {
            remote: None,
            sha: sha.into(),
        }
    }

    pub fn remote(remote: impl Into<String>, sha: impl Into<String>) -> Self {
        Self {
            remote: Some(remote.into()),
            sha: sha.into(),
        }
    }
}

/// The versioned, persisted aggregate of all rules for one snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub schema_version: String,
    pub repo: RepoIdentity,
    pub generated_at: DateTime<Utc>,
    pub rules: Vec<Rule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<BTreeMap<String, serde_json::Value>>,
}

impl Contract {
    /// Look up a rule by id
    pub fn rule(&self, id: &str) -> Option<&Rule> {
        self.rules.iter().find(|r| r.id == id)
    }

    /// Union of the languages named by any rule, sorted
    pub fn languages(&self) -> Vec<String> {
        let mut langs: Vec<String> = self
            .rules
            .iter()
            .flat_map(|r| r.languages.iter().cloned())
            .collect();
        langs.sort();
        langs.dedup();
        langs
    }
}
