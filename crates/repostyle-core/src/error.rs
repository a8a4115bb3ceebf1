//! Error types for repostyle
//!
//! Structural failures (schema violations, a broken projection table) are
//! fatal for a scan. Per-file and per-scanner failures never reach this type:
//! they are logged and skipped where they happen.

use thiserror::Error;

use crate::contracts::schema::Violation;

/// Main error type for repostyle operations
#[derive(Error, Debug)]
pub enum RepostyleError {
    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// File access or I/O error
    #[error("File error: {0}")]
    FileError(String),

    /// Parsing error for configuration or contract documents
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// The JSON schema itself could not be loaded or compiled
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// The assembled contract violates the schema
    #[error("Contract invalid: {} violation(s): {}", .0.len(), format_violations(.0))]
    SchemaViolation(Vec<Violation>),

    /// Two signal kinds in the projection table share a rule id
    #[error("Projection table maps both '{first}' and '{second}' to rule id '{id}'")]
    DuplicateProjectionId {
        id: String,
        first: String,
        second: String,
    },

    /// Repository materialization failure (git, clone, rev-parse)
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl RepostyleError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        RepostyleError::InvalidInput(msg.into())
    }

    /// Create a file error
    pub fn file_error(msg: impl Into<String>) -> Self {
        RepostyleError::FileError(msg.into())
    }

    /// Create a parse error
    pub fn parse_error(msg: impl Into<String>) -> Self {
        RepostyleError::ParseError(msg.into())
    }

    /// Create a repository error
    pub fn repository(msg: impl Into<String>) -> Self {
        RepostyleError::RepositoryError(msg.into())
    }

    /// Check if this is a user-facing error (vs a synthesis defect)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RepostyleError::InvalidInput(_)
                | RepostyleError::FileError(_)
                | RepostyleError::ParseError(_)
                | RepostyleError::RepositoryError(_)
        )
    }

    /// Violations carried by a schema failure, if any
    pub fn violations(&self) -> &[Violation] {
        match self {
            RepostyleError::SchemaViolation(v) => v,
            _ => &[],
        }
    }
}

impl From<std::io::Error> for RepostyleError {
    fn from(err: std::io::Error) -> Self {
        RepostyleError::FileError(err.to_string())
    }
}

impl From<serde_json::Error> for RepostyleError {
    fn from(err: serde_json::Error) -> Self {
        RepostyleError::ParseError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for RepostyleError {
    fn from(err: serde_yaml::Error) -> Self {
        RepostyleError::ParseError(format!("YAML error: {}", err))
    }
}

impl From<toml::de::Error> for RepostyleError {
    fn from(err: toml::de::Error) -> Self {
        RepostyleError::ParseError(format!("TOML error: {}", err))
    }
}

/// Result type alias for repostyle operations
pub type Result<T> = std::result::Result<T, RepostyleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RepostyleError::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "Invalid input: test error");
    }

    #[test]
    fn test_is_user_error() {
        assert!(RepostyleError::InvalidInput("test".to_string()).is_user_error());
        assert!(RepostyleError::FileError("test".to_string()).is_user_error());
        assert!(!RepostyleError::InternalError("test".to_string()).is_user_error());
        assert!(!RepostyleError::SchemaViolation(vec![]).is_user_error());
    }

    #[test]
    fn test_schema_violation_lists_every_entry() {
        let err = RepostyleError::SchemaViolation(vec![
            Violation::new("/rules/0/evidence", "[] has less than 1 item"),
            Violation::new("/rules/1/confidence", "1.5 is greater than the maximum of 1"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 violation(s)"));
        assert!(text.contains("/rules/0/evidence"));
        assert!(text.contains("/rules/1/confidence"));
        assert_eq!(err.violations().len(), 2);
    }

    #[test]
    fn test_duplicate_projection_display() {
        let err = RepostyleError::DuplicateProjectionId {
            id: "PY-FMT-001".to_string(),
            first: "config.black.lineLength".to_string(),
            second: "config.ruff.lineLength".to_string(),
        };
        assert!(err.to_string().contains("PY-FMT-001"));
    }
}
