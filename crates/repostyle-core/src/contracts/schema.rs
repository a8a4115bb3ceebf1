//! JSON Schema validation for contracts
//!
//! The schema ships with the crate (`schema/contract.schema.json`) and can be
//! replaced by an external document. Validation always collects the full
//! list of violations rather than stopping at the first.

use jsonschema::{Draft, Validator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{RepostyleError, Result};

/// Bundled contract schema document
pub const BUNDLED_SCHEMA: &str = include_str!("../../schema/contract.schema.json");

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// JSON pointer to the offending value (empty for the root)
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "/" } else { &self.path };
        write!(f, "{}: {}", path, self.message)
    }
}

/// Compiled contract schema
pub struct ContractSchema {
    validator: Validator,
    source: String,
}

impl fmt::Debug for ContractSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractSchema")
            .field("source", &self.source)
            .finish()
    }
}

impl ContractSchema {
    /// Compile the schema bundled with the crate
    pub fn bundled() -> Result<Self> {
        Self::compile(BUNDLED_SCHEMA, "bundled")
    }

    /// Load and compile an external schema document
    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            RepostyleError::file_error(format!(
                "Failed to read schema file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::compile(&raw, &path.display().to_string())
    }

    fn compile(raw: &str, source: &str) -> Result<Self> {
        let document: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| RepostyleError::SchemaError(format!("Invalid schema JSON: {}", e)))?;
        let validator = jsonschema::options()
            .with_draft(Draft::Draft7)
            .build(&document)
            .map_err(|e| RepostyleError::SchemaError(format!("Cannot compile schema: {}", e)))?;
        Ok(Self {
            validator,
            source: source.to_string(),
        })
    }

    /// Where the schema came from (`bundled` or a file path)
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Validate a candidate document, returning every violation
    pub fn validate(&self, instance: &serde_json::Value) -> Vec<Violation> {
        self.validator
            .iter_errors(instance)
            .map(|err| Violation::new(err.instance_path.to_string(), err.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_contract() -> serde_json::Value {
        json!({
            "schemaVersion": "1.0",
            "repo": { "sha": "abc123" },
            "generatedAt": "2024-01-01T00:00:00Z",
            "rules": [{
                "id": "PY-FMT-001",
                "title": "Black line length 88",
                "statement": "Python code MUST be formatted by Black with line length 88.",
                "scope": ["**/*.py"],
                "languages": ["python"],
                "severity": "error",
                "confidence": 0.95,
                "evidence": [{ "path": "pyproject.toml", "lines": [1, 1], "snippetHash": "abcd" }],
                "autofix": { "kind": "command", "details": "black --line-length 88 ." }
            }]
        })
    }

    #[test]
    fn test_bundled_schema_compiles() {
        let schema = ContractSchema::bundled().unwrap();
        assert_eq!(schema.source(), "bundled");
    }

    #[test]
    fn test_valid_contract_passes() {
        let schema = ContractSchema::bundled().unwrap();
        assert!(schema.validate(&valid_contract()).is_empty());
    }

    #[test]
    fn test_all_violations_are_collected() {
        let schema = ContractSchema::bundled().unwrap();
        let mut doc = valid_contract();
        doc["rules"][0]["evidence"] = json!([]);
        doc["rules"][0]["confidence"] = json!(1.7);
        doc["rules"][0]["severity"] = json!("fatal");

        let violations = schema.validate(&doc);
        assert!(violations.len() >= 3, "got {:?}", violations);
        assert!(violations.iter().any(|v| v.path == "/rules/0/evidence"));
        assert!(violations.iter().any(|v| v.path == "/rules/0/confidence"));
        assert!(violations.iter().any(|v| v.path == "/rules/0/severity"));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let schema = ContractSchema::bundled().unwrap();
        let mut doc = valid_contract();
        doc.as_object_mut().unwrap().remove("repo");
        assert!(!schema.validate(&doc).is_empty());
    }

    #[test]
    fn test_null_autofix_is_allowed() {
        let schema = ContractSchema::bundled().unwrap();
        let mut doc = valid_contract();
        doc["rules"][0]["autofix"] = serde_json::Value::Null;
        assert!(schema.validate(&doc).is_empty());
    }

    #[test]
    fn test_external_schema_errors_surface() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = ContractSchema::from_path(&path).unwrap_err();
        assert!(matches!(err, RepostyleError::SchemaError(_)));

        let missing = ContractSchema::from_path(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(missing, RepostyleError::FileError(_)));
    }
}
