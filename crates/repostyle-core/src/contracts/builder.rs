//! Contract assembly and validation
//!
//! The builder is the last stage of synthesis. It stamps the schema version
//! and generation time, then validates the whole document. A contract that
//! fails validation is never returned, so it can never be persisted.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};

use super::schema::{ContractSchema, Violation};
use super::{Contract, RepoIdentity, Rule, SCHEMA_VERSION};
use crate::error::{RepostyleError, Result};

/// Assembles and validates contracts
#[derive(Debug)]
pub struct ContractBuilder {
    schema: ContractSchema,
}

impl ContractBuilder {
    /// Builder validating against the bundled schema
    pub fn new() -> Result<Self> {
        Ok(Self::with_schema(ContractSchema::bundled()?))
    }

    /// Builder validating against a specific schema
    pub fn with_schema(schema: ContractSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &ContractSchema {
        &self.schema
    }

    /// Assemble a contract stamped with the current time
    pub fn build(
        &self,
        repo: RepoIdentity,
        rules: Vec<Rule>,
        metrics: Option<BTreeMap<String, serde_json::Value>>,
    ) -> Result<Contract> {
        self.build_at(repo, rules, metrics, Utc::now())
    }

    /// Assemble a contract with an explicit generation time
    pub fn build_at(
        &self,
        repo: RepoIdentity,
        rules: Vec<Rule>,
        metrics: Option<BTreeMap<String, serde_json::Value>>,
        generated_at: DateTime<Utc>,
    ) -> Result<Contract> {
        let contract = Contract {
            schema_version: SCHEMA_VERSION.to_string(),
            repo,
            generated_at,
            rules,
            metrics,
        };
        self.validate(&contract)?;

        tracing::debug!(
            rules = contract.rules.len(),
            schema = self.schema.source(),
            "Contract assembled and validated"
        );
        Ok(contract)
    }

    /// Validate an existing contract (e.g. one re-loaded from disk)
    pub fn validate(&self, contract: &Contract) -> Result<()> {
        let document = serde_json::to_value(contract)
            .map_err(|e| RepostyleError::SerializationError(e.to_string()))?;

        let mut violations = self.schema.validate(&document);
        violations.extend(duplicate_id_violations(&contract.rules));

        if violations.is_empty() {
            Ok(())
        } else {
            tracing::error!(
                count = violations.len(),
                "Contract failed schema validation"
            );
            Err(RepostyleError::SchemaViolation(violations))
        }
    }
}

/// Rule ids must be unique; JSON Schema cannot express that per property
fn duplicate_id_violations(rules: &[Rule]) -> Vec<Violation> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| !seen.insert(rule.id.as_str()))
        .map(|(index, rule)| {
            Violation::new(
                format!("/rules/{}/id", index),
                format!("duplicate rule id '{}'", rule.id),
            )
        })
        .collect()
}
