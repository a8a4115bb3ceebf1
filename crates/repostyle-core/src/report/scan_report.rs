//! Machine-readable scan report written next to the contract

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::contracts::{Contract, RepoIdentity, Severity};
use crate::engine::{DroppedRule, FileFailure, SynthesisOutcome};
use crate::error::Result;
use crate::store::write_atomic;

/// Rule counts of the synthesized contract
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractSummary {
    pub rule_count: usize,
    pub by_severity: BTreeMap<Severity, usize>,
}

impl ContractSummary {
    pub fn of(contract: &Contract) -> Self {
        let mut by_severity = BTreeMap::new();
        for severity in [Severity::Info, Severity::Warn, Severity::Error] {
            by_severity.insert(severity, 0);
        }
        for rule in &contract.rules {
            *by_severity.entry(rule.severity).or_insert(0) += 1;
        }
        Self {
            rule_count: contract.rules.len(),
            by_severity,
        }
    }
}

/// Summary of one synthesis run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub run_id: Uuid,
    pub repo: RepoIdentity,
    pub generated_at: DateTime<Utc>,
    pub contract_path: String,
    pub contract_summary: ContractSummary,
    pub metrics: BTreeMap<String, serde_json::Value>,
    pub dropped_duplicates: Vec<DroppedRule>,
    pub oracle_failures: Vec<FileFailure>,
    pub failed_scanners: Vec<String>,
    /// Prometheus text exposition of the run's counters
    pub prometheus: String,
}

impl ScanReport {
    pub fn from_outcome(outcome: &SynthesisOutcome, contract_path: &Path) -> Result<Self> {
        Ok(Self {
            run_id: Uuid::new_v4(),
            repo: outcome.contract.repo.clone(),
            generated_at: outcome.contract.generated_at,
            contract_path: contract_path.display().to_string(),
            contract_summary: ContractSummary::of(&outcome.contract),
            metrics: outcome.contract.metrics.clone().unwrap_or_default(),
            dropped_duplicates: outcome.dropped.clone(),
            oracle_failures: outcome
                .extraction
                .as_ref()
                .map(|e| e.failures.clone())
                .unwrap_or_default(),
            failed_scanners: outcome.bundle.failed_scanners.clone(),
            prometheus: outcome.metrics.encode_text()?,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        write_atomic(path, self.to_json()?.as_bytes())?;
        tracing::info!(path = %path.display(), "Scan report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{ContractBuilder, Signal};
    use crate::engine::SynthesisEngine;
    use crate::signals::config::KIND_BLACK_LINE_LENGTH;
    use crate::signals::ScanBundle;

    #[tokio::test]
    async fn test_report_shape() {
        let dir = tempfile::tempdir().unwrap();
        let engine = SynthesisEngine::new(ContractBuilder::new().unwrap()).unwrap();
        let bundle = ScanBundle {
            signals: vec![Signal::new(KIND_BLACK_LINE_LENGTH, 88, "pyproject.toml", (1, 1), 1.0)],
            ..Default::default()
        };
        let outcome = engine
            .synthesize_from(dir.path(), RepoIdentity::local("abc"), bundle)
            .await
            .unwrap();

        let report = ScanReport::from_outcome(&outcome, Path::new("repostyle.contract.yaml")).unwrap();
        let path = dir.path().join("repostyle.report.json");
        report.write(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["repo"]["sha"], "abc");
        assert_eq!(json["runId"].as_str().unwrap().len(), 36);
        assert_eq!(json["contractSummary"]["ruleCount"], 1);
        assert_eq!(json["contractSummary"]["bySeverity"]["error"], 1);
        assert_eq!(json["contractSummary"]["bySeverity"]["info"], 0);
        assert_eq!(json["metrics"]["deterministicRules"], 1);
        assert!(json["generatedAt"].is_string());
        assert!(json["prometheus"]
            .as_str()
            .unwrap()
            .contains("repostyle_rules_total"));
        assert_eq!(json["droppedDuplicates"], serde_json::json!([]));
    }
}
