//! SARIF 2.1.0 output for `check`
//!
//! Every contract rule becomes a reporting descriptor. Failing rules become
//! results at their severity's level; rules whose verifier could not run
//! become `note` results. Passing and skipped rules produce nothing.

use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

use crate::contracts::{Contract, Rule, Severity};
use crate::error::Result;
use crate::runtime::check::{CheckReport, RuleCheck, RuleStatus};
use crate::store::write_atomic;

pub const SARIF_VERSION: &str = "2.1.0";
pub const SARIF_SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";

#[derive(Debug, Serialize)]
pub struct SarifLog {
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub version: &'static str,
    pub runs: Vec<Run>,
}

#[derive(Debug, Serialize)]
pub struct Run {
    pub tool: Tool,
    pub results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
pub struct Tool {
    pub driver: Driver,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    pub name: &'static str,
    pub version: &'static str,
    pub rules: Vec<ReportingDescriptor>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingDescriptor {
    pub id: String,
    pub name: String,
    pub short_description: Message,
    pub default_configuration: Configuration,
    pub properties: DescriptorProperties,
}

#[derive(Debug, Serialize)]
pub struct Configuration {
    pub level: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DescriptorProperties {
    pub confidence: f64,
    pub scope: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct Message {
    pub text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SarifResult {
    pub rule_id: String,
    pub level: &'static str,
    pub message: Message,
    pub locations: Vec<Location>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    pub physical_location: PhysicalLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalLocation {
    pub artifact_location: ArtifactLocation,
    pub region: Region,
}

#[derive(Debug, Serialize)]
pub struct ArtifactLocation {
    pub uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Region {
    pub start_line: u32,
    pub end_line: u32,
}

/// SARIF level for a rule severity
pub fn level(severity: Severity) -> &'static str {
    match severity {
        Severity::Error => "error",
        Severity::Warn => "warning",
        Severity::Info => "note",
    }
}

fn locations(rule: Option<&Rule>) -> Vec<Location> {
    rule.map(|r| {
        r.evidence
            .iter()
            .map(|e| Location {
                physical_location: PhysicalLocation {
                    artifact_location: ArtifactLocation { uri: e.path.clone() },
                    region: Region {
                        start_line: e.lines.0,
                        end_line: e.lines.1,
                    },
                },
            })
            .collect()
    })
    .unwrap_or_default()
}

fn result_for(check: &RuleCheck, rule: Option<&Rule>) -> Option<SarifResult> {
    let (level, text) = match check.status {
        RuleStatus::Fail => (
            level(check.severity),
            format!(
                "{}: {}",
                rule.map(|r| r.statement.as_str()).unwrap_or(&check.title),
                check.message.as_deref().unwrap_or("verification failed")
            ),
        ),
        RuleStatus::Error => (
            "note",
            format!(
                "Rule could not be verified: {}",
                check.message.as_deref().unwrap_or("verifier unavailable")
            ),
        ),
        RuleStatus::Pass | RuleStatus::Skipped => return None,
    };
    Some(SarifResult {
        rule_id: check.id.clone(),
        level,
        message: Message { text },
        locations: locations(rule),
    })
}

/// Build a SARIF log from a check report
pub fn build(contract: &Contract, report: &CheckReport) -> SarifLog {
    let by_id: HashMap<&str, &Rule> = contract.rules.iter().map(|r| (r.id.as_str(), r)).collect();

    let rules = contract
        .rules
        .iter()
        .map(|r| ReportingDescriptor {
            id: r.id.clone(),
            name: r.title.clone(),
            short_description: Message {
                text: r.statement.clone(),
            },
            default_configuration: Configuration {
                level: level(r.severity),
            },
            properties: DescriptorProperties {
                confidence: r.confidence,
                scope: r.scope.clone(),
            },
        })
        .collect();

    let results = report
        .rules
        .iter()
        .filter_map(|check| result_for(check, by_id.get(check.id.as_str()).copied()))
        .collect();

    SarifLog {
        schema: SARIF_SCHEMA,
        version: SARIF_VERSION,
        runs: vec![Run {
            tool: Tool {
                driver: Driver {
                    name: "repostyle",
                    version: crate::VERSION,
                    rules,
                },
            },
            results,
        }],
    }
}

pub fn to_json(contract: &Contract, report: &CheckReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(&build(contract, report))?)
}

pub fn write(contract: &Contract, report: &CheckReport, path: &Path) -> Result<()> {
    write_atomic(path, to_json(contract, report)?.as_bytes())?;
    tracing::info!(path = %path.display(), "SARIF written");
    Ok(())
}
