//! Output formatting for the repostyle CLI
//!
//! JSON and YAML for machines, colored tables for people. Tables go to
//! stdout; logs stay on stderr.

use clap::ValueEnum;
use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

use repostyle_core::engine::{DroppedRule, FileFailure, SynthesisOutcome};
use repostyle_core::runtime::{CheckReport, RuleStatus, Suggestion};
use repostyle_core::{RepostyleError, Severity};

/// Output format options for CLI results
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum OutputFormat {
    /// Human-readable table format with colors
    #[default]
    Table,
    /// JSON format for machine processing
    Json,
    /// YAML format
    Yaml,
}

/// Render `value` as JSON or YAML, or through `table` for the table format
pub fn render<T, F>(value: &T, format: OutputFormat, table: F) -> Result<(), RepostyleError>
where
    T: Serialize,
    F: FnOnce(&T),
{
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
        OutputFormat::Table => table(value),
    }
    Ok(())
}

/// One row of the scan summary
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleRow {
    pub id: String,
    pub severity: Severity,
    pub confidence: f64,
    pub statement: String,
}

/// What `scan` reports on stdout
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanSummary {
    pub repo: String,
    pub sha: String,
    pub contract_path: String,
    pub report_path: String,
    pub rules: Vec<RuleRow>,
    pub metrics: BTreeMap<String, serde_json::Value>,
    pub dropped_duplicates: Vec<DroppedRule>,
    pub oracle_failures: Vec<FileFailure>,
    pub failed_scanners: Vec<String>,
    pub oracle_used: bool,
}

impl ScanSummary {
    pub fn new(outcome: &SynthesisOutcome, contract_path: &Path, report_path: &Path) -> Self {
        let contract = &outcome.contract;
        Self {
            repo: contract
                .repo
                .remote
                .clone()
                .unwrap_or_else(|| "local".to_string()),
            sha: contract.repo.sha.clone(),
            contract_path: contract_path.display().to_string(),
            report_path: report_path.display().to_string(),
            rules: contract
                .rules
                .iter()
                .map(|r| RuleRow {
                    id: r.id.clone(),
                    severity: r.severity,
                    confidence: r.confidence,
                    statement: r.statement.clone(),
                })
                .collect(),
            metrics: contract.metrics.clone().unwrap_or_default(),
            dropped_duplicates: outcome.dropped.clone(),
            oracle_failures: outcome
                .extraction
                .as_ref()
                .map(|e| e.failures.clone())
                .unwrap_or_default(),
            failed_scanners: outcome.bundle.failed_scanners.clone(),
            oracle_used: outcome.extraction.is_some(),
        }
    }

    pub fn render_table(&self) {
        let mut stdout = io::stdout();

        writeln!(stdout).ok();
        writeln!(stdout, "{}", "Scan Results".cyan().bold()).ok();
        writeln!(stdout, "{}", "=".repeat(60)).ok();
        writeln!(stdout, "Repo:     {} @ {}", self.repo, self.sha.dimmed()).ok();
        writeln!(stdout, "Contract: {}", self.contract_path).ok();
        writeln!(stdout, "Report:   {}", self.report_path).ok();
        if !self.oracle_used {
            writeln!(stdout, "Oracle:   {}", "not used (deterministic rules only)".yellow()).ok();
        }
        writeln!(stdout).ok();

        if self.rules.is_empty() {
            writeln!(stdout, "{} No conventions detected", "!".yellow()).ok();
        } else {
            writeln!(stdout, "{}", "Rules:".cyan().bold()).ok();
            writeln!(stdout, "{}", "-".repeat(60)).ok();
            for rule in &self.rules {
                writeln!(
                    stdout,
                    "  {} {} {:.2}  {}",
                    severity_label(rule.severity),
                    format!("{:<14}", rule.id).bold(),
                    rule.confidence,
                    rule.statement
                )
                .ok();
            }
        }

        if !self.dropped_duplicates.is_empty() || !self.oracle_failures.is_empty() {
            writeln!(stdout).ok();
            writeln!(stdout, "{}", "Notes:".cyan().bold()).ok();
            for dropped in &self.dropped_duplicates {
                writeln!(
                    stdout,
                    "  {} duplicate {} dropped ({})",
                    "!".yellow(),
                    dropped.id,
                    dropped.path.as_deref().unwrap_or("n/a")
                )
                .ok();
            }
            for failure in &self.oracle_failures {
                writeln!(
                    stdout,
                    "  {} {}: {}",
                    "x".red(),
                    failure.path,
                    failure.reason.dimmed()
                )
                .ok();
            }
        }
        for scanner in &self.failed_scanners {
            writeln!(stdout, "  {} scanner '{}' failed", "x".red(), scanner).ok();
        }

        stdout.flush().ok();
    }
}

/// Fixed-width colored severity label
pub fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Error => "ERROR".red().bold(),
        Severity::Warn => "WARN ".yellow().bold(),
        Severity::Info => "INFO ".blue(),
    }
}

fn status_label(status: RuleStatus) -> ColoredString {
    match status {
        RuleStatus::Pass => "PASS".green().bold(),
        RuleStatus::Fail => "FAIL".red().bold(),
        RuleStatus::Skipped => "SKIP".dimmed(),
        RuleStatus::Error => "ERR ".yellow().bold(),
    }
}

pub fn render_check_table(report: &CheckReport) {
    let mut stdout = io::stdout();

    writeln!(stdout).ok();
    writeln!(stdout, "{}", "Check Results".cyan().bold()).ok();
    writeln!(stdout, "{}", "=".repeat(60)).ok();

    for command in &report.commands {
        let icon = if command.succeeded() { "+".green() } else { "x".red() };
        writeln!(
            stdout,
            "  {} {} {}",
            icon,
            command.command,
            format_duration(command.duration_ms).dimmed()
        )
        .ok();
    }
    writeln!(stdout).ok();

    for rule in &report.rules {
        writeln!(
            stdout,
            "  {} {} {:<14} {}",
            status_label(rule.status),
            severity_label(rule.severity),
            rule.id,
            rule.message.as_deref().unwrap_or("")
        )
        .ok();
    }
    writeln!(stdout).ok();

    let summary = format!(
        "{} passed, {} failed, {} skipped, {} errored",
        report.count(RuleStatus::Pass),
        report.count(RuleStatus::Fail),
        report.count(RuleStatus::Skipped),
        report.count(RuleStatus::Error)
    );
    if report.has_violations {
        writeln!(stdout, "{} {}", "x".red(), summary).ok();
    } else {
        writeln!(stdout, "{} {}", "+".green(), summary).ok();
    }
    stdout.flush().ok();
}

pub fn render_suggestions(suggestions: &[Suggestion], applied: bool) {
    let mut stdout = io::stdout();
    if suggestions.is_empty() {
        writeln!(stdout, "{} Config already matches the contract", "+".green()).ok();
        return;
    }

    let heading = if applied {
        "Applied changes"
    } else {
        "Suggested changes (dry run)"
    };
    writeln!(stdout, "{}", heading.cyan().bold()).ok();
    for suggestion in suggestions {
        writeln!(
            stdout,
            "\n{} {}: {}",
            "->".blue(),
            suggestion.rule_id.bold(),
            suggestion.description
        )
        .ok();
        for line in suggestion.diff().lines() {
            let line = if line.starts_with('+') && !line.starts_with("+++") {
                line.green()
            } else if line.starts_with('-') && !line.starts_with("---") {
                line.red()
            } else {
                line.dimmed()
            };
            writeln!(stdout, "{}", line).ok();
        }
    }
    stdout.flush().ok();
}

pub fn print_written(path: &Path, what: &str) {
    println!("{} Wrote {} ({})", "+".green(), path.display(), what);
}

/// Format a duration in human-readable format
pub fn format_duration(ms: u64) -> String {
    if ms >= 60000 {
        let minutes = ms / 60000;
        let seconds = (ms % 60000) / 1000;
        format!("{}m {}s", minutes, seconds)
    } else if ms >= 1000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}
