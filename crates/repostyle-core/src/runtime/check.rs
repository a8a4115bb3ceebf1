//! Contract verification
//!
//! Projects the contract to its canonical verification commands, runs each
//! one in the repository root and derives a status per rule from the exit
//! codes of that rule's commands.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::time::Instant;

use crate::contracts::{Contract, Severity};
use crate::engine::commands::{canonical_commands, rule_to_commands};

/// Exit code shells use for "command not found"
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

const OUTPUT_TAIL_CHARS: usize = 2000;

/// Outcome of one rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleStatus {
    Pass,
    Fail,
    /// No command verifies this rule
    Skipped,
    /// A command could not run (tool missing, spawn failure)
    Error,
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RuleStatus::Pass => "pass",
            RuleStatus::Fail => "fail",
            RuleStatus::Skipped => "skipped",
            RuleStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// Minimum severity of a failing rule that makes the check fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FailOn {
    Warn,
    #[default]
    Error,
    /// Never fail
    None,
}

impl FailOn {
    fn threshold(self) -> Option<Severity> {
        match self {
            FailOn::Warn => Some(Severity::Warn),
            FailOn::Error => Some(Severity::Error),
            FailOn::None => None,
        }
    }
}

impl std::str::FromStr for FailOn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "warn" | "warning" => Ok(FailOn::Warn),
            "error" => Ok(FailOn::Error),
            "none" => Ok(FailOn::None),
            _ => Err(format!("Unknown fail-on level: {}", s)),
        }
    }
}

/// Result of running one shell command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub command: String,
    /// `None` when the process could not be started or was killed by a signal
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub stdout_tail: String,
    pub stderr_tail: String,
}

impl CommandResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// The command could not run at all
    pub fn is_error(&self) -> bool {
        matches!(self.exit_code, None | Some(EXIT_COMMAND_NOT_FOUND))
    }
}

/// Status of one rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCheck {
    pub id: String,
    pub title: String,
    pub severity: Severity,
    pub status: RuleStatus,
    pub commands: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Result of checking a contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckReport {
    pub rules: Vec<RuleCheck>,
    pub commands: Vec<CommandResult>,
    pub fail_on: FailOn,
    pub has_violations: bool,
}

impl CheckReport {
    pub fn count(&self, status: RuleStatus) -> usize {
        self.rules.iter().filter(|r| r.status == status).count()
    }
}

/// Executes verification commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str, root: &Path) -> CommandResult;
}

/// Runs commands through `sh -c`
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellRunner;

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, root: &Path) -> CommandResult {
        let start = Instant::now();
        tracing::info!(command, root = %root.display(), "Running verification command");

        let output = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(root)
            .kill_on_drop(true)
            .output()
            .await;

        let duration_ms = start.elapsed().as_millis() as u64;
        match output {
            Ok(output) => CommandResult {
                command: command.to_string(),
                exit_code: output.status.code(),
                duration_ms,
                stdout_tail: tail(&String::from_utf8_lossy(&output.stdout)),
                stderr_tail: tail(&String::from_utf8_lossy(&output.stderr)),
            },
            Err(e) => CommandResult {
                command: command.to_string(),
                exit_code: None,
                duration_ms,
                stdout_tail: String::new(),
                stderr_tail: format!("failed to spawn: {}", e),
            },
        }
    }
}

fn tail(text: &str) -> String {
    let count = text.chars().count();
    if count <= OUTPUT_TAIL_CHARS {
        return text.to_string();
    }
    text.chars().skip(count - OUTPUT_TAIL_CHARS).collect()
}

/// Run every canonical command once, in order, then derive rule statuses.
///
/// All commands run even after a failure so every rule gets a status.
pub async fn run_checks(
    contract: &Contract,
    root: &Path,
    runner: &dyn CommandRunner,
    fail_on: FailOn,
) -> CheckReport {
    let mut results = Vec::new();
    for command in canonical_commands(&contract.rules) {
        let result = runner.run(&command, root).await;
        if !result.succeeded() {
            tracing::warn!(command = %result.command, exit_code = ?result.exit_code, "Verification command failed");
        }
        results.push(result);
    }
    let by_command: HashMap<&str, &CommandResult> =
        results.iter().map(|r| (r.command.as_str(), r)).collect();

    let rules: Vec<RuleCheck> = contract
        .rules
        .iter()
        .map(|rule| {
            let commands = rule_to_commands(rule);
            let outcomes: Vec<&CommandResult> = commands
                .iter()
                .filter_map(|c| by_command.get(c.as_str()).copied())
                .collect();

            let (status, message) = if commands.is_empty() {
                (RuleStatus::Skipped, Some("no local verifier".to_string()))
            } else if let Some(failed) = outcomes.iter().find(|r| r.is_error()) {
                (
                    RuleStatus::Error,
                    Some(format!("could not run `{}`", failed.command)),
                )
            } else if let Some(failed) = outcomes.iter().find(|r| !r.succeeded()) {
                (RuleStatus::Fail, Some(format!("`{}` failed", failed.command)))
            } else {
                (RuleStatus::Pass, None)
            };

            RuleCheck {
                id: rule.id.clone(),
                title: rule.title.clone(),
                severity: rule.severity,
                status,
                commands,
                message,
            }
        })
        .collect();

    let has_violations = match fail_on.threshold() {
        Some(threshold) => rules
            .iter()
            .any(|r| r.status == RuleStatus::Fail && r.severity >= threshold),
        None => false,
    };

    CheckReport {
        rules,
        commands: results,
        fail_on,
        has_violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Evidence, RepoIdentity, Rule};
    use chrono::Utc;
    use std::sync::Mutex;

    /// Fixed exit code per command, recording invocations
    struct FakeRunner {
        codes: HashMap<&'static str, i32>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &str, _root: &Path) -> CommandResult {
            self.calls.lock().unwrap().push(command.to_string());
            CommandResult {
                command: command.to_string(),
                exit_code: Some(*self.codes.get(command).unwrap_or(&0)),
                duration_ms: 1,
                stdout_tail: String::new(),
                stderr_tail: String::new(),
            }
        }
    }

    fn rule(id: &str, severity: Severity) -> Rule {
        Rule::new(id, id, "s", severity, 0.9)
            .with_scope(["**/*"])
            .with_evidence(Evidence::at("f", (1, 1)))
    }

    fn contract(rules: Vec<Rule>) -> Contract {
        Contract {
            schema_version: "1.0".to_string(),
            repo: RepoIdentity::local("abc"),
            generated_at: Utc::now(),
            rules,
            metrics: None,
        }
    }

    fn runner(codes: &[(&'static str, i32)]) -> FakeRunner {
        FakeRunner {
            codes: codes.iter().copied().collect(),
            calls: Mutex::new(Vec::new()),
        }
    }

    #[tokio::test]
    async fn test_statuses_from_exit_codes() {
        let contract = contract(vec![
            rule("PY-FMT-001", Severity::Error),
            rule("PY-TEST-001", Severity::Info),
            rule("PY-TYPE-001", Severity::Warn),
            rule("TS-FMT-001", Severity::Error),
        ]);
        let runner = runner(&[("black --check .", 1), ("mypy .", 127)]);

        let report = run_checks(&contract, Path::new("."), &runner, FailOn::Error).await;
        let status: HashMap<&str, RuleStatus> =
            report.rules.iter().map(|r| (r.id.as_str(), r.status)).collect();
        assert_eq!(status["PY-FMT-001"], RuleStatus::Fail);
        assert_eq!(status["PY-TEST-001"], RuleStatus::Skipped);
        assert_eq!(status["PY-TYPE-001"], RuleStatus::Error);
        assert_eq!(status["TS-FMT-001"], RuleStatus::Pass);
        assert!(report.has_violations);
    }

    #[tokio::test]
    async fn test_shared_commands_run_once() {
        let contract = contract(vec![
            rule("TS-FMT-001", Severity::Error),
            rule("TS-TYPE-003", Severity::Error),
        ]);
        let runner = runner(&[]);
        run_checks(&contract, Path::new("."), &runner, FailOn::Error).await;

        let calls = runner.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "prettier -c .",
                "tsc -p tsconfig.json --noEmit",
                "eslint . --max-warnings 0"
            ]
        );
    }

    #[tokio::test]
    async fn test_fail_on_threshold() {
        let contract = contract(vec![rule("PY-TYPE-001", Severity::Warn)]);
        let failing = runner(&[("mypy .", 1)]);

        let report = run_checks(&contract, Path::new("."), &failing, FailOn::Error).await;
        assert!(!report.has_violations);
        let report = run_checks(&contract, Path::new("."), &failing, FailOn::Warn).await;
        assert!(report.has_violations);
        let report = run_checks(&contract, Path::new("."), &failing, FailOn::None).await;
        assert!(!report.has_violations);
        assert_eq!(report.count(RuleStatus::Fail), 1);
    }

    #[tokio::test]
    async fn test_shell_runner_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let ok = ShellRunner.run("true", dir.path()).await;
        assert!(ok.succeeded());
        let missing = ShellRunner
            .run("definitely-not-a-real-tool-xyz", dir.path())
            .await;
        assert_eq!(missing.exit_code, Some(EXIT_COMMAND_NOT_FOUND));
        assert!(missing.is_error());
    }

    #[test]
    fn test_fail_on_parsing() {
        assert_eq!("warn".parse::<FailOn>().unwrap(), FailOn::Warn);
        assert_eq!("NONE".parse::<FailOn>().unwrap(), FailOn::None);
        assert!("sometimes".parse::<FailOn>().is_err());
    }
}
