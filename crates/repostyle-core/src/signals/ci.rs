//! CI definition scanner
//!
//! Collects the shell commands a repository's CI runs. These signals have no
//! deterministic projection; they exist so the extractor reads the CI files.

use serde_yaml::Value;
use std::path::Path;

use super::{collect_files, line_at, read_text, ScanError, SignalScanner};
use crate::contracts::Signal;

pub const KIND_CI_RUN_COMMAND: &str = "ci.run.command";

const COMMAND_KEYS: &[&str] = &["run", "script", "before_script", "after_script"];

/// Scanner for GitHub Actions, GitLab CI and Azure Pipelines definitions
#[derive(Debug, Default, Clone, Copy)]
pub struct CiScanner;

fn is_ci_file(rel: &str) -> bool {
    let workflow = rel.starts_with(".github/workflows/")
        && (rel.ends_with(".yml") || rel.ends_with(".yaml"));
    workflow || rel == ".gitlab-ci.yml" || rel == "azure-pipelines.yml"
}

impl SignalScanner for CiScanner {
    fn name(&self) -> &'static str {
        "ci"
    }

    fn scan(&self, root: &Path, max_files: Option<usize>) -> Result<Vec<Signal>, ScanError> {
        let files = collect_files(root, max_files.unwrap_or(super::DEFAULT_MAX_FILES), is_ci_file)?;

        let mut signals = Vec::new();
        for file in &files {
            let text = read_text(file)?;
            let doc: Value = match serde_yaml::from_str(&text) {
                Ok(doc) => doc,
                Err(e) => {
                    tracing::warn!(file = %file.rel, error = %e, "Unparseable CI definition");
                    continue;
                }
            };

            let mut commands = Vec::new();
            collect_commands(&doc, &mut commands);

            let mut cursor = 0;
            for command in commands {
                // Search forward so repeated commands get distinct lines.
                let line = match text[cursor..].find(&command) {
                    Some(pos) => {
                        cursor += pos + command.len();
                        line_at(&text, cursor - command.len())
                    }
                    None => 1,
                };
                signals.push(Signal::new(
                    KIND_CI_RUN_COMMAND,
                    command,
                    &file.rel,
                    (line, line),
                    0.5,
                ));
            }
        }
        Ok(signals)
    }
}

fn collect_commands(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let is_command_key = key
                    .as_str()
                    .map(|k| COMMAND_KEYS.contains(&k))
                    .unwrap_or(false);
                if is_command_key {
                    push_command_lines(child, out);
                } else {
                    collect_commands(child, out);
                }
            }
        }
        Value::Sequence(items) => items.iter().for_each(|item| collect_commands(item, out)),
        _ => {}
    }
}

fn push_command_lines(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(script) => out.extend(
            script
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        ),
        Value::Sequence(items) => items.iter().for_each(|item| push_command_lines(item, out)),
        _ => {}
    }
}
