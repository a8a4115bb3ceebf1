//! Rule-to-command projection
//!
//! Maps each rule to the local verification commands its id prefix implies.
//! The mapping is total: unknown prefixes map to no commands.

use crate::contracts::Rule;

const PREFIX_COMMANDS: &[(&str, &[&str])] = &[
    ("PY-FMT", &["black --check ."]),
    ("PY-TYPE", &["mypy ."]),
    (
        "TS-TYPE",
        &[
            "tsc -p tsconfig.json --noEmit",
            "eslint . --max-warnings 0",
            "prettier -c .",
        ],
    ),
    ("TS-FMT", &["prettier -c ."]),
];

/// Commands that verify `rule` locally, in execution order
pub fn rule_to_commands(rule: &Rule) -> Vec<String> {
    commands_for_id(&rule.id)
}

/// Commands for a bare rule id
pub fn commands_for_id(id: &str) -> Vec<String> {
    PREFIX_COMMANDS
        .iter()
        .find(|(prefix, _)| {
            id.strip_prefix(*prefix)
                .map(|rest| rest.is_empty() || rest.starts_with('-'))
                .unwrap_or(false)
        })
        .map(|(_, commands)| commands.iter().map(|c| c.to_string()).collect())
        .unwrap_or_default()
}

/// Commands for every rule, first-seen order, without repeats
pub fn canonical_commands(rules: &[Rule]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for command in rules.iter().flat_map(rule_to_commands) {
        if !out.contains(&command) {
            out.push(command);
        }
    }
    out
}

/// Canonical commands joined into one shell pipeline
pub fn canonical_command_block(rules: &[Rule]) -> String {
    canonical_commands(rules).join(" && ")
}
