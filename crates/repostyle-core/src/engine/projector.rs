//! Deterministic signal-to-rule projection
//!
//! A closed table keyed by signal kind. Each entry turns one signal into at
//! most one rule with a fixed id and fixed confidence. Kinds without an entry
//! are ignored. The same input always produces the same output.

use std::collections::HashMap;

use crate::contracts::{Autofix, Rule, Severity, Signal};
use crate::error::{RepostyleError, Result};
use crate::signals::config::{KIND_BLACK_LINE_LENGTH, KIND_PRETTIER_PRESENT, KIND_TSCONFIG_STRICT};
use crate::signals::python::{KIND_TEST_PYTEST, KIND_TYPING_DENSITY};
use crate::signals::typescript::KIND_EXPORT_ANY_COUNT;

/// Version of the projection table below
pub const PROJECTION_TABLE_VERSION: u32 = 1;

/// Minimum `py.typing.density` that counts as a typing convention
pub const TYPING_DENSITY_THRESHOLD: f64 = 0.5;

const TS_SCOPE: &[&str] = &["**/*.ts", "**/*.tsx"];

/// One row of the projection table
#[derive(Debug, Clone, Copy)]
pub struct Projection {
    pub kind: &'static str,
    pub rule_id: &'static str,
    /// Builds the rule, or `None` when the signal value fails the predicate
    pub project: fn(&Signal) -> Option<Rule>,
}

fn black_line_length(signal: &Signal) -> Option<Rule> {
    let length = signal.value.as_u64().filter(|v| *v > 0)?;
    Some(
        Rule::new(
            "PY-FMT-001",
            format!("Black formatting at line length {}", length),
            format!(
                "Python code MUST be formatted with Black using a line length of {}.",
                length
            ),
            Severity::Error,
            0.95,
        )
        .with_rationale(format!("Declared in {}.", signal.source.path))
        .with_scope(["**/*.py"])
        .with_languages(["python"])
        .with_evidence(signal.evidence())
        .with_autofix(Autofix::command(format!("black --line-length {} .", length))),
    )
}

fn tsconfig_strict(signal: &Signal) -> Option<Rule> {
    if signal.value.as_bool() != Some(true) {
        return None;
    }
    Some(
        Rule::new(
            "TS-TYPE-003",
            "TypeScript strict mode",
            "TypeScript code MUST compile with the `strict` compiler option enabled.",
            Severity::Error,
            0.85,
        )
        .with_rationale("tsconfig.json enables strict mode.")
        .with_scope(TS_SCOPE.iter().copied())
        .with_languages(["typescript"])
        .with_evidence(signal.evidence()),
    )
}

fn exported_any(signal: &Signal) -> Option<Rule> {
    signal.value.as_u64().filter(|count| *count > 0)?;
    Some(
        Rule::new(
            "TS-TYPE-004",
            "No `any` in exported declarations",
            "Exported TypeScript declarations SHOULD NOT use the `any` type.",
            Severity::Warn,
            0.70,
        )
        .with_scope(TS_SCOPE.iter().copied())
        .with_languages(["typescript"])
        .with_evidence(signal.evidence())
        .with_related("TS-TYPE-003"),
    )
}

fn prettier_present(signal: &Signal) -> Option<Rule> {
    if signal.value.as_bool() != Some(true) {
        return None;
    }
    Some(
        Rule::new(
            "TS-FMT-001",
            "Prettier formatting",
            "TypeScript and JavaScript code MUST be formatted with Prettier.",
            Severity::Error,
            0.90,
        )
        .with_rationale(format!("Prettier is configured in {}.", signal.source.path))
        .with_scope(["**/*.ts", "**/*.tsx", "**/*.js", "**/*.jsx"])
        .with_languages(["typescript", "javascript"])
        .with_evidence(signal.evidence())
        .with_autofix(Autofix::command("prettier --write .")),
    )
}

fn typing_density(signal: &Signal) -> Option<Rule> {
    signal
        .value
        .as_f64()
        .filter(|density| *density >= TYPING_DENSITY_THRESHOLD)?;
    Some(
        Rule::new(
            "PY-TYPE-001",
            "Annotate function return types",
            "Python functions SHOULD declare return type annotations.",
            Severity::Warn,
            0.60,
        )
        .with_scope(["**/*.py"])
        .with_languages(["python"])
        .with_evidence(signal.evidence()),
    )
}

fn pytest(signal: &Signal) -> Option<Rule> {
    if signal.value.as_bool() != Some(true) {
        return None;
    }
    Some(
        Rule::new(
            "PY-TEST-001",
            "pytest test suite",
            "Python tests SHOULD be written as pytest test functions.",
            Severity::Info,
            0.70,
        )
        .with_scope(["tests/**/*.py", "**/test_*.py"])
        .with_languages(["python"])
        .with_evidence(signal.evidence()),
    )
}

/// The built-in projection table
pub fn default_table() -> Vec<Projection> {
    vec![
        Projection {
            kind: KIND_BLACK_LINE_LENGTH,
            rule_id: "PY-FMT-001",
            project: black_line_length,
        },
        Projection {
            kind: KIND_TSCONFIG_STRICT,
            rule_id: "TS-TYPE-003",
            project: tsconfig_strict,
        },
        Projection {
            kind: KIND_EXPORT_ANY_COUNT,
            rule_id: "TS-TYPE-004",
            project: exported_any,
        },
        Projection {
            kind: KIND_PRETTIER_PRESENT,
            rule_id: "TS-FMT-001",
            project: prettier_present,
        },
        Projection {
            kind: KIND_TYPING_DENSITY,
            rule_id: "PY-TYPE-001",
            project: typing_density,
        },
        Projection {
            kind: KIND_TEST_PYTEST,
            rule_id: "PY-TEST-001",
            project: pytest,
        },
    ]
}

/// Deterministic rule projector
#[derive(Debug, Clone)]
pub struct Projector {
    by_kind: HashMap<&'static str, Projection>,
}

impl Projector {
    /// Projector over the built-in table
    pub fn new() -> Result<Self> {
        Self::with_table(default_table())
    }

    /// Projector over an explicit table. Two kinds sharing a rule id is fatal.
    pub fn with_table(table: Vec<Projection>) -> Result<Self> {
        let mut owners: HashMap<&'static str, &'static str> = HashMap::new();
        let mut by_kind = HashMap::new();

        for entry in table {
            if let Some(first) = owners.insert(entry.rule_id, entry.kind) {
                if first != entry.kind {
                    return Err(RepostyleError::DuplicateProjectionId {
                        id: entry.rule_id.to_string(),
                        first: first.to_string(),
                        second: entry.kind.to_string(),
                    });
                }
            }
            if by_kind.insert(entry.kind, entry).is_some() {
                return Err(RepostyleError::InternalError(format!(
                    "projection table lists kind '{}' twice",
                    entry.kind
                )));
            }
        }
        Ok(Self { by_kind })
    }

    /// Project signals into rules, preserving signal order
    pub fn project(&self, signals: &[Signal]) -> Vec<Rule> {
        signals
            .iter()
            .filter_map(|signal| {
                let entry = self.by_kind.get(signal.kind.as_str())?;
                let rule = (entry.project)(signal);
                if rule.is_none() {
                    tracing::trace!(kind = %signal.kind, value = %signal.value, "Signal failed projection predicate");
                }
                rule
            })
            .collect()
    }

    /// Rule ids this projector can emit, sorted
    pub fn rule_ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<_> = self.by_kind.values().map(|p| p.rule_id).collect();
        ids.sort();
        ids
    }
}
