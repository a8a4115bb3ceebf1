//! Minimal configuration changes that bring a repository in line with its
//! contract. Only rules with a mechanical config counterpart produce
//! suggestions; everything else is left to the verifiers.

use regex::Regex;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::contracts::{Contract, Rule};
use crate::error::{RepostyleError, Result};
use crate::store::write_atomic;

const RUFF_FILE: &str = "ruff.toml";
const TSCONFIG_FILE: &str = "tsconfig.json";

static LINE_LENGTH_FLAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--line-length[= ](\d+)").expect("line-length flag regex compiles"));

static FIRST_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{2,3})\b").expect("number regex compiles"));

static RUFF_LINE_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([ \t]*line-length\s*=\s*)(\d+)").expect("ruff line-length regex compiles")
});

/// A proposed whole-file replacement
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub rule_id: String,
    /// Repository-relative path
    pub path: PathBuf,
    pub description: String,
    /// Current content; `None` when the file would be created
    pub before: Option<String>,
    pub after: String,
}

impl Suggestion {
    /// Line diff between `before` and `after`
    pub fn diff(&self) -> String {
        let before: Vec<&str> = self.before.as_deref().unwrap_or("").lines().collect();
        let after: Vec<&str> = self.after.lines().collect();

        let old = match self.before {
            Some(_) => format!("a/{}", self.path.display()),
            None => "/dev/null".to_string(),
        };
        let mut out = format!("--- {}\n+++ b/{}\n", old, self.path.display());
        for line in &before {
            if !after.contains(line) {
                out.push_str(&format!("-{}\n", line));
            }
        }
        for line in &after {
            if !before.contains(line) {
                out.push_str(&format!("+{}\n", line));
            }
        }
        out
    }
}

/// Compute suggestions for `contract` against the tree at `root`
pub fn suggest(contract: &Contract, root: &Path) -> Result<Vec<Suggestion>> {
    let mut suggestions = Vec::new();
    for rule in &contract.rules {
        let suggestion = match rule.id.as_str() {
            "PY-FMT-001" => ruff_line_length(rule, root)?,
            "TS-TYPE-003" => tsconfig_strict(rule, root)?,
            _ => None,
        };
        if let Some(s) = suggestion {
            tracing::debug!(rule_id = %s.rule_id, path = %s.path.display(), "Suggestion computed");
            suggestions.push(s);
        }
    }
    Ok(suggestions)
}

/// Write every suggestion, returning the number of files changed
pub fn apply(suggestions: &[Suggestion], root: &Path) -> Result<usize> {
    for s in suggestions {
        let target = root.join(&s.path);
        write_atomic(&target, s.after.as_bytes())?;
        tracing::info!(rule_id = %s.rule_id, path = %target.display(), "Suggestion applied");
    }
    Ok(suggestions.len())
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match std::fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(RepostyleError::file_error(format!(
            "Failed to read '{}': {}",
            path.display(),
            e
        ))),
    }
}

/// Black line length named by the rule's autofix, else its statement
fn line_length(rule: &Rule) -> Option<u32> {
    rule.autofix
        .as_ref()
        .and_then(|a| LINE_LENGTH_FLAG.captures(&a.details))
        .or_else(|| FIRST_NUMBER.captures(&rule.statement))
        .and_then(|c| c[1].parse().ok())
}

fn ruff_line_length(rule: &Rule, root: &Path) -> Result<Option<Suggestion>> {
    let Some(length) = line_length(rule) else {
        tracing::warn!(rule_id = %rule.id, "No line length found in rule; skipping ruff suggestion");
        return Ok(None);
    };

    let before = read_optional(&root.join(RUFF_FILE))?;
    let after = match &before {
        None => format!("line-length = {}\n", length),
        Some(text) => match RUFF_LINE_LENGTH.captures(text) {
            Some(c) if c[2].parse::<u32>().ok() == Some(length) => return Ok(None),
            Some(_) => RUFF_LINE_LENGTH
                .replace(text, format!("${{1}}{}", length).as_str())
                .into_owned(),
            None => format!("line-length = {}\n{}", length, text),
        },
    };

    Ok(Some(Suggestion {
        rule_id: rule.id.clone(),
        path: PathBuf::from(RUFF_FILE),
        description: format!("Align ruff line-length with Black ({})", length),
        before,
        after,
    }))
}

fn tsconfig_strict(rule: &Rule, root: &Path) -> Result<Option<Suggestion>> {
    let Some(before) = read_optional(&root.join(TSCONFIG_FILE))? else {
        return Ok(None);
    };
    let mut value: serde_json::Value = match serde_json::from_str(&before) {
        Ok(v) => v,
        Err(e) => {
            // JSONC (comments, trailing commas) is left alone
            tracing::warn!(error = %e, "tsconfig.json is not plain JSON; skipping strict suggestion");
            return Ok(None);
        }
    };
    let Some(root_obj) = value.as_object_mut() else {
        return Ok(None);
    };

    let options = root_obj
        .entry("compilerOptions")
        .or_insert_with(|| serde_json::json!({}));
    let Some(options) = options.as_object_mut() else {
        return Ok(None);
    };
    if options.get("strict") == Some(&serde_json::Value::Bool(true)) {
        return Ok(None);
    }
    options.insert("strict".to_string(), serde_json::Value::Bool(true));

    let mut after = serde_json::to_string_pretty(&value)?;
    after.push('\n');
    Ok(Some(Suggestion {
        rule_id: rule.id.clone(),
        path: PathBuf::from(TSCONFIG_FILE),
        description: "Enable compilerOptions.strict".to_string(),
        before: Some(before),
        after,
    }))
}
