//! AGENTS.md rendering
//!
//! Turns a contract into the operating manual a coding agent reads before
//! touching the repository. Rules at or above [`ENFORCED_CONFIDENCE`] are
//! listed as enforced, the rest as candidates.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use crate::contracts::{Contract, Evidence, Rule};
use crate::engine::commands::{canonical_command_block, rule_to_commands};
use crate::error::Result;
use crate::store::write_atomic;

/// Confidence at which a rule becomes blocking
pub const ENFORCED_CONFIDENCE: f64 = 0.55;

const POSTURE: &[&str] = &[
    "Produce the smallest diff possible. Do not refactor unless a rule mandates it.",
    "Do not alter CI or publishing unless a rule mandates it.",
    "Prefer existing patterns over new libraries.",
];

/// Render AGENTS.md for `contract`, citing `source` as the contract file
pub fn render(contract: &Contract, source: &Path) -> Result<String> {
    let mut rules: Vec<&Rule> = contract.rules.iter().collect();
    rules.sort_by(|a, b| a.id.cmp(&b.id));
    let (enforced, candidates): (Vec<&Rule>, Vec<&Rule>) = rules
        .into_iter()
        .partition(|r| r.confidence >= ENFORCED_CONFIDENCE);

    let mut out = String::new();
    out.push_str("# AGENTS.md\n\n");

    out.push_str("## Repository Context\n\n");
    let languages = contract.languages();
    writeln!(out, "- Repo: {}", contract.repo.remote.as_deref().unwrap_or("local")).ok();
    writeln!(out, "- Commit: {}", contract.repo.sha).ok();
    writeln!(
        out,
        "- Languages: {}",
        if languages.is_empty() {
            "none detected".to_string()
        } else {
            languages.join(", ")
        }
    )
    .ok();
    writeln!(
        out,
        "- Rules: {} enforced, {} candidate\n",
        enforced.len(),
        candidates.len()
    )
    .ok();

    out.push_str("## Operating Posture\n\n");
    for line in POSTURE {
        writeln!(out, "- {}", line).ok();
    }
    out.push('\n');

    out.push_str("## Enforced Rules\n\n");
    if enforced.is_empty() {
        out.push_str("No rules meet the enforcement threshold.\n\n");
    }
    for rule in &enforced {
        render_rule(&mut out, rule);
    }

    out.push_str("## Candidate Rules\n\n");
    if candidates.is_empty() {
        out.push_str("None.\n");
    }
    for rule in &candidates {
        writeln!(
            out,
            "- {}: {} ({})",
            rule.id,
            rule.statement,
            rule.primary_path().unwrap_or("n/a")
        )
        .ok();
    }
    out.push('\n');

    out.push_str("## Verification\n\n");
    let block = canonical_command_block(&enforced.iter().map(|r| (*r).clone()).collect::<Vec<_>>());
    if block.is_empty() {
        out.push_str("No local verifiers apply.\n\n");
    } else {
        writeln!(out, "```bash\n{}\n```\n", block).ok();
    }

    out.push_str("## Provenance Map\n\n");
    let provenance: BTreeMap<&str, &Vec<Evidence>> = contract
        .rules
        .iter()
        .map(|r| (r.id.as_str(), &r.evidence))
        .collect();
    writeln!(out, "```json\n{}\n```\n", serde_json::to_string_pretty(&provenance)?).ok();

    writeln!(
        out,
        "Last generated: {} | Source: {}",
        contract.generated_at.to_rfc3339(),
        source.display()
    )
    .ok();
    Ok(out)
}

fn render_rule(out: &mut String, rule: &Rule) {
    writeln!(out, "### {}: {}\n", rule.id, rule.title).ok();
    writeln!(out, "**Statement:** {}  ", rule.statement).ok();
    writeln!(out, "**Scope:** {}  ", rule.scope.join(", ")).ok();
    writeln!(
        out,
        "**Severity:** {} | **Confidence:** {:.2}\n",
        rule.severity, rule.confidence
    )
    .ok();
    if let Some(rationale) = &rule.rationale {
        writeln!(out, "**Rationale:** {}\n", rationale).ok();
    }

    out.push_str("**Local verification:**\n\n");
    let commands = rule_to_commands(rule);
    if commands.is_empty() {
        out.push_str("No local verifier.\n\n");
    } else {
        writeln!(out, "```bash\n{}\n```\n", commands.join(" && ")).ok();
    }

    writeln!(
        out,
        "**Autofix:** {}\n",
        rule.autofix
            .as_ref()
            .map(|a| format!("`{}`", a.details))
            .unwrap_or_else(|| "n/a".to_string())
    )
    .ok();

    let provenance: Vec<String> = rule
        .evidence
        .iter()
        .map(|e| format!("{}#L{}-L{} ({})", e.path, e.lines.0, e.lines.1, e.snippet_hash))
        .collect();
    writeln!(out, "**Provenance:** {}\n", provenance.join(", ")).ok();
}

/// Render and atomically write AGENTS.md
pub fn write(contract: &Contract, source: &Path, out: &Path) -> Result<()> {
    let text = render(contract, source)?;
    write_atomic(out, text.as_bytes())?;
    tracing::info!(path = %out.display(), rules = contract.rules.len(), "AGENTS.md written");
    Ok(())
}
