//! Rule deduplication
//!
//! Identity is the rule id alone. The first occurrence of an id wins and
//! every later one is dropped with a warning. Output is sorted by id.

use serde::Serialize;
use std::collections::HashSet;

use crate::contracts::Rule;

/// A rule discarded because an earlier rule had the same id
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedRule {
    pub id: String,
    pub statement: String,
    /// Path of the dropped rule's first evidence entry
    pub path: Option<String>,
}

/// Result of deduplication
#[derive(Debug, Clone, Default)]
pub struct DedupeOutcome {
    pub rules: Vec<Rule>,
    pub dropped: Vec<DroppedRule>,
}

/// Deduplicate rules by id (first wins), sorted by id ascending
pub fn dedupe_rules(rules: Vec<Rule>) -> DedupeOutcome {
    let mut seen = HashSet::new();
    let mut outcome = DedupeOutcome::default();

    for rule in rules {
        if seen.contains(&rule.id) {
            tracing::warn!(
                rule_id = %rule.id,
                statement = %rule.statement,
                path = rule.primary_path().unwrap_or(""),
                "Dropping duplicate rule"
            );
            outcome.dropped.push(DroppedRule {
                id: rule.id.clone(),
                statement: rule.statement.clone(),
                path: rule.primary_path().map(str::to_string),
            });
            continue;
        }
        seen.insert(rule.id.clone());
        outcome.rules.push(rule);
    }

    // Stable sort; ids are unique here so order is total.
    outcome.rules.sort_by(|a, b| a.id.cmp(&b.id));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::{Evidence, Severity};
    use proptest::prelude::*;

    fn rule(id: &str, statement: &str, path: &str) -> Rule {
        Rule::new(id, "t", statement, Severity::Warn, 0.7)
            .with_scope(["**/*.ts"])
            .with_evidence(Evidence::at(path, (1, 1)))
    }

    #[test]
    fn test_first_occurrence_wins() {
        let outcome = dedupe_rules(vec![
            rule("TS-TYPE-004", "first", "src/a.ts"),
            rule("TS-TYPE-004", "second", "src/b.ts"),
        ]);
        assert_eq!(outcome.rules.len(), 1);
        assert_eq!(outcome.rules[0].statement, "first");
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].path.as_deref(), Some("src/b.ts"));
    }

    #[test]
    fn test_same_id_different_statement_is_a_duplicate() {
        let outcome = dedupe_rules(vec![
            rule("PY-FMT-001", "Black at 88", "pyproject.toml"),
            rule("PY-FMT-001", "Use Black", "src/app.py"),
        ]);
        assert_eq!(outcome.rules.len(), 1);
    }

    #[test]
    fn test_output_sorted_by_id() {
        let outcome = dedupe_rules(vec![
            rule("TS-TYPE-003", "s", "a"),
            rule("PY-FMT-001", "s", "a"),
            rule("PY-TEST-001", "s", "a"),
        ]);
        let ids: Vec<&str> = outcome.rules.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["PY-FMT-001", "PY-TEST-001", "TS-TYPE-003"]);
        assert!(outcome.dropped.is_empty());
    }

    fn arb_rules() -> impl Strategy<Value = Vec<Rule>> {
        prop::collection::vec(("[A-C]-[0-3]", "[a-z]{1,6}"), 0..20).prop_map(|pairs| {
            pairs
                .into_iter()
                .map(|(id, statement)| rule(&id, &statement, "f.py"))
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_dedupe_is_idempotent(rules in arb_rules()) {
            let once = dedupe_rules(rules).rules;
            let twice = dedupe_rules(once.clone());
            prop_assert_eq!(&once, &twice.rules);
            prop_assert!(twice.dropped.is_empty());
        }

        #[test]
        fn prop_output_is_sorted_and_unique(rules in arb_rules()) {
            let total = rules.len();
            let outcome = dedupe_rules(rules);
            prop_assert!(outcome.rules.windows(2).all(|w| w[0].id < w[1].id));
            prop_assert_eq!(outcome.rules.len() + outcome.dropped.len(), total);
        }

        #[test]
        fn prop_unique_ids_are_permutation_invariant(
            ids in prop::collection::btree_set("[A-Z]{2}-[0-9]{3}", 0..15),
            seed in any::<u64>(),
        ) {
            let rules: Vec<Rule> = ids.iter().map(|id| rule(id, "s", "f.py")).collect();
            let mut shuffled = rules.clone();
            // Deterministic rotation derived from the seed
            if !shuffled.is_empty() {
                let k = (seed as usize) % shuffled.len();
                shuffled.rotate_left(k);
                shuffled.reverse();
            }
            prop_assert_eq!(dedupe_rules(rules).rules, dedupe_rules(shuffled).rules);
        }
    }
}
