//! End-to-end synthesis over a fixture repository

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use repostyle_core::contracts::Signal;
use repostyle_core::oracle::ChatMessage;
use repostyle_core::report::agents_md;
use repostyle_core::runtime::suggest;
use repostyle_core::signals::ScanBundle;
use repostyle_core::{
    ContractBuilder, ContractStore, Extractor, ExtractorConfig, Oracle, OracleError,
    RepoIdentity, Severity, SynthesisEngine,
};

/// Replies keyed by the analyzed file's path; unknown files get `[]`
struct FixtureOracle {
    replies: HashMap<String, String>,
}

impl FixtureOracle {
    fn new(replies: &[(&str, &str)]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies
                .iter()
                .map(|(path, reply)| (path.to_string(), reply.to_string()))
                .collect(),
        })
    }
}

#[async_trait]
impl Oracle for FixtureOracle {
    fn name(&self) -> &str {
        "fixture"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
        let user = &messages[messages.len() - 1].content;
        Ok(self
            .replies
            .iter()
            .find(|(path, _)| user.starts_with(&format!("File: {}\n", path)))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| "[]".to_string()))
    }
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn fixture_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "pyproject.toml", "[project]\nname = \"demo\"\n\n[tool.black]\nline-length = 88\n");
    write(
        root,
        "src/app.py",
        "import logging\n\nlog = logging.getLogger(__name__)\n\ndef run(x: int) -> int:\n    return x\n",
    );
    write(
        root,
        "tests/test_app.py",
        "import pytest\n\ndef test_run():\n    assert True\n",
    );
    write(root, "tsconfig.json", "{\n  \"compilerOptions\": {\n    \"strict\": true\n  }\n}\n");
    write(root, ".prettierrc", "{}\n");
    write(root, "web/api.ts", "export function load(input: any) {\n  return input;\n}\n");
    write(root, "node_modules/pkg/index.ts", "export const x: any = 1;\n");
    dir
}

fn candidate(id: &str, statement: &str, path: &str, confidence: f64) -> String {
    format!(
        r#"{{"id":"{}","title":"{}","statement":"{}","scope":["**/*.ts"],"languages":["typescript"],"severity":"warn","confidence":{},"evidence":[{{"path":"{}","lines":[1,3]}}]}}"#,
        id, id, statement, confidence, path
    )
}

fn engine() -> SynthesisEngine {
    SynthesisEngine::new(ContractBuilder::new().unwrap()).unwrap()
}

#[tokio::test]
async fn test_black_line_length_becomes_enforced_rule() {
    let repo = fixture_repo();
    let outcome = engine()
        .synthesize(repo.path(), RepoIdentity::local("abc123"))
        .await
        .unwrap();

    let rule = outcome.contract.rule("PY-FMT-001").unwrap();
    assert_eq!(rule.confidence, 0.95);
    assert_eq!(rule.severity, Severity::Error);
    assert!(rule.autofix.as_ref().unwrap().details.contains("--line-length 88"));
    assert_eq!(rule.evidence[0].path, "pyproject.toml");
    assert_eq!(rule.evidence[0].lines, (5, 5));

    assert!(outcome.contract.rule("TS-TYPE-003").is_some());
    assert!(outcome.contract.rule("TS-FMT-001").is_some());
    assert!(outcome.contract.rule("PY-TEST-001").is_some());

    // node_modules is never scanned
    let any_rule = outcome.contract.rule("TS-TYPE-004").unwrap();
    assert_eq!(any_rule.evidence[0].path, "web/api.ts");
    assert!(outcome.extraction.is_none());
}

#[tokio::test]
async fn test_duplicate_oracle_candidates_collapse() {
    let repo = fixture_repo();
    write(repo.path(), "ci/a.yml", "steps: []\n");
    write(repo.path(), "ci/b.yml", "steps: []\n");

    let oracle = FixtureOracle::new(&[
        (
            "ci/a.yml",
            &format!("[{}]", candidate("TS-TYPE-004", "Exports SHOULD avoid any.", "ci/a.yml", 0.8)),
        ),
        (
            "ci/b.yml",
            &format!("[{}]", candidate("TS-TYPE-004", "Avoid any in exports.", "ci/b.yml", 0.75)),
        ),
    ]);
    let engine = engine().with_extractor(Some(Extractor::new(oracle, ExtractorConfig::default())));

    let bundle = ScanBundle {
        signals: vec![
            Signal::new("ci.run.command", "npm test", "ci/a.yml", (1, 1), 0.5),
            Signal::new("ci.run.command", "npm run lint", "ci/b.yml", (1, 1), 0.5),
        ],
        ..Default::default()
    };
    let outcome = engine
        .synthesize_from(repo.path(), RepoIdentity::local("abc123"), bundle)
        .await
        .unwrap();

    let matching: Vec<_> = outcome
        .contract
        .rules
        .iter()
        .filter(|r| r.id == "TS-TYPE-004")
        .collect();
    assert_eq!(matching.len(), 1);
    assert_eq!(matching[0].statement, "Exports SHOULD avoid any.");
    assert_eq!(outcome.dropped.len(), 1);
    assert_eq!(outcome.dropped[0].path.as_deref(), Some("ci/b.yml"));
    assert_eq!(outcome.contract.metrics.as_ref().unwrap()["duplicatesDropped"], 1);
}

#[tokio::test]
async fn test_pattern_violating_id_does_not_abort_the_scan() {
    let repo = fixture_repo();
    write(repo.path(), "a.py", "import logging\n");
    write(repo.path(), "b.py", "def f():\n    pass\n");
    let oracle = FixtureOracle::new(&[
        (
            "a.py",
            &format!("[{}]", candidate("py.log.001", "Modules MUST log.", "a.py", 0.8)),
        ),
        (
            "b.py",
            &format!("[{}]", candidate("PY-GOOD-001", "Functions MUST be small.", "b.py", 0.8)),
        ),
    ]);
    let engine = engine().with_extractor(Some(Extractor::new(oracle, ExtractorConfig::default())));

    let bundle = ScanBundle {
        signals: vec![
            Signal::new("py.import.logging", true, "a.py", (1, 1), 0.2),
            Signal::new("py.typing.density", 0.0, "b.py", (1, 1), 0.5),
        ],
        ..Default::default()
    };
    let outcome = engine
        .synthesize_from(repo.path(), RepoIdentity::local("abc123"), bundle)
        .await
        .unwrap();

    assert!(outcome.contract.rule("PY-GOOD-001").is_some());
    assert!(outcome.contract.rule("py.log.001").is_none());
    let failures = &outcome.extraction.as_ref().unwrap().failures;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, "a.py");
}

#[tokio::test]
async fn test_malformed_reply_isolated_to_its_file() {
    let repo = fixture_repo();
    let oracle = FixtureOracle::new(&[
        ("src/app.py", "this is not json"),
        (
            "web/api.ts",
            &format!("[{}]", candidate("TS-API-001", "Loaders MUST validate input.", "web/api.ts", 0.7)),
        ),
    ]);
    let engine = engine().with_extractor(Some(Extractor::new(oracle, ExtractorConfig::default())));

    let outcome = engine
        .synthesize(repo.path(), RepoIdentity::local("abc123"))
        .await
        .unwrap();

    let extraction = outcome.extraction.as_ref().unwrap();
    assert_eq!(extraction.failures.len(), 1);
    assert_eq!(extraction.failures[0].path, "src/app.py");
    assert!(outcome.contract.rule("TS-API-001").is_some());
    // Deterministic rules still come from the failed file's signals
    assert!(outcome.contract.rule("PY-TYPE-001").is_some());

    let metrics = outcome.contract.metrics.as_ref().unwrap();
    assert_eq!(metrics["oracleFailures"], 1);
    assert_eq!(metrics["probabilisticRules"], 1);
    assert!(metrics["filesAnalyzed"].as_u64().unwrap() >= 2);
}

#[tokio::test]
async fn test_low_confidence_candidates_are_dropped() {
    let repo = fixture_repo();
    let oracle = FixtureOracle::new(&[(
        "web/api.ts",
        &format!("[{}]", candidate("TS-API-002", "Maybe a rule.", "web/api.ts", 0.3)),
    )]);
    let engine = engine().with_extractor(Some(Extractor::new(oracle, ExtractorConfig::default())));

    let outcome = engine
        .synthesize(repo.path(), RepoIdentity::local("abc123"))
        .await
        .unwrap();
    assert!(outcome.contract.rule("TS-API-002").is_none());
    assert_eq!(outcome.extraction.unwrap().below_threshold, 1);
}

#[tokio::test]
async fn test_persist_load_and_render() {
    let repo = fixture_repo();
    let outcome = engine()
        .synthesize(repo.path(), RepoIdentity::local("abc123"))
        .await
        .unwrap();

    let out = tempfile::tempdir().unwrap();
    let contract_path = out.path().join("repostyle.contract.yaml");
    let store = ContractStore::for_path(&contract_path);
    store.persist(&outcome.contract).unwrap();
    let loaded = store.load(&ContractBuilder::new().unwrap()).unwrap();
    assert_eq!(loaded, outcome.contract);

    let agents = agents_md::render(&loaded, &contract_path).unwrap();
    assert!(agents.contains("### PY-FMT-001:"));
    assert!(agents.contains("black --check ."));
    assert!(agents.contains("- Commit: abc123"));

    let suggestions = suggest::suggest(&loaded, repo.path()).unwrap();
    assert_eq!(suggestions.len(), 1);
    assert_eq!(suggestions[0].after, "line-length = 88\n");
}

#[tokio::test]
async fn test_synthesis_is_deterministic_without_oracle() {
    let repo = fixture_repo();
    let a = engine()
        .synthesize(repo.path(), RepoIdentity::local("abc123"))
        .await
        .unwrap();
    let b = engine()
        .synthesize(repo.path(), RepoIdentity::local("abc123"))
        .await
        .unwrap();
    assert_eq!(a.contract.rules, b.contract.rules);
}
