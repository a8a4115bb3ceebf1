//! Probabilistic rule extraction
//!
//! Every file referenced by a signal is sent to the oracle once. Files are
//! independent: a failure for one file (unreadable, transport error, timeout,
//! malformed or schema-violating reply) is logged and yields zero rules from
//! that file, and the run continues.

use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::contracts::{Evidence, Rule};
use crate::oracle::{AzureOpenAiOracle, ChatMessage, Oracle, OracleConfig, OracleError, RuleCandidate};
use crate::signals::{extension, line_count};

/// Instruction sent with every request
pub const SYSTEM_PROMPT: &str = "You analyze one source or configuration file from a software repository \
and infer the coding conventions its authors follow. Respond with ONLY a JSON array (no prose) of 3 to 10 \
rule objects with the fields: id (uppercase prefixed code such as PY-LOG-001), title, statement (one \
testable sentence using MUST or SHOULD), rationale, scope (glob patterns), languages, severity \
(info|warn|error), confidence (0 to 1), evidence (array of {path, lines: [start, end]}). Emit only \
generalizable, principle-level rules. Exclude configuration or tooling trivia and one-off details that \
only apply to this file.";

/// Tuning for the extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Maximum in-flight oracle calls
    pub concurrency: usize,
    /// Bound on each oracle call
    pub call_timeout: Duration,
    /// File content sent to the oracle is truncated to this many bytes
    pub max_file_bytes: usize,
    /// Candidates below this confidence are dropped
    pub min_confidence: f64,
    /// Candidates kept per file
    pub max_rules_per_file: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            call_timeout: Duration::from_secs(60),
            max_file_bytes: 65_536,
            min_confidence: 0.55,
            max_rules_per_file: 10,
        }
    }
}

/// Why a file contributed no rules
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileFailure {
    pub path: String,
    pub reason: String,
}

/// Aggregate result of one extraction run
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Rules in file order, then reply order
    pub rules: Vec<Rule>,
    pub files_analyzed: usize,
    pub failures: Vec<FileFailure>,
    /// Candidates dropped for low confidence
    pub below_threshold: usize,
    /// Candidates dropped by the per-file cap
    pub over_cap: usize,
}

#[derive(Debug)]
struct FileRules {
    rules: Vec<Rule>,
    below_threshold: usize,
    over_cap: usize,
}

/// Oracle-backed rule extractor
pub struct Extractor {
    oracle: Arc<dyn Oracle>,
    config: ExtractorConfig,
}

impl Extractor {
    pub fn new(oracle: Arc<dyn Oracle>, config: ExtractorConfig) -> Self {
        Self { oracle, config }
    }

    /// Extractor over the Azure OpenAI transport
    pub fn azure(oracle: OracleConfig, config: ExtractorConfig) -> Result<Self, OracleError> {
        Ok(Self::new(Arc::new(AzureOpenAiOracle::new(oracle)?), config))
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn oracle_name(&self) -> &str {
        self.oracle.name()
    }

    /// Extract rules for `paths` (relative to `root`).
    ///
    /// Paths are de-duplicated and sorted first so request order is stable.
    pub async fn extract(&self, root: &Path, paths: &[String]) -> ExtractionOutcome {
        let mut paths: Vec<&str> = paths
            .iter()
            .map(String::as_str)
            .filter(|p| !p.is_empty())
            .collect();
        paths.sort_unstable();
        paths.dedup();

        let results: Vec<(String, Result<FileRules, String>)> = stream::iter(paths)
            .map(|path| async move { (path.to_string(), self.extract_file(root, path).await) })
            .buffered(self.config.concurrency.max(1))
            .collect()
            .await;

        let mut outcome = ExtractionOutcome {
            files_analyzed: results.len(),
            ..Default::default()
        };
        for (path, result) in results {
            match result {
                Ok(file) => {
                    outcome.below_threshold += file.below_threshold;
                    outcome.over_cap += file.over_cap;
                    outcome.rules.extend(file.rules);
                }
                Err(reason) => {
                    tracing::warn!(file = %path, reason = %reason, "Oracle extraction failed; no rules from this file");
                    outcome.failures.push(FileFailure { path, reason });
                }
            }
        }
        outcome
    }

    async fn extract_file(&self, root: &Path, path: &str) -> Result<FileRules, String> {
        let text = tokio::fs::read_to_string(root.join(path))
            .await
            .map_err(|e| format!("unreadable: {}", e))?;
        let lines = line_count(&text);
        let content = truncate_on_char_boundary(&text, self.config.max_file_bytes);

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("File: {}\n\n```\n{}\n```", path, content)),
        ];

        let call = self.oracle.propose_rules(&messages);
        let candidates = match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(Ok(candidates)) => candidates,
            Ok(Err(e)) => return Err(e.to_string()),
            Err(_) => return Err(OracleError::Timeout(self.config.call_timeout.as_secs()).to_string()),
        };

        let total = candidates.len();
        let confident: Vec<RuleCandidate> = candidates
            .into_iter()
            .filter(|c| c.confidence >= self.config.min_confidence)
            .collect();
        let below_threshold = total - confident.len();

        let over_cap = confident.len().saturating_sub(self.config.max_rules_per_file);
        if over_cap > 0 {
            tracing::warn!(
                file = %path,
                dropped = over_cap,
                cap = self.config.max_rules_per_file,
                "Oracle proposed more rules than the per-file cap"
            );
        }

        let rules: Vec<Rule> = confident
            .into_iter()
            .take(self.config.max_rules_per_file)
            .map(|candidate| candidate_to_rule(candidate, path, lines))
            .collect();

        let problems: Vec<String> = rules.iter().flat_map(Rule::validate).collect();
        if !problems.is_empty() {
            return Err(format!("schema-violating reply: {}", problems.join("; ")));
        }

        tracing::debug!(file = %path, candidates = total, below_threshold, "File analyzed");
        Ok(FileRules {
            rules,
            below_threshold,
            over_cap,
        })
    }
}

/// Fill defaults from the analyzed file and convert to a `Rule`
pub fn candidate_to_rule(candidate: RuleCandidate, path: &str, line_count: u32) -> Rule {
    let ext = extension(path);

    let mut evidence: Vec<Evidence> = candidate
        .evidence
        .into_iter()
        .filter(|e| !e.path.trim().is_empty())
        .map(|e| Evidence::at(e.path, e.lines))
        .collect();
    if evidence.is_empty() {
        evidence.push(Evidence::at(path, (1, line_count)));
    }

    let mut scope = candidate.scope;
    scope.retain(|s| !s.trim().is_empty());
    if scope.is_empty() {
        scope.push(match &ext {
            Some(ext) => format!("**/*.{}", ext),
            None => path.to_string(),
        });
    }

    let mut languages = candidate.languages;
    if languages.is_empty() {
        if let Some(language) = ext.as_deref().and_then(language_for_extension) {
            languages.push(language.to_string());
        }
    }

    let title = candidate
        .title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| candidate.id.clone());

    Rule {
        id: candidate.id,
        title,
        statement: candidate.statement,
        rationale: candidate.rationale.filter(|r| !r.trim().is_empty()),
        scope,
        languages,
        severity: candidate.severity,
        confidence: candidate.confidence,
        evidence,
        autofix: candidate
            .autofix
            .filter(|a| !a.kind.trim().is_empty() && !a.details.trim().is_empty()),
        related_rules: candidate.related_rules,
    }
}

/// Language name for a lowercased file extension
pub fn language_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "py" | "pyi" => Some("python"),
        "ts" | "tsx" | "mts" | "cts" => Some("typescript"),
        "js" | "jsx" | "mjs" | "cjs" => Some("javascript"),
        "rs" => Some("rust"),
        "go" => Some("go"),
        "toml" => Some("toml"),
        "json" => Some("json"),
        "yml" | "yaml" => Some("yaml"),
        _ => None,
    }
}

fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Severity;
    use crate::oracle::CandidateEvidence;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replies per file path named in the user message
    struct ScriptedOracle {
        replies: HashMap<&'static str, &'static str>,
    }

    #[async_trait]
    impl Oracle for ScriptedOracle {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, OracleError> {
            let user = &messages[1].content;
            self.replies
                .iter()
                .find(|(path, _)| user.starts_with(&format!("File: {}\n", path)))
                .map(|(_, reply)| reply.to_string())
                .ok_or_else(|| OracleError::Transport("no scripted reply".to_string()))
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl Oracle for SlowOracle {
        fn name(&self) -> &str {
            "slow"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, OracleError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("[]".to_string())
        }
    }

    /// Tracks the highest number of overlapping calls
    #[derive(Default)]
    struct CountingOracle {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Oracle for CountingOracle {
        fn name(&self) -> &str {
            "counting"
        }

        async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, OracleError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok("[]".to_string())
        }
    }

    fn candidate_json(id: &str, confidence: f64) -> String {
        format!(
            r#"{{"id":"{}","title":"t","statement":"Code MUST do {}.","severity":"warn","confidence":{}}}"#,
            id, id, confidence
        )
    }

    fn leak(s: String) -> &'static str {
        Box::leak(s.into_boxed_str())
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "import logging\nlog = logging.getLogger(__name__)\n").unwrap();
        fs::write(dir.path().join("b.py"), "def f():\n    pass\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_malformed_reply_isolated_to_its_file() {
        let dir = fixture();
        let good = leak(format!("[{}]", candidate_json("PY-LOG-001", 0.8)));
        let oracle = ScriptedOracle {
            replies: [("a.py", good), ("b.py", "[{ not json")].into(),
        };
        let extractor = Extractor::new(Arc::new(oracle), ExtractorConfig::default());

        let outcome = extractor
            .extract(dir.path(), &["b.py".to_string(), "a.py".to_string()])
            .await;

        assert_eq!(outcome.files_analyzed, 2);
        assert_eq!(outcome.rules.len(), 1);
        assert_eq!(outcome.rules[0].id, "PY-LOG-001");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "b.py");
    }

    #[tokio::test]
    async fn test_invalid_rule_id_fails_only_its_file() {
        let dir = fixture();
        let bad = leak(format!("[{}]", candidate_json("py.log.001", 0.8)));
        let good = leak(format!("[{}]", candidate_json("PY-GOOD-001", 0.8)));
        let oracle = ScriptedOracle {
            replies: [("a.py", bad), ("b.py", good)].into(),
        };
        let extractor = Extractor::new(Arc::new(oracle), ExtractorConfig::default());

        let outcome = extractor
            .extract(dir.path(), &["a.py".to_string(), "b.py".to_string()])
            .await;

        assert_eq!(outcome.rules.len(), 1);
        assert_eq!(outcome.rules[0].id, "PY-GOOD-001");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].path, "a.py");
        assert!(outcome.failures[0].reason.contains("py.log.001"));
    }

    #[tokio::test]
    async fn test_in_flight_calls_respect_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<String> = (0..5).map(|i| format!("m{}.py", i)).collect();
        for path in &paths {
            fs::write(dir.path().join(path), "x = 1\n").unwrap();
        }
        let oracle = Arc::new(CountingOracle::default());
        let config = ExtractorConfig {
            concurrency: 2,
            ..Default::default()
        };
        let extractor = Extractor::new(oracle.clone(), config);

        let outcome = extractor.extract(dir.path(), &paths).await;

        assert_eq!(outcome.files_analyzed, 5);
        assert!(outcome.failures.is_empty());
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 5);
        let peak = oracle.peak.load(Ordering::SeqCst);
        assert!(peak <= 2, "peak in-flight calls was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_threshold_and_cap() {
        let dir = fixture();
        let mut items: Vec<String> = (0..12)
            .map(|i| candidate_json(&format!("PY-X-{:03}", i), 0.9))
            .collect();
        items.push(candidate_json("PY-LOW-001", 0.3));
        let reply = leak(format!("[{}]", items.join(",")));
        let oracle = ScriptedOracle {
            replies: [("a.py", reply)].into(),
        };
        let extractor = Extractor::new(Arc::new(oracle), ExtractorConfig::default());

        let outcome = extractor.extract(dir.path(), &["a.py".to_string()]).await;
        assert_eq!(outcome.rules.len(), 10);
        assert_eq!(outcome.below_threshold, 1);
        assert_eq!(outcome.over_cap, 2);
        assert!(outcome.rules.iter().all(|r| r.id != "PY-LOW-001"));
    }

    #[tokio::test]
    async fn test_unreadable_file_is_a_failure() {
        let dir = fixture();
        let oracle = ScriptedOracle {
            replies: HashMap::new(),
        };
        let extractor = Extractor::new(Arc::new(oracle), ExtractorConfig::default());
        let outcome = extractor
            .extract(dir.path(), &["missing.py".to_string(), String::new()])
            .await;
        assert_eq!(outcome.files_analyzed, 1);
        assert!(outcome.failures[0].reason.starts_with("unreadable"));
    }

    #[tokio::test]
    async fn test_calls_are_timeout_bounded() {
        let dir = fixture();
        let config = ExtractorConfig {
            call_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        let extractor = Extractor::new(Arc::new(SlowOracle), config);
        let outcome = extractor.extract(dir.path(), &["a.py".to_string()]).await;
        assert!(outcome.rules.is_empty());
        assert!(outcome.failures[0].reason.contains("timed out"));
    }

    #[test]
    fn test_candidate_defaults_are_filled() {
        let candidate = RuleCandidate {
            id: "TS-NAME-001".to_string(),
            title: None,
            statement: "Components MUST be PascalCase.".to_string(),
            rationale: None,
            scope: vec![],
            languages: vec![],
            severity: Severity::Info,
            confidence: 0.7,
            evidence: vec![],
            autofix: None,
            related_rules: vec![],
        };
        let rule = candidate_to_rule(candidate, "src/App.tsx", 42);
        assert_eq!(rule.title, "TS-NAME-001");
        assert_eq!(rule.scope, vec!["**/*.tsx".to_string()]);
        assert_eq!(rule.languages, vec!["typescript".to_string()]);
        assert_eq!(rule.evidence, vec![Evidence::at("src/App.tsx", (1, 42))]);
        assert!(rule.validate().is_empty());
    }

    #[test]
    fn test_candidate_evidence_is_rehashed() {
        let candidate = RuleCandidate {
            id: "PY-LOG-001".to_string(),
            title: Some("Loggers".to_string()),
            statement: "s".to_string(),
            rationale: Some(" ".to_string()),
            scope: vec!["src/**/*.py".to_string()],
            languages: vec!["python".to_string()],
            severity: Severity::Warn,
            confidence: 0.9,
            evidence: vec![CandidateEvidence {
                path: "a.py".to_string(),
                lines: (2, 2),
            }],
            autofix: None,
            related_rules: vec![],
        };
        let rule = candidate_to_rule(candidate, "a.py", 2);
        assert_eq!(rule.evidence[0].snippet_hash, Evidence::at("a.py", (2, 2)).snippet_hash);
        assert!(rule.rationale.is_none());
        assert_eq!(rule.scope, vec!["src/**/*.py".to_string()]);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "aé";
        assert_eq!(truncate_on_char_boundary(text, 2), "a");
        assert_eq!(truncate_on_char_boundary(text, 3), "aé");
        assert_eq!(truncate_on_char_boundary(text, 10), "aé");
    }
}
