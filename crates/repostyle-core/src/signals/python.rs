//! Python source heuristics

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::{collect_files, line_at, read_text, ScanError, SignalScanner, DEFAULT_MAX_FILES};
use crate::contracts::Signal;

pub const KIND_IMPORT_LOGGING: &str = "py.import.logging";
pub const KIND_TEST_PYTEST: &str = "py.test.pytest";
pub const KIND_TYPING_DENSITY: &str = "py.typing.density";

static LOGGING_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:import\s+logging\b|from\s+logging\s+import\b)")
        .expect("logging pattern compiles")
});

static PYTEST_IMPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:import\s+pytest\b|from\s+pytest\s+import\b)")
        .expect("pytest pattern compiles")
});

static DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:async\s+)?def\s+\w+\s*\(").expect("def pattern compiles")
});

static ANNOTATED_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?:async\s+)?def\s+\w+\s*\([^)]*\)\s*->")
        .expect("annotated def pattern compiles")
});

/// Scanner for `**/*.py`
#[derive(Debug, Default, Clone, Copy)]
pub struct PythonScanner;

impl SignalScanner for PythonScanner {
    fn name(&self) -> &'static str {
        "python"
    }

    fn scan(&self, root: &Path, max_files: Option<usize>) -> Result<Vec<Signal>, ScanError> {
        let files = collect_files(root, max_files.unwrap_or(DEFAULT_MAX_FILES), |rel| {
            rel.ends_with(".py")
        })?;

        let mut signals = Vec::new();
        let mut defs = 0usize;
        let mut annotated = 0usize;

        for file in &files {
            let text = match read_text(file) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(file = %file.rel, error = %e, "Skipping unreadable Python file");
                    continue;
                }
            };

            if let Some(m) = LOGGING_IMPORT.find(&text) {
                let line = line_at(&text, m.start());
                signals.push(Signal::new(KIND_IMPORT_LOGGING, true, &file.rel, (line, line), 0.2));
            }
            if let Some(m) = PYTEST_IMPORT.find(&text) {
                let line = line_at(&text, m.start());
                signals.push(Signal::new(KIND_TEST_PYTEST, true, &file.rel, (line, line), 0.2));
            }

            defs += DEF.find_iter(&text).count();
            annotated += ANNOTATED_DEF.find_iter(&text).count();
        }

        if defs > 0 {
            if let Some(first) = files.first() {
                let density = (annotated as f64 / defs as f64 * 100.0).round() / 100.0;
                signals.push(Signal::new(KIND_TYPING_DENSITY, density, &first.rel, (1, 1), 0.5));
            }
        }

        Ok(signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_python_signals() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("tests")).unwrap();
        fs::write(
            dir.path().join("src/app.py"),
            "import os\nimport logging\n\ndef run(x: int) -> int:\n    return x\n\ndef helper(y):\n    return y\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("tests/test_app.py"),
            "import pytest\n\nasync def test_run() -> None:\n    pass\n",
        )
        .unwrap();

        let signals = PythonScanner.scan(dir.path(), None).unwrap();

        let logging = signals.iter().find(|s| s.kind == KIND_IMPORT_LOGGING).unwrap();
        assert_eq!(logging.source.path, "src/app.py");
        assert_eq!(logging.source.lines, (2, 2));

        let pytest = signals.iter().find(|s| s.kind == KIND_TEST_PYTEST).unwrap();
        assert_eq!(pytest.source.path, "tests/test_app.py");
        assert_eq!(pytest.weight, 0.2);

        let density = signals.iter().find(|s| s.kind == KIND_TYPING_DENSITY).unwrap();
        assert_eq!(density.value, serde_json::json!(0.67));
        assert_eq!(density.source.path, "src/app.py");
    }

    #[test]
    fn test_evidence_line_after_docstring() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("svc.py"),
            "\"\"\"Module doc.\"\"\"\n\nimport logging\n",
        )
        .unwrap();

        let signals = PythonScanner.scan(dir.path(), None).unwrap();
        let logging = signals.iter().find(|s| s.kind == KIND_IMPORT_LOGGING).unwrap();
        assert_eq!(logging.source.lines, (3, 3));
    }

    #[test]
    fn test_no_defs_means_no_density() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("const.py"), "VALUE = 1\n").unwrap();
        let signals = PythonScanner.scan(dir.path(), None).unwrap();
        assert!(signals.iter().all(|s| s.kind != KIND_TYPING_DENSITY));
    }

    #[test]
    fn test_max_files_caps_enumeration() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.py"), "import pytest\n").unwrap();
        fs::write(dir.path().join("b.py"), "import pytest\n").unwrap();
        let signals = PythonScanner.scan(dir.path(), Some(1)).unwrap();
        let pytest: Vec<_> = signals.iter().filter(|s| s.kind == KIND_TEST_PYTEST).collect();
        assert_eq!(pytest.len(), 1);
        assert_eq!(pytest[0].source.path, "a.py");
    }
}
