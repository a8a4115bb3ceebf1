//! Signal scanners
//!
//! Scanners are independent producers of `Signal` lists. Each one is pure with
//! respect to engine state: given a repository root it walks the tree, reads
//! files and returns observations. Scanners run concurrently; the order in
//! which their signals arrive carries no meaning because deduplication sorts
//! the final rule list.
//!
//! - `config` - static configuration files (pyproject, tsconfig, prettier)
//! - `python` - regex heuristics over Python sources
//! - `typescript` - exported `any` detection over TypeScript sources
//! - `ci` - commands run by CI definitions

pub mod ci;
pub mod config;
pub mod python;
pub mod typescript;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::contracts::Signal;

pub use ci::CiScanner;
pub use config::ConfigScanner;
pub use python::PythonScanner;
pub use typescript::TypeScriptScanner;

/// Default per-scanner file cap
pub const DEFAULT_MAX_FILES: usize = 200;

/// Directories never descended into
pub const IGNORED_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    ".venv",
    "venv",
    "site-packages",
    "target",
    "dist",
    "build",
    "__pycache__",
];

/// Scanner errors
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to walk '{0}': {1}")]
    Walk(String, String),

    #[error("Scanner '{0}' panicked or was cancelled")]
    Aborted(String),
}

/// A producer of signals for one evidence source
pub trait SignalScanner: Send + Sync {
    /// Stable scanner name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Scan a repository root. `max_files` caps enumeration deterministically.
    fn scan(&self, root: &Path, max_files: Option<usize>) -> Result<Vec<Signal>, ScanError>;
}

/// The scanners shipped with repostyle
pub fn default_scanners() -> Vec<Arc<dyn SignalScanner>> {
    vec![
        Arc::new(ConfigScanner),
        Arc::new(PythonScanner),
        Arc::new(TypeScriptScanner),
        Arc::new(CiScanner),
    ]
}

/// All signals gathered from one repository
#[derive(Debug, Clone, Default)]
pub struct ScanBundle {
    pub signals: Vec<Signal>,
    /// Signals produced per scanner
    pub per_scanner: BTreeMap<String, usize>,
    /// Scanners that failed and contributed nothing
    pub failed_scanners: Vec<String>,
}

impl ScanBundle {
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Distinct, sorted, non-empty paths referenced by signal sources
    pub fn referenced_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self
            .signals
            .iter()
            .map(|s| s.source.path.clone())
            .filter(|p| !p.is_empty())
            .collect();
        paths.sort();
        paths.dedup();
        paths
    }
}

/// Run every scanner concurrently and join their output.
///
/// A failing scanner is logged and skipped; it never fails the scan.
pub async fn scan_repository(
    root: &Path,
    max_files: Option<usize>,
    scanners: &[Arc<dyn SignalScanner>],
) -> ScanBundle {
    let tasks = scanners.iter().map(|scanner| {
        let scanner = Arc::clone(scanner);
        let root = root.to_path_buf();
        async move {
            let name = scanner.name();
            let outcome =
                tokio::task::spawn_blocking(move || scanner.scan(&root, max_files)).await;
            let outcome = match outcome {
                Ok(result) => result,
                Err(_) => Err(ScanError::Aborted(name.to_string())),
            };
            (name, outcome)
        }
    });

    let mut bundle = ScanBundle::default();
    for (name, outcome) in futures::future::join_all(tasks).await {
        match outcome {
            Ok(signals) => {
                tracing::debug!(scanner = name, count = signals.len(), "Scanner finished");
                bundle.per_scanner.insert(name.to_string(), signals.len());
                bundle.signals.extend(signals);
            }
            Err(e) => {
                tracing::warn!(scanner = name, error = %e, "Scanner failed; continuing without it");
                bundle.per_scanner.insert(name.to_string(), 0);
                bundle.failed_scanners.push(name.to_string());
            }
        }
    }
    bundle
}

/// A file found during a walk
#[derive(Debug, Clone)]
pub struct FoundFile {
    pub abs: PathBuf,
    /// Root-relative, `/`-separated
    pub rel: String,
}

fn is_ignored(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| IGNORED_DIRS.contains(&name))
            .unwrap_or(false)
}

/// Walk `root` in sorted order and return the first `max` files accepted by `accept`
pub fn collect_files<F>(root: &Path, max: usize, accept: F) -> Result<Vec<FoundFile>, ScanError>
where
    F: Fn(&str) -> bool,
{
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_ignored(e));

    for entry in walker {
        let entry =
            entry.map_err(|e| ScanError::Walk(root.display().to_string(), e.to_string()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .replace('\\', "/");
        if !accept(&rel) {
            continue;
        }
        files.push(FoundFile {
            abs: entry.path().to_path_buf(),
            rel,
        });
    }

    // Walk order is per-directory; re-sort on the full path so capping is stable.
    files.sort_by(|a, b| a.rel.cmp(&b.rel));
    files.truncate(max);
    Ok(files)
}

/// Read a file, mapping errors to `ScanError`
pub fn read_text(file: &FoundFile) -> Result<String, ScanError> {
    std::fs::read_to_string(&file.abs).map_err(|source| ScanError::Io {
        path: file.rel.clone(),
        source,
    })
}

/// 1-based line number containing byte `offset`
pub fn line_at(text: &str, offset: usize) -> u32 {
    let offset = offset.min(text.len());
    text.as_bytes()[..offset].iter().filter(|&&b| b == b'\n').count() as u32 + 1
}

/// Number of lines in `text` (at least 1)
pub fn line_count(text: &str) -> u32 {
    (text.lines().count() as u32).max(1)
}

/// Lowercased extension of a relative path
pub fn extension(rel: &str) -> Option<String> {
    Path::new(rel)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct FailingScanner;

    impl SignalScanner for FailingScanner {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn scan(&self, root: &Path, _max: Option<usize>) -> Result<Vec<Signal>, ScanError> {
            Err(ScanError::Walk(root.display().to_string(), "boom".to_string()))
        }
    }

    struct FixedScanner;

    impl SignalScanner for FixedScanner {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn scan(&self, _root: &Path, _max: Option<usize>) -> Result<Vec<Signal>, ScanError> {
            Ok(vec![Signal::new("x.kind", true, "a.py", (1, 1), 1.0)])
        }
    }

    #[test]
    fn test_collect_files_is_sorted_capped_and_skips_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::write(dir.path().join("b/z.py"), "").unwrap();
        fs::write(dir.path().join("a.py"), "").unwrap();
        fs::write(dir.path().join("c.py"), "").unwrap();
        fs::write(dir.path().join("node_modules/pkg/x.py"), "").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();

        let all = collect_files(dir.path(), 10, |rel| rel.ends_with(".py")).unwrap();
        let rels: Vec<&str> = all.iter().map(|f| f.rel.as_str()).collect();
        assert_eq!(rels, vec!["a.py", "b/z.py", "c.py"]);

        let capped = collect_files(dir.path(), 2, |rel| rel.ends_with(".py")).unwrap();
        assert_eq!(capped.len(), 2);
        assert_eq!(capped[1].rel, "b/z.py");
    }

    #[test]
    fn test_line_helpers() {
        let text = "a\nb\nc";
        assert_eq!(line_at(text, 0), 1);
        assert_eq!(line_at(text, 2), 2);
        assert_eq!(line_at(text, 4), 3);
        assert_eq!(line_count(text), 3);
        assert_eq!(line_count(""), 1);
        assert_eq!(extension("src/App.TSX").as_deref(), Some("tsx"));
    }

    #[tokio::test]
    async fn test_failing_scanner_does_not_abort_scan() {
        let dir = tempfile::tempdir().unwrap();
        let scanners: Vec<Arc<dyn SignalScanner>> =
            vec![Arc::new(FailingScanner), Arc::new(FixedScanner)];

        let bundle = scan_repository(dir.path(), None, &scanners).await;
        assert_eq!(bundle.signal_count(), 1);
        assert_eq!(bundle.failed_scanners, vec!["failing".to_string()]);
        assert_eq!(bundle.per_scanner["fixed"], 1);
    }

    #[test]
    fn test_referenced_paths_are_distinct_and_sorted() {
        let bundle = ScanBundle {
            signals: vec![
                Signal::new("k", 1, "b.ts", (1, 1), 1.0),
                Signal::new("k", 1, "a.ts", (1, 1), 1.0),
                Signal::new("k", 1, "b.ts", (2, 2), 1.0),
                Signal::new("k", 1, "", (1, 1), 1.0),
            ],
            ..Default::default()
        };
        assert_eq!(bundle.referenced_paths(), vec!["a.ts", "b.ts"]);
    }
}
