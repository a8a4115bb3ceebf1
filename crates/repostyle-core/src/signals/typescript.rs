//! TypeScript exported-`any` detection

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::{collect_files, read_text, ScanError, SignalScanner, DEFAULT_MAX_FILES};
use crate::contracts::Signal;

pub const KIND_EXPORT_ANY_COUNT: &str = "ts.export.any.count";

static EXPORT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*export\s+(?:default\s+)?(?:async\s+)?(?:function|const|let|var|class|interface|type)\b",
    )
    .expect("export pattern compiles")
});

static ANY_ANNOTATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r":\s*any\b").expect("any pattern compiles"));

/// Scanner for `**/*.ts` and `**/*.tsx`
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeScriptScanner;

impl SignalScanner for TypeScriptScanner {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn scan(&self, root: &Path, max_files: Option<usize>) -> Result<Vec<Signal>, ScanError> {
        let files = collect_files(root, max_files.unwrap_or(DEFAULT_MAX_FILES), |rel| {
            (rel.ends_with(".ts") || rel.ends_with(".tsx")) && !rel.ends_with(".d.ts")
        })?;

        let mut signals = Vec::new();
        for file in &files {
            let text = match read_text(file) {
                Ok(text) => text,
                Err(e) => {
                    tracing::debug!(file = %file.rel, error = %e, "Skipping unreadable TypeScript file");
                    continue;
                }
            };

            let offending = exported_any_lines(&text);
            if let (Some(first), Some(last)) = (offending.first(), offending.last()) {
                signals.push(Signal::new(
                    KIND_EXPORT_ANY_COUNT,
                    offending.len() as u64,
                    &file.rel,
                    (*first, *last),
                    1.0,
                ));
            }
        }
        Ok(signals)
    }
}

/// 1-based lines of exported declarations that mention `: any`
fn exported_any_lines(text: &str) -> Vec<u32> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| EXPORT_DECL.is_match(line) && ANY_ANNOTATION.is_match(line))
        .map(|(index, _)| index as u32 + 1)
        .collect()
}
