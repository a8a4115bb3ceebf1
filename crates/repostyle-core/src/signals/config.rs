//! Static configuration scanner
//!
//! Reads formatter and compiler configuration at the repository root.

use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

use super::{line_at, ScanError, SignalScanner};
use crate::contracts::Signal;

pub const KIND_BLACK_LINE_LENGTH: &str = "config.black.lineLength";
pub const KIND_TSCONFIG_STRICT: &str = "config.tsconfig.strict";
pub const KIND_PRETTIER_PRESENT: &str = "config.prettier.present";

static LINE_LENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*line[-_]?length\s*=\s*(\d+)").expect("line-length pattern compiles")
});

static STRICT_TRUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""strict"\s*:\s*true"#).expect("strict pattern compiles"));

const PRETTIER_FILES: &[&str] = &[
    ".prettierrc",
    ".prettierrc.json",
    ".prettierrc.yaml",
    ".prettierrc.yml",
    ".prettierrc.js",
    ".prettierrc.cjs",
    ".prettierrc.mjs",
    ".prettierrc.toml",
    ".prettierrc.json5",
    "prettier.config.js",
    "prettier.config.cjs",
    "prettier.config.mjs",
    "prettier.config.ts",
];

/// Scanner for `pyproject.toml`, `tsconfig.json` and prettier configuration
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigScanner;

impl SignalScanner for ConfigScanner {
    fn name(&self) -> &'static str {
        "config"
    }

    fn scan(&self, root: &Path, _max_files: Option<usize>) -> Result<Vec<Signal>, ScanError> {
        let mut signals = Vec::new();

        if let Some(text) = read_optional(root, "pyproject.toml")? {
            if let Some((length, line)) = black_line_length(&text) {
                signals.push(Signal::new(
                    KIND_BLACK_LINE_LENGTH,
                    length,
                    "pyproject.toml",
                    (line, line),
                    1.0,
                ));
            }
        }

        if let Some(text) = read_optional(root, "tsconfig.json")? {
            if let Some(line) = tsconfig_strict(&text) {
                signals.push(Signal::new(
                    KIND_TSCONFIG_STRICT,
                    true,
                    "tsconfig.json",
                    (line, line),
                    1.0,
                ));
            }
        }

        if let Some(name) = PRETTIER_FILES.iter().find(|name| root.join(name).is_file()) {
            signals.push(Signal::new(KIND_PRETTIER_PRESENT, true, *name, (1, 1), 1.0));
        }

        Ok(signals)
    }
}

fn read_optional(root: &Path, name: &str) -> Result<Option<String>, ScanError> {
    let path = root.join(name);
    if !path.is_file() {
        return Ok(None);
    }
    std::fs::read_to_string(&path)
        .map(Some)
        .map_err(|source| ScanError::Io {
            path: name.to_string(),
            source,
        })
}

/// Line length from `[tool.black]`, then `[tool.ruff]`, then any `line-length = N`.
/// Returns the value and the 1-based line it was found on.
fn black_line_length(text: &str) -> Option<(u64, u32)> {
    let parsed: Option<toml::Value> = toml::from_str(text).ok();

    for section in ["black", "ruff"] {
        let value = parsed
            .as_ref()
            .and_then(|doc| doc.get("tool"))
            .and_then(|tool| tool.get(section))
            .and_then(|table| table.get("line-length"))
            .and_then(|v| v.as_integer())
            .filter(|v| *v > 0);
        if let Some(value) = value {
            let header = format!("[tool.{}]", section);
            let line = section_line(text, &header, value as u64).unwrap_or(1);
            return Some((value as u64, line));
        }
    }

    let caps = LINE_LENGTH.captures(text)?;
    let value: u64 = caps.get(1)?.as_str().parse().ok()?;
    let offset = caps.get(0)?.start();
    Some((value, line_at(text, offset)))
}

fn section_line(text: &str, header: &str, value: u64) -> Option<u32> {
    let start = text.find(header)?;
    LINE_LENGTH
        .captures_iter(&text[start..])
        .find(|c| c.get(1).map(|m| m.as_str()) == Some(value.to_string().as_str()))
        .and_then(|c| c.get(0))
        .map(|m| line_at(text, start + m.start()))
}

/// Line of `"strict": true`, when tsconfig enables strict mode
fn tsconfig_strict(text: &str) -> Option<u32> {
    let strict_line = || STRICT_TRUE.find(text).map(|m| line_at(text, m.start()));

    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(doc) => {
            let strict = doc
                .get("compilerOptions")
                .and_then(|o| o.get("strict"))
                .and_then(|s| s.as_bool())
                .unwrap_or(false);
            if strict {
                Some(strict_line().unwrap_or(1))
            } else {
                None
            }
        }
        // tsconfig is frequently JSONC (comments, trailing commas)
        Err(_) => strict_line(),
    }
}
