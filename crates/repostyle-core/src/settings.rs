//! Runtime settings
//!
//! Precedence, lowest first: built-in defaults, `repostyle.toml`,
//! `REPOSTYLE_*` environment variables, then command-line flags (applied by
//! the CLI on the returned value).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::engine::ExtractorConfig;
use crate::error::{RepostyleError, Result};

pub const DEFAULT_SETTINGS_FILE: &str = "repostyle.toml";
pub const DEFAULT_CONTRACT_PATH: &str = "repostyle.contract.yaml";
pub const DEFAULT_REPORT_PATH: &str = "repostyle.report.json";

/// Oracle-related settings (`[llm]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LlmSettings {
    pub enabled: bool,
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub max_file_bytes: usize,
    pub min_confidence: f64,
    pub max_rules_per_file: usize,
}

impl Default for LlmSettings {
    fn default() -> Self {
        let extractor = ExtractorConfig::default();
        Self {
            enabled: true,
            concurrency: extractor.concurrency,
            timeout_secs: extractor.call_timeout.as_secs(),
            max_file_bytes: extractor.max_file_bytes,
            min_confidence: extractor.min_confidence,
            max_rules_per_file: extractor.max_rules_per_file,
        }
    }
}

/// All settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub contract_path: PathBuf,
    pub report_path: PathBuf,
    /// Per-scanner file cap
    pub max_files: usize,
    /// External contract schema replacing the bundled one
    pub schema_path: Option<PathBuf>,
    pub llm: LlmSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            contract_path: PathBuf::from(DEFAULT_CONTRACT_PATH),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            max_files: crate::signals::DEFAULT_MAX_FILES,
            schema_path: None,
            llm: LlmSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from `repostyle.toml` when it exists,
    /// then apply environment overrides.
    ///
    /// An explicitly named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_SETTINGS_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_SETTINGS_FILE))?
            }
            None => Self::default(),
        };
        settings.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RepostyleError::file_error(format!(
                "Failed to read settings '{}': {}",
                path.display(),
                e
            ))
        })?;
        let settings = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.display(), "Loaded settings file");
        Ok(settings)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let settings: Self = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `REPOSTYLE_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("REPOSTYLE_CONTRACT") {
            self.contract_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("REPOSTYLE_REPORT") {
            self.report_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("REPOSTYLE_SCHEMA") {
            self.schema_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("REPOSTYLE_MAX_FILES") {
            self.max_files = parse_env("REPOSTYLE_MAX_FILES", &v)?;
        }
        if let Some(v) = lookup("REPOSTYLE_LLM_ENABLED") {
            self.llm.enabled = parse_bool("REPOSTYLE_LLM_ENABLED", &v)?;
        }
        if let Some(v) = lookup("REPOSTYLE_LLM_CONCURRENCY") {
            self.llm.concurrency = parse_env("REPOSTYLE_LLM_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("REPOSTYLE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("REPOSTYLE_LLM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("REPOSTYLE_LLM_MAX_FILE_BYTES") {
            self.llm.max_file_bytes = parse_env("REPOSTYLE_LLM_MAX_FILE_BYTES", &v)?;
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.max_files == 0 {
            return Err(RepostyleError::invalid_input("max_files must be at least 1"));
        }
        if self.llm.concurrency == 0 {
            return Err(RepostyleError::invalid_input("llm.concurrency must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.llm.min_confidence) {
            return Err(RepostyleError::invalid_input(
                "llm.min_confidence must be within [0, 1]",
            ));
        }
        Ok(())
    }

    /// Extractor tuning derived from `[llm]`
    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            concurrency: self.llm.concurrency,
            call_timeout: Duration::from_secs(self.llm.timeout_secs),
            max_file_bytes: self.llm.max_file_bytes,
            min_confidence: self.llm.min_confidence,
            max_rules_per_file: self.llm.max_rules_per_file,
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RepostyleError::invalid_input(format!("{} has invalid value '{}'", name, value)))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RepostyleError::invalid_input(format!(
            "{} has invalid value '{}'",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.contract_path, PathBuf::from("repostyle.contract.yaml"));
        assert_eq!(settings.max_files, 200);
        assert_eq!(settings.llm.concurrency, 4);
        assert_eq!(settings.llm.timeout_secs, 60);
        assert_eq!(settings.llm.max_file_bytes, 65_536);
    }

    #[test]
    fn test_toml_partial_file() {
        let settings = Settings::from_toml_str(
            "contract_path = \"out/contract.json\"\n\n[llm]\nenabled = false\n",
        )
        .unwrap();
        assert_eq!(settings.contract_path, PathBuf::from("out/contract.json"));
        assert!(!settings.llm.enabled);
        assert_eq!(settings.llm.concurrency, 4);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let err = Settings::from_toml_str("max_filez = 3\n").unwrap_err();
        assert!(matches!(err, RepostyleError::ParseError(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("REPOSTYLE_MAX_FILES", "50"),
            ("REPOSTYLE_LLM_ENABLED", "no"),
            ("REPOSTYLE_SCHEMA", "schema.json"),
        ]
        .into();
        let mut settings = Settings::default();
        settings
            .apply_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(settings.max_files, 50);
        assert!(!settings.llm.enabled);
        assert_eq!(settings.schema_path, Some(PathBuf::from("schema.json")));
    }

    #[test]
    fn test_invalid_env_value() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|k| (k == "REPOSTYLE_MAX_FILES").then(|| "lots".to_string()))
            .unwrap_err();
        assert!(err.is_user_error());

        let err = settings
            .apply_overrides(|k| (k == "REPOSTYLE_LLM_CONCURRENCY").then(|| "0".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_extractor_config() {
        let mut settings = Settings::default();
        settings.llm.timeout_secs = 5;
        let config = settings.extractor_config();
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.min_confidence, 0.55);
    }
}
