//! Contract persistence
//!
//! One codec is chosen from the target's extension when the store is created.
//! Writes go to a temporary file in the target directory which is then
//! renamed over the target, so readers never observe a partial contract.
//! The last writer wins.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::contracts::{Contract, ContractBuilder};
use crate::error::{RepostyleError, Result};

/// Encoding of a contract document
pub trait ContractCodec: Send + Sync {
    /// Short format name (`yaml`, `json`)
    fn format(&self) -> &'static str;
    fn encode(&self, contract: &Contract) -> Result<String>;
    fn decode(&self, text: &str) -> Result<Contract>;
}

/// YAML codec (the default contract format)
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlCodec;

impl ContractCodec for YamlCodec {
    fn format(&self) -> &'static str {
        "yaml"
    }

    fn encode(&self, contract: &Contract) -> Result<String> {
        serde_yaml::to_string(contract).map_err(|e| RepostyleError::SerializationError(e.to_string()))
    }

    fn decode(&self, text: &str) -> Result<Contract> {
        Ok(serde_yaml::from_str(text)?)
    }
}

/// Pretty-printed JSON codec
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ContractCodec for JsonCodec {
    fn format(&self) -> &'static str {
        "json"
    }

    fn encode(&self, contract: &Contract) -> Result<String> {
        let mut text = serde_json::to_string_pretty(contract)
            .map_err(|e| RepostyleError::SerializationError(e.to_string()))?;
        text.push('\n');
        Ok(text)
    }

    fn decode(&self, text: &str) -> Result<Contract> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Codec for a path's extension; anything not `.json` is YAML
pub fn codec_for_path(path: &Path) -> Box<dyn ContractCodec> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase) {
        Some(ext) if ext == "json" => Box::new(JsonCodec),
        _ => Box::new(YamlCodec),
    }
}

/// A contract file plus the codec used to read and write it
pub struct ContractStore {
    path: PathBuf,
    codec: Box<dyn ContractCodec>,
}

impl ContractStore {
    /// Store for `path`, choosing the codec from its extension
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let codec = codec_for_path(&path);
        Self { path, codec }
    }

    /// Store with an explicit codec
    pub fn with_codec(path: impl Into<PathBuf>, codec: Box<dyn ContractCodec>) -> Self {
        Self {
            path: path.into(),
            codec,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &'static str {
        self.codec.format()
    }

    /// Atomically replace the stored contract
    pub fn persist(&self, contract: &Contract) -> Result<()> {
        let text = self.codec.encode(contract)?;
        write_atomic(&self.path, text.as_bytes())?;

        tracing::info!(
            path = %self.path.display(),
            format = self.codec.format(),
            rules = contract.rules.len(),
            "Contract persisted"
        );
        Ok(())
    }

    /// Read the stored contract and re-validate it
    pub fn load(&self, builder: &ContractBuilder) -> Result<Contract> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| {
            RepostyleError::file_error(format!(
                "Failed to read contract '{}': {}",
                self.path.display(),
                e
            ))
        })?;
        let contract = self.codec.decode(&text)?;
        builder.validate(&contract)?;
        Ok(contract)
    }
}

/// Write `bytes` to a temporary file beside `path`, then rename over it
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| {
        RepostyleError::file_error(format!(
            "Failed to create directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| {
        RepostyleError::file_error(format!("Failed to write '{}': {}", path.display(), e.error))
    })?;
    Ok(())
}
