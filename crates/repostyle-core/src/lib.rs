//! repostyle core
//!
//! Infers a repository's coding conventions and compiles them into a
//! versioned, schema-validated contract of citable rules.
//!
//! ## Pipeline
//!
//! 1. **Signals** (`signals/`): scanners walk the tree and emit typed
//!    observations (`config.black.lineLength`, `ts.export.any.count`, ...).
//!
//! 2. **Projection** (`engine::projector`): a fixed table maps signal kinds to
//!    deterministic rules with fixed ids and confidences.
//!
//! 3. **Extraction** (`engine::extractor`, `oracle/`): an optional language
//!    model proposes further rules per referenced file. Every failure is
//!    isolated to its file.
//!
//! 4. **Dedupe and build** (`engine::dedupe`, `contracts::builder`): rules are
//!    merged deterministic-first, deduplicated by id and validated against the
//!    bundled JSON schema.
//!
//! 5. **Consumers** (`store`, `report/`, `runtime/`): the contract is persisted
//!    atomically, rendered to AGENTS.md or SARIF, checked with local tools and
//!    turned into config suggestions.
//!
//! ## Example
//!
//! ```rust,no_run
//! use repostyle_core::{ContractBuilder, ContractStore, SynthesisEngine};
//!
//! #[tokio::main]
//! async fn main() -> repostyle_core::Result<()> {
//!     let repo = repostyle_core::repo::materialize(".", None).await?;
//!     let engine = SynthesisEngine::new(ContractBuilder::new()?)?;
//!     let outcome = engine.synthesize(&repo.root, repo.identity.clone()).await?;
//!
//!     ContractStore::for_path("repostyle.contract.yaml").persist(&outcome.contract)?;
//!     Ok(())
//! }
//! ```

pub mod contracts;
pub mod engine;
pub mod error;
pub mod oracle;
pub mod repo;
pub mod report;
pub mod runtime;
pub mod settings;
pub mod signals;
pub mod store;
pub mod telemetry;

pub use contracts::{
    Autofix, Contract, ContractBuilder, ContractSchema, Evidence, RepoIdentity, Rule, Severity,
    Signal, Violation, SCHEMA_VERSION,
};
pub use engine::{
    canonical_command_block, canonical_commands, rule_to_commands, ExtractionOutcome, Extractor,
    ExtractorConfig, Projector, SynthesisEngine, SynthesisOutcome,
};
pub use error::{RepostyleError, Result};
pub use oracle::{AzureOpenAiOracle, Oracle, OracleConfig, OracleError};
pub use settings::Settings;
pub use signals::{ScanBundle, SignalScanner};
pub use store::ContractStore;
pub use telemetry::ScanMetrics;

/// Crate version (from Cargo.toml)
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
