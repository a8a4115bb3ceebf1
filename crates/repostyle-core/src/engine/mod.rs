//! Synthesis engine
//!
//! The single pipeline that turns a repository into a contract:
//!
//! 1. scanners emit signals (concurrently)
//! 2. the projector maps signals to deterministic rules
//! 3. the extractor asks the oracle for rules per referenced file (optional)
//! 4. deterministic rules are merged ahead of probabilistic ones and deduplicated
//! 5. the builder stamps and validates the contract
//!
//! Per-file and per-scanner failures are absorbed along the way. Only
//! structural failures (schema violations) abort a run.

pub mod commands;
pub mod dedupe;
pub mod extractor;
pub mod projector;

use std::path::Path;
use std::sync::Arc;

pub use commands::{canonical_command_block, canonical_commands, rule_to_commands};
pub use dedupe::{dedupe_rules, DedupeOutcome, DroppedRule};
pub use extractor::{ExtractionOutcome, Extractor, ExtractorConfig, FileFailure};
pub use projector::Projector;

use crate::contracts::{Contract, ContractBuilder, RepoIdentity};
use crate::error::Result;
use crate::signals::{self, ScanBundle, SignalScanner};
use crate::telemetry::metrics::{ORIGIN_DETERMINISTIC, ORIGIN_PROBABILISTIC};
use crate::telemetry::ScanMetrics;

/// Everything a synthesis run produced
pub struct SynthesisOutcome {
    pub contract: Contract,
    pub bundle: ScanBundle,
    pub deterministic_rules: usize,
    pub extraction: Option<ExtractionOutcome>,
    pub dropped: Vec<DroppedRule>,
    pub metrics: ScanMetrics,
}

/// Signal-to-rule synthesis pipeline
pub struct SynthesisEngine {
    scanners: Vec<Arc<dyn SignalScanner>>,
    projector: Projector,
    extractor: Option<Extractor>,
    builder: ContractBuilder,
    max_files: usize,
}

impl SynthesisEngine {
    /// Engine with the default scanners and projection table, no oracle
    pub fn new(builder: ContractBuilder) -> Result<Self> {
        Ok(Self {
            scanners: signals::default_scanners(),
            projector: Projector::new()?,
            extractor: None,
            builder,
            max_files: signals::DEFAULT_MAX_FILES,
        })
    }

    pub fn with_scanners(mut self, scanners: Vec<Arc<dyn SignalScanner>>) -> Self {
        self.scanners = scanners;
        self
    }

    pub fn with_extractor(mut self, extractor: Option<Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn with_max_files(mut self, max_files: usize) -> Self {
        self.max_files = max_files;
        self
    }

    pub fn builder(&self) -> &ContractBuilder {
        &self.builder
    }

    pub fn has_extractor(&self) -> bool {
        self.extractor.is_some()
    }

    /// Scan `root` and synthesize a validated contract
    pub async fn synthesize(&self, root: &Path, identity: RepoIdentity) -> Result<SynthesisOutcome> {
        let bundle = signals::scan_repository(root, Some(self.max_files), &self.scanners).await;
        self.synthesize_from(root, identity, bundle).await
    }

    /// Synthesize from signals already gathered
    pub async fn synthesize_from(
        &self,
        root: &Path,
        identity: RepoIdentity,
        bundle: ScanBundle,
    ) -> Result<SynthesisOutcome> {
        let metrics = ScanMetrics::new()?;
        let timer = metrics.start_timer();

        for (scanner, count) in &bundle.per_scanner {
            metrics.record_signals(scanner, *count);
        }
        if bundle.per_scanner.is_empty() {
            metrics.record_signals("external", bundle.signal_count());
        }

        let deterministic = self.projector.project(&bundle.signals);
        let deterministic_rules = deterministic.len();
        metrics.record_rules(ORIGIN_DETERMINISTIC, deterministic_rules);
        tracing::info!(
            signals = bundle.signal_count(),
            rules = deterministic_rules,
            "Deterministic projection complete"
        );

        let extraction = match &self.extractor {
            Some(extractor) => {
                let paths = bundle.referenced_paths();
                tracing::info!(files = paths.len(), oracle = extractor.oracle_name(), "Extracting rules");
                let outcome = extractor.extract(root, &paths).await;
                metrics.record_files_analyzed(outcome.files_analyzed);
                let failed = outcome.failures.len();
                metrics.record_oracle_requests(outcome.files_analyzed - failed, failed);
                metrics.record_rules(ORIGIN_PROBABILISTIC, outcome.rules.len());
                Some(outcome)
            }
            None => {
                tracing::info!("No oracle configured; skipping probabilistic extraction");
                None
            }
        };

        // Deterministic rules come first so they win id collisions.
        let mut merged = deterministic;
        if let Some(outcome) = &extraction {
            merged.extend(outcome.rules.iter().cloned());
        }
        let DedupeOutcome { rules, dropped } = dedupe_rules(merged);
        metrics.record_duplicates(dropped.len());

        drop(timer);
        let contract = self.builder.build(identity, rules, Some(metrics.snapshot()))?;
        tracing::info!(
            rules = contract.rules.len(),
            dropped = dropped.len(),
            "Contract synthesized"
        );

        Ok(SynthesisOutcome {
            contract,
            bundle,
            deterministic_rules,
            extraction,
            dropped,
            metrics,
        })
    }
}
