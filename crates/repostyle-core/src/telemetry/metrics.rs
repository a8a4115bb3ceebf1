//! Prometheus metrics for a synthesis run
//!
//! - `repostyle_signals_total` (counter) - signals by scanner
//! - `repostyle_rules_total` (counter) - rules by origin (deterministic, probabilistic)
//! - `repostyle_oracle_requests_total` (counter) - oracle calls by result
//! - `repostyle_duplicates_dropped_total` (counter) - rules dropped by dedupe
//! - `repostyle_files_analyzed_total` (counter) - files sent to the oracle
//! - `repostyle_scan_duration_seconds` (histogram) - end-to-end synthesis time

use prometheus::{Counter, CounterVec, Histogram, HistogramOpts, Opts, Registry};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use super::{Result, TelemetryError};

pub const ORIGIN_DETERMINISTIC: &str = "deterministic";
pub const ORIGIN_PROBABILISTIC: &str = "probabilistic";

/// Metrics for one synthesis run
pub struct ScanMetrics {
    registry: Arc<Registry>,
    signals_total: CounterVec,
    rules_total: CounterVec,
    oracle_requests_total: CounterVec,
    duplicates_dropped_total: Counter,
    files_analyzed_total: Counter,
    scan_duration_seconds: Histogram,
}

impl ScanMetrics {
    /// Metrics on a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Metrics registered on an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let signals_total = CounterVec::new(
            Opts::new("signals_total", "Signals emitted by scanners").namespace("repostyle"),
            &["scanner"],
        )?;

        let rules_total = CounterVec::new(
            Opts::new("rules_total", "Rules produced before deduplication").namespace("repostyle"),
            &["origin"],
        )?;

        let oracle_requests_total = CounterVec::new(
            Opts::new("oracle_requests_total", "Oracle requests by result").namespace("repostyle"),
            &["result"],
        )?;

        let duplicates_dropped_total = Counter::new(
            "repostyle_duplicates_dropped_total",
            "Rules discarded because an earlier rule had the same id",
        )?;

        let files_analyzed_total = Counter::new(
            "repostyle_files_analyzed_total",
            "Files sent to the oracle",
        )?;

        let scan_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("scan_duration_seconds", "End-to-end synthesis duration")
                .namespace("repostyle")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        registry.register(Box::new(signals_total.clone()))?;
        registry.register(Box::new(rules_total.clone()))?;
        registry.register(Box::new(oracle_requests_total.clone()))?;
        registry.register(Box::new(duplicates_dropped_total.clone()))?;
        registry.register(Box::new(files_analyzed_total.clone()))?;
        registry.register(Box::new(scan_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            signals_total,
            rules_total,
            oracle_requests_total,
            duplicates_dropped_total,
            files_analyzed_total,
            scan_duration_seconds,
        })
    }

    pub fn record_signals(&self, scanner: &str, count: usize) {
        self.signals_total
            .with_label_values(&[scanner])
            .inc_by(count as f64);
    }

    pub fn record_rules(&self, origin: &str, count: usize) {
        self.rules_total
            .with_label_values(&[origin])
            .inc_by(count as f64);
    }

    pub fn record_oracle_requests(&self, succeeded: usize, failed: usize) {
        self.oracle_requests_total
            .with_label_values(&["ok"])
            .inc_by(succeeded as f64);
        self.oracle_requests_total
            .with_label_values(&["failed"])
            .inc_by(failed as f64);
    }

    pub fn record_duplicates(&self, count: usize) {
        self.duplicates_dropped_total.inc_by(count as f64);
    }

    pub fn record_files_analyzed(&self, count: usize) {
        self.files_analyzed_total.inc_by(count as f64);
    }

    /// Start a timer that observes the scan duration on drop
    pub fn start_timer(&self) -> ScanTimer<'_> {
        ScanTimer {
            start: Instant::now(),
            metrics: self,
        }
    }

    /// Counter values in the shape stored under `contract.metrics`
    pub fn snapshot(&self) -> BTreeMap<String, serde_json::Value> {
        let signals: f64 = self
            .registry
            .gather()
            .iter()
            .filter(|family| family.get_name() == "repostyle_signals_total")
            .flat_map(|family| family.get_metric().iter())
            .map(|metric| metric.get_counter().get_value())
            .sum();

        let origin = |label: &str| self.rules_total.with_label_values(&[label]).get();

        let mut map = BTreeMap::new();
        map.insert("signalCount".to_string(), json!(signals as u64));
        map.insert(
            "deterministicRules".to_string(),
            json!(origin(ORIGIN_DETERMINISTIC) as u64),
        );
        map.insert(
            "probabilisticRules".to_string(),
            json!(origin(ORIGIN_PROBABILISTIC) as u64),
        );
        map.insert(
            "oracleFailures".to_string(),
            json!(self.oracle_requests_total.with_label_values(&["failed"]).get() as u64),
        );
        map.insert(
            "duplicatesDropped".to_string(),
            json!(self.duplicates_dropped_total.get() as u64),
        );
        map.insert(
            "filesAnalyzed".to_string(),
            json!(self.files_analyzed_total.get() as u64),
        );
        map
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    /// Encode metrics in the Prometheus text exposition format
    pub fn encode_text(&self) -> Result<String> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(|e| TelemetryError::EncodingError(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::EncodingError(e.to_string()))
    }
}

/// RAII guard timing a scan
pub struct ScanTimer<'a> {
    start: Instant,
    metrics: &'a ScanMetrics,
}

impl ScanTimer<'_> {
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Drop for ScanTimer<'_> {
    fn drop(&mut self) {
        self.metrics
            .scan_duration_seconds
            .observe(self.start.elapsed().as_secs_f64());
    }
}
