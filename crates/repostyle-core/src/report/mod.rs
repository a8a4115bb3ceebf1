//! Renderers over a persisted contract
//!
//! - [`agents_md`]: the AGENTS.md operating manual
//! - [`scan_report`]: JSON summary of a synthesis run
//! - [`sarif`]: SARIF 2.1.0 for check results

pub mod agents_md;
pub mod sarif;
pub mod scan_report;

pub use scan_report::{ContractSummary, ScanReport};
