//! Read-only consumers of a persisted contract: verification and config
//! suggestions.

pub mod check;
pub mod suggest;

pub use check::{run_checks, CheckReport, CommandRunner, FailOn, RuleCheck, RuleStatus, ShellRunner};
pub use suggest::{apply, suggest, Suggestion};
