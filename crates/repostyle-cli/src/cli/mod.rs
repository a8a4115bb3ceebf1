//! CLI module for repostyle
//!
//! Scans a repository into a contract, renders AGENTS.md, checks the
//! repository against its contract and proposes config changes.

pub mod commands;
pub mod output;

pub use commands::{CheckFormat, CiCommands, Cli, Commands};
pub use output::OutputFormat;

use repostyle_core::RepostyleError;

/// Exit codes for CLI operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command completed and found nothing blocking
    Success = 0,
    /// `check` found failing rules at or above the fail-on level
    Violations = 1,
    /// Invalid input or arguments
    InvalidInput = 3,
    /// File not found or inaccessible
    FileError = 4,
    /// Contract or schema errors
    SchemaError = 5,
    /// Internal error
    InternalError = 10,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    pub fn from_violations(has_violations: bool) -> Self {
        if has_violations {
            ExitCode::Violations
        } else {
            ExitCode::Success
        }
    }

    /// Map a failed command to its exit code
    pub fn from_error(error: &RepostyleError) -> Self {
        match error {
            RepostyleError::InvalidInput(_) | RepostyleError::RepositoryError(_) => {
                ExitCode::InvalidInput
            }
            RepostyleError::FileError(_) => ExitCode::FileError,
            RepostyleError::ParseError(_)
            | RepostyleError::SchemaError(_)
            | RepostyleError::SchemaViolation(_) => ExitCode::SchemaError,
            RepostyleError::SerializationError(_)
            | RepostyleError::DuplicateProjectionId { .. }
            | RepostyleError::InternalError(_) => ExitCode::InternalError,
        }
    }
}

/// Run the CLI with the given arguments and return the exit code
pub async fn run(cli: Cli) -> Result<ExitCode, RepostyleError> {
    let ctx = commands::Context::load(&cli)?;
    match cli.command {
        Commands::Scan {
            target,
            rev,
            max_files,
            no_llm,
            schema,
            out,
            format,
        } => {
            commands::execute_scan(
                &ctx,
                commands::ScanArgs {
                    target,
                    rev,
                    max_files,
                    no_llm,
                    schema,
                    out,
                    format,
                },
            )
            .await
        }
        Commands::Agents { contract, out } => commands::execute_agents(&ctx, contract, out),
        Commands::Check {
            contract,
            root,
            format,
            sarif_out,
            fail_on,
        } => commands::execute_check(&ctx, contract, root, format, sarif_out, fail_on).await,
        Commands::Suggest {
            contract,
            root,
            apply,
            dry_run,
        } => commands::execute_suggest(&ctx, contract, root, apply, dry_run),
        Commands::Ci {
            command: CiCommands::Init { apply },
        } => commands::execute_ci_init(&ctx, apply),
    }
}
