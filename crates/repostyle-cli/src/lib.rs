//! repostyle command-line interface
//!
//! ```bash
//! # Synthesize the contract for the current repository
//! repostyle scan .
//!
//! # Render the agent manual
//! repostyle agents --out AGENTS.md
//!
//! # Run local verifiers, failing on error-severity rules
//! repostyle check --fail-on error --format sarif --sarif-out results.sarif
//! ```

pub mod cli;

pub use cli::{Cli, Commands, ExitCode, OutputFormat};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default log directive for a `-v` count; `RUST_LOG` takes precedence
pub fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Install the global subscriber. Logs go to stderr so stdout stays parseable.
pub fn init_tracing(verbose: u8, quiet: bool, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(verbose, quiet)));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Run the CLI, printing any error and mapping it to an exit code
pub async fn run_cli(cli: Cli) -> ExitCode {
    match cli::run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            tracing::debug!(user_error = e.is_user_error(), "Command failed");
            ExitCode::from_error(&e)
        }
    }
}
