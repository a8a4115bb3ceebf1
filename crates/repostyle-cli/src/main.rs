//! repostyle CLI
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: `check` found violations at or above `--fail-on`
//! - 3: Invalid input or arguments
//! - 4: File not found or inaccessible
//! - 5: Contract or schema errors
//! - 10: Internal error

use clap::Parser;
use repostyle_cli::{init_tracing, run_cli, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet, cli.log_json);

    let exit_code = run_cli(cli).await;
    std::process::exit(exit_code.into());
}
