//! CLI command definitions for repostyle
//!
//! Clap-based commands for scanning a repository, rendering AGENTS.md,
//! checking compliance and suggesting config changes.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

use repostyle_core::contracts::ContractSchema;
use repostyle_core::report::{agents_md, sarif, ScanReport};
use repostyle_core::runtime::{self, FailOn, ShellRunner};
use repostyle_core::store::write_atomic;
use repostyle_core::{
    repo, Contract, ContractBuilder, ContractStore, Extractor, OracleConfig, RepostyleError,
    Settings, SynthesisEngine,
};

use super::output::{self, OutputFormat, ScanSummary};
use super::ExitCode;

/// Where `ci init` places the workflow
pub const WORKFLOW_PATH: &str = ".github/workflows/repostyle.yml";

const WORKFLOW: &str = r#"name: repostyle
on:
  pull_request:
  push:
    branches: [main]

jobs:
  conventions:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - uses: dtolnay/rust-toolchain@stable
      - name: Install repostyle
        run: cargo install repostyle-cli --locked
      - name: Check contract
        run: repostyle check --format sarif --sarif-out results.sarif --fail-on error
      - name: Upload SARIF
        if: always()
        uses: github/codeql-action/upload-sarif@v3
        with:
          sarif_file: results.sarif
"#;

/// repostyle CLI
///
/// Infer a repository's coding conventions, compile them into a versioned
/// contract and hold the repository to it.
#[derive(Parser, Debug)]
#[command(name = "repostyle")]
#[command(about = "Infer coding conventions and enforce them as a contract", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress human-readable output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Settings file (defaults to ./repostyle.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a repository and write its contract
    ///
    /// Accepts a local path or a GitHub locator (https://github.com/o/r,
    /// github:o/r). The language model pass runs only when Azure OpenAI
    /// credentials are present in the environment.
    Scan {
        /// Local path or GitHub locator
        #[arg(default_value = ".")]
        target: String,

        /// Revision to scan (default HEAD)
        #[arg(long)]
        rev: Option<String>,

        /// Maximum files examined per scanner
        #[arg(long)]
        max_files: Option<usize>,

        /// Skip the language model pass
        #[arg(long)]
        no_llm: bool,

        /// External contract schema replacing the bundled one
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Contract output path (.yaml or .json)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Output format for the scan summary
        #[arg(long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Render AGENTS.md from the contract
    Agents {
        /// Contract path
        #[arg(long)]
        contract: Option<PathBuf>,

        /// Output path
        #[arg(short, long, default_value = "AGENTS.md")]
        out: PathBuf,
    },

    /// Run each rule's local verifiers
    Check {
        /// Contract path
        #[arg(long)]
        contract: Option<PathBuf>,

        /// Repository root the verifiers run in
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Output format for check results
        #[arg(long, value_enum, default_value = "table")]
        format: CheckFormat,

        /// Also write SARIF to this path
        #[arg(long)]
        sarif_out: Option<PathBuf>,

        /// Lowest failing severity that fails the command (warn, error, none)
        #[arg(long, default_value = "error")]
        fail_on: FailOn,
    },

    /// Propose minimal config changes that match the contract
    Suggest {
        /// Contract path
        #[arg(long)]
        contract: Option<PathBuf>,

        /// Repository root
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Write the suggested changes
        #[arg(long)]
        apply: bool,

        /// Print the changes without writing (wins over --apply)
        #[arg(long)]
        dry_run: bool,
    },

    /// CI integration
    Ci {
        #[command(subcommand)]
        command: CiCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum CiCommands {
    /// Print or write a GitHub Actions workflow that checks the contract
    Init {
        /// Write the workflow instead of printing it
        #[arg(long)]
        apply: bool,
    },
}

/// Output format for `check`
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Debug, Default)]
pub enum CheckFormat {
    #[default]
    Table,
    Json,
    Sarif,
}

/// Shared state for every command
#[derive(Debug)]
pub struct Context {
    pub settings: Settings,
    pub quiet: bool,
}

impl Context {
    pub fn load(cli: &Cli) -> Result<Self, RepostyleError> {
        Ok(Self {
            settings: Settings::load(cli.config.as_deref())?,
            quiet: cli.quiet,
        })
    }

    fn contract_builder(&self, schema: Option<&Path>) -> Result<ContractBuilder, RepostyleError> {
        match schema.or(self.settings.schema_path.as_deref()) {
            Some(path) => {
                tracing::info!(schema = %path.display(), "Using external contract schema");
                Ok(ContractBuilder::with_schema(ContractSchema::from_path(path)?))
            }
            None => ContractBuilder::new(),
        }
    }

    fn contract_path(&self, explicit: Option<PathBuf>) -> PathBuf {
        explicit.unwrap_or_else(|| self.settings.contract_path.clone())
    }

    fn load_contract(&self, explicit: Option<PathBuf>) -> Result<(Contract, PathBuf), RepostyleError> {
        let path = self.contract_path(explicit);
        let contract = ContractStore::for_path(&path).load(&self.contract_builder(None)?)?;
        tracing::debug!(path = %path.display(), rules = contract.rules.len(), "Contract loaded");
        Ok((contract, path))
    }
}

/// Arguments of `scan`
#[derive(Debug)]
pub struct ScanArgs {
    pub target: String,
    pub rev: Option<String>,
    pub max_files: Option<usize>,
    pub no_llm: bool,
    pub schema: Option<PathBuf>,
    pub out: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Build the extractor when the oracle is enabled and configured.
///
/// Missing credentials are not an error: the scan proceeds with
/// deterministic rules only.
fn build_extractor(settings: &Settings, no_llm: bool) -> Option<Extractor> {
    if no_llm || !settings.llm.enabled {
        tracing::info!("Language model pass disabled");
        return None;
    }
    let oracle = match OracleConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "Oracle not configured; emitting deterministic rules only");
            return None;
        }
    };
    match Extractor::azure(oracle, settings.extractor_config()) {
        Ok(extractor) => Some(extractor),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize oracle; emitting deterministic rules only");
            None
        }
    }
}

/// Execute the scan command
pub async fn execute_scan(ctx: &Context, args: ScanArgs) -> Result<ExitCode, RepostyleError> {
    let mut settings = ctx.settings.clone();
    if let Some(max_files) = args.max_files {
        if max_files == 0 {
            return Err(RepostyleError::invalid_input("--max-files must be at least 1"));
        }
        settings.max_files = max_files;
    }
    if let Some(out) = args.out {
        settings.contract_path = out;
    }

    let builder = ctx.contract_builder(args.schema.as_deref())?;
    let repository = repo::materialize(&args.target, args.rev.as_deref()).await?;
    tracing::info!(
        root = %repository.root.display(),
        sha = %repository.identity.sha,
        "Repository ready"
    );

    let engine = SynthesisEngine::new(builder)?
        .with_max_files(settings.max_files)
        .with_extractor(build_extractor(&settings, args.no_llm));
    let outcome = engine
        .synthesize(&repository.root, repository.identity.clone())
        .await?;

    ContractStore::for_path(&settings.contract_path).persist(&outcome.contract)?;
    let report = ScanReport::from_outcome(&outcome, &settings.contract_path)?;
    report.write(&settings.report_path)?;

    if !ctx.quiet || args.format != OutputFormat::Table {
        let summary = ScanSummary::new(&outcome, &settings.contract_path, &settings.report_path);
        output::render(&summary, args.format, ScanSummary::render_table)?;
    }
    Ok(ExitCode::Success)
}

/// Execute the agents command
pub fn execute_agents(
    ctx: &Context,
    contract: Option<PathBuf>,
    out: PathBuf,
) -> Result<ExitCode, RepostyleError> {
    let (contract, source) = ctx.load_contract(contract)?;
    agents_md::write(&contract, &source, &out)?;

    if !ctx.quiet {
        let enforced = contract
            .rules
            .iter()
            .filter(|r| r.confidence >= agents_md::ENFORCED_CONFIDENCE)
            .count();
        output::print_written(
            &out,
            &format!(
                "{} enforced, {} candidate rule(s)",
                enforced,
                contract.rules.len() - enforced
            ),
        );
    }
    Ok(ExitCode::Success)
}

/// Execute the check command
pub async fn execute_check(
    ctx: &Context,
    contract: Option<PathBuf>,
    root: PathBuf,
    format: CheckFormat,
    sarif_out: Option<PathBuf>,
    fail_on: FailOn,
) -> Result<ExitCode, RepostyleError> {
    let (contract, _) = ctx.load_contract(contract)?;
    if !root.is_dir() {
        return Err(RepostyleError::invalid_input(format!(
            "'{}' is not a directory",
            root.display()
        )));
    }

    let report = runtime::run_checks(&contract, &root, &ShellRunner, fail_on).await;

    if let Some(path) = &sarif_out {
        sarif::write(&contract, &report, path)?;
    }
    match format {
        CheckFormat::Table => {
            if !ctx.quiet {
                output::render_check_table(&report);
            }
        }
        CheckFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        CheckFormat::Sarif => println!("{}", sarif::to_json(&contract, &report)?),
    }
    Ok(ExitCode::from_violations(report.has_violations))
}

/// Execute the suggest command
pub fn execute_suggest(
    ctx: &Context,
    contract: Option<PathBuf>,
    root: PathBuf,
    apply: bool,
    dry_run: bool,
) -> Result<ExitCode, RepostyleError> {
    let (contract, _) = ctx.load_contract(contract)?;
    let suggestions = runtime::suggest(&contract, &root)?;

    let write = apply && !dry_run;
    if write {
        runtime::apply(&suggestions, &root)?;
    }
    if !ctx.quiet {
        output::render_suggestions(&suggestions, write);
    }
    Ok(ExitCode::Success)
}

/// Execute `ci init`
pub fn execute_ci_init(ctx: &Context, apply: bool) -> Result<ExitCode, RepostyleError> {
    if apply {
        let path = Path::new(WORKFLOW_PATH);
        write_atomic(path, WORKFLOW.as_bytes())?;
        if !ctx.quiet {
            output::print_written(path, "GitHub Actions workflow");
        }
    } else {
        print!("{}", WORKFLOW);
    }
    Ok(ExitCode::Success)
}
