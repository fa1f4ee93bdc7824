//! clockstep CLI: drives a clocked model through reset and stimulus.
//!
//! Provides `clockstep run` to execute a run, `clockstep check` to validate a
//! configuration against its model without clocking it, and
//! `clockstep presets` to list the built-in configurations.

#![warn(missing_docs)]

mod check;
mod pipeline;
mod presets;
mod run;

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

/// clockstep, a cycle-accurate simulation driver.
#[derive(Parser, Debug)]
#[command(name = "clockstep", version, about = "Cycle-accurate simulation driver")]
pub struct Cli {
    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose (info-level) logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format for run results.
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a run.
    Run(RunArgs),
    /// Validate a configuration and bind it to its model without running.
    Check(RunArgs),
    /// List the built-in presets.
    Presets,
}

/// Arguments shared by `clockstep run` and `clockstep check`.
#[derive(Parser, Debug, Default)]
pub struct RunArgs {
    /// Path to a run configuration file.
    #[arg(short, long, conflicts_with = "preset")]
    pub config: Option<PathBuf>,

    /// Start from a built-in preset instead of a file.
    #[arg(short, long)]
    pub preset: Option<String>,

    /// Override a configuration key (e.g., `--set run.cycle_budget=500`).
    #[arg(short, long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Plusargs such as `+vcd_file=out.vcd`.
    #[arg(value_name = "PLUSARG")]
    pub plusargs: Vec<String>,
}

/// Result output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Global settings derived from CLI flags.
pub struct GlobalArgs {
    /// Whether to suppress non-error output.
    pub quiet: bool,
    /// Whether to print verbose information.
    pub verbose: bool,
    /// How run results are printed.
    pub format: ReportFormat,
}

fn main() {
    let cli = Cli::parse();

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        format: cli.format,
    };
    init_logging(&global);

    let result = match cli.command {
        Command::Run(ref args) => run::run(args, &global),
        Command::Check(ref args) => check::run(args, &global),
        Command::Presets => presets::run(&global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over the flags.
fn init_logging(global: &GlobalArgs) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_level(global)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_log_level(global: &GlobalArgs) -> &'static str {
    if global.quiet {
        "error"
    } else if global.verbose {
        "info"
    } else {
        "warn"
    }
}
