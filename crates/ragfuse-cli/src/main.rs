#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{CliError, OutputMode, render_error, resolve_output_mode};
use std::env;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ragfuse: fuse retrieval results from many RAG techniques",
    long_about = None
)]
struct Cli {
    /// Enable debug logging on stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty, text, or json.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true, hide = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

impl Cli {
    fn output_mode(&self) -> OutputMode {
        resolve_output_mode(self.format, self.json)
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    Aggregate(cmd::aggregate::AggregateArgs),

    Hybrid(cmd::hybrid::HybridArgs),

    #[command(
        about = "Show the effective configuration",
        long_about = "Print the configuration that `aggregate` and `hybrid` start from: \
                      .ragfuse/config.toml in the current directory when present, otherwise \
                      the user config file, otherwise built-in defaults.",
        after_help = "EXAMPLES:\n    # TOML, ready to paste into .ragfuse/config.toml\n    ragfuse config --format text\n\n\
                      # Machine-readable output\n    ragfuse config --format json"
    )]
    Config,
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("RAGFUSE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if verbose || env::var("DEBUG").is_ok() {
            "ragfuse=debug,info"
        } else {
            "ragfuse=info,warn"
        })
    });

    let format = env::var("RAGFUSE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries command output, so logs always go to stderr.
    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn run(cli: &Cli, output: OutputMode) -> anyhow::Result<()> {
    let project_root = env::current_dir()?;
    debug!(root = %project_root.display(), ?output, "resolved project root");

    match &cli.command {
        Commands::Aggregate(args) => cmd::aggregate::run_aggregate(args, output, &project_root),
        Commands::Hybrid(args) => cmd::hybrid::run_hybrid(args, output, &project_root),
        Commands::Config => cmd::config::run_config(output, &project_root),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let output = cli.output_mode();

    match run(&cli, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            debug!("command failed: {err:#}");
            if let Err(render_err) = render_error(output, &CliError::from_error(&err)) {
                eprintln!("error: {err:#} ({render_err})");
            }
            ExitCode::FAILURE
        }
    }
}
