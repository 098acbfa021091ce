#![forbid(unsafe_code)]

mod cmd;
mod output;

use clap::{Parser, Subcommand};
use output::{OutputMode, resolve_output_mode};
use std::env;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "completion: reconcile completion state against progress",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Path to the TOML config (missing file means defaults).
    #[arg(long, global = true, default_value = "completion.toml")]
    config: PathBuf,

    /// Output format.
    #[arg(long, global = true, value_enum)]
    format: Option<OutputMode>,

    /// Shorthand for `--format json`.
    #[arg(long, global = true)]
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
    #[command(
        about = "Evaluate the aggregate policy against one progress sample",
        after_help = "EXAMPLES:\n    # 7 of 10 against an 80% threshold\n    completion evaluate --absolute 7 --max 10 --percentage 0.8\n\n    # Absolute threshold\n    completion evaluate --absolute 3 --count 3"
    )]
    Evaluate(cmd::evaluate::EvaluateArgs),

    #[command(
        about = "Replay a JSON scenario through the reconciliation engine",
        after_help = "EXAMPLES:\n    completion reconcile scenario.json\n    completion --json reconcile scenario.json"
    )]
    Reconcile(cmd::reconcile::ReconcileArgs),

    #[command(about = "Show the effective configuration")]
    Config(cmd::config::ConfigArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("COMPLETION_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "completion=debug,completion_core=debug,info"
        } else {
            "completion=info,completion_core=info,warn"
        })
    });

    let format = env::var("COMPLETION_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

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

fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    let output = cli.output_mode();
    let config = completion_core::load_config(&cli.config)?;

    match cli.command {
        Commands::Evaluate(ref args) => cmd::evaluate::run_evaluate(args, &config, output),
        Commands::Reconcile(ref args) => cmd::reconcile::run_reconcile(args, &config, output),
        Commands::Config(ref args) => cmd::config::run_config(args, &config, output),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_flag_parses_after_subcommand() {
        let cli = Cli::parse_from(["completion", "config", "--json"]);
        assert!(cli.json);
        assert!(cli.output_mode().is_json());
    }

    #[test]
    fn config_defaults_to_working_directory_file() {
        let cli = Cli::parse_from(["completion", "config"]);
        assert_eq!(cli.config, PathBuf::from("completion.toml"));
    }

    #[test]
    fn evaluate_args_parse() {
        let cli = Cli::parse_from([
            "completion",
            "evaluate",
            "--absolute",
            "3",
            "--max",
            "4",
            "--unsuccessful",
            "tag:q1",
            "--unsuccessful",
            "tag:q2",
        ]);
        let Commands::Evaluate(args) = cli.command else {
            panic!("expected evaluate");
        };
        assert!((args.absolute - 3.0).abs() < f64::EPSILON);
        assert_eq!(args.max, Some(4.0));
        assert_eq!(args.unsuccessful.len(), 2);
    }
}
