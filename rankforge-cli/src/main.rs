//! Rankforge CLI: resolve, inspect and seed recommender experiments.

mod args;
mod commands;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use args::RunArgs;

/// Rankforge: layered experiment configuration for recommender research
#[derive(Parser, Debug)]
#[command(name = "rankforge", version, about, long_about = None)]
struct Cli {
    /// Workspace directory (holds rankforge.toml and the config tree)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Inspect or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// List registered algorithms with their tunable hyperparameters
    Algorithms,
    /// List evaluation metrics
    Metrics,
    /// Expand the algorithm's tune_space into trials
    Sweep {
        #[command(flatten)]
        run: RunArgs,

        /// Search strategy
        #[arg(long, value_enum, default_value_t = StrategyArg::Random)]
        strategy: StrategyArg,

        /// Number of random trials (defaults to the `hyperopt_trail` key)
        #[arg(long)]
        trials: Option<usize>,
    },
    /// Resolve the configuration, seed the run and write its manifest
    Prepare {
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Print the resolved experiment configuration
    Show {
        #[command(flatten)]
        run: RunArgs,

        /// Show which layer each key came from
        #[arg(long)]
        explain: bool,
    },
    /// Create a default rankforge.toml in the workspace
    Init,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyArg {
    Grid,
    Random,
}

fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let settings = rankforge_core::load_settings(Some(&workspace), None)
        .map_err(|e| anyhow::anyhow!("Settings error: {}", e))?;

    // Set up tracing: human-readable stderr + optional JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error".to_string(),
        0 => settings.log.level.clone(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let mut _guard = None;
    let json_layer = if settings.log.json_file {
        let log_dir = rankforge_core::config::project_dirs()
            .map(|d| d.data_dir().join("logs"))
            .unwrap_or_else(|| PathBuf::from("."));
        let _ = std::fs::create_dir_all(&log_dir);
        let file_appender = tracing_appender::rolling::daily(&log_dir, "rankforge.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        _guard = Some(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new("debug")),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    commands::handle_command(cli.command, &workspace, &settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cli_parses_config_show() {
        let cli = Cli::try_parse_from([
            "rankforge",
            "config",
            "show",
            "--algo_name",
            "ngcf",
            "--seed",
            "-7",
            "--explain",
        ])
        .unwrap();
        let Commands::Config {
            action: ConfigAction::Show { run, explain },
        } = cli.command
        else {
            panic!("expected config show");
        };
        assert!(explain);
        let layer = run.to_layer();
        assert_eq!(layer["algo_name"], json!("ngcf"));
        assert_eq!(layer["seed"], json!(-7));
    }

    #[test]
    fn test_cli_parses_repeated_set() {
        let cli = Cli::try_parse_from([
            "rankforge",
            "prepare",
            "--set",
            "lr=0.01",
            "--set",
            "metrics=[ndcg]",
        ])
        .unwrap();
        let Commands::Prepare { run } = cli.command else {
            panic!("expected prepare");
        };
        let layer = run.to_layer();
        assert_eq!(layer["lr"], json!(0.01));
        assert_eq!(layer["metrics"], json!(["ndcg"]));
    }

    #[test]
    fn test_cli_sweep_defaults() {
        let cli = Cli::try_parse_from(["rankforge", "sweep"]).unwrap();
        let Commands::Sweep {
            strategy, trials, ..
        } = cli.command
        else {
            panic!("expected sweep");
        };
        assert_eq!(strategy, StrategyArg::Random);
        assert_eq!(trials, None);
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["rankforge", "algorithms", "-vv", "--workspace", "/tmp"]).unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.workspace, PathBuf::from("/tmp"));
        assert!(matches!(cli.command, Commands::Algorithms));
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["rankforge", "prepare", "--epochs", "many"]).is_err());
        assert!(Cli::try_parse_from(["rankforge", "prepare", "--set", "novalue"]).is_err());
        assert!(
            Cli::try_parse_from(["rankforge", "sweep", "--strategy", "bayes"]).is_err()
        );
        assert!(Cli::try_parse_from(["rankforge"]).is_err());
    }
}
