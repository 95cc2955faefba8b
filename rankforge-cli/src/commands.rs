//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::StrategyArg;
use crate::args::RunArgs;
use rankforge_core::config::{SETTINGS_FILE, settings_exist};
use rankforge_core::{
    Algorithm, ConfigResolver, Configuration, HyperparamSweep, Metric, RngSuite, RunManifest,
    SearchSpace, Settings, SweepStrategy,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Trials drawn by a random sweep when neither `--trials` nor
/// `hyperopt_trail` says otherwise.
const DEFAULT_TRIALS: usize = 30;

/// Handle a CLI subcommand.
pub fn handle_command(
    command: Commands,
    workspace: &Path,
    settings: &Settings,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, settings),
        Commands::Algorithms => {
            print!("{}", render_algorithms());
            Ok(())
        }
        Commands::Metrics => {
            print!("{}", render_metrics());
            Ok(())
        }
        Commands::Sweep {
            run,
            strategy,
            trials,
        } => handle_sweep(&run, strategy, trials, workspace, settings),
        Commands::Prepare { run } => {
            let (manifest, path) = prepare_run(&run, workspace, settings)?;
            println!("Prepared run {}", manifest.run_id);
            println!("  algorithm: {}", manifest.algorithm.as_deref().unwrap_or("-"));
            println!("  seed:      {}", manifest.seed);
            println!("  digest:    {}", manifest.config_digest);
            println!("  manifest:  {}", path.display());
            Ok(())
        }
    }
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    settings: &Settings,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let settings_path = workspace.join(SETTINGS_FILE);
            if settings_exist(workspace) {
                println!(
                    "Settings file already exists at: {}",
                    settings_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&Settings::default())?;
            std::fs::write(&settings_path, &toml_str)?;
            println!("Created default settings at: {}", settings_path.display());
            Ok(())
        }
        ConfigAction::Show { run, explain } => {
            let config = resolve(&run, workspace, settings)?;
            if explain {
                print!("{}", render_explain(&config));
            } else {
                print!("{}", config.to_yaml()?);
            }
            Ok(())
        }
    }
}

fn handle_sweep(
    run: &RunArgs,
    strategy: StrategyArg,
    trials: Option<usize>,
    workspace: &Path,
    settings: &Settings,
) -> anyhow::Result<()> {
    let sweep = build_sweep(run, strategy, trials, workspace, settings)?;
    println!(
        "Sweep {} over {} ({} trials)",
        sweep.id,
        sweep.space.algorithm(),
        sweep.trials.len()
    );
    for trial in &sweep.trials {
        println!(
            "  #{:<4} {}",
            trial.trial_number,
            serde_json::to_string(&trial.params)?
        );
    }
    Ok(())
}

fn resolver(workspace: &Path, settings: &Settings) -> ConfigResolver {
    ConfigResolver::new(settings.config_root(workspace))
}

fn resolve(run: &RunArgs, workspace: &Path, settings: &Settings) -> anyhow::Result<Configuration> {
    Ok(resolver(workspace, settings).resolve(&run.to_layer(), None)?)
}

/// Build the sweep for the resolved configuration and generate its trials.
pub(crate) fn build_sweep(
    run: &RunArgs,
    strategy: StrategyArg,
    trials: Option<usize>,
    workspace: &Path,
    settings: &Settings,
) -> anyhow::Result<HyperparamSweep> {
    let config = resolve(run, workspace, settings)?;
    let space = SearchSpace::from_config(&config)?;
    let strategy = match strategy {
        StrategyArg::Grid => SweepStrategy::Grid,
        StrategyArg::Random => {
            let n_trials = match trials {
                Some(n) => n,
                None => config
                    .get_i64("hyperopt_trail")?
                    .and_then(|n| usize::try_from(n).ok())
                    .unwrap_or(DEFAULT_TRIALS),
            };
            SweepStrategy::Random { n_trials }
        }
    };

    let rng = RngSuite::from_config(&config)?;
    let mut sweep = HyperparamSweep::new(space, strategy);
    sweep.generate_trials(&rng)?;
    Ok(sweep)
}

/// Resolve, validate and seed a run, then write its manifest.
///
/// Metrics, the initializer and typed hyperparameters are checked up front
/// so a run never starts from a configuration the training loop would
/// reject later.
pub(crate) fn prepare_run(
    run: &RunArgs,
    workspace: &Path,
    settings: &Settings,
) -> anyhow::Result<(RunManifest, PathBuf)> {
    let config = resolve(run, workspace, settings)?;
    config.metrics()?;
    config.initializer()?;
    config.typed_hyperparams()?;

    let rng = RngSuite::from_config(&config)?;
    let manifest = RunManifest::new(&config, &rng)?;
    let path = manifest.write_to(&settings.manifest_root(workspace))?;
    Ok((manifest, path))
}

/// One line per key: name, originating layer, compact JSON value.
pub(crate) fn render_explain(config: &Configuration) -> String {
    let width = config.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
    let mut out = String::new();
    for (key, value) in config.iter() {
        let source = config
            .source(key)
            .map(|s| s.to_string())
            .unwrap_or_default();
        let _ = writeln!(out, "{key:<width$}  {source:<12}  {value}");
    }
    out
}

pub(crate) fn render_algorithms() -> String {
    let mut out = String::new();
    for algorithm in Algorithm::ALL {
        let model = algorithm.model();
        let params = algorithm
            .tunable_params()
            .iter()
            .map(|p| format!("{}:{}", p, p.param_type()))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            out,
            "{:<10} {:<14} {:<14} {}",
            algorithm.key(),
            model.name,
            model.family.to_string(),
            if params.is_empty() { "-" } else { params.as_str() }
        );
    }
    out
}

pub(crate) fn render_metrics() -> String {
    let mut out = String::new();
    for metric in Metric::ALL {
        let direction = if metric.higher_is_better() {
            "higher"
        } else {
            "lower"
        };
        let _ = writeln!(
            out,
            "{:<10} {:<10} {:<16} {} is better",
            metric.key(),
            metric.display_name(),
            metric.kind().to_string(),
            direction
        );
    }
    out
}
