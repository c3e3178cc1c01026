//! Headless scenario player.
//!
//! Runs the built-in demo scenarios to completion with no rendering and
//! prints a summary of each run. Every scenario is played twice and the
//! final state hashes compared.
//!
//! ```text
//! scenaria-headless --scenario cut_in --ticks 1200 --json
//! scenaria-headless --list
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scenaria_core::config::EngineConfig;

mod error;
mod runner;
mod scenarios;

use error::RunError;
use runner::{CheckedRun, RunOptions, run_checked};
use scenarios::DemoScenario;

#[derive(Parser, Debug)]
#[command(name = "scenaria-headless", about = "Play storyboard scenarios without a renderer")]
struct Args {
    /// Scenario to run, or "all".
    #[arg(short, long, default_value = "all")]
    scenario: String,

    /// Maximum ticks per run.
    #[arg(short, long, default_value_t = 600)]
    ticks: u64,

    /// Step length in seconds. Defaults to the config's fixed step.
    #[arg(long)]
    step: Option<f64>,

    /// Engine config (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,

    /// List the built-in scenarios and exit.
    #[arg(long)]
    list: bool,

    /// Print reports as JSON.
    #[arg(long)]
    json: bool,
}

fn load_config(path: Option<&PathBuf>) -> Result<EngineConfig, RunError> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let src = std::fs::read_to_string(path).map_err(|source| RunError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(EngineConfig::from_toml_str(&src)?)
}

fn selected(name: &str) -> Result<Vec<DemoScenario>, RunError> {
    if name.eq_ignore_ascii_case("all") {
        return Ok(DemoScenario::ALL.to_vec());
    }
    name.parse::<DemoScenario>()
        .map(|demo| vec![demo])
        .map_err(|_| RunError::UnknownScenario(name.to_string()))
}

fn print_text(run: &CheckedRun) {
    let report = &run.report;
    println!(
        "{:<12} {:>8} after {:>5} ticks ({:.2} s), stories {}/{}, {} events, hash {}{}",
        report.scenario,
        report.outcome,
        report.ticks_run,
        report.elapsed_secs,
        report.stories_completed,
        report.stories_total,
        report.events_delivered,
        report.state_hash,
        if run.deterministic { "" } else { " (MISMATCH)" },
    );
    for entity in &report.entities {
        println!(
            "    {:<10} speed {:>6.2} m/s  lane {:>3} offset {:>6.2}  travelled {:>8.2} m  at ({:.2}, {:.2})",
            entity.name,
            entity.speed,
            entity.lane_id,
            entity.lane_offset,
            entity.distance_travelled,
            entity.position[0],
            entity.position[1],
        );
    }
}

fn run(args: &Args) -> Result<bool, RunError> {
    let config = load_config(args.config.as_ref())?;
    let options = RunOptions {
        max_ticks: args.ticks,
        step: args.step.unwrap_or(config.fixed_step_secs),
        config,
    };
    let demos = selected(&args.scenario)?;
    info!(scenarios = demos.len(), step = options.step, max_ticks = options.max_ticks, "starting");

    let mut runs = Vec::with_capacity(demos.len());
    for demo in demos {
        runs.push(run_checked(demo, &options)?);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&runs)?);
    } else {
        for run in &runs {
            print_text(run);
        }
    }
    Ok(runs.iter().all(|run| run.deterministic))
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if args.list {
        for demo in DemoScenario::ALL {
            println!("{:<12} {}", demo.name(), demo.description());
        }
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => {
            error!("at least one scenario was not deterministic");
            ExitCode::from(1)
        }
        Err(err) => {
            error!("{err}");
            ExitCode::from(2)
        }
    }
}
