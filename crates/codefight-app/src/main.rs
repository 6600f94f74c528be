use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use codefight_app::{MatchPlan, PlanOverrides};
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "codefight",
    version,
    about = "Play a CodeFight match plan without interaction"
)]
struct Cli {
    /// JSON match plan to play.
    #[arg(long, env = "CODEFIGHT_PLAN")]
    plan: PathBuf,

    /// Override the plan's step budget.
    #[arg(long)]
    steps: Option<u64>,

    /// Fill free cells randomly with this seed instead of the plan's mode.
    #[arg(long, allow_hyphen_values = true)]
    seed: Option<i32>,

    /// Override the arena size.
    #[arg(long)]
    memory_size: Option<usize>,

    /// Print the full report as JSON instead of one line per AI.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let plan = MatchPlan::load(&cli.plan)
        .with_context(|| format!("failed to load plan {}", cli.plan.display()))?
        .with_overrides(PlanOverrides {
            steps: cli.steps,
            seed: cli.seed,
            memory_size: cli.memory_size,
        });
    info!(plan = %cli.plan.display(), steps = plan.steps, "playing match plan");

    let report = plan.run().context("match aborted")?;
    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{json}");
        return Ok(());
    }

    for stop in &report.stops {
        println!("{} executed {} steps until stopping.", stop.name, stop.steps);
    }
    for survivor in report.survivors() {
        println!("{survivor} is still running.");
    }
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}
