use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use rltf::{
    rltf_candle_agent::registry::ModelKind,
    run::{self, RunConfig},
};

/// Train reinforcement learning models of the catalogue.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered models
    List,

    /// Train a model on CartPole (discrete actions) or Pendulum (continuous actions)
    Train(TrainArgs),
}

#[derive(Args, Debug)]
struct TrainArgs {
    /// Name of the model, e.g. DQN or BstrapDQN_IDS
    #[arg(short, long)]
    model: String,

    /// The number of optimization steps
    #[arg(long, default_value_t = 10_000)]
    max_opts: usize,

    /// Output directory
    #[arg(long, default_value = "./logs")]
    log_dir: String,

    /// Interval of evaluation in optimization steps
    #[arg(long, default_value_t = 1_000)]
    eval_interval: usize,

    /// Random seed
    #[arg(long, default_value_t = 42)]
    seed: i64,

    /// Configuration of the run in YAML, overridden by the other options
    #[arg(long)]
    config: Option<String>,
}

fn list() {
    println!(
        "{:<20} {:<12} {:<12} {}",
        "name", "family", "actions", "distributional"
    );
    for kind in ModelKind::ALL.iter() {
        println!(
            "{:<20} {:<12} {:<12} {}",
            kind.name(),
            kind.family(),
            format!("{:?}", kind.action_space()),
            kind.is_distributional()
        );
    }
}

fn train(args: &TrainArgs) -> Result<()> {
    let kind: ModelKind = args.model.parse()?;
    let config = match &args.config {
        Some(path) => RunConfig::load(path)?,
        None => RunConfig::default(),
    }
    .max_opts(args.max_opts)
    .eval_interval(args.eval_interval)
    .seed(args.seed)
    .log_dir(args.log_dir.as_str());

    run::train(kind, &config)?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match &cli.command {
        Command::List => list(),
        Command::Train(args) => train(args)?,
    }

    Ok(())
}
