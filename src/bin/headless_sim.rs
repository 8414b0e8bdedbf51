//! Headless simulation runner
//!
//! Runs N ticks without network or publishing and prints a JSON summary.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use bot_habitat::core::EngineConfig;
use bot_habitat::simulation::{Simulation, SpeechSource};

/// Headless Bot Habitat - run ticks and report population statistics
#[derive(Parser, Debug)]
#[command(name = "headless_sim")]
#[command(about = "Run the simulation without observers and print a JSON summary")]
struct Args {
    /// Number of ticks to run
    #[arg(long, default_value_t = 6000)]
    ticks: u64,

    /// TOML config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initial number of bots
    #[arg(long)]
    agents: Option<usize>,

    /// World seed
    #[arg(long)]
    seed: Option<u64>,

    /// Pretty-print the summary
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Summary {
    seed: u64,
    ticks: u64,
    days: u64,
    initial_population: usize,
    final_population: usize,
    births: usize,
    expiries: usize,
    shelters_claimed: usize,
    shelters_built: usize,
    claims_rejected: usize,
    couplings: usize,
    path_failures: usize,
    posts_queued: usize,
    need_posts: usize,
    milestone_posts: usize,
    chatter_posts: usize,
    resource_spots: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bot_habitat=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Failed to load config '{}': {}", path.display(), e);
            std::process::exit(1);
        }),
        None => EngineConfig::default(),
    };
    if let Some(agents) = args.agents {
        config.world.agent_count = agents;
    }
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid config: {}", e);
        std::process::exit(1);
    }

    let seed = config.world.seed;
    let mut sim = Simulation::new(config);
    let mut summary = Summary {
        seed,
        ticks: args.ticks,
        days: 0,
        initial_population: sim.world().agent_count(),
        final_population: 0,
        births: 0,
        expiries: 0,
        shelters_claimed: 0,
        shelters_built: 0,
        claims_rejected: 0,
        couplings: 0,
        path_failures: 0,
        posts_queued: 0,
        need_posts: 0,
        milestone_posts: 0,
        chatter_posts: 0,
        resource_spots: 0,
    };

    for _ in 0..args.ticks {
        let report = sim.tick();
        summary.births += report.births.len();
        summary.expiries += report.expiries.len();
        summary.shelters_claimed += report.shelters_claimed.len();
        summary.shelters_built += report.shelters_built.len();
        summary.claims_rejected += report.claims_rejected;
        summary.couplings += report.couplings;
        summary.path_failures += report.path_failures;

        for speech in sim.drain_speeches() {
            summary.posts_queued += 1;
            match speech.source {
                SpeechSource::Need { .. } => summary.need_posts += 1,
                SpeechSource::Milestone(_) => summary.milestone_posts += 1,
                SpeechSource::Chatter => summary.chatter_posts += 1,
            }
        }
    }

    summary.days = sim.world().env.sundial.day();
    summary.final_population = sim.world().agent_count();
    summary.resource_spots = sim.world().env.resources.len();

    let output = if args.pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    };
    match output {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to encode summary: {}", e);
            std::process::exit(1);
        }
    }
}
