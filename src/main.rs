//! Bot Habitat - Entry Point
//!
//! Runs the simulation loop, the observer WebSocket endpoint and the publish
//! worker until Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::runtime::Runtime;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use bot_habitat::broadcast::{server, BroadcastHub};
use bot_habitat::core::error::{EngineError, Result};
use bot_habitat::core::EngineConfig;
use bot_habitat::publish::{spawn_worker, HttpPublisher, LocalPublisher, PublishOutcome, PublishQueue};
use bot_habitat::simulation::{Simulation, SimulationLoop};

/// Bot Habitat simulation server
#[derive(Parser, Debug)]
#[command(name = "bot-habitat")]
#[command(about = "Run the bot habitat simulation and stream it to observers")]
struct Args {
    /// TOML config file; defaults apply to anything it leaves out
    #[arg(long)]
    config: Option<PathBuf>,

    /// Observer endpoint address, e.g. 0.0.0.0:9001
    #[arg(long)]
    bind: Option<String>,

    /// Initial number of bots
    #[arg(long)]
    agents: Option<usize>,

    /// World seed
    #[arg(long)]
    seed: Option<u64>,

    /// Initial speed multiplier (must be one of the allowed speeds)
    #[arg(long)]
    speed: Option<f32>,
}

fn load_config(args: &Args) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    config.apply_env();
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(agents) = args.agents {
        config.world.agent_count = agents;
    }
    if let Some(seed) = args.seed {
        config.world.seed = seed;
    }
    if let Some(speed) = args.speed {
        config.clock.initial_speed = speed;
    }
    config.validate()?;
    Ok(config)
}

type PublishHandles = (PublishQueue, mpsc::UnboundedReceiver<PublishOutcome>, JoinHandle<()>);

fn start_publisher(config: &EngineConfig) -> Result<PublishHandles> {
    let capacity = config.publish.queue_capacity;
    match HttpPublisher::from_config(&config.publish)? {
        Some(http) => {
            tracing::info!(url = http.posts_url(), "publishing to content service");
            Ok(spawn_worker(Arc::new(http), capacity))
        }
        None => {
            tracing::warn!("HABITAT_PUBLISH_URL not set - posts stay local");
            Ok(spawn_worker(Arc::new(LocalPublisher::new()), capacity))
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bot_habitat=info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    tracing::info!(
        agents = config.world.agent_count,
        seed = config.world.seed,
        "Bot Habitat starting..."
    );

    let rt = Runtime::new()?;
    rt.block_on(async move {
        let (hub, control_rx) =
            BroadcastHub::new(config.server.broadcast_capacity, config.server.control_capacity);
        let (queue, outcomes, worker) = start_publisher(&config)?;

        let listener = server::bind(&config.server.bind).await?;
        let server_task = tokio::spawn(server::serve(listener, hub.clone()));

        let sim = Simulation::new(config);
        let sim_loop = SimulationLoop::new(sim, hub, control_rx, queue, outcomes);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let loop_task = tokio::spawn(sim_loop.run(shutdown_rx));

        tokio::signal::ctrl_c().await?;
        tracing::info!("shutdown requested");
        let _ = shutdown_tx.send(());

        match loop_task.await {
            Ok(sim) => tracing::info!(
                tick = sim.world().current_tick,
                agents = sim.world().agent_count(),
                generation = sim.generation(),
                "simulation stopped"
            ),
            Err(e) => tracing::error!(error = %e, "simulation loop panicked"),
        }

        // Dropping the loop closed the publish queue; the worker drains and exits
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "publish worker panicked");
        }
        server_task.abort();
        Ok::<(), EngineError>(())
    })
}
