//! Engine binary for the Homestead simulation.
//!
//! Loads configuration, starts the actor system, seeds the initial
//! population, and lets the world clock run until `max_ticks` is reached
//! or the process is interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `homestead-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Start the simulation: clock, owner supervisor, registries
//! 4. Seed owners, workers, and jobs
//! 5. Run until `max_ticks` or Ctrl-C
//! 6. Log a per-owner summary and shut down

mod error;
mod seed;

use std::path::Path;

use homestead_core::config::{LogFormat, LoggingConfig};
use homestead_core::{Simulation, SimulationConfig};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::seed::OwnerPlan;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "homestead-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, startup, or seeding fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is configured from it, so nothing is
    //    logged before this point.
    let (config, from_file) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!(
        world_name = %config.world.name,
        seed = config.world.seed,
        tick_interval_ms = config.world.tick_interval_ms,
        season_duration = config.world.season_duration,
        max_ticks = config.world.max_ticks,
        from_file,
        "homestead-engine starting"
    );

    // 3. Start the simulation.
    let max_ticks = config.world.max_ticks;
    let mut rng = StdRng::seed_from_u64(config.world.seed);
    let plans = seed::plan(&config.seed, &mut rng)?;
    let sim = Simulation::start(config)?;

    // 4. Seed the initial population.
    seed::apply(&sim, &plans).await?;

    // 5. Run.
    run(&sim, max_ticks).await;

    // 6. Summarize and stop.
    summarize(&sim, &plans).await;
    let total_ticks = sim.get_world_state().total_ticks;
    sim.shutdown().await;
    info!(total_ticks, "homestead-engine shutdown complete");
    Ok(())
}

/// Load `homestead-config.yaml` if present. Returns whether the file was
/// used.
fn load_config() -> Result<(SimulationConfig, bool), EngineError> {
    let path = Path::new(CONFIG_PATH);
    if path.exists() {
        Ok((SimulationConfig::from_file(path)?, true))
    } else {
        Ok((SimulationConfig::default(), false))
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match logging.format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

/// Wait for `max_ticks` (0 runs forever) or Ctrl-C.
async fn run(sim: &Simulation, max_ticks: u64) {
    let mut state = sim.clock().subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = state.changed() => {
                if changed.is_err() {
                    warn!("World clock stopped unexpectedly");
                    break;
                }
                let total_ticks = state.borrow_and_update().total_ticks;
                if max_ticks > 0 && total_ticks >= max_ticks {
                    info!(total_ticks, "Tick limit reached");
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }
}

/// Log each seeded owner's ledger, structures, and job counters.
async fn summarize(sim: &Simulation, plans: &[OwnerPlan]) {
    for plan in plans {
        let owner = match sim.get_owner_state(&plan.id).await {
            Ok(owner) => owner,
            Err(err) => {
                warn!(owner_id = %plan.id, error = %err, "Owner unavailable for summary");
                continue;
            }
        };
        let stats = sim
            .get_scheduler_state(&plan.id)
            .await
            .map(|snapshot| snapshot.stats)
            .unwrap_or_default();
        info!(
            owner_id = %owner.id,
            name = %owner.name,
            ledger = ?owner.resource_ledger,
            workers = owner.workers.len(),
            structures = owner.structures.len(),
            jobs_assigned = stats.total_assigned,
            jobs_completed = stats.total_completed,
            "Owner summary"
        );
    }
}
