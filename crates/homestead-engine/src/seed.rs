//! Initial population for a fresh simulation.
//!
//! [`plan`] turns the `seed` config section into owners, workers, and
//! queued gather jobs, using a seeded RNG so the same config always yields
//! the same world. [`apply`] starts them through the [`Simulation`] facade.

use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use homestead_agents::WorkerSpec;
use homestead_core::Simulation;
use homestead_core::config::SeedConfig;
use homestead_types::{Coordinate, Job, JobTarget, OwnerId, Priority, Role};
use rand::Rng;
use tracing::info;

use crate::error::EngineError;

/// Range of each coordinate a seeded worker can start at.
const SPAWN_AREA: RangeInclusive<i32> = -10..=10;

/// Built-in pool of worker names. Picked without replacement.
const NAME_POOL: &[&str] = &[
    "Alder", "Birch", "Cedar", "Dusk", "Ember", "Fern", "Grove", "Haze",
    "Iris", "Juniper", "Kestrel", "Lark", "Moss", "Nettle", "Oak", "Pine",
    "Quill", "Reed", "Sage", "Thorn", "Umber", "Vale", "Wren", "Yarrow",
    "Ash", "Brook", "Clay", "Dawn", "Elm", "Flint", "Gale", "Heath",
];

/// Names of the seeded owners, in start order.
const HOLDING_POOL: &[&str] = &[
    "Northfield", "Stonebrook", "Millhaven", "Ashford", "Greywater", "Oakmere",
];

const ROLES: [Role; 3] = [Role::Builder, Role::Farmer, Role::Miner];

const PRIORITIES: [Priority; 4] = [
    Priority::Critical,
    Priority::High,
    Priority::Normal,
    Priority::Low,
];

/// One owner and everything started under it.
#[derive(Debug, Clone)]
pub struct OwnerPlan {
    /// Owner ID.
    pub id: OwnerId,
    /// Display name.
    pub name: String,
    /// Workers to start.
    pub workers: Vec<WorkerSpec>,
    /// Jobs to queue, with their priority.
    pub jobs: Vec<(Job, Priority)>,
}

/// Decide the initial population.
///
/// # Errors
///
/// Returns [`EngineError::Seed`] if the section asks for jobs but lists no
/// resources to gather.
pub fn plan(config: &SeedConfig, rng: &mut impl Rng) -> Result<Vec<OwnerPlan>, EngineError> {
    if config.initial_jobs > 0 && config.resources.is_empty() {
        return Err(EngineError::Seed {
            message: String::from("initial_jobs is set but resources is empty"),
        });
    }

    let mut used = BTreeSet::new();
    let mut owners = Vec::new();
    for n in 1..=config.owners {
        let id = OwnerId::new(format!("owner-{n}"));
        let name = holding_name(n);

        let workers = (1..=config.workers_per_owner)
            .map(|w| WorkerSpec {
                id: format!("w{w}").into(),
                name: pick_unused_name(rng, &mut used),
                owner_id: id.clone(),
                role: ROLES.get(rng.random_range(0..ROLES.len())).copied(),
                location: Coordinate::new(
                    rng.random_range(SPAWN_AREA),
                    rng.random_range(SPAWN_AREA),
                ),
            })
            .collect();

        let jobs = config
            .resources
            .iter()
            .cycle()
            .take(usize::try_from(config.initial_jobs).unwrap_or(usize::MAX))
            .map(|&resource| {
                let priority = PRIORITIES
                    .get(rng.random_range(0..PRIORITIES.len()))
                    .copied()
                    .unwrap_or_default();
                let target = JobTarget::Gather {
                    resource,
                    quota: config.gather_quota,
                };
                (Job::new(target, priority), priority)
            })
            .collect();

        owners.push(OwnerPlan {
            id,
            name,
            workers,
            jobs,
        });
    }
    Ok(owners)
}

/// Start every planned owner and worker and queue the planned jobs.
///
/// # Errors
///
/// Returns the first [`EngineError::Simulation`] the facade reports.
pub async fn apply(sim: &Simulation, plans: &[OwnerPlan]) -> Result<(), EngineError> {
    for plan in plans {
        sim.start_owner(plan.id.clone(), plan.name.clone()).await?;
        for spec in &plan.workers {
            sim.start_worker(spec.clone()).await?;
        }
        for (job, priority) in &plan.jobs {
            sim.add_job(&plan.id, job.clone(), *priority).await?;
        }
        info!(
            owner_id = %plan.id,
            name = %plan.name,
            workers = plan.workers.len(),
            jobs = plan.jobs.len(),
            "Owner seeded"
        );
    }
    Ok(())
}

fn holding_name(n: u32) -> String {
    let index = usize::try_from(n.saturating_sub(1)).unwrap_or(usize::MAX);
    match HOLDING_POOL.get(index) {
        Some(name) => String::from(*name),
        None => format!("Holding {n}"),
    }
}

/// Pick a random name not yet in `used` and mark it used. Falls back to a
/// numbered name once the pool runs dry.
fn pick_unused_name(rng: &mut impl Rng, used: &mut BTreeSet<String>) -> String {
    let available: Vec<&str> = NAME_POOL
        .iter()
        .filter(|&&n| !used.contains(n))
        .copied()
        .collect();

    let name = if available.is_empty() {
        format!("Worker-{}", used.len().saturating_add(1))
    } else {
        let idx = rng.random_range(0..available.len());
        available
            .get(idx)
            .map_or_else(|| format!("Worker-{idx}"), |s| String::from(*s))
    };
    used.insert(name.clone());
    name
}
