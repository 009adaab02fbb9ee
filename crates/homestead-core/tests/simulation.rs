//! End-to-end tests of the actor system through the [`Simulation`] facade.
//!
//! The clock starts paused and every tick is fired with `tick_now`, so the
//! tests control time exactly. Tests run on the current-thread runtime: a
//! tick's broadcast is fully enqueued before any receiver runs.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::time::Duration;

use homestead_agents::WorkerSpec;
use homestead_core::{Scope, Simulation, SimulationConfig, SimulationError};
use homestead_types::{
    Coordinate, Job, JobTarget, OwnerId, Priority, ResourceKind, ResourceMap, Season, Terrain,
    Tile, WorkerId, WorkerState,
};
use homestead_world::WorldError;

fn config(ledger: &[(ResourceKind, u32)]) -> SimulationConfig {
    let mut config = SimulationConfig::default();
    config.world.start_paused = true;
    config.logging.narrate_seasons = false;
    config.scheduler.stale_sweep_interval_ticks = 0;
    config.economy.starting_ledger = ledger.iter().copied().collect();
    config
}

fn grass(x: i32, y: i32) -> Tile {
    Tile {
        coordinate: Coordinate::new(x, y),
        terrain: Terrain::Grass,
        structure_id: None,
    }
}

fn gather(resource: ResourceKind, quota: u32) -> Job {
    Job::new(JobTarget::Gather { resource, quota }, Priority::Normal)
}

/// Wait until every message already sent inside the domain has been
/// handled. Each query queues behind the casts that came before it, and the
/// second pass catches what the first pass triggered.
async fn settle(sim: &Simulation, owner_id: &OwnerId, worker_ids: &[WorkerId]) {
    for _ in 0..2 {
        let _ = sim.get_owner_state(owner_id).await;
        let _ = sim.get_scheduler_state(owner_id).await;
        for worker_id in worker_ids {
            let _ = sim.get_worker_state(owner_id, worker_id).await;
        }
    }
}

async fn tick(sim: &Simulation, owner_id: &OwnerId, worker_ids: &[WorkerId]) {
    sim.tick_now().await.unwrap();
    settle(sim, owner_id, worker_ids).await;
}

async fn domain_with_workers(sim: &Simulation, workers: &[&str]) -> (OwnerId, Vec<WorkerId>) {
    let owner_id = OwnerId::from("o1");
    sim.start_owner(owner_id.clone(), "Alder Farm").await.unwrap();
    let mut ids = Vec::new();
    for id in workers {
        sim.start_worker(WorkerSpec::new(*id, format!("worker {id}"), owner_id.clone()))
            .await
            .unwrap();
        ids.push(WorkerId::from(*id));
    }
    // Workers announce themselves to the owner on start.
    for worker_id in &ids {
        sim.get_worker_state(&owner_id, worker_id).await.unwrap();
    }
    settle(sim, &owner_id, &ids).await;
    (owner_id, ids)
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn owner_starts_with_configured_ledger_and_roster() {
    let sim = Simulation::start(config(&[(ResourceKind::Wood, 7)])).unwrap();
    let (owner_id, _) = domain_with_workers(&sim, &["w1", "w2"]).await;

    let owner = sim.get_owner_state(&owner_id).await.unwrap();
    assert_eq!(owner.name, "Alder Farm");
    assert_eq!(owner.resource_ledger.get(&ResourceKind::Wood), Some(&7));
    let mut roster: Vec<_> = owner.workers.iter().map(|w| w.id.as_str().to_owned()).collect();
    roster.sort();
    assert_eq!(roster, ["w1", "w2"]);
    assert!(owner.workers.iter().all(|w| w.state == WorkerState::Idle));

    sim.shutdown().await;
}

#[tokio::test]
async fn duplicate_starts_are_rejected() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, _) = domain_with_workers(&sim, &["w1"]).await;

    let err = sim.start_owner(owner_id.clone(), "again").await.unwrap_err();
    assert!(err.is_already_started());

    let err = sim
        .start_worker(WorkerSpec::new("w1", "again", owner_id.clone()))
        .await
        .unwrap_err();
    assert!(err.is_already_started());

    sim.shutdown().await;
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let sim = Simulation::start(config(&[])).unwrap();
    let ghost = OwnerId::from("ghost");

    assert!(matches!(
        sim.get_owner_state(&ghost).await,
        Err(SimulationError::OwnerNotFound(_))
    ));
    assert!(matches!(
        sim.start_worker(WorkerSpec::new("w1", "Ash", ghost.clone())).await,
        Err(SimulationError::OwnerNotFound(_))
    ));
    assert!(matches!(
        sim.get_worker_state(&ghost, &WorkerId::from("w1")).await,
        Err(SimulationError::WorkerNotFound { .. })
    ));

    sim.shutdown().await;
}

#[tokio::test]
async fn same_worker_id_in_two_domains() {
    let sim = Simulation::start(config(&[])).unwrap();
    let a = OwnerId::from("a");
    let b = OwnerId::from("b");
    sim.start_owner(a.clone(), "A").await.unwrap();
    sim.start_owner(b.clone(), "B").await.unwrap();

    sim.start_worker(WorkerSpec::new("v1", "Ash", a.clone())).await.unwrap();
    sim.start_worker(WorkerSpec::new("v1", "Birch", b.clone())).await.unwrap();

    let in_a = sim.get_worker_state(&a, &WorkerId::from("v1")).await.unwrap();
    let in_b = sim.get_worker_state(&b, &WorkerId::from("v1")).await.unwrap();
    assert_eq!(in_a.name, "Ash");
    assert_eq!(in_b.name, "Birch");

    sim.shutdown().await;
}

#[tokio::test]
async fn stopped_worker_leaves_the_roster() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1", "w2"]).await;

    assert!(sim.stop_worker(&owner_id, &ids[0]).await.unwrap());
    tick(&sim, &owner_id, &ids[1..]).await;

    let owner = sim.get_owner_state(&owner_id).await.unwrap();
    assert_eq!(owner.workers.len(), 1);
    assert_eq!(owner.workers[0].id, ids[1]);

    sim.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stopped_worker_id_can_be_reused_at_once() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;

    for _ in 0..10 {
        assert!(sim.stop_worker(&owner_id, &ids[0]).await.unwrap());
        sim.start_worker(WorkerSpec::new("w1", "Ash", owner_id.clone()))
            .await
            .unwrap();
    }
    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(worker.state, WorkerState::Idle);

    sim.shutdown().await;
}

// =============================================================================
// Jobs
// =============================================================================

#[tokio::test]
async fn gather_job_runs_to_completion() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;

    sim.add_job(&owner_id, gather(ResourceKind::Wood, 10), Priority::Normal)
        .await
        .unwrap();

    // Tick 1: the owner sees an idle worker and the job is handed out.
    tick(&sim, &owner_id, &ids).await;
    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(worker.state, WorkerState::Working);
    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert!(snapshot.queue.is_empty());
    assert_eq!(snapshot.active.len(), 1);

    // Ticks 2 and 3: 5 wood each in spring.
    tick(&sim, &owner_id, &ids).await;
    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(worker.inventory.get(&ResourceKind::Wood), Some(&5));
    tick(&sim, &owner_id, &ids).await;

    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(worker.state, WorkerState::Idle);
    assert!(worker.current_job.is_none());
    assert_eq!(worker.inventory.get(&ResourceKind::Wood), Some(&0));

    let owner = sim.get_owner_state(&owner_id).await.unwrap();
    assert_eq!(owner.resource_ledger.get(&ResourceKind::Wood), Some(&10));

    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert!(snapshot.active.is_empty());
    assert_eq!(snapshot.stats.total_assigned, 1);
    assert_eq!(snapshot.stats.total_completed, 1);

    sim.shutdown().await;
}

#[tokio::test]
async fn higher_priority_job_is_assigned_first() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;

    let routine = gather(ResourceKind::Stone, 30);
    let urgent = gather(ResourceKind::Food, 30);
    let urgent_id = urgent.id;
    sim.add_job(&owner_id, routine, Priority::Low).await.unwrap();
    sim.add_job(&owner_id, urgent, Priority::Critical).await.unwrap();

    let report = sim.assign_jobs(&owner_id, ids.clone()).await.unwrap();
    assert_eq!(report.assigned, vec![(urgent_id, ids[0].clone())]);

    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(worker.current_job.map(|job| job.id), Some(urgent_id));

    sim.shutdown().await;
}

#[tokio::test]
async fn assign_jobs_on_empty_queue_is_an_error() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;

    let err = sim.assign_jobs(&owner_id, ids).await.unwrap_err();
    assert!(matches!(
        err,
        SimulationError::Agent(homestead_agents::AgentError::NoJobsAvailable)
    ));

    sim.shutdown().await;
}

#[tokio::test]
async fn stale_job_returns_to_the_queue() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["v1"]).await;

    let job = gather(ResourceKind::Wood, 50);
    let job_id = job.id;
    sim.add_job(&owner_id, job, Priority::High).await.unwrap();
    sim.assign_jobs(&owner_id, ids.clone()).await.unwrap();

    // Simulate a crash: the worker vanishes from the registry.
    assert!(
        sim.registries()
            .workers
            .unregister(&Scope::Owner(owner_id.clone()), "v1")
    );

    let reclaimed = sim.check_stale_jobs(&owner_id).await.unwrap();
    assert_eq!(reclaimed, vec![job_id]);

    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert!(snapshot.active.is_empty());
    assert_eq!(snapshot.queue.len(), 1);
    assert_eq!(snapshot.queue[0].job.id, job_id);
    assert_eq!(snapshot.queue[0].priority, Priority::High);
    assert!(snapshot.queue[0].job.assigned_worker_id.is_none());

    sim.shutdown().await;
}

#[tokio::test]
async fn cancelled_job_is_abandoned_not_requeued() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;

    sim.add_job(&owner_id, gather(ResourceKind::Wood, 50), Priority::Normal)
        .await
        .unwrap();
    sim.assign_jobs(&owner_id, ids.clone()).await.unwrap();
    sim.cancel_job(&owner_id, &ids[0]).unwrap();
    settle(&sim, &owner_id, &ids).await;

    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(worker.state, WorkerState::Idle);
    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert!(snapshot.active.is_empty());
    assert!(snapshot.queue.is_empty());
    assert_eq!(snapshot.stats.total_completed, 0);

    sim.shutdown().await;
}

#[tokio::test]
async fn busy_worker_is_not_given_a_second_job() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;
    for _ in 0..3 {
        sim.add_job(&owner_id, gather(ResourceKind::Wood, 50), Priority::Normal)
            .await
            .unwrap();
    }

    let first = sim.assign_jobs(&owner_id, ids.clone()).await.unwrap();
    let second = sim.assign_jobs(&owner_id, ids.clone()).await.unwrap();
    settle(&sim, &owner_id, &ids).await;

    assert_eq!(first.assigned.len(), 1);
    assert!(second.assigned.is_empty());
    assert_eq!(second.skipped, ids);

    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert_eq!(snapshot.queue.len(), 2);
    assert_eq!(snapshot.active.len(), 1);
    assert_eq!(snapshot.stats.total_assigned, 1);
    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(
        worker.current_job.map(|job| job.id),
        Some(snapshot.active[0].job.id)
    );

    sim.shutdown().await;
}

#[tokio::test]
async fn back_to_back_ticks_keep_every_job() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;
    for _ in 0..3 {
        sim.add_job(&owner_id, gather(ResourceKind::Wood, 50), Priority::Normal)
            .await
            .unwrap();
    }

    // No settling in between: the owner may still see w1 as idle.
    for _ in 0..3 {
        sim.tick_now().await.unwrap();
    }
    settle(&sim, &owner_id, &ids).await;

    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert_eq!(snapshot.active.len(), 1);
    assert_eq!(snapshot.queue.len(), 2);
    assert_eq!(snapshot.stats.total_assigned, 1);
    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(
        worker.current_job.map(|job| job.id),
        Some(snapshot.active[0].job.id)
    );

    sim.shutdown().await;
}

#[tokio::test]
async fn periodic_sweep_requeues_job_of_stopped_worker() {
    let mut config = config(&[]);
    config.scheduler.stale_sweep_interval_ticks = 1;
    let sim = Simulation::start(config).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["v1"]).await;

    let job = gather(ResourceKind::Wood, 50);
    let job_id = job.id;
    sim.add_job(&owner_id, job, Priority::High).await.unwrap();
    sim.assign_jobs(&owner_id, ids.clone()).await.unwrap();
    assert!(sim.stop_worker(&owner_id, &ids[0]).await.unwrap());

    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert_eq!(snapshot.active.len(), 1);

    tick(&sim, &owner_id, &[]).await;

    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert!(snapshot.active.is_empty());
    assert_eq!(snapshot.queue.len(), 1);
    assert_eq!(snapshot.queue[0].job.id, job_id);
    assert_eq!(snapshot.queue[0].priority, Priority::High);
    assert!(snapshot.queue[0].job.assigned_worker_id.is_none());

    sim.shutdown().await;
}

#[tokio::test]
async fn sweep_interval_skips_other_ticks() {
    let mut config = config(&[]);
    config.scheduler.stale_sweep_interval_ticks = 3;
    let sim = Simulation::start(config).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["v1"]).await;

    sim.add_job(&owner_id, gather(ResourceKind::Wood, 50), Priority::Normal)
        .await
        .unwrap();
    sim.assign_jobs(&owner_id, ids.clone()).await.unwrap();
    assert!(sim.stop_worker(&owner_id, &ids[0]).await.unwrap());

    tick(&sim, &owner_id, &[]).await;
    tick(&sim, &owner_id, &[]).await;
    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert_eq!(snapshot.active.len(), 1);

    tick(&sim, &owner_id, &[]).await;
    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert!(snapshot.active.is_empty());
    assert_eq!(snapshot.queue.len(), 1);

    sim.shutdown().await;
}

#[tokio::test]
async fn clear_all_jobs_resets_the_board() {
    let sim = Simulation::start(config(&[])).unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["w1"]).await;

    sim.add_job(&owner_id, gather(ResourceKind::Wood, 50), Priority::Normal)
        .await
        .unwrap();
    sim.add_job(&owner_id, gather(ResourceKind::Stone, 50), Priority::Normal)
        .await
        .unwrap();
    sim.assign_jobs(&owner_id, ids).await.unwrap();
    sim.clear_all_jobs(&owner_id).unwrap();

    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert!(snapshot.queue.is_empty());
    assert!(snapshot.active.is_empty());
    assert_eq!(snapshot.stats.total_assigned, 0);

    sim.shutdown().await;
}

// =============================================================================
// Construction
// =============================================================================

#[tokio::test]
async fn place_structure_pays_from_the_ledger() {
    let sim = Simulation::start(config(&[(ResourceKind::Wood, 100), (ResourceKind::Stone, 50)]))
        .unwrap();
    let (owner_id, _) = domain_with_workers(&sim, &[]).await;

    let house = sim
        .place_structure(&owner_id, grass(1, 1), "house", Coordinate::new(1, 1))
        .await
        .unwrap();
    assert_eq!(house.construction_progress, 0);
    assert_eq!(house.hp, 100);

    let owner = sim.get_owner_state(&owner_id).await.unwrap();
    assert_eq!(
        owner.resource_ledger,
        ResourceMap::from([(ResourceKind::Wood, 50), (ResourceKind::Stone, 30)])
    );
    assert_eq!(owner.structures, vec![house]);

    let err = sim
        .place_structure(&owner_id, grass(1, 1), "farm", Coordinate::new(1, 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::World(WorldError::TileOccupied { .. })
    ));

    sim.shutdown().await;
}

#[tokio::test]
async fn insufficient_resources_leave_the_owner_unchanged() {
    let sim = Simulation::start(config(&[(ResourceKind::Wood, 10), (ResourceKind::Stone, 5)]))
        .unwrap();
    let (owner_id, _) = domain_with_workers(&sim, &[]).await;
    let before = sim.get_owner_state(&owner_id).await.unwrap();

    let err = sim
        .place_structure(&owner_id, grass(0, 0), "house", Coordinate::new(0, 0))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SimulationError::World(WorldError::InsufficientResources { .. })
    ));

    let after = sim.get_owner_state(&owner_id).await.unwrap();
    assert_eq!(before, after);

    sim.shutdown().await;
}

#[tokio::test]
async fn cancel_construction_refunds_half_below_threshold() {
    let sim = Simulation::start(config(&[(ResourceKind::Wood, 50), (ResourceKind::Stone, 20)]))
        .unwrap();
    let (owner_id, _) = domain_with_workers(&sim, &[]).await;

    let house = sim
        .place_structure(&owner_id, grass(2, 2), "house", Coordinate::new(2, 2))
        .await
        .unwrap();
    let refund = sim.cancel_construction(&owner_id, house.id).await.unwrap();
    assert_eq!(
        refund,
        ResourceMap::from([(ResourceKind::Wood, 25), (ResourceKind::Stone, 10)])
    );

    let owner = sim.get_owner_state(&owner_id).await.unwrap();
    assert!(owner.structures.is_empty());
    assert_eq!(owner.resource_ledger, refund);

    let err = sim.cancel_construction(&owner_id, house.id).await.unwrap_err();
    assert!(matches!(
        err,
        SimulationError::World(WorldError::StructureNotFound(_))
    ));

    sim.shutdown().await;
}

#[tokio::test]
async fn builder_advances_the_owners_structure() {
    let sim = Simulation::start(config(&[(ResourceKind::Wood, 100), (ResourceKind::Stone, 50)]))
        .unwrap();
    let (owner_id, ids) = domain_with_workers(&sim, &["b1"]).await;

    let house = sim
        .place_structure(&owner_id, grass(3, 3), "house", Coordinate::new(3, 3))
        .await
        .unwrap();
    let job = Job::new(
        JobTarget::Build {
            structure_id: house.id,
            work_required: 3,
        },
        Priority::Normal,
    );
    sim.add_job(&owner_id, job, Priority::Normal).await.unwrap();

    // Tick 1 hands out the job; ticks 2 to 4 each add floor(10 * 1.1) = 11.
    for _ in 0..4 {
        tick(&sim, &owner_id, &ids).await;
    }

    let owner = sim.get_owner_state(&owner_id).await.unwrap();
    assert_eq!(owner.structures[0].construction_progress, 33);

    let worker = sim.get_worker_state(&owner_id, &ids[0]).await.unwrap();
    assert_eq!(worker.state, WorkerState::Idle);
    let snapshot = sim.get_scheduler_state(&owner_id).await.unwrap();
    assert_eq!(snapshot.stats.total_completed, 1);

    sim.shutdown().await;
}

// =============================================================================
// Clock
// =============================================================================

#[tokio::test]
async fn manual_ticks_roll_the_season() {
    let mut config = config(&[]);
    config.world.season_duration = 2;
    let sim = Simulation::start(config).unwrap();

    for _ in 0..3 {
        sim.tick_now().await.unwrap();
    }

    let season = sim.get_season();
    assert_eq!(season.current, Season::Summer);
    assert_eq!(season.ticks_elapsed, 1);
    assert_eq!(season.year, 1);
    let world = sim.get_world_state();
    assert_eq!(world.total_ticks, 3);
    assert!(world.paused);

    sim.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn interval_drives_ticks_until_paused() {
    let mut config = config(&[]);
    config.world.start_paused = false;
    config.world.tick_interval_ms = 1000;
    let sim = Simulation::start(config).unwrap();

    tokio::time::sleep(Duration::from_millis(3500)).await;
    assert_eq!(sim.get_world_state().total_ticks, 3);

    sim.pause().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(sim.get_world_state().total_ticks, 3);
    assert!(sim.get_world_state().paused);

    sim.resume().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(sim.get_world_state().total_ticks, 4);

    sim.shutdown().await;
}
