//! Worker state machine and per-tick job processing.
//!
//! This is the logic the worker actor runs inside its mailbox loop. Every
//! function takes `&mut Worker` and returns what the actor must tell other
//! actors about; nothing here sends messages itself.
//!
//! ```text
//! idle --assign_job--> working | moving
//! working | moving --cancel_job--> idle
//! moving --arrived--> idle
//! idle --rest--> resting --tick--> idle
//! ```
//!
//! Invariant: `state` is `Working` or `Moving` exactly when `current_job`
//! is `Some`. Every function here preserves it.

use homestead_types::{
    Coordinate, Job, JobKind, JobStatus, JobTarget, OwnerId, ResourceKind, ResourceMap, Role,
    Season, StructureId, Worker, WorkerId, WorkerState,
};
use homestead_world::{construction_multiplier, gather_yield, ledger, movement_multiplier, scale_floor};

/// Work points a builder contributes per tick before the seasonal multiplier.
pub const BASE_BUILD_PROGRESS: u32 = 1;

/// Tiles a mover covers per axis per tick before the seasonal multiplier.
pub const BASE_MOVEMENT_SPEED: u32 = 1;

/// Parameters for starting a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSpec {
    /// Worker identifier, unique within the owner's domain.
    pub id: WorkerId,
    /// Display name.
    pub name: String,
    /// Owning owner.
    pub owner_id: OwnerId,
    /// Specialization, if any.
    pub role: Option<Role>,
    /// Starting position.
    pub location: Coordinate,
}

impl WorkerSpec {
    /// A spec with no role at the origin.
    pub fn new(id: impl Into<WorkerId>, name: impl Into<String>, owner_id: impl Into<OwnerId>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            owner_id: owner_id.into(),
            role: None,
            location: Coordinate::new(0, 0),
        }
    }

    /// Fresh worker state: idle, empty inventory, no job.
    ///
    /// A restarted worker actor calls this again, so a crash always loses
    /// the in-flight job.
    pub fn initial_state(&self) -> Worker {
        Worker {
            id: self.id.clone(),
            owner_id: self.owner_id.clone(),
            name: self.name.clone(),
            state: WorkerState::Idle,
            role: self.role,
            location: self.location,
            inventory: ResourceMap::new(),
            current_job: None,
            work_progress: 0,
        }
    }
}

/// Something a tick asks the worker actor to tell another actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEffect {
    /// Credit a finished haul to the owner's ledger.
    Deposit(ResourceMap),
    /// Ask the owner to advance a structure by one tick of construction.
    ConstructionWork {
        /// Structure being built.
        structure_id: StructureId,
        /// Season the work happened in.
        season: Season,
    },
    /// Report the job as finished to the scheduler.
    Completed(Job),
}

// ---------------------------------------------------------------------------
// Transitions
// ---------------------------------------------------------------------------

/// Give `worker` a job, replacing any job it already holds.
///
/// The worker moves to `Moving` for move jobs and `Working` otherwise, with
/// `work_progress` reset to 0. Returns the replaced job, if any, so the
/// caller can report it abandoned.
pub fn assign_job(worker: &mut Worker, mut job: Job) -> Option<Job> {
    job.status = JobStatus::InProgress;
    job.assigned_worker_id = Some(worker.id.clone());
    worker.state = match job.kind() {
        JobKind::Move => WorkerState::Moving,
        JobKind::Gather | JobKind::Build => WorkerState::Working,
    };
    worker.work_progress = 0;
    worker.current_job.replace(job)
}

/// Drop the current job and go idle. Returns the dropped job.
///
/// A resting worker stays resting; an idle worker is unaffected.
pub fn cancel_job(worker: &mut Worker) -> Option<Job> {
    let job = worker.current_job.take();
    if job.is_some() {
        worker.state = WorkerState::Idle;
        worker.work_progress = 0;
    }
    job
}

/// Send an idle worker to rest for one tick. Returns whether it rested.
pub fn rest(worker: &mut Worker) -> bool {
    if worker.state != WorkerState::Idle {
        return false;
    }
    worker.state = WorkerState::Resting;
    true
}

// ---------------------------------------------------------------------------
// Tick processing
// ---------------------------------------------------------------------------

/// Advance `worker` by one tick of `season`.
///
/// Returns the effects the actor must forward, in the order they happened.
pub fn process_tick(worker: &mut Worker, season: Season) -> Vec<WorkerEffect> {
    match worker.state {
        WorkerState::Idle => Vec::new(),
        WorkerState::Resting => {
            worker.state = WorkerState::Idle;
            Vec::new()
        }
        WorkerState::Working | WorkerState::Moving => {
            let Some(target) = worker.current_job.as_ref().map(|job| job.target) else {
                // Repair a state/job mismatch rather than carry it forward.
                worker.state = WorkerState::Idle;
                return Vec::new();
            };
            match target {
                JobTarget::Gather { resource, quota } => gather(worker, resource, quota, season),
                JobTarget::Build {
                    structure_id,
                    work_required,
                } => build(worker, structure_id, work_required, season),
                JobTarget::Move { destination } => walk(worker, destination, season),
            }
        }
    }
}

fn gather(worker: &mut Worker, resource: ResourceKind, quota: u32, season: Season) -> Vec<WorkerEffect> {
    let gathered = gather_yield(resource, season);
    let held = worker.inventory.entry(resource).or_insert(0);
    *held = held.saturating_add(gathered);
    worker.work_progress = worker.work_progress.saturating_add(gathered);

    if quota == 0 || worker.work_progress < quota {
        return Vec::new();
    }

    let haul = worker
        .work_progress
        .min(ledger::amount(&worker.inventory, resource));
    let haul = ResourceMap::from([(resource, haul)]);
    let mut effects = Vec::with_capacity(2);
    if ledger::deduct(&mut worker.inventory, &haul).is_ok() {
        effects.push(WorkerEffect::Deposit(haul));
    }
    effects.extend(finish(worker));
    effects
}

fn build(
    worker: &mut Worker,
    structure_id: StructureId,
    work_required: u32,
    season: Season,
) -> Vec<WorkerEffect> {
    let step = scale_floor(BASE_BUILD_PROGRESS, construction_multiplier(season)).max(1);
    worker.work_progress = worker.work_progress.saturating_add(step);

    let mut effects = vec![WorkerEffect::ConstructionWork {
        structure_id,
        season,
    }];
    if work_required > 0 && worker.work_progress >= work_required {
        effects.extend(finish(worker));
    }
    effects
}

fn walk(worker: &mut Worker, destination: Coordinate, season: Season) -> Vec<WorkerEffect> {
    let speed = scale_floor(BASE_MOVEMENT_SPEED, movement_multiplier(season)).max(1);
    let speed = i32::try_from(speed).unwrap_or(i32::MAX);

    let here = worker.location;
    worker.location = Coordinate::new(
        step_toward(here.x, destination.x, speed),
        step_toward(here.y, destination.y, speed),
    );
    if worker.location != here {
        worker.work_progress = worker.work_progress.saturating_add(1);
    }

    if worker.location == destination {
        finish(worker).into_iter().collect()
    } else {
        Vec::new()
    }
}

/// Move from `from` toward `to` by at most `speed`.
fn step_toward(from: i32, to: i32, speed: i32) -> i32 {
    let delta = to.saturating_sub(from).clamp(speed.saturating_neg(), speed);
    from.saturating_add(delta)
}

/// Close out the current job: idle, progress reset, job marked done.
fn finish(worker: &mut Worker) -> Option<WorkerEffect> {
    worker.state = WorkerState::Idle;
    worker.work_progress = 0;
    worker.current_job.take().map(|mut job| {
        job.status = JobStatus::Done;
        WorkerEffect::Completed(job)
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homestead_types::Priority;

    use super::*;

    fn idle_worker() -> Worker {
        WorkerSpec::new("w1", "Ada", "o1").initial_state()
    }

    fn gather_job(resource: ResourceKind, quota: u32) -> Job {
        Job::new(JobTarget::Gather { resource, quota }, Priority::Normal)
    }

    fn move_job(x: i32, y: i32) -> Job {
        Job::new(
            JobTarget::Move {
                destination: Coordinate::new(x, y),
            },
            Priority::Normal,
        )
    }

    fn build_job(work_required: u32) -> Job {
        Job::new(
            JobTarget::Build {
                structure_id: StructureId::new(),
                work_required,
            },
            Priority::Normal,
        )
    }

    fn holds_invariant(worker: &Worker) -> bool {
        matches!(worker.state, WorkerState::Working | WorkerState::Moving)
            == worker.current_job.is_some()
    }

    #[test]
    fn initial_state_is_idle_and_empty() {
        let worker = idle_worker();
        assert_eq!(worker.state, WorkerState::Idle);
        assert!(worker.inventory.is_empty());
        assert!(worker.current_job.is_none());
        assert!(holds_invariant(&worker));
    }

    #[test]
    fn assign_sets_state_by_kind() {
        let mut worker = idle_worker();
        assert!(assign_job(&mut worker, gather_job(ResourceKind::Wood, 0)).is_none());
        assert_eq!(worker.state, WorkerState::Working);
        let job = worker.current_job.as_ref().unwrap();
        assert_eq!(job.status, JobStatus::InProgress);
        assert_eq!(job.assigned_worker_id, Some(WorkerId::from("w1")));

        let replaced = assign_job(&mut worker, move_job(3, 3));
        assert_eq!(replaced.map(|j| j.kind()), Some(JobKind::Gather));
        assert_eq!(worker.state, WorkerState::Moving);
        assert_eq!(worker.work_progress, 0);
        assert!(holds_invariant(&worker));
    }

    #[test]
    fn cancel_returns_job_and_goes_idle() {
        let mut worker = idle_worker();
        let job = gather_job(ResourceKind::Stone, 10);
        let id = job.id;
        assign_job(&mut worker, job);
        process_tick(&mut worker, Season::Spring);

        let dropped = cancel_job(&mut worker).unwrap();
        assert_eq!(dropped.id, id);
        assert_eq!(worker.state, WorkerState::Idle);
        assert_eq!(worker.work_progress, 0);
        assert!(cancel_job(&mut worker).is_none());
    }

    #[test]
    fn rest_lasts_one_tick() {
        let mut worker = idle_worker();
        assert!(rest(&mut worker));
        assert_eq!(worker.state, WorkerState::Resting);
        assert!(process_tick(&mut worker, Season::Fall).is_empty());
        assert_eq!(worker.state, WorkerState::Idle);
    }

    #[test]
    fn busy_worker_cannot_rest() {
        let mut worker = idle_worker();
        assign_job(&mut worker, move_job(5, 0));
        assert!(!rest(&mut worker));
        assert_eq!(worker.state, WorkerState::Moving);
    }

    #[test]
    fn gather_wood_spring_and_summer() {
        let mut worker = idle_worker();
        assign_job(&mut worker, gather_job(ResourceKind::Wood, 0));
        process_tick(&mut worker, Season::Spring);
        assert_eq!(ledger::amount(&worker.inventory, ResourceKind::Wood), 5);

        let mut worker = idle_worker();
        assign_job(&mut worker, gather_job(ResourceKind::Wood, 0));
        process_tick(&mut worker, Season::Summer);
        assert_eq!(ledger::amount(&worker.inventory, ResourceKind::Wood), 6);
    }

    #[test]
    fn gather_food_uses_farming_table() {
        let mut worker = idle_worker();
        assign_job(&mut worker, gather_job(ResourceKind::Food, 0));
        process_tick(&mut worker, Season::Summer);
        assert_eq!(ledger::amount(&worker.inventory, ResourceKind::Food), 12);
    }

    #[test]
    fn continuous_gather_never_completes() {
        let mut worker = idle_worker();
        assign_job(&mut worker, gather_job(ResourceKind::Stone, 0));
        for _ in 0..50 {
            assert!(process_tick(&mut worker, Season::Spring).is_empty());
        }
        assert_eq!(worker.state, WorkerState::Working);
        assert_eq!(ledger::amount(&worker.inventory, ResourceKind::Stone), 150);
    }

    #[test]
    fn gather_quota_deposits_haul_and_completes() {
        let mut worker = idle_worker();
        worker.inventory.insert(ResourceKind::Wood, 2);
        assign_job(&mut worker, gather_job(ResourceKind::Wood, 10));

        assert!(process_tick(&mut worker, Season::Spring).is_empty());
        let effects = process_tick(&mut worker, Season::Spring);

        assert_eq!(effects.len(), 2);
        assert_eq!(
            effects.first(),
            Some(&WorkerEffect::Deposit(ResourceMap::from([(ResourceKind::Wood, 10)])))
        );
        assert!(matches!(
            effects.get(1),
            Some(WorkerEffect::Completed(job)) if job.status == JobStatus::Done
        ));
        // Wood carried before the job stays in the pack.
        assert_eq!(ledger::amount(&worker.inventory, ResourceKind::Wood), 2);
        assert_eq!(worker.state, WorkerState::Idle);
        assert!(holds_invariant(&worker));
    }

    #[test]
    fn build_in_winter_still_progresses_one() {
        let mut worker = idle_worker();
        assign_job(&mut worker, build_job(0));
        let effects = process_tick(&mut worker, Season::Winter);
        assert_eq!(worker.work_progress, 1);
        assert!(matches!(
            effects.as_slice(),
            [WorkerEffect::ConstructionWork { season: Season::Winter, .. }]
        ));
    }

    #[test]
    fn build_completes_at_work_required() {
        let mut worker = idle_worker();
        assign_job(&mut worker, build_job(2));
        assert_eq!(process_tick(&mut worker, Season::Summer).len(), 1);
        let effects = process_tick(&mut worker, Season::Summer);
        assert_eq!(effects.len(), 2);
        assert!(matches!(effects.last(), Some(WorkerEffect::Completed(_))));
        assert_eq!(worker.state, WorkerState::Idle);
    }

    #[test]
    fn move_steps_toward_destination_and_arrives() {
        let mut worker = idle_worker();
        assign_job(&mut worker, move_job(2, -1));

        assert!(process_tick(&mut worker, Season::Spring).is_empty());
        assert_eq!(worker.location, Coordinate::new(1, -1));
        assert_eq!(worker.state, WorkerState::Moving);

        let effects = process_tick(&mut worker, Season::Spring);
        assert_eq!(worker.location, Coordinate::new(2, -1));
        assert_eq!(worker.state, WorkerState::Idle);
        assert!(worker.current_job.is_none());
        assert!(matches!(effects.as_slice(), [WorkerEffect::Completed(_)]));
    }

    #[test]
    fn winter_move_still_covers_one_tile() {
        let mut worker = idle_worker();
        assign_job(&mut worker, move_job(-4, 0));
        process_tick(&mut worker, Season::Winter);
        assert_eq!(worker.location, Coordinate::new(-1, 0));
    }

    #[test]
    fn move_to_current_location_completes_immediately() {
        let mut worker = idle_worker();
        assign_job(&mut worker, move_job(0, 0));
        let effects = process_tick(&mut worker, Season::Spring);
        assert_eq!(effects.len(), 1);
        assert_eq!(worker.state, WorkerState::Idle);
    }

    #[test]
    fn mismatched_state_is_repaired() {
        let mut worker = idle_worker();
        worker.state = WorkerState::Working;
        assert!(process_tick(&mut worker, Season::Spring).is_empty());
        assert_eq!(worker.state, WorkerState::Idle);
    }
}
