//! Core entity structs for the Homestead simulation.
//!
//! Every struct here is a plain snapshot: actors own the live copy and hand
//! out clones through their `get_state` queries.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{
    JobKind, JobStatus, Priority, ResourceKind, Role, Season, StructureKind, Terrain, WorkerState,
};
use crate::ids::{JobId, OwnerId, StructureId, WorkerId};

/// A resource ledger or inventory: quantity held per resource kind.
pub type ResourceMap = BTreeMap<ResourceKind, u32>;

// ---------------------------------------------------------------------------
// Space
// ---------------------------------------------------------------------------

/// A position on the world grid.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[ts(export, export_to = "bindings/")]
pub struct Coordinate {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coordinate {
    /// Construct a coordinate.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A map tile as seen by the construction rules.
///
/// The map itself belongs to the presentation layer; callers pass the tile
/// they want to build on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Tile {
    /// Where the tile sits.
    pub coordinate: Coordinate,
    /// What the tile is made of.
    pub terrain: Terrain,
    /// The structure already standing here, if any.
    pub structure_id: Option<StructureId>,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Season position within the annual cycle.
///
/// Invariant: `ticks_elapsed < season_duration` of the clock that owns it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SeasonState {
    /// The current season.
    pub current: Season,
    /// Ticks spent in the current season so far.
    pub ticks_elapsed: u64,
    /// Year number, starting at 1.
    pub year: u64,
}

impl Default for SeasonState {
    fn default() -> Self {
        Self {
            current: Season::Spring,
            ticks_elapsed: 0,
            year: 1,
        }
    }
}

/// Read-only snapshot of the world clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldState {
    /// Current season position.
    pub season: SeasonState,
    /// Ticks fired since the clock started.
    pub total_ticks: u64,
    /// Ticks per season.
    pub season_duration: u64,
    /// Whether the interval timer is currently suspended.
    pub paused: bool,
}

/// Payload of the clock's tick broadcast.
///
/// Carries the season so receivers never have to query the clock back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSignal {
    /// Season after this tick was applied.
    pub season: SeasonState,
    /// Tick number (1 for the first tick).
    pub total_ticks: u64,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// What a job works on. The variant determines the job's [`JobKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum JobTarget {
    /// Gather a resource.
    Gather {
        /// The resource to collect.
        resource: ResourceKind,
        /// Units to collect before the job completes. `0` never completes.
        quota: u32,
    },
    /// Work on a structure.
    Build {
        /// The structure receiving the labor.
        structure_id: StructureId,
        /// Work points needed before the job completes. `0` never completes.
        work_required: u32,
    },
    /// Walk to a coordinate.
    Move {
        /// Where to go.
        destination: Coordinate,
    },
}

/// A unit of work held by a scheduler (queued) or a worker (active).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Job {
    /// Job identifier.
    pub id: JobId,
    /// What the job works on.
    pub target: JobTarget,
    /// Worker currently holding the job.
    pub assigned_worker_id: Option<WorkerId>,
    /// Progress status.
    pub status: JobStatus,
    /// Priority class.
    pub priority: Priority,
}

impl Job {
    /// Create a pending, unassigned job.
    pub fn new(target: JobTarget, priority: Priority) -> Self {
        Self {
            id: JobId::new(),
            target,
            assigned_worker_id: None,
            status: JobStatus::Pending,
            priority,
        }
    }

    /// The kind of work, derived from the target.
    pub const fn kind(&self) -> JobKind {
        match self.target {
            JobTarget::Gather { .. } => JobKind::Gather,
            JobTarget::Build { .. } => JobKind::Build,
            JobTarget::Move { .. } => JobKind::Move,
        }
    }
}

/// A job waiting in a scheduler queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct QueuedJob {
    /// The job.
    pub job: Job,
    /// Priority class the job was queued under.
    pub priority: Priority,
}

/// A job handed to a worker and not yet reported back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ActiveJob {
    /// The job as it was sent to the worker.
    pub job: Job,
    /// Worker holding the job.
    pub worker_id: WorkerId,
    /// Registry incarnation of the worker when the job was handed out.
    pub incarnation: u64,
    /// When the assignment was made.
    pub assigned_at: DateTime<Utc>,
    /// Priority the job was queued under, restored if it is reclaimed.
    pub priority: Priority,
}

/// Lifetime counters of a scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SchedulerStats {
    /// Jobs handed to workers.
    pub total_assigned: u64,
    /// Jobs reported complete.
    pub total_completed: u64,
}

/// Read-only snapshot of a job scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SchedulerSnapshot {
    /// Owner-domain the scheduler serves.
    pub owner_id: OwnerId,
    /// Queue, front first.
    pub queue: Vec<QueuedJob>,
    /// Active assignments, ordered by job ID.
    pub active: Vec<ActiveJob>,
    /// Counters.
    pub stats: SchedulerStats,
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// A worker's full state.
///
/// Invariant: `state` is `Working` or `Moving` exactly when `current_job`
/// is `Some`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Worker {
    /// Worker identifier, unique within the owner's domain.
    pub id: WorkerId,
    /// The owner this worker belongs to.
    pub owner_id: OwnerId,
    /// Display name.
    pub name: String,
    /// State machine position.
    pub state: WorkerState,
    /// Specialization, if any.
    pub role: Option<Role>,
    /// Current position.
    pub location: Coordinate,
    /// Carried resources.
    pub inventory: ResourceMap,
    /// Job being executed.
    pub current_job: Option<Job>,
    /// Progress on the current job. Units gathered, build points, or steps.
    pub work_progress: u32,
}

/// The copy of a worker an owner keeps in its roster.
pub type WorkerSnapshot = Worker;

// ---------------------------------------------------------------------------
// Structures and owners
// ---------------------------------------------------------------------------

/// A structure placed by an owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Structure {
    /// Structure identifier.
    pub id: StructureId,
    /// What kind of building it is.
    pub kind: StructureKind,
    /// Where it stands.
    pub location: Coordinate,
    /// Percent complete, `0..=100`.
    pub construction_progress: u32,
    /// Hit points.
    pub hp: u32,
}

impl Structure {
    /// Whether construction has finished.
    pub const fn is_complete(&self) -> bool {
        self.construction_progress >= 100
    }
}

/// An owner's aggregate state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct OwnerAggregate {
    /// Owner identifier.
    pub id: OwnerId,
    /// Display name.
    pub name: String,
    /// Resources held.
    pub resource_ledger: ResourceMap,
    /// Last known snapshot of each worker.
    pub workers: Vec<WorkerSnapshot>,
    /// Structures placed, in placement order.
    pub structures: Vec<Structure>,
}

impl OwnerAggregate {
    /// Create an aggregate with the given starting ledger and nothing else.
    pub const fn new(id: OwnerId, name: String, resource_ledger: ResourceMap) -> Self {
        Self {
            id,
            name,
            resource_ledger,
            workers: Vec::new(),
            structures: Vec::new(),
        }
    }
}
