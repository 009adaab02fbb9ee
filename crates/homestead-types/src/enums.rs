//! Enumeration types for the Homestead simulation.
//!
//! All enums serialize as `snake_case` strings so snapshots read naturally
//! in JSON and in the generated `TypeScript` bindings.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// One of the four seasons of the annual cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Season {
    /// First season of the year. Entering it starts a new year.
    Spring,
    /// Second season.
    Summer,
    /// Third season.
    Fall,
    /// Fourth season.
    Winter,
}

impl Season {
    /// All seasons in cycle order.
    pub const ALL: [Self; 4] = [Self::Spring, Self::Summer, Self::Fall, Self::Winter];

    /// The season that follows this one (`winter` wraps to `spring`).
    pub const fn next(self) -> Self {
        match self {
            Self::Spring => Self::Summer,
            Self::Summer => Self::Fall,
            Self::Fall => Self::Winter,
            Self::Winter => Self::Spring,
        }
    }
}

/// Time-of-day phase, derived from the total tick count.
///
/// Only the flavor/narration collaborator reads this; simulation rules never
/// depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum TimeOfDay {
    /// First light.
    Dawn,
    /// Working morning.
    Morning,
    /// Afternoon.
    Afternoon,
    /// Sunset.
    Dusk,
    /// Night.
    Night,
}

// ---------------------------------------------------------------------------
// Resources and terrain
// ---------------------------------------------------------------------------

/// A kind of resource held in ledgers and inventories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ResourceKind {
    /// Timber from forests.
    Wood,
    /// Quarried stone.
    Stone,
    /// Crops and forage. Gathering it follows the farming season table.
    Food,
    /// Raw ore from mines.
    Ore,
}

/// Terrain of a map tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Terrain {
    /// Open grassland.
    Grass,
    /// Woodland.
    Forest,
    /// Rolling hills.
    Hills,
    /// Lakes and rivers. Nothing can be built here.
    Water,
    /// Mountains. Nothing can be built here.
    Mountain,
}

impl Terrain {
    /// Whether structures may be placed on this terrain.
    pub const fn is_buildable(self) -> bool {
        !matches!(self, Self::Water | Self::Mountain)
    }
}

// ---------------------------------------------------------------------------
// Structures
// ---------------------------------------------------------------------------

/// A kind of structure an owner can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum StructureKind {
    /// Housing for workers.
    House,
    /// Food production.
    Farm,
    /// Wood production.
    Lumberyard,
    /// Resource storage.
    Storage,
}

impl StructureKind {
    /// All structure kinds.
    pub const ALL: [Self; 4] = [Self::House, Self::Farm, Self::Lumberyard, Self::Storage];

    /// The `snake_case` name used on the wire and in configuration.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::House => "house",
            Self::Farm => "farm",
            Self::Lumberyard => "lumberyard",
            Self::Storage => "storage",
        }
    }
}

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// Lifecycle state of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum WorkerState {
    /// No job. Eligible for assignment.
    Idle,
    /// Executing a gather or build job.
    Working,
    /// Executing a move job.
    Moving,
    /// Taking a one-tick break. Not eligible for assignment.
    Resting,
}

/// Specialization of a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Role {
    /// Builds structures.
    Builder,
    /// Works the fields.
    Farmer,
    /// Works the quarries and mines.
    Miner,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Kind of work a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum JobKind {
    /// Collect a resource into the worker's inventory.
    Gather,
    /// Put labor into a structure.
    Build,
    /// Walk to a coordinate.
    Move,
}

/// Progress status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum JobStatus {
    /// Waiting in a scheduler queue.
    Pending,
    /// Assigned to a worker.
    InProgress,
    /// Finished.
    Done,
}

/// Priority class of a queued job.
///
/// The derived ordering runs from most to least urgent, so
/// `Priority::Critical < Priority::Low`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS,
)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Priority {
    /// Must run before anything else.
    Critical,
    /// Ahead of routine work.
    High,
    /// Routine work.
    #[default]
    Normal,
    /// Only when nothing else is waiting.
    Low,
}

impl Priority {
    /// Numeric rank: 0 for critical up to 3 for low.
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 0,
            Self::High => 1,
            Self::Normal => 2,
            Self::Low => 3,
        }
    }
}
