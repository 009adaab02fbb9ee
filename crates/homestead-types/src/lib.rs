//! Shared type definitions for the Homestead simulation.
//!
//! This crate is the single source of truth for the data model shared by
//! every other crate in the workspace. Types are plain snapshots with
//! `serde` derives so persistence and presentation collaborators can consume
//! them, and `ts-rs` derives so the presentation layer gets `TypeScript`
//! bindings.
//!
//! # Modules
//!
//! - [`ids`] -- UUID-backed job/structure IDs and string-backed owner/worker IDs
//! - [`enums`] -- Seasons, resources, terrain, structure kinds, worker and job enums
//! - [`structs`] -- Workers, jobs, structures, owner aggregates, clock snapshots

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    JobKind, JobStatus, Priority, ResourceKind, Role, Season, StructureKind, Terrain, TimeOfDay,
    WorkerState,
};
pub use ids::{JobId, OwnerId, StructureId, WorkerId};
pub use structs::{
    ActiveJob, Coordinate, Job, JobTarget, OwnerAggregate, QueuedJob, ResourceMap,
    SchedulerSnapshot, SchedulerStats, SeasonState, Structure, TickSignal, Tile, Worker,
    WorkerSnapshot, WorldState,
};
