//! Worker state machine and job board for the Homestead simulation.
//!
//! This crate contains the logic layer the worker and scheduler actors run:
//! everything that operates on worker and queue state without touching a
//! mailbox. It sits between `homestead-world` (seasonal rules) and
//! `homestead-core` (actors and supervision).
//!
//! # Modules
//!
//! - [`error`] -- Error types for job board operations ([`AgentError`])
//! - [`jobs`] -- Priority queue, active table, assignment, and stale
//!   reclamation ([`JobBoard`])
//! - [`worker`] -- Worker transitions and per-tick job processing

pub mod error;
pub mod jobs;
pub mod worker;

// Re-export primary types at crate root for convenience.
pub use error::AgentError;
pub use jobs::{AssignmentReport, JobBoard, WorkerDirectory};
pub use worker::{WorkerEffect, WorkerSpec, assign_job, cancel_job, process_tick, rest};
