//! Actors, registry, supervision, and the world clock for the Homestead
//! simulation.
//!
//! Every stateful entity is a tokio task with a bounded mailbox: one clock,
//! one owner per participant, one scheduler per owner-domain, and one task
//! per worker. The [`Simulation`] facade is the in-process API the outer
//! layers use.
//!
//! # Modules
//!
//! - [`clock`] -- World clock state and the ticking actor that broadcasts to
//!   owners and workers.
//! - [`config`] -- Configuration loading from `homestead-config.yaml` into
//!   strongly-typed structs.
//! - [`context`] -- Registries and configuration shared by every actor.
//! - [`domain`] -- Per-owner supervision subtree (scheduler and workers).
//! - [`error`] -- Actor delivery errors and the facade's error type.
//! - [`mailbox`] -- Bounded mailboxes with cast and call delivery.
//! - [`narrator`] -- Descriptive text for season changes in the log.
//! - [`owner`] -- Owner actor: ledger, roster, and structures.
//! - [`registry`] -- Scoped, insert-if-absent tables of live actors.
//! - [`scheduler`] -- Job scheduler actor.
//! - [`simulation`] -- The [`Simulation`] facade.
//! - [`supervisor`] -- One-for-one supervisors with restart policies.
//! - [`worker`] -- Worker actor.

pub mod clock;
pub mod config;
pub mod context;
pub mod domain;
pub mod error;
pub mod mailbox;
pub mod narrator;
pub mod owner;
pub mod registry;
pub mod scheduler;
pub mod simulation;
pub mod supervisor;
pub mod worker;

pub use clock::{ClockError, ClockHandle, WorldClock};
pub use config::{ConfigError, SimulationConfig};
pub use context::ActorContext;
pub use domain::OwnerDomain;
pub use error::{ActorError, SimulationError};
pub use narrator::{Narrator, PlainNarrator};
pub use owner::OwnerHandle;
pub use registry::{Registries, Registry, RegistryError, Scope};
pub use scheduler::{SchedulerCallError, SchedulerHandle};
pub use simulation::Simulation;
pub use supervisor::{ChildSpec, RestartPolicy, SupervisorError, SupervisorHandle};
pub use worker::WorkerHandle;
