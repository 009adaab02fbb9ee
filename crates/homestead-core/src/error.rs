//! Error types for the homestead-core crate.
//!
//! Rules failures from the lower crates ([`WorldError`], [`AgentError`])
//! travel back to callers unchanged inside [`SimulationError`]. Actor
//! failures never cross a mailbox as panics: a stopped or saturated actor
//! shows up as an [`ActorError`] value.

use homestead_agents::AgentError;
use homestead_types::{OwnerId, WorkerId};
use homestead_world::WorldError;

use crate::clock::ClockError;
use crate::registry::RegistryError;
use crate::scheduler::SchedulerCallError;
use crate::supervisor::SupervisorError;

/// Errors delivering a message to an actor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActorError {
    /// The mailbox was full and the message was dropped.
    #[error("mailbox of {actor} is full")]
    MailboxFull {
        /// Label of the target actor.
        actor: String,
    },

    /// The actor has stopped.
    #[error("{actor} has stopped")]
    Stopped {
        /// Label of the target actor.
        actor: String,
    },
}

/// Errors returned by the [`Simulation`](crate::simulation::Simulation)
/// facade.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// A construction or ledger rule rejected the request.
    #[error(transparent)]
    World(#[from] WorldError),

    /// A job board operation failed.
    #[error(transparent)]
    Agent(#[from] AgentError),

    /// An actor with this ID is already running.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A supervisor rejected the request.
    #[error(transparent)]
    Supervisor(SupervisorError),

    /// The target actor could not be reached.
    #[error(transparent)]
    Actor(#[from] ActorError),

    /// The world clock failed.
    #[error(transparent)]
    Clock(#[from] ClockError),

    /// No owner with this ID is running.
    #[error("owner not found: {0}")]
    OwnerNotFound(OwnerId),

    /// No worker with this ID is running under the owner.
    #[error("worker not found: {owner_id}/{worker_id}")]
    WorkerNotFound {
        /// Owner-domain searched.
        owner_id: OwnerId,
        /// Worker looked up.
        worker_id: WorkerId,
    },
}

impl SimulationError {
    /// Whether this is an `already_started` rejection.
    pub const fn is_already_started(&self) -> bool {
        matches!(
            self,
            Self::Registry(RegistryError::AlreadyStarted { .. })
                | Self::Supervisor(SupervisorError::DuplicateChild(_))
        )
    }
}

impl From<SupervisorError> for SimulationError {
    fn from(err: SupervisorError) -> Self {
        match err {
            SupervisorError::Registry(inner) => Self::Registry(inner),
            SupervisorError::Actor(inner) => Self::Actor(inner),
            other => Self::Supervisor(other),
        }
    }
}

impl From<SchedulerCallError> for SimulationError {
    fn from(err: SchedulerCallError) -> Self {
        match err {
            SchedulerCallError::Actor(inner) => Self::Actor(inner),
            SchedulerCallError::Board(inner) => Self::Agent(inner),
        }
    }
}
