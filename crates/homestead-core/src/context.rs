//! Shared context handed to every actor.

use std::sync::Arc;

use crate::config::SimulationConfig;
use crate::registry::Registries;

/// What every actor can reach: the registries and the configuration.
///
/// Cloning is cheap; both parts are reference-counted.
#[derive(Debug, Clone)]
pub struct ActorContext {
    /// Live actors by scope and ID.
    pub registries: Arc<Registries>,
    /// Loaded configuration.
    pub config: Arc<SimulationConfig>,
}

impl ActorContext {
    /// A context with fresh, empty registries.
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            registries: Arc::new(Registries::new()),
            config: Arc::new(config),
        }
    }

    /// Bound of every actor mailbox.
    pub fn mailbox_capacity(&self) -> usize {
        self.config.actors.mailbox_capacity
    }
}
