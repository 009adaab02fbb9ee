//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure mode of startup and seeding so
//! `main` can propagate with `?`.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: homestead_core::ConfigError,
    },

    /// The simulation rejected a request.
    #[error("simulation error: {source}")]
    Simulation {
        /// The underlying simulation error.
        #[from]
        source: homestead_core::SimulationError,
    },

    /// The seed section cannot be satisfied.
    #[error("seed error: {message}")]
    Seed {
        /// Description of the seeding failure.
        message: String,
    },
}
