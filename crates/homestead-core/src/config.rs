//! Configuration loading and typed config structures for the Homestead
//! simulation.
//!
//! The canonical configuration lives in `homestead-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror the
//! YAML structure, and provides a loader that reads it. Every field has a
//! default, so an empty or partial file is valid.

use std::path::Path;
use std::time::Duration;

use homestead_types::{ResourceKind, ResourceMap};
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `homestead-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// World clock settings.
    #[serde(default)]
    pub world: WorldConfig,

    /// Mailbox settings shared by every actor.
    #[serde(default)]
    pub actors: ActorConfig,

    /// Restart intensity for every supervisor.
    #[serde(default)]
    pub supervision: SupervisionConfig,

    /// Job scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Starting economy.
    #[serde(default)]
    pub economy: EconomyConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Initial population created by the engine binary.
    #[serde(default)]
    pub seed: SeedConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }
}

/// World clock configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldConfig {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Random seed for reproducible population seeding.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Real-time milliseconds per tick.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Ticks in one season. Must be at least 1.
    #[serde(default = "default_season_duration")]
    pub season_duration: u64,

    /// Stop after this many ticks. `0` runs until interrupted.
    #[serde(default)]
    pub max_ticks: u64,

    /// Start with the interval timer suspended; ticks then only happen on
    /// demand.
    #[serde(default)]
    pub start_paused: bool,
}

impl WorldConfig {
    /// The tick interval as a [`Duration`], never shorter than 1 ms.
    pub const fn tick_interval(&self) -> Duration {
        if self.tick_interval_ms == 0 {
            Duration::from_millis(1)
        } else {
            Duration::from_millis(self.tick_interval_ms)
        }
    }
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            season_duration: default_season_duration(),
            max_ticks: 0,
            start_paused: false,
        }
    }
}

/// Actor mailbox configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ActorConfig {
    /// Bound of every actor mailbox. Casts to a full mailbox are dropped.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

/// Supervisor restart intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SupervisionConfig {
    /// Restarts allowed per child within `restart_window_ms`.
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Sliding window for counting restarts.
    #[serde(default = "default_restart_window_ms")]
    pub restart_window_ms: u64,
}

impl SupervisionConfig {
    /// The restart window as a [`Duration`].
    pub const fn restart_window(&self) -> Duration {
        Duration::from_millis(self.restart_window_ms)
    }
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            restart_window_ms: default_restart_window_ms(),
        }
    }
}

/// Job scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Owners ask their scheduler to reclaim stale jobs every N ticks.
    /// `0` disables the periodic sweep.
    #[serde(default = "default_stale_sweep_interval_ticks")]
    pub stale_sweep_interval_ticks: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            stale_sweep_interval_ticks: default_stale_sweep_interval_ticks(),
        }
    }
}

/// Starting economy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EconomyConfig {
    /// Ledger every new owner starts with.
    #[serde(default)]
    pub starting_ledger: ResourceMap,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive (trace, debug, info, warn, error).
    /// `RUST_LOG` takes precedence when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Log the narrator's description on every season change.
    #[serde(default = "default_true")]
    pub narrate_seasons: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            narrate_seasons: true,
        }
    }
}

/// Initial population created by the engine binary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedConfig {
    /// Owners to start.
    #[serde(default = "default_seed_owners")]
    pub owners: u32,

    /// Workers started under each owner.
    #[serde(default = "default_workers_per_owner")]
    pub workers_per_owner: u32,

    /// Gather jobs queued for each owner at start.
    #[serde(default = "default_initial_jobs")]
    pub initial_jobs: u32,

    /// Quota of each seeded gather job.
    #[serde(default = "default_gather_quota")]
    pub gather_quota: u32,

    /// Resources the seeded gather jobs cycle through.
    #[serde(default = "default_seed_resources")]
    pub resources: Vec<ResourceKind>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            owners: default_seed_owners(),
            workers_per_owner: default_workers_per_owner(),
            initial_jobs: default_initial_jobs(),
            gather_quota: default_gather_quota(),
            resources: default_seed_resources(),
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

fn default_world_name() -> String {
    "Homestead".to_owned()
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_season_duration() -> u64 {
    30
}

const fn default_mailbox_capacity() -> usize {
    1024
}

const fn default_max_restarts() -> u32 {
    3
}

const fn default_restart_window_ms() -> u64 {
    5000
}

const fn default_stale_sweep_interval_ticks() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}

const fn default_seed_owners() -> u32 {
    2
}

const fn default_workers_per_owner() -> u32 {
    3
}

const fn default_initial_jobs() -> u32 {
    4
}

const fn default_gather_quota() -> u32 {
    20
}

fn default_seed_resources() -> Vec<ResourceKind> {
    vec![ResourceKind::Wood, ResourceKind::Stone, ResourceKind::Food]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SimulationConfig::default();
        assert_eq!(config.world.seed, 42);
        assert_eq!(config.world.season_duration, 30);
        assert_eq!(config.actors.mailbox_capacity, 1024);
        assert_eq!(config.supervision.max_restarts, 3);
        assert_eq!(config.scheduler.stale_sweep_interval_ticks, 5);
        assert!(config.economy.starting_ledger.is_empty());
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
world:
  name: "Test Valley"
  seed: 7
  tick_interval_ms: 250
  season_duration: 12
  max_ticks: 100

actors:
  mailbox_capacity: 64

supervision:
  max_restarts: 5
  restart_window_ms: 1000

scheduler:
  stale_sweep_interval_ticks: 2

economy:
  starting_ledger:
    wood: 100
    stone: 40

logging:
  level: "debug"
  format: json
  narrate_seasons: false

seed:
  owners: 1
  workers_per_owner: 4
  initial_jobs: 2
  gather_quota: 15
  resources: [food, ore]
"#;

        let config = SimulationConfig::parse(yaml);
        assert!(config.is_ok(), "parse failed: {config:?}");
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.world.name, "Test Valley");
        assert_eq!(config.world.max_ticks, 100);
        assert_eq!(config.world.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.actors.mailbox_capacity, 64);
        assert_eq!(config.supervision.restart_window(), Duration::from_secs(1));
        assert_eq!(config.scheduler.stale_sweep_interval_ticks, 2);
        assert_eq!(
            config.economy.starting_ledger.get(&ResourceKind::Wood),
            Some(&100)
        );
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(!config.logging.narrate_seasons);
        assert_eq!(config.seed.resources, vec![ResourceKind::Food, ResourceKind::Ore]);
    }

    #[test]
    fn parse_minimal_yaml() {
        let config = SimulationConfig::parse("world:\n  season_duration: 3\n");
        assert!(config.is_ok());
        let config = config.ok().unwrap_or_default();

        assert_eq!(config.world.season_duration, 3);
        assert_eq!(config.world.tick_interval_ms, 1000);
        assert_eq!(config.seed.workers_per_owner, 3);
    }

    #[test]
    fn parse_empty_yaml() {
        assert_eq!(SimulationConfig::parse("").ok(), Some(SimulationConfig::default()));
    }

    #[test]
    fn zero_tick_interval_is_clamped() {
        let world = WorldConfig {
            tick_interval_ms: 0,
            ..WorldConfig::default()
        };
        assert_eq!(world.tick_interval(), Duration::from_millis(1));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("homestead-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
        }
    }
}
