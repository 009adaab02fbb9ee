//! World clock and tick broadcast.
//!
//! [`WorldClock`] is the pure temporal state: season position, tick count,
//! and season length. The clock actor owns one, advances it on a fixed
//! [`tokio::time::interval`], and broadcasts a [`TickSignal`] to every
//! registered owner and worker. It is the only timer in the simulation.
//!
//! # Design Principles
//!
//! - All temporal arithmetic is checked. Overflow pauses the clock and is
//!   reported as a [`ClockError`].
//! - The tick payload carries the season, so receivers never query the
//!   clock back.
//! - Snapshots are published on a `watch` channel and read without a
//!   mailbox round trip.

use std::sync::Arc;
use std::time::Duration;

use homestead_types::{Season, SeasonState, TickSignal, TimeOfDay, WorldState};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::{ActorError, SimulationError};
use crate::mailbox::Mailbox;
use crate::narrator::Narrator;
use crate::registry::Registries;

/// Number of time-of-day phases within one tick-day.
const TIME_OF_DAY_PHASES: u64 = 5;

/// Mailbox bound of the clock. Only control messages arrive here.
const CLOCK_MAILBOX: usize = 16;

/// Errors that can occur during clock operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClockError {
    /// A counter would overflow.
    #[error("clock overflow: {counter} cannot advance beyond u64::MAX")]
    TickOverflow {
        /// Which counter overflowed.
        counter: &'static str,
    },

    /// Invalid clock configuration (e.g. zero-length seasons).
    #[error("invalid clock configuration: {reason}")]
    InvalidConfig {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Pure state
// ---------------------------------------------------------------------------

/// World clock tracking the simulation's temporal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorldClock {
    season: SeasonState,
    total_ticks: u64,
    season_duration: u64,
}

impl WorldClock {
    /// A clock at tick 0, spring of year 1.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `season_duration` is 0.
    pub fn new(season_duration: u64) -> Result<Self, ClockError> {
        Self::from_parts(SeasonState::default(), 0, season_duration)
    }

    /// Restore a clock from explicit parts.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::InvalidConfig`] if `season_duration` is 0, if
    /// `ticks_elapsed` is not below it, or if `year` is 0.
    pub fn from_parts(
        season: SeasonState,
        total_ticks: u64,
        season_duration: u64,
    ) -> Result<Self, ClockError> {
        if season_duration == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "season_duration must be at least 1".to_owned(),
            });
        }
        if season.ticks_elapsed >= season_duration {
            return Err(ClockError::InvalidConfig {
                reason: format!(
                    "ticks_elapsed {} must be below season_duration {season_duration}",
                    season.ticks_elapsed
                ),
            });
        }
        if season.year == 0 {
            return Err(ClockError::InvalidConfig {
                reason: "year starts at 1".to_owned(),
            });
        }
        Ok(Self {
            season,
            total_ticks,
            season_duration,
        })
    }

    /// Advance by one tick and return the signal to broadcast.
    ///
    /// On reaching `season_duration` the season rolls over and
    /// `ticks_elapsed` resets to 0; the year increments exactly when the
    /// new season is spring. Nothing changes if any counter would overflow.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::TickOverflow`] on counter overflow.
    pub fn advance(&mut self) -> Result<TickSignal, ClockError> {
        let mut season = self.season;
        let elapsed = season
            .ticks_elapsed
            .checked_add(1)
            .ok_or(ClockError::TickOverflow {
                counter: "ticks_elapsed",
            })?;
        if elapsed >= self.season_duration {
            season.current = season.current.next();
            season.ticks_elapsed = 0;
            if season.current == Season::Spring {
                season.year = season
                    .year
                    .checked_add(1)
                    .ok_or(ClockError::TickOverflow { counter: "year" })?;
            }
        } else {
            season.ticks_elapsed = elapsed;
        }
        let total_ticks = self
            .total_ticks
            .checked_add(1)
            .ok_or(ClockError::TickOverflow {
                counter: "total_ticks",
            })?;

        self.season = season;
        self.total_ticks = total_ticks;
        Ok(TickSignal {
            season,
            total_ticks,
        })
    }

    /// Current season position.
    pub const fn season(&self) -> SeasonState {
        self.season
    }

    /// Ticks fired so far.
    pub const fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Ticks per season.
    pub const fn season_duration(&self) -> u64 {
        self.season_duration
    }

    /// Time of day, cycling `tick % 5` through Dawn, Morning, Afternoon,
    /// Dusk, Night.
    pub fn time_of_day(&self) -> TimeOfDay {
        match self.total_ticks.checked_rem(TIME_OF_DAY_PHASES).unwrap_or(0) {
            0 => TimeOfDay::Dawn,
            1 => TimeOfDay::Morning,
            2 => TimeOfDay::Afternoon,
            3 => TimeOfDay::Dusk,
            _ => TimeOfDay::Night,
        }
    }

    /// Snapshot for external readers.
    pub const fn state(&self, paused: bool) -> WorldState {
        WorldState {
            season: self.season,
            total_ticks: self.total_ticks,
            season_duration: self.season_duration,
            paused,
        }
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    TickNow(oneshot::Sender<Result<TickSignal, ClockError>>),
    Pause(oneshot::Sender<()>),
    Resume(oneshot::Sender<()>),
    Stop(oneshot::Sender<()>),
}

/// Clonable handle to the clock actor.
#[derive(Clone)]
pub struct ClockHandle {
    mailbox: Mailbox<Command>,
    state: watch::Receiver<WorldState>,
}

impl std::fmt::Debug for ClockHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockHandle")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl ClockHandle {
    /// Current season position.
    pub fn get_season(&self) -> SeasonState {
        self.state.borrow().season
    }

    /// Current clock snapshot.
    pub fn get_state(&self) -> WorldState {
        *self.state.borrow()
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<WorldState> {
        self.state.clone()
    }

    /// Fire one tick immediately, paused or not.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Clock`] on overflow, or
    /// [`SimulationError::Actor`] if the clock has stopped.
    pub async fn tick_now(&self) -> Result<TickSignal, SimulationError> {
        Ok(self.mailbox.call(Command::TickNow).await??)
    }

    /// Stop the interval timer. State is kept.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the clock has stopped.
    pub async fn pause(&self) -> Result<(), ActorError> {
        self.mailbox.call(Command::Pause).await
    }

    /// Restart the interval timer. The next tick fires one period later.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the clock has stopped.
    pub async fn resume(&self) -> Result<(), ActorError> {
        self.mailbox.call(Command::Resume).await
    }

    /// Stop the clock actor.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the clock has already stopped.
    pub async fn stop(&self) -> Result<(), ActorError> {
        self.mailbox.call(Command::Stop).await
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Settings for [`spawn`].
pub struct ClockOptions {
    /// Real time between ticks.
    pub period: Duration,
    /// Start with the timer suspended.
    pub start_paused: bool,
    /// Describes each new season in the log. `None` keeps quiet.
    pub narrator: Option<Arc<dyn Narrator>>,
}

struct ClockActor {
    clock: WorldClock,
    paused: bool,
    interval: Interval,
    registries: Arc<Registries>,
    narrator: Option<Arc<dyn Narrator>>,
    publish: watch::Sender<WorldState>,
}

/// Start the clock actor.
pub fn spawn(clock: WorldClock, registries: Arc<Registries>, options: ClockOptions) -> ClockHandle {
    let (mailbox, rx) = Mailbox::channel("clock", CLOCK_MAILBOX);
    let (publish, state) = watch::channel(clock.state(options.start_paused));

    let first = Instant::now()
        .checked_add(options.period)
        .unwrap_or_else(Instant::now);
    let mut interval = tokio::time::interval_at(first, options.period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let actor = ClockActor {
        clock,
        paused: options.start_paused,
        interval,
        registries,
        narrator: options.narrator,
        publish,
    };
    tokio::spawn(actor.run(rx));
    ClockHandle { mailbox, state }
}

impl ClockActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        info!(
            season_duration = self.clock.season_duration(),
            paused = self.paused,
            "World clock started"
        );
        loop {
            tokio::select! {
                command = rx.recv() => match command {
                    Some(Command::TickNow(reply)) => {
                        let _ = reply.send(self.tick());
                    }
                    Some(Command::Pause(reply)) => {
                        self.set_paused(true);
                        let _ = reply.send(());
                    }
                    Some(Command::Resume(reply)) => {
                        self.interval.reset();
                        self.set_paused(false);
                        let _ = reply.send(());
                    }
                    Some(Command::Stop(reply)) => {
                        let _ = reply.send(());
                        break;
                    }
                    None => break,
                },
                _ = self.interval.tick(), if !self.paused => {
                    let _ = self.tick();
                }
            }
        }
        info!(total_ticks = self.clock.total_ticks(), "World clock stopped");
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
        self.publish.send_replace(self.clock.state(paused));
        info!(paused, total_ticks = self.clock.total_ticks(), "Clock paused state changed");
    }

    fn tick(&mut self) -> Result<TickSignal, ClockError> {
        let signal = match self.clock.advance() {
            Ok(signal) => signal,
            Err(err) => {
                error!(error = %err, "Clock cannot advance, pausing");
                self.set_paused(true);
                return Err(err);
            }
        };
        self.publish.send_replace(self.clock.state(self.paused));

        let owners = self.registries.owners.list_all();
        let workers = self.registries.workers.list_all();
        let delivered_owners = owners.iter().filter(|o| o.tick(signal).is_ok()).count();
        let delivered_workers = workers.iter().filter(|w| w.tick(signal).is_ok()).count();

        debug!(
            tick = signal.total_ticks,
            season = ?signal.season.current,
            owners = owners.len(),
            workers = workers.len(),
            dropped = owners
                .len()
                .saturating_add(workers.len())
                .saturating_sub(delivered_owners.saturating_add(delivered_workers)),
            "Tick broadcast"
        );

        let season_changed = signal.season.ticks_elapsed == 0;
        if let Some(narrator) = self.narrator.as_ref().filter(|_| season_changed) {
            info!(
                season = ?signal.season.current,
                year = signal.season.year,
                narration = %narrator.describe(signal.season.current, self.clock.time_of_day()),
                "Season changed"
            );
        }
        Ok(signal)
    }
}
