//! In-process facade over the actor system.
//!
//! [`Simulation`] is what external collaborators talk to. It owns the world
//! clock, the top-level owner supervisor, and one [`OwnerDomain`] per owner.
//! Every query goes to the actor that owns the state; the facade itself
//! holds only handles.
//!
//! Lookups are scoped: a worker is addressed by `(owner_id, worker_id)`
//! because worker IDs are only unique within their owner's domain.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use homestead_agents::{AssignmentReport, WorkerSpec};
use homestead_types::{
    Coordinate, Job, JobId, OwnerAggregate, OwnerId, Priority, ResourceMap, SchedulerSnapshot,
    SeasonState, Structure, StructureId, TickSignal, Tile, Worker, WorkerId, WorldState,
};
use tracing::info;

use crate::clock::{self, ClockHandle, ClockOptions, WorldClock};
use crate::config::SimulationConfig;
use crate::context::ActorContext;
use crate::domain::OwnerDomain;
use crate::error::SimulationError;
use crate::narrator::{Narrator, PlainNarrator};
use crate::owner::{self, OwnerHandle};
use crate::registry::{Registries, RegistryError, Scope};
use crate::scheduler::SchedulerHandle;
use crate::supervisor::{Supervisor, SupervisorHandle};
use crate::worker::WorkerHandle;

/// A running simulation.
#[derive(Debug)]
pub struct Simulation {
    ctx: ActorContext,
    clock: ClockHandle,
    owners: SupervisorHandle,
    domains: Mutex<BTreeMap<OwnerId, OwnerDomain>>,
}

impl Simulation {
    /// Start the clock and an empty owner supervisor.
    ///
    /// Season changes are narrated with [`PlainNarrator`] when
    /// `logging.narrate_seasons` is set.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Clock`] if `world.season_duration` is 0.
    pub fn start(config: SimulationConfig) -> Result<Self, SimulationError> {
        let narrator: Option<Arc<dyn Narrator>> = if config.logging.narrate_seasons {
            Some(Arc::new(PlainNarrator))
        } else {
            None
        };
        Self::launch(config, narrator)
    }

    /// Like [`Simulation::start`], with a custom narrator.
    ///
    /// # Errors
    ///
    /// Same as [`Simulation::start`].
    pub fn with_narrator(
        config: SimulationConfig,
        narrator: Arc<dyn Narrator>,
    ) -> Result<Self, SimulationError> {
        Self::launch(config, Some(narrator))
    }

    fn launch(
        config: SimulationConfig,
        narrator: Option<Arc<dyn Narrator>>,
    ) -> Result<Self, SimulationError> {
        let world = WorldClock::new(config.world.season_duration)?;
        let options = ClockOptions {
            period: config.world.tick_interval(),
            start_paused: config.world.start_paused,
            narrator,
        };
        let owners = Supervisor::spawn_dynamic("owners", config.supervision);
        let ctx = ActorContext::new(config);
        let clock = clock::spawn(world, Arc::clone(&ctx.registries), options);

        info!(
            world = %ctx.config.world.name,
            tick_interval_ms = ctx.config.world.tick_interval_ms,
            season_duration = ctx.config.world.season_duration,
            "Simulation started"
        );
        Ok(Self {
            ctx,
            clock,
            owners,
            domains: Mutex::new(BTreeMap::new()),
        })
    }

    /// The registries of live actors.
    pub fn registries(&self) -> &Arc<Registries> {
        &self.ctx.registries
    }

    /// The loaded configuration.
    pub fn config(&self) -> &SimulationConfig {
        &self.ctx.config
    }

    /// The world clock.
    pub const fn clock(&self) -> &ClockHandle {
        &self.clock
    }

    // -----------------------------------------------------------------------
    // Owners
    // -----------------------------------------------------------------------

    /// Start an owner together with its scheduler and worker supervisor.
    ///
    /// An owner that was removed after exhausting its restarts can be
    /// started again; it rejoins its still-running domain.
    ///
    /// # Errors
    ///
    /// Returns an `already_started` error if the owner is running.
    pub async fn start_owner(
        &self,
        id: impl Into<OwnerId>,
        name: impl Into<String>,
    ) -> Result<OwnerHandle, SimulationError> {
        let id = id.into();
        if self.ctx.registries.owner(&id).is_some() {
            return Err(RegistryError::AlreadyStarted {
                scope: Scope::World,
                id: id.as_str().to_owned(),
            }
            .into());
        }

        let existing = self.domain(&id);
        let fresh = existing.is_none();
        let domain = match existing {
            Some(domain) => domain,
            None => OwnerDomain::start(id.clone(), self.ctx.clone())?,
        };

        let spec = owner::child_spec(id.clone(), name.into(), self.ctx.clone());
        if let Err(err) = self.owners.start_child(spec).await {
            if fresh {
                domain.shutdown().await;
            }
            return Err(err.into());
        }

        self.domains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), domain);
        self.owner(&id)
    }

    /// Stop an owner and its whole domain. Returns whether it was running.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Actor`] if the owner supervisor is gone.
    pub async fn stop_owner(&self, id: &OwnerId) -> Result<bool, SimulationError> {
        let domain = self
            .domains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        let was_running = self.owners.terminate_child(id.as_str()).await?;
        if let Some(domain) = &domain {
            domain.shutdown().await;
        }
        Ok(was_running || domain.is_some())
    }

    /// Snapshot of an owner's aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if no such owner runs.
    pub async fn get_owner_state(&self, id: &OwnerId) -> Result<OwnerAggregate, SimulationError> {
        Ok(self.owner(id)?.get_state().await?)
    }

    /// Place a structure for an owner.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::World`] if a construction rule rejects
    /// the placement, or [`SimulationError::OwnerNotFound`].
    pub async fn place_structure(
        &self,
        owner_id: &OwnerId,
        tile: Tile,
        kind: &str,
        coordinate: Coordinate,
    ) -> Result<Structure, SimulationError> {
        self.owner(owner_id)?
            .place_structure(tile, kind, coordinate)
            .await
    }

    /// Remove a structure, refunding part of its cost if it is less than
    /// half built.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::World`] if the owner has no such
    /// structure, or [`SimulationError::OwnerNotFound`].
    pub async fn cancel_construction(
        &self,
        owner_id: &OwnerId,
        structure_id: StructureId,
    ) -> Result<ResourceMap, SimulationError> {
        self.owner(owner_id)?
            .cancel_construction(structure_id)
            .await
    }

    // -----------------------------------------------------------------------
    // Workers
    // -----------------------------------------------------------------------

    /// Start a worker in its owner's domain.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if the owner has no
    /// domain, or an `already_started` error if the worker is running.
    pub async fn start_worker(&self, spec: WorkerSpec) -> Result<WorkerHandle, SimulationError> {
        let domain = self
            .domain(&spec.owner_id)
            .ok_or_else(|| SimulationError::OwnerNotFound(spec.owner_id.clone()))?;
        domain.start_worker(spec).await
    }

    /// Stop a worker without restarting it. Returns whether it was running.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if the owner has no
    /// domain.
    pub async fn stop_worker(
        &self,
        owner_id: &OwnerId,
        worker_id: &WorkerId,
    ) -> Result<bool, SimulationError> {
        let domain = self
            .domain(owner_id)
            .ok_or_else(|| SimulationError::OwnerNotFound(owner_id.clone()))?;
        Ok(domain.stop_worker(worker_id).await?)
    }

    /// Snapshot of a worker.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::WorkerNotFound`] if no such worker runs.
    pub async fn get_worker_state(
        &self,
        owner_id: &OwnerId,
        worker_id: &WorkerId,
    ) -> Result<Worker, SimulationError> {
        Ok(self.worker(owner_id, worker_id)?.get_state().await?)
    }

    /// Give a worker a job directly, bypassing the scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::WorkerNotFound`] or a delivery failure.
    pub fn assign_job(
        &self,
        owner_id: &OwnerId,
        worker_id: &WorkerId,
        job: Job,
    ) -> Result<(), SimulationError> {
        Ok(self.worker(owner_id, worker_id)?.assign_job(job)?)
    }

    /// Make a worker drop its current job.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::WorkerNotFound`] or a delivery failure.
    pub fn cancel_job(&self, owner_id: &OwnerId, worker_id: &WorkerId) -> Result<(), SimulationError> {
        Ok(self.worker(owner_id, worker_id)?.cancel_job()?)
    }

    /// Send an idle worker to rest for one tick.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::WorkerNotFound`] or a delivery failure.
    pub fn rest_worker(&self, owner_id: &OwnerId, worker_id: &WorkerId) -> Result<(), SimulationError> {
        Ok(self.worker(owner_id, worker_id)?.rest()?)
    }

    // -----------------------------------------------------------------------
    // Scheduler
    // -----------------------------------------------------------------------

    /// Queue a job in an owner's scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if the domain has no
    /// scheduler running.
    pub async fn add_job(
        &self,
        owner_id: &OwnerId,
        job: Job,
        priority: Priority,
    ) -> Result<(), SimulationError> {
        Ok(self.scheduler(owner_id)?.add_job(job, priority).await?)
    }

    /// Drop a queued job. No-op if it is not queued.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if the domain has no
    /// scheduler running.
    pub fn remove_job(&self, owner_id: &OwnerId, job_id: JobId) -> Result<(), SimulationError> {
        Ok(self.scheduler(owner_id)?.remove_job(job_id)?)
    }

    /// Snapshot of an owner's scheduler.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if the domain has no
    /// scheduler running.
    pub async fn get_scheduler_state(
        &self,
        owner_id: &OwnerId,
    ) -> Result<SchedulerSnapshot, SimulationError> {
        Ok(self.scheduler(owner_id)?.get_state().await?)
    }

    /// Hand queued jobs to the given workers.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Agent`] with `no_jobs_available` when the
    /// queue is empty and `worker_ids` is not.
    pub async fn assign_jobs(
        &self,
        owner_id: &OwnerId,
        worker_ids: Vec<WorkerId>,
    ) -> Result<AssignmentReport, SimulationError> {
        Ok(self.scheduler(owner_id)?.assign_jobs(worker_ids).await?)
    }

    /// Requeue jobs held by workers that are gone. Returns their IDs.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if the domain has no
    /// scheduler running.
    pub async fn check_stale_jobs(&self, owner_id: &OwnerId) -> Result<Vec<JobId>, SimulationError> {
        Ok(self.scheduler(owner_id)?.check_stale_jobs().await?)
    }

    /// Empty an owner's queue and active table and reset its counters.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::OwnerNotFound`] if the domain has no
    /// scheduler running.
    pub fn clear_all_jobs(&self, owner_id: &OwnerId) -> Result<(), SimulationError> {
        Ok(self.scheduler(owner_id)?.clear_all_jobs()?)
    }

    // -----------------------------------------------------------------------
    // Clock
    // -----------------------------------------------------------------------

    /// Current season position.
    pub fn get_season(&self) -> SeasonState {
        self.clock.get_season()
    }

    /// Current clock snapshot.
    pub fn get_world_state(&self) -> WorldState {
        self.clock.get_state()
    }

    /// Fire one tick now.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Clock`] on overflow.
    pub async fn tick_now(&self) -> Result<TickSignal, SimulationError> {
        self.clock.tick_now().await
    }

    /// Suspend the interval timer.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Actor`] if the clock has stopped.
    pub async fn pause(&self) -> Result<(), SimulationError> {
        Ok(self.clock.pause().await?)
    }

    /// Restart the interval timer.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Actor`] if the clock has stopped.
    pub async fn resume(&self) -> Result<(), SimulationError> {
        Ok(self.clock.resume().await?)
    }

    /// Stop the clock, every owner, and every domain.
    pub async fn shutdown(self) {
        let _ = self.clock.stop().await;
        let _ = self.owners.shutdown().await;
        let domains = std::mem::take(
            &mut *self
                .domains
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for domain in domains.values() {
            domain.shutdown().await;
        }
        info!(owners = domains.len(), "Simulation stopped");
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    fn domain(&self, owner_id: &OwnerId) -> Option<OwnerDomain> {
        self.domains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner_id)
            .cloned()
    }

    fn owner(&self, owner_id: &OwnerId) -> Result<OwnerHandle, SimulationError> {
        self.ctx
            .registries
            .owner(owner_id)
            .ok_or_else(|| SimulationError::OwnerNotFound(owner_id.clone()))
    }

    fn scheduler(&self, owner_id: &OwnerId) -> Result<SchedulerHandle, SimulationError> {
        self.ctx
            .registries
            .scheduler(owner_id)
            .ok_or_else(|| SimulationError::OwnerNotFound(owner_id.clone()))
    }

    fn worker(&self, owner_id: &OwnerId, worker_id: &WorkerId) -> Result<WorkerHandle, SimulationError> {
        self.ctx
            .registries
            .workers
            .lookup(&Scope::Owner(owner_id.clone()), worker_id.as_str())
            .ok_or_else(|| SimulationError::WorkerNotFound {
                owner_id: owner_id.clone(),
                worker_id: worker_id.clone(),
            })
    }
}
