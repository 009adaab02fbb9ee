//! Owner actor.
//!
//! One task per owner. The actor holds the [`OwnerAggregate`]: the resource
//! ledger, the roster of worker snapshots, and the structure list. Every
//! change to the aggregate happens inside one mailbox turn, so a placement
//! can never interleave with a deposit.
//!
//! On each tick the owner refreshes its roster from the live workers, asks
//! the scheduler to sweep stale jobs every `stale_sweep_interval_ticks`
//! ticks, and forwards the idle workers to the scheduler for assignment.
//! The owner waits on its workers' `get_state` replies; nothing the owner
//! calls ever waits on the owner.

use homestead_types::{
    Coordinate, OwnerAggregate, OwnerId, ResourceMap, Season, Structure, StructureId, TickSignal,
    Tile, Worker, WorkerState,
};
use homestead_world::{WorldError, ledger};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::context::ActorContext;
use crate::error::{ActorError, SimulationError};
use crate::mailbox::Mailbox;
use crate::registry::{RegistrationGuard, RegistryError, Scope};
use crate::supervisor::{ChildFuture, ChildSpec, RestartPolicy};

enum Command {
    GetState(oneshot::Sender<OwnerAggregate>),
    AddWorker(Box<Worker>),
    SyncWorkers,
    Tick(TickSignal),
    PlaceStructure {
        tile: Tile,
        kind: String,
        coordinate: Coordinate,
        reply: oneshot::Sender<Result<Structure, WorldError>>,
    },
    CancelConstruction {
        structure_id: StructureId,
        reply: oneshot::Sender<Result<ResourceMap, WorldError>>,
    },
    Deposit(ResourceMap),
    ConstructionWork {
        structure_id: StructureId,
        season: Season,
    },
}

/// Clonable handle to a running owner.
#[derive(Clone)]
pub struct OwnerHandle {
    id: OwnerId,
    mailbox: Mailbox<Command>,
}

impl std::fmt::Debug for OwnerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl OwnerHandle {
    /// Owner ID.
    pub const fn id(&self) -> &OwnerId {
        &self.id
    }

    /// Snapshot of the aggregate.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the owner is gone.
    pub async fn get_state(&self) -> Result<OwnerAggregate, ActorError> {
        self.mailbox.call(Command::GetState).await
    }

    /// Add or replace a roster entry.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn add_worker(&self, worker: Worker) -> Result<(), ActorError> {
        self.mailbox.cast(Command::AddWorker(Box::new(worker)))
    }

    /// Rebuild the roster from every worker registered in this domain.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn sync_workers(&self) -> Result<(), ActorError> {
        self.mailbox.cast(Command::SyncWorkers)
    }

    /// Deliver a clock tick.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the tick was dropped.
    pub fn tick(&self, signal: TickSignal) -> Result<(), ActorError> {
        self.mailbox.cast(Command::Tick(signal))
    }

    /// Place a structure of `kind` on `tile`, paying from the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::World`] if a construction rule rejects
    /// the placement, in which case the aggregate is unchanged.
    pub async fn place_structure(
        &self,
        tile: Tile,
        kind: impl Into<String>,
        coordinate: Coordinate,
    ) -> Result<Structure, SimulationError> {
        let kind = kind.into();
        let placed = self
            .mailbox
            .call(|reply| Command::PlaceStructure {
                tile,
                kind,
                coordinate,
                reply,
            })
            .await?;
        Ok(placed?)
    }

    /// Remove a structure, refunding part of its cost if it is less than
    /// half built. Returns the refund.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::World`] if the owner has no such
    /// structure.
    pub async fn cancel_construction(
        &self,
        structure_id: StructureId,
    ) -> Result<ResourceMap, SimulationError> {
        let refund = self
            .mailbox
            .call(|reply| Command::CancelConstruction {
                structure_id,
                reply,
            })
            .await?;
        Ok(refund?)
    }

    /// Credit a worker's haul to the ledger.
    ///
    /// Never dropped: a full mailbox delays the message instead.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the owner is gone.
    pub fn deposit(&self, resources: ResourceMap) -> Result<(), ActorError> {
        self.mailbox.post(Command::Deposit(resources))
    }

    /// Advance one tick of construction on a structure.
    ///
    /// Never dropped: a full mailbox delays the message instead.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the owner is gone.
    pub fn construction_work(
        &self,
        structure_id: StructureId,
        season: Season,
    ) -> Result<(), ActorError> {
        self.mailbox.post(Command::ConstructionWork {
            structure_id,
            season,
        })
    }
}

/// Supervisor entry for an owner. Crashed owners restart with a fresh
/// aggregate and rebuild their roster from the registry.
pub fn child_spec(id: OwnerId, name: String, ctx: ActorContext) -> ChildSpec {
    let key = id.as_str().to_owned();
    ChildSpec::new(key, RestartPolicy::Transient, move || start(&id, &name, &ctx))
}

fn start(id: &OwnerId, name: &str, ctx: &ActorContext) -> Result<ChildFuture, RegistryError> {
    let (mailbox, rx) = Mailbox::channel(format!("owner {id}"), ctx.mailbox_capacity());
    let handle = OwnerHandle {
        id: id.clone(),
        mailbox,
    };
    let guard = ctx
        .registries
        .owners
        .register(Scope::World, id.as_str(), handle)?;

    let ledger = ctx.config.economy.starting_ledger.clone();
    let actor = OwnerActor {
        owner: OwnerAggregate::new(id.clone(), name.to_owned(), ledger),
        ctx: ctx.clone(),
    };
    Ok(Box::pin(actor.run(rx, guard)))
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct OwnerActor {
    owner: OwnerAggregate,
    ctx: ActorContext,
}

impl OwnerActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, guard: RegistrationGuard<OwnerHandle>) {
        info!(
            owner_id = %self.owner.id,
            name = %self.owner.name,
            incarnation = guard.incarnation(),
            "Owner started"
        );
        self.sync_workers().await;

        while let Some(command) = rx.recv().await {
            self.handle(command).await;
        }
        drop(guard);
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::GetState(reply) => {
                let _ = reply.send(self.owner.clone());
            }
            Command::AddWorker(worker) => self.upsert_worker(*worker),
            Command::SyncWorkers => self.sync_workers().await,
            Command::Tick(signal) => self.on_tick(signal).await,
            Command::PlaceStructure {
                tile,
                kind,
                coordinate,
                reply,
            } => {
                let result = homestead_world::place_structure(&self.owner, &tile, &kind, coordinate)
                    .map(|(next, structure)| {
                        self.owner = next;
                        structure
                    });
                let _ = reply.send(result);
            }
            Command::CancelConstruction {
                structure_id,
                reply,
            } => {
                let result = homestead_world::cancel_construction(&self.owner, structure_id).map(
                    |(next, refund)| {
                        self.owner = next;
                        refund
                    },
                );
                let _ = reply.send(result);
            }
            Command::Deposit(resources) => {
                if let Err(err) = ledger::credit(&mut self.owner.resource_ledger, &resources) {
                    warn!(owner_id = %self.owner.id, error = %err, "Deposit rejected");
                }
            }
            Command::ConstructionWork {
                structure_id,
                season,
            } => self.construction_work(structure_id, season),
        }
    }

    fn upsert_worker(&mut self, worker: Worker) {
        match self.owner.workers.iter_mut().find(|w| w.id == worker.id) {
            Some(entry) => *entry = worker,
            None => self.owner.workers.push(worker),
        }
    }

    async fn sync_workers(&mut self) {
        let scope = Scope::Owner(self.owner.id.clone());
        let mut roster = Vec::new();
        for (worker_id, worker) in self.ctx.registries.workers.list(&scope) {
            match worker.get_state().await {
                Ok(snapshot) => roster.push(snapshot),
                Err(err) => {
                    warn!(owner_id = %self.owner.id, worker_id = %worker_id, error = %err, "Worker unreachable during sync");
                }
            }
        }
        debug!(owner_id = %self.owner.id, workers = roster.len(), "Roster synced");
        self.owner.workers = roster;
    }

    /// Refresh every roster entry from its live worker, dropping the ones
    /// that are gone.
    async fn refresh_roster(&mut self) {
        let scope = Scope::Owner(self.owner.id.clone());
        let mut refreshed = Vec::with_capacity(self.owner.workers.len());
        for entry in std::mem::take(&mut self.owner.workers) {
            let live = self
                .ctx
                .registries
                .workers
                .lookup(&scope, entry.id.as_str());
            let snapshot = match live {
                Some(worker) => worker.get_state().await.ok(),
                None => None,
            };
            match snapshot {
                Some(snapshot) => refreshed.push(snapshot),
                None => warn!(owner_id = %self.owner.id, worker_id = %entry.id, "Worker gone, dropped from roster"),
            }
        }
        self.owner.workers = refreshed;
    }

    async fn on_tick(&mut self, signal: TickSignal) {
        self.refresh_roster().await;

        let Some(scheduler) = self.ctx.registries.scheduler(&self.owner.id) else {
            debug!(owner_id = %self.owner.id, "No scheduler running");
            return;
        };

        let interval = self.ctx.config.scheduler.stale_sweep_interval_ticks;
        if signal.total_ticks.checked_rem(interval) == Some(0) {
            let _ = scheduler.request_stale_sweep();
        }

        let idle: Vec<_> = self
            .owner
            .workers
            .iter()
            .filter(|w| w.state == WorkerState::Idle)
            .map(|w| w.id.clone())
            .collect();
        debug!(
            owner_id = %self.owner.id,
            tick = signal.total_ticks,
            workers = self.owner.workers.len(),
            idle = idle.len(),
            "Owner tick"
        );
        if !idle.is_empty() {
            let _ = scheduler.request_assignments(idle);
        }
    }

    fn construction_work(&mut self, structure_id: StructureId, season: Season) {
        let Some(structure) = self
            .owner
            .structures
            .iter_mut()
            .find(|s| s.id == structure_id)
        else {
            debug!(owner_id = %self.owner.id, structure_id = %structure_id, "Work on unknown structure ignored");
            return;
        };
        *structure = homestead_world::advance_construction(structure, 1, Some(season));
        if structure.is_complete() {
            debug!(owner_id = %self.owner.id, structure_id = %structure_id, "Structure complete");
        }
    }
}
