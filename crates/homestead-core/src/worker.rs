//! Worker actor.
//!
//! One task per worker. The actor owns a [`Worker`] and runs the state
//! machine from `homestead_agents::worker` against it, one message at a
//! time. It never waits on another actor: deposits and construction work go
//! to the owner, and completions and abandonments go to the scheduler, all
//! as casts.
//!
//! A restarted worker starts from [`WorkerSpec::initial_state`], idle and
//! empty-handed. It announces itself to its owner on start so the roster
//! picks it up again.

use homestead_agents::{WorkerEffect, WorkerSpec};
use homestead_types::{Job, OwnerId, TickSignal, Worker, WorkerId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::context::ActorContext;
use crate::error::ActorError;
use crate::mailbox::Mailbox;
use crate::registry::{RegistrationGuard, RegistryError, Scope};
use crate::supervisor::{ChildFuture, ChildSpec, RestartPolicy};

enum Command {
    GetState(oneshot::Sender<Worker>),
    AssignJob(Job),
    CancelJob,
    Rest,
    Tick(TickSignal),
}

/// Clonable handle to a running worker.
#[derive(Clone)]
pub struct WorkerHandle {
    owner_id: OwnerId,
    id: WorkerId,
    mailbox: Mailbox<Command>,
}

impl std::fmt::Debug for WorkerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerHandle")
            .field("owner_id", &self.owner_id)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl WorkerHandle {
    /// Worker ID.
    pub const fn id(&self) -> &WorkerId {
        &self.id
    }

    /// Owner-domain the worker belongs to.
    pub const fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Snapshot of the worker's state.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the worker is gone.
    pub async fn get_state(&self) -> Result<Worker, ActorError> {
        self.mailbox.call(Command::GetState).await
    }

    /// Give the worker a job, replacing any job it holds.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn assign_job(&self, job: Job) -> Result<(), ActorError> {
        self.mailbox.cast(Command::AssignJob(job))
    }

    /// Like [`WorkerHandle::assign_job`], but hands the job back if the
    /// mailbox refuses it.
    ///
    /// # Errors
    ///
    /// Returns the undelivered job.
    pub fn offer_job(&self, job: Job) -> Result<(), Job> {
        match self.mailbox.try_reserve() {
            Ok(permit) => {
                permit.send(Command::AssignJob(job));
                Ok(())
            }
            Err(_refused) => Err(job),
        }
    }

    /// Drop the current job.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn cancel_job(&self) -> Result<(), ActorError> {
        self.mailbox.cast(Command::CancelJob)
    }

    /// Rest for one tick if idle.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn rest(&self) -> Result<(), ActorError> {
        self.mailbox.cast(Command::Rest)
    }

    /// Deliver a clock tick.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the tick was dropped.
    pub fn tick(&self, signal: TickSignal) -> Result<(), ActorError> {
        self.mailbox.cast(Command::Tick(signal))
    }
}

/// Supervisor entry for a worker. Crashed workers restart; stopped ones
/// stay down.
pub fn child_spec(spec: WorkerSpec, ctx: ActorContext) -> ChildSpec {
    let id = spec.id.as_str().to_owned();
    ChildSpec::new(id, RestartPolicy::Transient, move || start(&spec, &ctx))
}

fn start(spec: &WorkerSpec, ctx: &ActorContext) -> Result<ChildFuture, RegistryError> {
    let (mailbox, rx) = Mailbox::channel(
        format!("worker {}/{}", spec.owner_id, spec.id),
        ctx.mailbox_capacity(),
    );
    let handle = WorkerHandle {
        owner_id: spec.owner_id.clone(),
        id: spec.id.clone(),
        mailbox,
    };
    let guard = ctx.registries.workers.register(
        Scope::Owner(spec.owner_id.clone()),
        spec.id.as_str(),
        handle,
    )?;

    let actor = WorkerActor {
        worker: spec.initial_state(),
        ctx: ctx.clone(),
    };
    Ok(Box::pin(actor.run(rx, guard)))
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct WorkerActor {
    worker: Worker,
    ctx: ActorContext,
}

impl WorkerActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, guard: RegistrationGuard<WorkerHandle>) {
        info!(
            owner_id = %self.worker.owner_id,
            worker_id = %self.worker.id,
            incarnation = guard.incarnation(),
            "Worker started"
        );
        if let Some(owner) = self.ctx.registries.owner(&self.worker.owner_id) {
            let _ = owner.add_worker(self.worker.clone());
        }

        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        drop(guard);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::GetState(reply) => {
                let _ = reply.send(self.worker.clone());
            }
            Command::AssignJob(job) => {
                let job_id = job.id;
                debug!(worker_id = %self.worker.id, job_id = %job_id, kind = ?job.kind(), "Job assigned");
                let replaced = homestead_agents::assign_job(&mut self.worker, job)
                    .filter(|replaced| replaced.id != job_id);
                if let Some(replaced) = replaced {
                    self.report_abandoned(&replaced);
                }
            }
            Command::CancelJob => {
                if let Some(job) = homestead_agents::cancel_job(&mut self.worker) {
                    debug!(worker_id = %self.worker.id, job_id = %job.id, "Job cancelled");
                    self.report_abandoned(&job);
                }
            }
            Command::Rest => {
                homestead_agents::rest(&mut self.worker);
            }
            Command::Tick(signal) => {
                let effects = homestead_agents::process_tick(&mut self.worker, signal.season.current);
                for effect in effects {
                    self.forward(effect);
                }
            }
        }
    }

    fn forward(&self, effect: WorkerEffect) {
        let owner_id = &self.worker.owner_id;
        match effect {
            WorkerEffect::Deposit(haul) => match self.ctx.registries.owner(owner_id) {
                Some(owner) => {
                    if owner.deposit(haul).is_err() {
                        warn!(owner_id = %owner_id, worker_id = %self.worker.id, "Haul lost");
                    }
                }
                None => warn!(owner_id = %owner_id, worker_id = %self.worker.id, "Owner gone, haul lost"),
            },
            WorkerEffect::ConstructionWork {
                structure_id,
                season,
            } => {
                if let Some(owner) = self.ctx.registries.owner(owner_id) {
                    let _ = owner.construction_work(structure_id, season);
                }
            }
            WorkerEffect::Completed(job) => {
                debug!(worker_id = %self.worker.id, job_id = %job.id, "Job completed");
                if let Some(scheduler) = self.ctx.registries.scheduler(owner_id) {
                    let _ = scheduler.complete_job(job.id, self.worker.id.clone());
                }
            }
        }
    }

    fn report_abandoned(&self, job: &Job) {
        if let Some(scheduler) = self.ctx.registries.scheduler(&self.worker.owner_id) {
            let _ = scheduler.abandon_job(job.id, self.worker.id.clone());
        }
    }
}
