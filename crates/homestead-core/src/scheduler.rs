//! Job scheduler actor.
//!
//! One scheduler per owner-domain, registered under [`SCHEDULER_KEY`] in the
//! owner's scope. The actor wraps a [`JobBoard`] and is the only place its
//! queue is mutated, so queue operations need no locks.
//!
//! Workers are reached through the registry: [`DomainWorkers`] resolves a
//! worker ID to its current incarnation and delivers assignments with a
//! reserved mailbox slot, so a job refused by a full mailbox comes back to
//! the board instead of being lost.

use std::sync::Arc;

use chrono::Utc;
use homestead_agents::{AgentError, AssignmentReport, JobBoard, WorkerDirectory};
use homestead_types::{Job, JobId, OwnerId, Priority, SchedulerSnapshot, WorkerId};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::context::ActorContext;
use crate::error::ActorError;
use crate::mailbox::Mailbox;
use crate::registry::{RegistrationGuard, Registry, RegistryError, SCHEDULER_KEY, Scope};
use crate::supervisor::{ChildFuture, ChildSpec, RestartPolicy};
use crate::worker::WorkerHandle;

type AssignReply = oneshot::Sender<Result<AssignmentReport, AgentError>>;

enum Command {
    AddJob(Job, Priority),
    RemoveJob(JobId),
    AssignJobs {
        worker_ids: Vec<WorkerId>,
        reply: Option<AssignReply>,
    },
    CompleteJob(JobId, WorkerId),
    AbandonJob(JobId, WorkerId),
    CheckStaleJobs(Option<oneshot::Sender<Vec<JobId>>>),
    ClearAllJobs,
    GetState(oneshot::Sender<SchedulerSnapshot>),
}

/// Clonable handle to a running scheduler.
#[derive(Clone)]
pub struct SchedulerHandle {
    owner_id: OwnerId,
    mailbox: Mailbox<Command>,
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("owner_id", &self.owner_id)
            .finish_non_exhaustive()
    }
}

impl SchedulerHandle {
    /// Owner-domain this scheduler serves.
    pub const fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Queue a job, waiting for mailbox space.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the scheduler is gone.
    pub async fn add_job(&self, job: Job, priority: Priority) -> Result<(), ActorError> {
        self.mailbox.send(Command::AddJob(job, priority)).await
    }

    /// Drop a queued job. No-op if it is not queued.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn remove_job(&self, job_id: JobId) -> Result<(), ActorError> {
        self.mailbox.cast(Command::RemoveJob(job_id))
    }

    /// Hand queued jobs to `worker_ids` and wait for the report.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerCallError::Board`] with
    /// [`AgentError::NoJobsAvailable`] when the queue is empty and
    /// `worker_ids` is not.
    pub async fn assign_jobs(
        &self,
        worker_ids: Vec<WorkerId>,
    ) -> Result<AssignmentReport, SchedulerCallError> {
        let result = self
            .mailbox
            .call(|reply| Command::AssignJobs {
                worker_ids,
                reply: Some(reply),
            })
            .await?;
        Ok(result?)
    }

    /// Fire-and-forget variant of [`SchedulerHandle::assign_jobs`].
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn request_assignments(&self, worker_ids: Vec<WorkerId>) -> Result<(), ActorError> {
        self.mailbox.cast(Command::AssignJobs {
            worker_ids,
            reply: None,
        })
    }

    /// Report a finished job.
    ///
    /// Never dropped: a full mailbox delays the report instead.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the scheduler is gone.
    pub fn complete_job(&self, job_id: JobId, worker_id: WorkerId) -> Result<(), ActorError> {
        self.mailbox.post(Command::CompleteJob(job_id, worker_id))
    }

    /// Report a job the worker gave up.
    ///
    /// Never dropped: a full mailbox delays the report instead.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the scheduler is gone.
    pub fn abandon_job(&self, job_id: JobId, worker_id: WorkerId) -> Result<(), ActorError> {
        self.mailbox.post(Command::AbandonJob(job_id, worker_id))
    }

    /// Reclaim jobs held by workers that are gone and wait for their IDs.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the scheduler is gone.
    pub async fn check_stale_jobs(&self) -> Result<Vec<JobId>, ActorError> {
        self.mailbox
            .call(|reply| Command::CheckStaleJobs(Some(reply)))
            .await
    }

    /// Fire-and-forget variant of [`SchedulerHandle::check_stale_jobs`].
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn request_stale_sweep(&self) -> Result<(), ActorError> {
        self.mailbox.cast(Command::CheckStaleJobs(None))
    }

    /// Empty the queue and the active table and reset the counters.
    ///
    /// # Errors
    ///
    /// Returns an [`ActorError`] if the message could not be delivered.
    pub fn clear_all_jobs(&self) -> Result<(), ActorError> {
        self.mailbox.cast(Command::ClearAllJobs)
    }

    /// Snapshot of queue, active table, and counters.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the scheduler is gone.
    pub async fn get_state(&self) -> Result<SchedulerSnapshot, ActorError> {
        self.mailbox.call(Command::GetState).await
    }
}

/// Errors from [`SchedulerHandle::assign_jobs`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerCallError {
    /// The scheduler could not be reached.
    #[error(transparent)]
    Actor(#[from] ActorError),

    /// The board rejected the request.
    #[error(transparent)]
    Board(#[from] AgentError),
}

/// Supervisor entry for a scheduler. Always restarted, with an empty queue.
pub fn child_spec(owner_id: OwnerId, ctx: ActorContext) -> ChildSpec {
    ChildSpec::new(SCHEDULER_KEY, RestartPolicy::Permanent, move || {
        start(&owner_id, &ctx)
    })
}

fn start(owner_id: &OwnerId, ctx: &ActorContext) -> Result<ChildFuture, RegistryError> {
    let (mailbox, rx) = Mailbox::channel(format!("scheduler {owner_id}"), ctx.mailbox_capacity());
    let handle = SchedulerHandle {
        owner_id: owner_id.clone(),
        mailbox,
    };
    let scope = Scope::Owner(owner_id.clone());
    let guard = ctx
        .registries
        .schedulers
        .register(scope, SCHEDULER_KEY, handle)?;

    let actor = SchedulerActor {
        board: JobBoard::new(owner_id.clone()),
        workers: DomainWorkers::new(Arc::clone(&ctx.registries.workers), owner_id.clone()),
    };
    Ok(Box::pin(actor.run(rx, guard)))
}

// ---------------------------------------------------------------------------
// Worker directory
// ---------------------------------------------------------------------------

/// The workers of one owner-domain, as seen through the registry.
#[derive(Debug, Clone)]
pub struct DomainWorkers {
    registry: Arc<Registry<WorkerHandle>>,
    scope: Scope,
}

impl DomainWorkers {
    /// Directory over the workers registered in `owner_id`'s scope.
    pub fn new(registry: Arc<Registry<WorkerHandle>>, owner_id: OwnerId) -> Self {
        Self {
            registry,
            scope: Scope::Owner(owner_id),
        }
    }
}

impl WorkerDirectory for DomainWorkers {
    fn resolve(&self, worker_id: &WorkerId) -> Option<u64> {
        self.registry.incarnation(&self.scope, worker_id.as_str())
    }

    fn dispatch(&self, worker_id: &WorkerId, job: Job) -> Result<(), Job> {
        match self.registry.lookup(&self.scope, worker_id.as_str()) {
            Some(worker) => worker.offer_job(job),
            None => Err(job),
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct SchedulerActor {
    board: JobBoard,
    workers: DomainWorkers,
}

impl SchedulerActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Command>, guard: RegistrationGuard<SchedulerHandle>) {
        info!(owner_id = %self.board.owner_id(), "Scheduler started");
        while let Some(command) = rx.recv().await {
            self.handle(command);
        }
        drop(guard);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::AddJob(job, priority) => {
                debug!(owner_id = %self.board.owner_id(), job_id = %job.id, ?priority, "Job queued");
                self.board.add(job, priority);
            }
            Command::RemoveJob(job_id) => {
                self.board.remove(job_id);
            }
            Command::AssignJobs { worker_ids, reply } => {
                let result = self.board.assign(&worker_ids, &self.workers, Utc::now());
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            debug!(owner_id = %self.board.owner_id(), error = %err, "No assignment");
                        }
                    }
                }
            }
            Command::CompleteJob(job_id, worker_id) => {
                if let Err(err) = self.board.complete(job_id, &worker_id) {
                    debug!(
                        owner_id = %self.board.owner_id(),
                        worker_id = %worker_id,
                        error = %err,
                        "Completion ignored"
                    );
                }
            }
            Command::AbandonJob(job_id, worker_id) => {
                if self.board.abandon(job_id, &worker_id).is_ok() {
                    debug!(owner_id = %self.board.owner_id(), job_id = %job_id, worker_id = %worker_id, "Job abandoned");
                }
            }
            Command::CheckStaleJobs(reply) => {
                let reclaimed = self.board.reclaim_stale(&self.workers);
                if !reclaimed.is_empty() {
                    warn!(
                        owner_id = %self.board.owner_id(),
                        reclaimed = reclaimed.len(),
                        "Reclaimed jobs from vanished workers"
                    );
                }
                if let Some(reply) = reply {
                    let _ = reply.send(reclaimed);
                }
            }
            Command::ClearAllJobs => {
                self.board.clear();
            }
            Command::GetState(reply) => {
                let _ = reply.send(self.board.snapshot());
            }
        }
    }
}
