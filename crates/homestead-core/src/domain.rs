//! Per-owner supervision subtree.
//!
//! An [`OwnerDomain`] owns two supervisors: a static one holding the
//! domain's scheduler and a dynamic one holding its workers. A crash in one
//! worker is restarted or removed by the worker supervisor without touching
//! the scheduler or the other workers.

use homestead_agents::WorkerSpec;
use homestead_types::{OwnerId, WorkerId};
use tracing::{info, warn};

use crate::context::ActorContext;
use crate::error::{ActorError, SimulationError};
use crate::registry::Scope;
use crate::scheduler;
use crate::supervisor::{Supervisor, SupervisorError, SupervisorHandle};
use crate::worker::{self, WorkerHandle};

/// Scheduler and worker supervisors of one owner.
#[derive(Debug, Clone)]
pub struct OwnerDomain {
    owner_id: OwnerId,
    ctx: ActorContext,
    scheduler: SupervisorHandle,
    workers: SupervisorHandle,
}

impl OwnerDomain {
    /// Start the domain's scheduler and an empty worker supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Registry`] if this owner-domain already
    /// has a scheduler running.
    pub fn start(owner_id: OwnerId, ctx: ActorContext) -> Result<Self, SupervisorError> {
        let supervision = ctx.config.supervision;
        let scheduler = Supervisor::spawn_static(
            format!("{owner_id}/scheduler"),
            supervision,
            vec![scheduler::child_spec(owner_id.clone(), ctx.clone())],
        )?;
        let workers = Supervisor::spawn_dynamic(format!("{owner_id}/workers"), supervision);
        info!(owner_id = %owner_id, "Owner domain started");
        Ok(Self {
            owner_id,
            ctx,
            scheduler,
            workers,
        })
    }

    /// Owner this domain belongs to.
    pub const fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Start a supervised worker in this domain.
    ///
    /// # Errors
    ///
    /// Returns an `already_started` error if a worker with the same ID is
    /// running here.
    pub async fn start_worker(&self, mut spec: WorkerSpec) -> Result<WorkerHandle, SimulationError> {
        spec.owner_id = self.owner_id.clone();
        let worker_id = spec.id.clone();
        self.workers
            .start_child(worker::child_spec(spec, self.ctx.clone()))
            .await?;
        self.ctx
            .registries
            .workers
            .lookup(&Scope::Owner(self.owner_id.clone()), worker_id.as_str())
            .ok_or_else(|| SimulationError::WorkerNotFound {
                owner_id: self.owner_id.clone(),
                worker_id,
            })
    }

    /// Stop a worker without restarting it. Returns whether it was running.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the worker supervisor is gone.
    pub async fn stop_worker(&self, worker_id: &WorkerId) -> Result<bool, ActorError> {
        self.workers.terminate_child(worker_id.as_str()).await
    }

    /// IDs of the supervised workers, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the worker supervisor is gone.
    pub async fn workers(&self) -> Result<Vec<WorkerId>, ActorError> {
        let ids = self.workers.children().await?;
        Ok(ids.into_iter().map(WorkerId::from).collect())
    }

    /// Stop every worker, then the scheduler.
    pub async fn shutdown(&self) {
        if let Err(err) = self.workers.shutdown().await {
            warn!(owner_id = %self.owner_id, error = %err, "Worker supervisor already gone");
        }
        if let Err(err) = self.scheduler.shutdown().await {
            warn!(owner_id = %self.owner_id, error = %err, "Scheduler supervisor already gone");
        }
        info!(owner_id = %self.owner_id, "Owner domain stopped");
    }
}
