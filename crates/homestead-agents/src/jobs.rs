//! The job board: priority queue, active table, and assignment bookkeeping.
//!
//! A [`JobBoard`] is the private state of one scheduler actor. The queue is
//! kept ordered by priority class with arrival order preserved inside each
//! class. Jobs move from the queue to the active table when a worker accepts
//! them and leave the active table when the worker reports back or the
//! stale sweep reclaims them.
//!
//! Worker lookup and message delivery are behind the [`WorkerDirectory`]
//! trait so the board itself stays synchronous and testable.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Utc};
use homestead_types::{
    ActiveJob, Job, JobId, JobStatus, OwnerId, Priority, QueuedJob, SchedulerSnapshot,
    SchedulerStats, WorkerId,
};
use tracing::debug;

use crate::error::AgentError;

/// How the board reaches workers during assignment.
pub trait WorkerDirectory {
    /// Current registry incarnation of `worker_id`, or `None` if the worker
    /// is not running.
    fn resolve(&self, worker_id: &WorkerId) -> Option<u64>;

    /// Hand `job` to the worker.
    ///
    /// # Errors
    ///
    /// Returns the job unchanged if it could not be delivered.
    fn dispatch(&self, worker_id: &WorkerId, job: Job) -> Result<(), Job>;
}

/// Outcome of one [`JobBoard::assign`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentReport {
    /// Jobs delivered, with the worker that took each.
    pub assigned: Vec<(JobId, WorkerId)>,
    /// Listed workers that did not resolve or were already busy, passed
    /// over.
    pub skipped: Vec<WorkerId>,
    /// Jobs whose delivery failed and went back to the queue front.
    pub returned: Vec<JobId>,
}

/// Queue, active table, and counters of one owner-domain's scheduler.
#[derive(Debug, Clone)]
pub struct JobBoard {
    owner_id: OwnerId,
    queue: VecDeque<QueuedJob>,
    active: BTreeMap<JobId, ActiveJob>,
    stats: SchedulerStats,
}

impl JobBoard {
    /// An empty board for `owner_id`.
    pub const fn new(owner_id: OwnerId) -> Self {
        Self {
            owner_id,
            queue: VecDeque::new(),
            active: BTreeMap::new(),
            stats: SchedulerStats {
                total_assigned: 0,
                total_completed: 0,
            },
        }
    }

    /// Owner-domain this board serves.
    pub const fn owner_id(&self) -> &OwnerId {
        &self.owner_id
    }

    /// Number of queued jobs.
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Number of jobs held by workers.
    pub fn active(&self) -> usize {
        self.active.len()
    }

    /// Lifetime counters.
    pub const fn stats(&self) -> SchedulerStats {
        self.stats
    }

    // -----------------------------------------------------------------------
    // Queue
    // -----------------------------------------------------------------------

    /// Queue `job` under `priority`.
    ///
    /// The job goes after every entry of equal or higher priority, so the
    /// queue stays sorted by priority and FIFO within a class. The job is
    /// reset to pending and unassigned.
    pub fn add(&mut self, mut job: Job, priority: Priority) {
        job.status = JobStatus::Pending;
        job.assigned_worker_id = None;
        job.priority = priority;

        let position = self
            .queue
            .iter()
            .position(|entry| entry.priority.rank() > priority.rank())
            .unwrap_or(self.queue.len());
        self.queue.insert(position, QueuedJob { job, priority });
    }

    /// Drop a queued job. Returns whether it was queued.
    ///
    /// Active jobs are not touched.
    pub fn remove(&mut self, job_id: JobId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.job.id != job_id);
        self.queue.len() != before
    }

    /// Empty the queue and the active table and reset the counters.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.active.clear();
        self.stats = SchedulerStats::default();
    }

    // -----------------------------------------------------------------------
    // Assignment
    // -----------------------------------------------------------------------

    /// Hand queued jobs to `idle_workers`, one job per worker, front first.
    ///
    /// For each worker in order: stop if the queue is empty; skip the worker
    /// without popping if it does not resolve or already holds an active job
    /// from this board; otherwise pop the front job,
    /// mark it in progress, and dispatch it. A delivered job enters the
    /// active table stamped with `now` and the worker's incarnation. A job
    /// that fails delivery is not retried in this call and goes back to the
    /// queue front once the call ends.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::NoJobsAvailable`] if the queue is empty while
    /// `idle_workers` is not, and [`AgentError::ArithmeticOverflow`] if the
    /// assignment counter would overflow.
    pub fn assign(
        &mut self,
        idle_workers: &[WorkerId],
        directory: &impl WorkerDirectory,
        now: DateTime<Utc>,
    ) -> Result<AssignmentReport, AgentError> {
        if self.queue.is_empty() && !idle_workers.is_empty() {
            return Err(AgentError::NoJobsAvailable);
        }

        let mut report = AssignmentReport::default();
        let mut undelivered = Vec::new();

        for worker_id in idle_workers {
            if self.queue.is_empty() {
                break;
            }
            let Some(incarnation) = directory.resolve(worker_id) else {
                report.skipped.push(worker_id.clone());
                continue;
            };
            if self.holds_active(worker_id, incarnation) {
                report.skipped.push(worker_id.clone());
                continue;
            }
            let Some(QueuedJob { mut job, priority }) = self.queue.pop_front() else {
                break;
            };

            job.status = JobStatus::InProgress;
            job.assigned_worker_id = Some(worker_id.clone());

            match directory.dispatch(worker_id, job.clone()) {
                Ok(()) => {
                    self.stats.total_assigned = self
                        .stats
                        .total_assigned
                        .checked_add(1)
                        .ok_or(AgentError::ArithmeticOverflow {
                            context: "total_assigned",
                        })?;
                    report.assigned.push((job.id, worker_id.clone()));
                    self.active.insert(
                        job.id,
                        ActiveJob {
                            job,
                            worker_id: worker_id.clone(),
                            incarnation,
                            assigned_at: now,
                            priority,
                        },
                    );
                }
                Err(mut job) => {
                    job.status = JobStatus::Pending;
                    job.assigned_worker_id = None;
                    report.returned.push(job.id);
                    undelivered.push(QueuedJob { job, priority });
                }
            }
        }

        for entry in undelivered.into_iter().rev() {
            self.queue.push_front(entry);
        }

        debug!(
            owner_id = %self.owner_id,
            assigned = report.assigned.len(),
            skipped = report.skipped.len(),
            returned = report.returned.len(),
            queued = self.queue.len(),
            "Jobs assigned"
        );

        Ok(report)
    }

    /// Whether this incarnation of `worker_id` already holds a job from
    /// this board. An entry from an older incarnation does not count; the
    /// stale sweep reclaims it.
    fn holds_active(&self, worker_id: &WorkerId, incarnation: u64) -> bool {
        self.active
            .values()
            .any(|entry| entry.worker_id == *worker_id && entry.incarnation == incarnation)
    }

    // -----------------------------------------------------------------------
    // Reports from workers
    // -----------------------------------------------------------------------

    /// Record that `worker_id` finished `job_id`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::JobNotFound`] if the job is not active under
    /// that worker, for example after it was reclaimed and reassigned.
    pub fn complete(&mut self, job_id: JobId, worker_id: &WorkerId) -> Result<ActiveJob, AgentError> {
        let entry = self.take_active(job_id, worker_id)?;
        self.stats.total_completed = self
            .stats
            .total_completed
            .checked_add(1)
            .ok_or(AgentError::ArithmeticOverflow {
                context: "total_completed",
            })?;
        Ok(entry)
    }

    /// Record that `worker_id` gave up `job_id`. The job is not requeued.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::JobNotFound`] if the job is not active under
    /// that worker.
    pub fn abandon(&mut self, job_id: JobId, worker_id: &WorkerId) -> Result<ActiveJob, AgentError> {
        self.take_active(job_id, worker_id)
    }

    fn take_active(&mut self, job_id: JobId, worker_id: &WorkerId) -> Result<ActiveJob, AgentError> {
        match self.active.get(&job_id) {
            Some(entry) if entry.worker_id == *worker_id => {
                self.active.remove(&job_id).ok_or(AgentError::JobNotFound(job_id))
            }
            _ => Err(AgentError::JobNotFound(job_id)),
        }
    }

    // -----------------------------------------------------------------------
    // Stale sweep
    // -----------------------------------------------------------------------

    /// Requeue every active job whose worker is gone.
    ///
    /// A worker counts as gone when `directory` no longer resolves it to the
    /// incarnation the job was handed to; a restarted worker starts empty
    /// and will never report the old job. Reclaimed jobs go back under their
    /// original priority. Returns the reclaimed job IDs.
    pub fn reclaim_stale(&mut self, directory: &impl WorkerDirectory) -> Vec<JobId> {
        let stale: Vec<JobId> = self
            .active
            .values()
            .filter(|entry| directory.resolve(&entry.worker_id) != Some(entry.incarnation))
            .map(|entry| entry.job.id)
            .collect();

        for job_id in &stale {
            if let Some(entry) = self.active.remove(job_id) {
                debug!(
                    owner_id = %self.owner_id,
                    job_id = %job_id,
                    worker_id = %entry.worker_id,
                    "Reclaiming stale job"
                );
                self.add(entry.job, entry.priority);
            }
        }
        stale
    }

    /// Read-only copy of the board.
    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            owner_id: self.owner_id.clone(),
            queue: self.queue.iter().cloned().collect(),
            active: self.active.values().cloned().collect(),
            stats: self.stats,
        }
    }
}
