//! One-for-one supervisors.
//!
//! A supervisor is an actor that runs child futures in a [`JoinSet`] and
//! restarts them according to their [`RestartPolicy`]. Each child is wrapped
//! in `catch_unwind`, so a panicking child is reported as a crash instead of
//! taking the supervisor down; siblings are never touched.
//!
//! Two kinds exist:
//!
//! - **static**: children are fixed when the supervisor starts;
//! - **dynamic**: children are added with [`SupervisorHandle::start_child`]
//!   and removed with [`SupervisorHandle::terminate_child`].
//!
//! Restart intensity is tracked per child: at most `max_restarts` restarts
//! within `restart_window`. A child that exceeds it is left removed and an
//! error is logged.

use std::collections::{BTreeMap, VecDeque};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::{AbortHandle, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SupervisionConfig;
use crate::error::ActorError;
use crate::mailbox::Mailbox;
use crate::registry::RegistryError;

/// A running child: an actor's mailbox loop.
pub type ChildFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// Starts one incarnation of a child.
///
/// Registration happens inside the call, so an `already_started` conflict
/// surfaces before anything is spawned.
pub type StartFn = Arc<dyn Fn() -> Result<ChildFuture, RegistryError> + Send + Sync>;

/// Errors returned by supervisor operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SupervisorError {
    /// A child with this ID is already supervised.
    #[error("child already supervised: {0}")]
    DuplicateChild(String),

    /// Static supervisors do not accept new children.
    #[error("supervisor {0} is static")]
    Static(String),

    /// The child failed to register.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The supervisor could not be reached.
    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// When a stopped child is started again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Always restart.
    Permanent,
    /// Restart only after a crash.
    Transient,
    /// Never restart.
    Temporary,
}

/// How a child stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    /// The future returned.
    Normal,
    /// The future panicked.
    Crashed(String),
}

impl RestartPolicy {
    /// Whether a child that stopped with `exit` should be restarted.
    pub const fn restarts_after(self, exit: &Exit) -> bool {
        match self {
            Self::Permanent => true,
            Self::Transient => matches!(exit, Exit::Crashed(_)),
            Self::Temporary => false,
        }
    }
}

/// Everything a supervisor needs to (re)start a child.
#[derive(Clone)]
pub struct ChildSpec {
    id: String,
    restart: RestartPolicy,
    start: StartFn,
}

impl ChildSpec {
    /// A child named `id` started by `start`.
    pub fn new<F>(id: impl Into<String>, restart: RestartPolicy, start: F) -> Self
    where
        F: Fn() -> Result<ChildFuture, RegistryError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            restart,
            start: Arc::new(start),
        }
    }

    /// Child ID, unique within its supervisor.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Restart policy.
    pub const fn restart(&self) -> RestartPolicy {
        self.restart
    }
}

impl std::fmt::Debug for ChildSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChildSpec")
            .field("id", &self.id)
            .field("restart", &self.restart)
            .finish_non_exhaustive()
    }
}

/// Whether children can be added after start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorKind {
    /// Children fixed at start.
    Static,
    /// Children added and removed at runtime.
    Dynamic,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

enum Command {
    StartChild {
        spec: ChildSpec,
        reply: oneshot::Sender<Result<(), SupervisorError>>,
    },
    TerminateChild {
        id: String,
        reply: oneshot::Sender<bool>,
    },
    Children {
        reply: oneshot::Sender<Vec<String>>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Clonable handle to a running supervisor.
#[derive(Clone)]
pub struct SupervisorHandle {
    mailbox: Mailbox<Command>,
}

impl std::fmt::Debug for SupervisorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupervisorHandle")
            .field("name", &self.mailbox.label())
            .finish()
    }
}

impl SupervisorHandle {
    /// Start and supervise a new child.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::DuplicateChild`] if a child with the same
    /// ID is running, [`SupervisorError::Registry`] if the child failed to
    /// register, and [`SupervisorError::Static`] on a static supervisor.
    pub async fn start_child(&self, spec: ChildSpec) -> Result<(), SupervisorError> {
        self.mailbox
            .call(|reply| Command::StartChild { spec, reply })
            .await?
    }

    /// Stop a child without restarting it. Returns whether it was running.
    ///
    /// Resolves only after the child's future has been dropped, so its
    /// registration is already released.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the supervisor is gone.
    pub async fn terminate_child(&self, id: &str) -> Result<bool, ActorError> {
        let id = id.to_owned();
        self.mailbox
            .call(|reply| Command::TerminateChild { id, reply })
            .await
    }

    /// IDs of the running children, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the supervisor is gone.
    pub async fn children(&self) -> Result<Vec<String>, ActorError> {
        self.mailbox.call(|reply| Command::Children { reply }).await
    }

    /// Stop every child and then the supervisor.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the supervisor is already gone.
    pub async fn shutdown(&self) -> Result<(), ActorError> {
        self.mailbox.call(|reply| Command::Shutdown { reply }).await
    }
}

// ---------------------------------------------------------------------------
// Supervisor actor
// ---------------------------------------------------------------------------

struct Child {
    spec: ChildSpec,
    generation: u64,
    abort: AbortHandle,
    stopped: oneshot::Receiver<()>,
    restarts: VecDeque<Instant>,
}

/// A child future that signals once it has been dropped.
///
/// Fields drop in declaration order, so everything the child owns,
/// including its registration guard, is gone before `stopped` closes.
struct Tracked {
    future: ChildFuture,
    _stopped: oneshot::Sender<()>,
}

impl Future for Tracked {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.future.as_mut().poll(cx)
    }
}

/// The supervisor actor's private state.
pub struct Supervisor {
    name: String,
    kind: SupervisorKind,
    max_restarts: u32,
    restart_window: Duration,
    children: BTreeMap<String, Child>,
    tasks: JoinSet<(String, u64, Exit)>,
    next_generation: u64,
}

impl Supervisor {
    /// Start a static supervisor running `children`.
    ///
    /// Children start in order; if one fails, those already started are
    /// stopped and the error is returned.
    ///
    /// # Errors
    ///
    /// Returns the first child start failure.
    pub fn spawn_static(
        name: impl Into<String>,
        config: SupervisionConfig,
        children: Vec<ChildSpec>,
    ) -> Result<SupervisorHandle, SupervisorError> {
        let mut supervisor = Self::new(name.into(), SupervisorKind::Static, config);
        for spec in children {
            // Dropping `supervisor` on error aborts whatever already started.
            supervisor.start(spec)?;
        }
        Ok(supervisor.spawn())
    }

    /// Start an empty dynamic supervisor.
    pub fn spawn_dynamic(name: impl Into<String>, config: SupervisionConfig) -> SupervisorHandle {
        Self::new(name.into(), SupervisorKind::Dynamic, config).spawn()
    }

    fn new(name: String, kind: SupervisorKind, config: SupervisionConfig) -> Self {
        Self {
            name,
            kind,
            max_restarts: config.max_restarts,
            restart_window: config.restart_window(),
            children: BTreeMap::new(),
            tasks: JoinSet::new(),
            next_generation: 0,
        }
    }

    fn spawn(self) -> SupervisorHandle {
        let (mailbox, rx) = Mailbox::channel(format!("supervisor {}", self.name), 64);
        tokio::spawn(self.run(rx));
        SupervisorHandle { mailbox }
    }

    async fn run(mut self, mut rx: mpsc::Receiver<Command>) {
        debug!(supervisor = %self.name, kind = ?self.kind, "Supervisor started");
        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else { break };
                    if let Some(reply) = self.handle(command) {
                        self.tasks.shutdown().await;
                        let _ = reply.send(());
                        break;
                    }
                }
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    // Aborted children come back as `Err`; they were already removed.
                    if let Ok((id, generation, exit)) = joined {
                        self.on_exit(id, generation, exit);
                    }
                }
            }
        }
        self.tasks.shutdown().await;
        debug!(supervisor = %self.name, "Supervisor stopped");
    }

    /// Apply one command. Returns the reply channel on shutdown.
    fn handle(&mut self, command: Command) -> Option<oneshot::Sender<()>> {
        match command {
            Command::StartChild { spec, reply } => {
                let result = if self.kind == SupervisorKind::Static {
                    Err(SupervisorError::Static(self.name.clone()))
                } else {
                    self.start(spec)
                };
                let _ = reply.send(result);
            }
            Command::TerminateChild { id, reply } => match self.children.remove(&id) {
                Some(child) => {
                    child.abort.abort();
                    debug!(supervisor = %self.name, child = %id, "Child terminated");
                    // Reply once the aborted future is dropped and has
                    // released its registration.
                    tokio::spawn(async move {
                        let _ = child.stopped.await;
                        let _ = reply.send(true);
                    });
                }
                None => {
                    let _ = reply.send(false);
                }
            },
            Command::Children { reply } => {
                let _ = reply.send(self.children.keys().cloned().collect());
            }
            Command::Shutdown { reply } => {
                self.children.clear();
                return Some(reply);
            }
        }
        None
    }

    fn start(&mut self, spec: ChildSpec) -> Result<(), SupervisorError> {
        if self.children.contains_key(spec.id()) {
            return Err(SupervisorError::DuplicateChild(spec.id().to_owned()));
        }
        let future = (spec.start)()?;
        let (generation, abort, stopped) = self.launch(spec.id().to_owned(), future);
        self.children.insert(
            spec.id().to_owned(),
            Child {
                spec,
                generation,
                abort,
                stopped,
                restarts: VecDeque::new(),
            },
        );
        Ok(())
    }

    fn launch(
        &mut self,
        id: String,
        future: ChildFuture,
    ) -> (u64, AbortHandle, oneshot::Receiver<()>) {
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);
        let (stopped_tx, stopped) = oneshot::channel();
        let tracked = Tracked {
            future,
            _stopped: stopped_tx,
        };
        let abort = self.tasks.spawn(async move {
            let exit = match AssertUnwindSafe(tracked).catch_unwind().await {
                Ok(()) => Exit::Normal,
                Err(payload) => Exit::Crashed(panic_message(payload.as_ref())),
            };
            (id, generation, exit)
        });
        (generation, abort, stopped)
    }

    fn on_exit(&mut self, id: String, generation: u64, exit: Exit) {
        let Some(child) = self.children.get_mut(&id) else {
            return;
        };
        if child.generation != generation {
            return;
        }

        if let Exit::Crashed(reason) = &exit {
            warn!(supervisor = %self.name, child = %id, reason = %reason, "Child crashed");
        }
        if !child.spec.restart().restarts_after(&exit) {
            debug!(supervisor = %self.name, child = %id, exit = ?exit, "Child stopped");
            self.children.remove(&id);
            return;
        }

        let now = Instant::now();
        while child
            .restarts
            .front()
            .is_some_and(|at| now.saturating_duration_since(*at) > self.restart_window)
        {
            child.restarts.pop_front();
        }
        let recent = u32::try_from(child.restarts.len()).unwrap_or(u32::MAX);
        if recent >= self.max_restarts {
            error!(
                supervisor = %self.name,
                child = %id,
                max_restarts = self.max_restarts,
                window_ms = self.restart_window.as_millis(),
                "Restart intensity exceeded, child left stopped"
            );
            self.children.remove(&id);
            return;
        }
        child.restarts.push_back(now);

        let start = Arc::clone(&child.spec.start);
        match start() {
            Ok(future) => {
                let (generation, abort, stopped) = self.launch(id.clone(), future);
                if let Some(child) = self.children.get_mut(&id) {
                    child.generation = generation;
                    child.abort = abort;
                    child.stopped = stopped;
                }
                info!(supervisor = %self.name, child = %id, "Child restarted");
            }
            Err(err) => {
                error!(supervisor = %self.name, child = %id, error = %err, "Child restart failed");
                self.children.remove(&id);
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_owned())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| String::from("unknown panic"))
}
