//! Bounded actor mailboxes.
//!
//! Every actor owns the receiving half of a bounded `mpsc` channel and hands
//! out [`Mailbox`] clones. Two delivery modes exist:
//!
//! - **cast**: fire-and-forget via `try_send`. A full mailbox drops the
//!   message and logs a warning; the sender never waits.
//! - **post**: like cast, but a full mailbox hands the message to a spawned
//!   task that waits for space. Used for reports that must not be lost.
//! - **call**: `send().await` followed by a `oneshot` reply. The caller
//!   waits for mailbox space and for the reply, with no timeout.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Permit};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::ActorError;

/// Sending half of an actor's mailbox.
#[derive(Debug)]
pub struct Mailbox<M> {
    label: Arc<str>,
    tx: mpsc::Sender<M>,
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            label: Arc::clone(&self.label),
            tx: self.tx.clone(),
        }
    }
}

impl<M> Mailbox<M> {
    /// Create a mailbox holding at most `capacity` messages (minimum 1).
    ///
    /// `label` names the actor in logs and errors.
    pub fn channel(label: impl Into<Arc<str>>, capacity: usize) -> (Self, mpsc::Receiver<M>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                label: label.into(),
                tx,
            },
            rx,
        )
    }

    /// The actor's label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the actor has stopped receiving.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Whether both mailboxes lead to the same actor.
    pub fn same_actor(&self, other: &Self) -> bool {
        self.tx.same_channel(&other.tx)
    }

    /// Deliver `message` without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::MailboxFull`] if the message was dropped, or
    /// [`ActorError::Stopped`] if the actor is gone.
    pub fn cast(&self, message: M) -> Result<(), ActorError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_dropped)) => Err(self.full()),
            Err(TrySendError::Closed(_dropped)) => Err(self.stopped()),
        }
    }

    /// Deliver `message`, waiting for mailbox space.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the actor is gone.
    pub async fn send(&self, message: M) -> Result<(), ActorError> {
        self.tx.send(message).await.map_err(|_closed| self.stopped())
    }

    /// Reserve one slot without waiting, so the caller keeps ownership of
    /// its payload until delivery is certain.
    ///
    /// # Errors
    ///
    /// Same as [`Mailbox::cast`].
    pub fn try_reserve(&self) -> Result<Permit<'_, M>, ActorError> {
        self.tx.try_reserve().map_err(|err| match err {
            TrySendError::Full(()) => self.full(),
            TrySendError::Closed(()) => self.stopped(),
        })
    }

    /// Send a request built by `make` and wait for the reply.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the actor stops before replying.
    pub async fn call<R>(&self, make: impl FnOnce(oneshot::Sender<R>) -> M) -> Result<R, ActorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_closed| self.stopped())?;
        reply_rx.await.map_err(|_dropped| self.stopped())
    }

    fn full(&self) -> ActorError {
        warn!(actor = %self.label, "Mailbox full, message dropped");
        ActorError::MailboxFull {
            actor: self.label.to_string(),
        }
    }

    fn stopped(&self) -> ActorError {
        ActorError::Stopped {
            actor: self.label.to_string(),
        }
    }
}

impl<M: Send + 'static> Mailbox<M> {
    /// Deliver `message` without waiting and without dropping it.
    ///
    /// If the mailbox is full, a spawned task waits for space, so the
    /// message may arrive after messages sent later.
    ///
    /// # Errors
    ///
    /// Returns [`ActorError::Stopped`] if the actor is gone.
    pub fn post(&self, message: M) -> Result<(), ActorError> {
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(message)) => {
                let tx = self.tx.clone();
                let label = Arc::clone(&self.label);
                tokio::spawn(async move {
                    if tx.send(message).await.is_err() {
                        debug!(actor = %label, "Actor stopped before a posted message arrived");
                    }
                });
                Ok(())
            }
            Err(TrySendError::Closed(_dropped)) => Err(self.stopped()),
        }
    }
}
