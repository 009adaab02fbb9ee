//! Process-wide actor registry.
//!
//! A [`Registry`] maps `(scope, id)` to a live actor handle. Registration is
//! an atomic insert-if-absent under the write lock, so concurrent starts of
//! the same ID produce exactly one winner. Each successful registration is
//! stamped with a fresh incarnation number, which lets the scheduler tell a
//! restarted worker apart from the one it handed a job to.
//!
//! Registration returns a [`RegistrationGuard`]. The actor task holds the
//! guard for its whole life; dropping it (normal exit, panic unwind, or
//! abort) removes the entry, but only if the entry still belongs to the
//! same incarnation.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use homestead_types::OwnerId;

use crate::owner::OwnerHandle;
use crate::scheduler::SchedulerHandle;
use crate::worker::WorkerHandle;

/// Errors that can occur during registration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// An actor is already registered under this key.
    #[error("already started: {id} in {scope}")]
    AlreadyStarted {
        /// Scope of the key.
        scope: Scope,
        /// ID within the scope.
        id: String,
    },
}

/// Namespace of a registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    /// Global names: owners.
    World,
    /// Names private to one owner-domain: its workers and scheduler.
    Owner(OwnerId),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::World => write!(f, "world"),
            Self::Owner(owner_id) => write!(f, "owner:{owner_id}"),
        }
    }
}

type Key = (Scope, String);

#[derive(Debug)]
struct Entry<H> {
    handle: H,
    incarnation: u64,
}

/// Table of live actors of one kind.
#[derive(Debug)]
pub struct Registry<H> {
    kind: &'static str,
    entries: RwLock<HashMap<Key, Entry<H>>>,
    next_incarnation: AtomicU64,
}

impl<H: Clone> Registry<H> {
    /// Create an empty registry. `kind` names the actor kind in logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: RwLock::new(HashMap::new()),
            next_incarnation: AtomicU64::new(1),
        }
    }

    /// Register `handle` under `(scope, id)` if the key is free.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyStarted`] if the key is taken.
    pub fn register(
        self: &Arc<Self>,
        scope: Scope,
        id: impl Into<String>,
        handle: H,
    ) -> Result<RegistrationGuard<H>, RegistryError> {
        let key = (scope, id.into());
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(&key) {
            return Err(RegistryError::AlreadyStarted {
                scope: key.0,
                id: key.1,
            });
        }
        let incarnation = self.next_incarnation.fetch_add(1, Ordering::Relaxed);
        entries.insert(key.clone(), Entry { handle, incarnation });
        drop(entries);

        tracing::trace!(kind = self.kind, scope = %key.0, id = %key.1, incarnation, "Registered");
        Ok(RegistrationGuard {
            registry: Arc::clone(self),
            key,
            incarnation,
        })
    }

    /// Handle registered under `(scope, id)`.
    pub fn lookup(&self, scope: &Scope, id: &str) -> Option<H> {
        self.resolve(scope, id).map(|(handle, _)| handle)
    }

    /// Handle and incarnation registered under `(scope, id)`.
    pub fn resolve(&self, scope: &Scope, id: &str) -> Option<(H, u64)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(&(scope.clone(), id.to_owned()))
            .map(|entry| (entry.handle.clone(), entry.incarnation))
    }

    /// Incarnation registered under `(scope, id)`.
    pub fn incarnation(&self, scope: &Scope, id: &str) -> Option<u64> {
        self.resolve(scope, id).map(|(_, incarnation)| incarnation)
    }

    /// Whether `(scope, id)` still resolves to `incarnation`.
    pub fn is_current(&self, scope: &Scope, id: &str, incarnation: u64) -> bool {
        self.incarnation(scope, id) == Some(incarnation)
    }

    /// Remove `(scope, id)` regardless of incarnation. Returns whether an
    /// entry was removed.
    pub fn unregister(&self, scope: &Scope, id: &str) -> bool {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(&(scope.clone(), id.to_owned())).is_some()
    }

    /// Every `(id, handle)` in `scope`, ordered by ID.
    pub fn list(&self, scope: &Scope) -> Vec<(String, H)> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut found: Vec<(String, H)> = entries
            .iter()
            .filter(|((entry_scope, _), _)| entry_scope == scope)
            .map(|((_, id), entry)| (id.clone(), entry.handle.clone()))
            .collect();
        drop(entries);
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }

    /// Every handle in every scope.
    pub fn list_all(&self) -> Vec<H> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().map(|entry| entry.handle.clone()).collect()
    }

    /// Number of registered actors.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no actor is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn release(&self, key: &Key, incarnation: u64) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.get(key).is_some_and(|entry| entry.incarnation == incarnation) {
            entries.remove(key);
            tracing::trace!(kind = self.kind, scope = %key.0, id = %key.1, incarnation, "Unregistered");
        }
    }
}

/// Keeps a registration alive. Dropping it unregisters the entry if it
/// still belongs to this incarnation.
#[derive(Debug)]
pub struct RegistrationGuard<H: Clone> {
    registry: Arc<Registry<H>>,
    key: Key,
    incarnation: u64,
}

impl<H: Clone> RegistrationGuard<H> {
    /// Incarnation stamped on this registration.
    pub const fn incarnation(&self) -> u64 {
        self.incarnation
    }
}

impl<H: Clone> Drop for RegistrationGuard<H> {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.incarnation);
    }
}

/// Key under which each owner-domain registers its scheduler.
pub const SCHEDULER_KEY: &str = "scheduler";

/// The three registries every actor can reach.
#[derive(Debug)]
pub struct Registries {
    /// Owners, in [`Scope::World`] keyed by owner ID.
    pub owners: Arc<Registry<OwnerHandle>>,
    /// Workers, in [`Scope::Owner`] keyed by worker ID.
    pub workers: Arc<Registry<WorkerHandle>>,
    /// Schedulers, in [`Scope::Owner`] keyed by [`SCHEDULER_KEY`].
    pub schedulers: Arc<Registry<SchedulerHandle>>,
}

impl Registries {
    /// Three empty registries.
    pub fn new() -> Self {
        Self {
            owners: Arc::new(Registry::new("owner")),
            workers: Arc::new(Registry::new("worker")),
            schedulers: Arc::new(Registry::new("scheduler")),
        }
    }

    /// The running owner with this ID.
    pub fn owner(&self, owner_id: &OwnerId) -> Option<OwnerHandle> {
        self.owners.lookup(&Scope::World, owner_id.as_str())
    }

    /// The running scheduler of this owner-domain.
    pub fn scheduler(&self, owner_id: &OwnerId) -> Option<SchedulerHandle> {
        self.schedulers
            .lookup(&Scope::Owner(owner_id.clone()), SCHEDULER_KEY)
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Barrier;

    use super::*;

    fn registry() -> Arc<Registry<u32>> {
        Arc::new(Registry::new("test"))
    }

    fn owner_scope(id: &str) -> Scope {
        Scope::Owner(OwnerId::from(id))
    }

    #[test]
    fn register_then_lookup() {
        let reg = registry();
        let _guard = reg.register(Scope::World, "a", 7).unwrap();
        assert_eq!(reg.lookup(&Scope::World, "a"), Some(7));
        assert_eq!(reg.lookup(&Scope::World, "b"), None);
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn duplicate_key_is_already_started() {
        let reg = registry();
        let _guard = reg.register(Scope::World, "a", 1).unwrap();
        let second = reg.register(Scope::World, "a", 2);
        assert_eq!(
            second.map(|g| g.incarnation()),
            Err(RegistryError::AlreadyStarted {
                scope: Scope::World,
                id: String::from("a"),
            })
        );
        assert_eq!(reg.lookup(&Scope::World, "a"), Some(1));
    }

    #[test]
    fn scopes_are_independent() {
        let reg = registry();
        let _a = reg.register(owner_scope("o1"), "w1", 1).unwrap();
        let _b = reg.register(owner_scope("o2"), "w1", 2).unwrap();
        assert_eq!(reg.lookup(&owner_scope("o1"), "w1"), Some(1));
        assert_eq!(reg.lookup(&owner_scope("o2"), "w1"), Some(2));
        assert_eq!(reg.list(&owner_scope("o1")), vec![(String::from("w1"), 1)]);
        assert_eq!(reg.list_all().len(), 2);
    }

    #[test]
    fn dropping_guard_unregisters() {
        let reg = registry();
        let guard = reg.register(Scope::World, "a", 1).unwrap();
        drop(guard);
        assert!(reg.is_empty());
    }

    #[test]
    fn stale_guard_leaves_newer_incarnation() {
        let reg = registry();
        let old = reg.register(Scope::World, "a", 1).unwrap();
        let old_incarnation = old.incarnation();
        assert!(reg.unregister(&Scope::World, "a"));

        let new = reg.register(Scope::World, "a", 2).unwrap();
        assert_ne!(new.incarnation(), old_incarnation);
        drop(old);

        assert_eq!(reg.lookup(&Scope::World, "a"), Some(2));
        assert!(reg.is_current(&Scope::World, "a", new.incarnation()));
        assert!(!reg.is_current(&Scope::World, "a", old_incarnation));
    }

    #[test]
    fn concurrent_registration_has_one_winner() {
        let reg = registry();
        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8_u32)
            .map(|n| {
                let reg = Arc::clone(&reg);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    reg.register(Scope::World, "contested", n).ok()
                })
            })
            .collect();

        let guards: Vec<_> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect();
        assert_eq!(guards.len(), 1);
        assert_eq!(reg.len(), 1);
    }
}
