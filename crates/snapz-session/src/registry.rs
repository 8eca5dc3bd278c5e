//! Keyed session registry.
//!
//! A [`SessionRegistry`] is a map from key (peer user name or room name) to a
//! live session, guarded by a single mutex. Callers take the lock once with
//! [`SessionRegistry::lock`] and perform find-or-create-then-act inside the
//! returned guard, so two callers can never create duplicate sessions for the
//! same key.
//!
//! Disposal is `Drop`: replacing or removing an entry drops the old session,
//! which releases its engine-side handle.

use std::collections::HashMap;

use parking_lot::{Mutex, MutexGuard};

/// Mutex-guarded map of live sessions.
#[derive(Debug)]
pub struct SessionRegistry<S> {
    sessions: Mutex<HashMap<String, S>>,
}

impl<S> Default for SessionRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SessionRegistry<S> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { sessions: Mutex::new(HashMap::new()) }
    }

    /// Lock the registry for a compound operation.
    pub fn lock(&self) -> RegistryGuard<'_, S> {
        RegistryGuard { sessions: self.sessions.lock() }
    }

    /// Dispose every session and empty the table.
    ///
    /// Sessions are dropped after the lock is released, so disposal side
    /// effects never run under the registry lock.
    pub fn dispose_all(&self) -> usize {
        let drained: Vec<S> = {
            let mut sessions = self.sessions.lock();
            sessions.drain().map(|(_, session)| session).collect()
        };
        let count = drained.len();
        drop(drained);
        count
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}

/// Exclusive access to a [`SessionRegistry`].
pub struct RegistryGuard<'a, S> {
    sessions: MutexGuard<'a, HashMap<String, S>>,
}

impl<S> RegistryGuard<'_, S> {
    /// Session for `key`.
    pub fn find(&self, key: &str) -> Option<&S> {
        self.sessions.get(key)
    }

    /// Mutable session for `key`.
    pub fn find_mut(&mut self, key: &str) -> Option<&mut S> {
        self.sessions.get_mut(key)
    }

    /// Whether a session exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// Store `session` under `key`, disposing any prior entry.
    pub fn insert(&mut self, key: &str, session: S) -> &mut S {
        // Drop the old entry before the new one is visible.
        self.sessions.remove(key);
        self.sessions.entry(key.to_string()).or_insert(session)
    }

    /// Remove and dispose the session for `key`.
    ///
    /// Returns false if there was none.
    pub fn remove(&mut self, key: &str) -> bool {
        self.sessions.remove(key).is_some()
    }

    /// Remove the session for `key` without disposing it.
    pub fn take(&mut self, key: &str) -> Option<S> {
        self.sessions.remove(key)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;

    struct Tracked {
        id: u32,
        dropped: Arc<AtomicUsize>,
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.dropped.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(id: u32, dropped: &Arc<AtomicUsize>) -> Tracked {
        Tracked { id, dropped: Arc::clone(dropped) }
    }

    #[test]
    fn insert_replaces_and_disposes_prior_entry() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let registry = SessionRegistry::new();

        let mut guard = registry.lock();
        guard.insert("alice", tracked(1, &dropped));
        guard.insert("alice", tracked(2, &dropped));

        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert_eq!(guard.len(), 1);
        assert_eq!(guard.find("alice").map(|s| s.id), Some(2));
    }

    #[test]
    fn remove_disposes_and_reports_presence() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let registry = SessionRegistry::new();

        let mut guard = registry.lock();
        guard.insert("lobby", tracked(1, &dropped));

        assert!(guard.remove("lobby"));
        assert!(!guard.remove("lobby"));
        assert_eq!(dropped.load(Ordering::SeqCst), 1);
        assert!(guard.is_empty());
    }

    #[test]
    fn dispose_all_empties_registry() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let registry = SessionRegistry::new();
        {
            let mut guard = registry.lock();
            guard.insert("a", tracked(1, &dropped));
            guard.insert("b", tracked(2, &dropped));
            guard.insert("c", tracked(3, &dropped));
        }

        assert_eq!(registry.dispose_all(), 3);
        assert_eq!(dropped.load(Ordering::SeqCst), 3);
        assert!(registry.is_empty());
        assert_eq!(registry.dispose_all(), 0);
    }

    #[test]
    fn take_does_not_dispose() {
        let dropped = Arc::new(AtomicUsize::new(0));
        let registry = SessionRegistry::new();

        let taken = {
            let mut guard = registry.lock();
            guard.insert("bob", tracked(7, &dropped));
            guard.take("bob")
        };

        assert_eq!(dropped.load(Ordering::SeqCst), 0);
        assert_eq!(taken.as_ref().map(|s| s.id), Some(7));
        assert_eq!(registry.len(), 0);
    }
}
