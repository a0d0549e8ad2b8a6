// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Weakly-keyed association of agent state with library-owned instances.
//!
//! Instrumented libraries own their objects; the agent cannot add fields to
//! them, yet advice needs somewhere to hang per-instance state ("the span
//! for this session", "the context for this task"). The store keeps one
//! state value per carrier instance, keyed by the carrier's identity and
//! held through a [`Weak`] reference so the association never extends the
//! carrier's lifetime. In a long-running process the store must not grow
//! with the number of carriers ever seen, only with the number currently
//! alive.
//!
//! Dead entries are reclaimed by an amortized prune pass that runs during
//! mutation once the table crosses a watermark; there is no background
//! thread. Lookups for never-associated (or already-collected) carriers
//! return `None`.
//!
//! Carrier identity is the `Arc` allocation address. An address can be
//! reused after a carrier is dropped, so every hit revalidates that the
//! stored weak reference is still alive: two live allocations cannot share
//! an address, which makes (live entry, equal address) proof of identity.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

const MIN_PRUNE_WATERMARK: usize = 64;

struct StoreEntry<C, S> {
    carrier: Weak<C>,
    state: Arc<S>,
}

/// Concurrent association table from carrier instances to agent state.
///
/// Every operation is independently atomic; there are no cross-operation
/// transactions. Racing writers must use [`ContextStore::put_if_absent`],
/// which resolves the race to a single winning state instance.
pub struct ContextStore<C, S> {
    entries: DashMap<usize, StoreEntry<C, S>>,
    prune_watermark: AtomicUsize,
}

impl<C, S> Default for ContextStore<C, S>
where
    C: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, S> ContextStore<C, S>
where
    C: Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            prune_watermark: AtomicUsize::new(MIN_PRUNE_WATERMARK),
        }
    }

    /// The state associated with `carrier`, or `None` when nothing was
    /// attached (or the attachment raced with the carrier's death).
    pub fn get(&self, carrier: &Arc<C>) -> Option<Arc<S>> {
        let entry = self.entries.get(&key_of(carrier))?;
        if entry.carrier.strong_count() == 0 {
            // Stale entry left by a dead carrier whose address was reused.
            return None;
        }
        Some(entry.state.clone())
    }

    /// Associates `state` with `carrier`, replacing any existing state.
    pub fn put(&self, carrier: &Arc<C>, state: Arc<S>) {
        self.maybe_prune();
        self.entries.insert(
            key_of(carrier),
            StoreEntry {
                carrier: Arc::downgrade(carrier),
                state,
            },
        );
    }

    /// Atomically associates `state` unless the carrier already has one.
    ///
    /// Returns the winning state: the existing one if a concurrent (or
    /// earlier) writer got there first, otherwise the caller's. Losing
    /// callers must use the returned instance and discard their own.
    pub fn put_if_absent(&self, carrier: &Arc<C>, state: Arc<S>) -> Arc<S> {
        self.maybe_prune();
        match self.entries.entry(key_of(carrier)) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().carrier.strong_count() > 0 {
                    occupied.get().state.clone()
                } else {
                    // The previous tenant of this address is dead; claim it.
                    occupied.insert(StoreEntry {
                        carrier: Arc::downgrade(carrier),
                        state: state.clone(),
                    });
                    state
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoreEntry {
                    carrier: Arc::downgrade(carrier),
                    state: state.clone(),
                });
                state
            }
        }
    }

    /// Removes and returns the carrier's state, if any.
    pub fn remove(&self, carrier: &Arc<C>) -> Option<Arc<S>> {
        let key = key_of(carrier);
        let (_, entry) = self.entries.remove(&key)?;
        if entry.carrier.strong_count() == 0 {
            return None;
        }
        Some(entry.state)
    }

    /// Number of entries currently held, dead entries included; a
    /// diagnostic for leak tests and debug logging.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry whose carrier is gone. Runs automatically during
    /// mutation; exposed for deterministic cleanup in tests and shutdown
    /// paths.
    pub fn prune(&self) {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.carrier.strong_count() > 0);
        let live = self.entries.len();
        self.prune_watermark
            .store((live * 2).max(MIN_PRUNE_WATERMARK), Ordering::Relaxed);
        if before != live {
            debug!(dropped = before - live, live, "pruned dead context store entries");
        }
    }

    fn maybe_prune(&self) {
        if self.entries.len() >= self.prune_watermark.load(Ordering::Relaxed) {
            self.prune();
        }
    }
}

fn key_of<C>(carrier: &Arc<C>) -> usize {
    Arc::as_ptr(carrier) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Session {
        #[allow(dead_code)]
        name: &'static str,
    }

    struct State(u32);

    #[test]
    fn absent_lookup_returns_none() {
        let store: ContextStore<Session, State> = ContextStore::new();
        let session = Arc::new(Session { name: "s1" });
        assert!(store.get(&session).is_none());
    }

    #[test]
    fn put_then_get_roundtrip() {
        let store = ContextStore::new();
        let session = Arc::new(Session { name: "s1" });
        store.put(&session, Arc::new(State(7)));
        assert_eq!(store.get(&session).map(|state| state.0), Some(7));
    }

    #[test]
    fn put_overwrites_existing_state() {
        let store = ContextStore::new();
        let session = Arc::new(Session { name: "s1" });
        store.put(&session, Arc::new(State(1)));
        store.put(&session, Arc::new(State(2)));
        assert_eq!(store.get(&session).map(|state| state.0), Some(2));
    }

    #[test]
    fn put_if_absent_keeps_first_writer() {
        let store = ContextStore::new();
        let session = Arc::new(Session { name: "s1" });
        let first = store.put_if_absent(&session, Arc::new(State(1)));
        let second = store.put_if_absent(&session, Arc::new(State(2)));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.get(&session).map(|state| state.0), Some(1));
    }

    #[test]
    fn remove_clears_association() {
        let store = ContextStore::new();
        let session = Arc::new(Session { name: "s1" });
        store.put(&session, Arc::new(State(3)));
        assert_eq!(store.remove(&session).map(|state| state.0), Some(3));
        assert!(store.get(&session).is_none());
        assert!(store.remove(&session).is_none());
    }

    #[test]
    fn association_does_not_keep_carrier_alive() {
        let store = ContextStore::new();
        let session = Arc::new(Session { name: "s1" });
        let weak_session = Arc::downgrade(&session);
        store.put(&session, Arc::new(State(1)));
        drop(session);
        assert!(weak_session.upgrade().is_none());
    }

    #[test]
    fn prune_releases_state_of_dead_carriers() {
        let store = ContextStore::new();
        let state = Arc::new(State(9));
        let weak_state = Arc::downgrade(&state);
        let session = Arc::new(Session { name: "s1" });
        store.put(&session, state);
        drop(session);
        store.prune();
        assert_eq!(store.len(), 0);
        assert!(weak_state.upgrade().is_none());
    }
}
