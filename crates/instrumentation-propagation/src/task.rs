// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Context-propagating wrappers for one-shot jobs.
//!
//! Two shapes are covered. Closures are wrapped directly: [`traced`]
//! captures the submitter's context into the returned closure. Task
//! *objects* that a library keeps and reuses (pooled runnables, batch
//! entries) instead get their context attached through the context store
//! with [`attach_current`] and retrieved — exactly once, clearing the
//! association — with [`take_attached`], so a reused carrier never runs
//! under a stale context from its previous life.

use std::sync::Arc;

use instrumentation_core::ContextStore;
use tracing::debug;

use crate::snapshot::ContextSnapshot;

/// Boxed one-shot job as accepted by [`crate::Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Wraps a closure so it runs under the context active right now.
///
/// The executing thread's own ambient context is restored when the
/// closure returns, unwinding included.
pub fn traced<F, R>(f: F) -> impl FnOnce() -> R
where
    F: FnOnce() -> R,
{
    let snapshot = ContextSnapshot::capture();
    move || {
        let _scope = snapshot.activate();
        f()
    }
}

/// A boxed job bundled with the context captured at wrap time.
///
/// Dropping the wrapper without running it counts as a rejected
/// submission and releases the captured context.
pub struct TracedJob {
    snapshot: Option<ContextSnapshot>,
    job: Option<Job>,
}

impl TracedJob {
    /// Wraps `job` with the currently active context.
    pub fn wrap(job: Job) -> Self {
        Self::with_snapshot(job, ContextSnapshot::capture())
    }

    pub fn with_snapshot(job: Job, snapshot: ContextSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            job: Some(job),
        }
    }

    /// Runs the job under the captured context, restoring the executing
    /// thread's previous context afterwards.
    pub fn run(mut self) {
        let snapshot = self.snapshot.take();
        let job = self.job.take();
        let _scope = snapshot.and_then(|snapshot| snapshot.activate());
        if let Some(job) = job {
            job();
        }
    }
}

impl Drop for TracedJob {
    fn drop(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            debug!("traced job dropped before running");
            snapshot.cancel();
        }
    }
}

/// Context snapshot attached to a reusable task object via the store.
pub struct PropagatedContext {
    snapshot: ContextSnapshot,
}

impl PropagatedContext {
    pub fn snapshot(&self) -> &ContextSnapshot {
        &self.snapshot
    }
}

/// Attaches the currently active context to `carrier`, unless the carrier
/// already has one (first submission wins for shared carriers).
///
/// Returns whether this call's snapshot was attached. Nothing is attached
/// when no context is active.
pub fn attach_current<C>(store: &ContextStore<C, PropagatedContext>, carrier: &Arc<C>) -> bool
where
    C: Send + Sync + 'static,
{
    let snapshot = ContextSnapshot::capture();
    if snapshot.is_empty() {
        return false;
    }
    let candidate = Arc::new(PropagatedContext { snapshot });
    let winner = store.put_if_absent(carrier, candidate.clone());
    Arc::ptr_eq(&winner, &candidate)
}

/// Retrieves and clears the context attached to `carrier`.
///
/// The clearing is the point: retrieval is exactly-once, and a pooled
/// carrier reused for unrelated later work observes no stale context.
pub fn take_attached<C>(
    store: &ContextStore<C, PropagatedContext>,
    carrier: &Arc<C>,
) -> Option<ContextSnapshot>
where
    C: Send + Sync + 'static,
{
    store
        .remove(carrier)
        .map(|attached| attached.snapshot.clone())
}
