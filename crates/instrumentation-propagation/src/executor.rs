// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Context propagation at the thread-pool submission boundary.
//!
//! Submission APIs stack: an instrumented `submit` commonly delegates to
//! an instrumented `execute` on the same thread. Only the outermost layer
//! may wrap the job — wrapping twice is harmless for correctness but pure
//! overhead — so wrapping is gated on a call-depth marker scoped to the
//! executor boundary. The outermost call resets the marker on every exit
//! path; nested calls pass the job through untouched.

use instrumentation_core::{CallDepth, DepthGuard};

use crate::snapshot::ContextSnapshot;
use crate::task::{Job, TracedJob};

/// Call-depth marker for nested instrumented submission layers.
pub struct ExecutorSubmission;

/// Minimal job-submission surface of a thread pool.
pub trait Executor {
    /// Submits a job for asynchronous execution. Rejections (saturated
    /// queue, shut-down pool) drop the job and report [`SubmitError`].
    fn execute(&self, job: Job) -> Result<(), SubmitError>;
}

/// A submission was rejected; the job will never run.
#[derive(Debug, thiserror::Error)]
#[error("job submission rejected: {0}")]
pub struct SubmitError(pub String);

/// Wraps an executor so submitted jobs run under the submitter's context.
///
/// Jobs submitted while no context is active pass through unwrapped; the
/// executor's behavior is otherwise unchanged, including rejection. A
/// rejected wrapped job releases its captured context on the spot.
pub struct TracedExecutor<E> {
    inner: E,
}

impl<E: Executor> TracedExecutor<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    pub fn get_ref(&self) -> &E {
        &self.inner
    }

    pub fn into_inner(self) -> E {
        self.inner
    }
}

impl<E: Executor> Executor for TracedExecutor<E> {
    fn execute(&self, job: Job) -> Result<(), SubmitError> {
        if CallDepth::<ExecutorSubmission>::enter() > 0 {
            // A wrapping layer above us already owns this submission.
            return self.inner.execute(job);
        }
        let _reset: DepthGuard = CallDepth::<ExecutorSubmission>::reset_on_drop();
        let snapshot = ContextSnapshot::capture();
        if snapshot.is_empty() {
            return self.inner.execute(job);
        }
        let traced = TracedJob::with_snapshot(job, snapshot);
        // On rejection the closure is dropped without running, which
        // releases the captured context through the wrapper's drop.
        self.inner.execute(Box::new(move || traced.run()))
    }
}
