// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Context propagation across concurrency boundaries.
//!
//! Work submitted to an executor, polled as a future, or consumed as a
//! stream generally executes on a different thread than the one that
//! created it. These wrappers snapshot the context active at the
//! submission boundary and reinstall it — restoring the executing thread's
//! own ambient context afterwards — for the dynamic extent of the work:
//!
//! - [`TracedJob`] / [`TracedExecutor`]: thread-pool style `FnOnce` jobs,
//!   wrapped exactly once even when instrumented submission layers nest
//! - [`Traced`] / [`SpanFuture`]: futures whose every poll runs under the
//!   captured context, with optional exactly-once span completion
//! - [`TracedStream`] / [`SpanStream`]: streams whose notifications can
//!   arrive on arbitrary threads, finished on the first terminal signal
//!   (end, first error, or drop-before-terminal)
//! - [`CompletionGuard`]: the atomic first-wins latch behind all async
//!   span completion, cancellation included
//! - [`PropagatedContext`]: context attachment for reusable task objects
//!   through the context store, cleared on retrieval so pooled carriers
//!   never replay a stale context

#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(unused_extern_crates)]

pub mod completion;
pub mod executor;
pub mod future;
pub mod snapshot;
pub mod stream;
pub mod task;

pub use completion::CompletionGuard;
pub use executor::{Executor, SubmitError, TracedExecutor};
pub use future::{SpanFuture, Traced, TracedFutureExt};
pub use snapshot::ContextSnapshot;
pub use stream::{SpanStream, TracedStream};
pub use task::{attach_current, take_attached, traced, Job, PropagatedContext, TracedJob};
