// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Exactly-once span completion for asynchronous operations.
//!
//! An async operation can signal its end more than once: a completion
//! racing an error, a cancellation racing a completion, several
//! subscribers observing the same hot source. The guard latches on the
//! first signal; whichever arrives first finishes the span with its
//! attributes and every later signal is a no-op. A guard dropped before
//! any signal counts as cancellation, so an abandoned operation can never
//! leave its span open.

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use instrumentation_core::Span;

/// Atomic first-wins latch finishing a span on the first terminal signal.
#[derive(Debug)]
pub struct CompletionGuard {
    span: Span,
    completed: AtomicBool,
}

impl CompletionGuard {
    pub fn new(span: Span) -> Self {
        Self {
            span,
            completed: AtomicBool::new(false),
        }
    }

    /// The span under guard, for late attribute population.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Whether a terminal signal has already been accepted.
    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Normal completion; finishes the span if this is the first signal.
    pub fn complete(&self) {
        if self.first_signal() {
            self.span.finish();
        }
    }

    /// Error completion; finishes the span flagged as failed if this is
    /// the first signal.
    pub fn fail(&self, error: &dyn Display) {
        if self.first_signal() {
            self.span.finish_with_error(&error.to_string());
        }
    }

    /// Cancellation; finishes the span tagged as canceled if this is the
    /// first signal.
    pub fn cancel(&self) {
        if self.first_signal() {
            self.span.finish_canceled();
        }
    }

    fn first_signal(&self) -> bool {
        !self.completed.swap(true, Ordering::AcqRel)
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        // Dropping the guard without a signal is cancellation.
        self.cancel();
    }
}
