// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Captured "active context at the submission boundary".

use instrumentation_core::scope::{self, Scope};
use instrumentation_core::Span;
use tracing::debug;

/// The context that was active when work was scheduled, to be reinstalled
/// when (and wherever) the work actually runs.
#[derive(Clone, Debug)]
pub struct ContextSnapshot {
    span: Option<Span>,
}

impl ContextSnapshot {
    /// Captures the context active on the calling thread right now.
    pub fn capture() -> Self {
        Self {
            span: scope::current(),
        }
    }

    pub fn empty() -> Self {
        Self { span: None }
    }

    /// True when there was no active context at capture time; empty
    /// snapshots are not worth wrapping work for.
    pub fn is_empty(&self) -> bool {
        self.span.is_none()
    }

    /// The captured span, e.g. to parent a consumer-side child span.
    pub fn span(&self) -> Option<&Span> {
        self.span.as_ref()
    }

    /// Reinstalls the captured context on the calling thread until the
    /// returned scope drops; `None` for empty snapshots.
    pub fn activate(&self) -> Option<Scope> {
        self.span.clone().map(scope::activate)
    }

    /// Releases a snapshot whose work will never run (rejected submission,
    /// canceled task). Purely diagnostic today; the snapshot holds no
    /// resources beyond the span handle it drops.
    pub fn cancel(self) {
        if let Some(span) = self.span {
            debug!(
                trace_id = span.context().trace_id,
                span_id = span.context().span_id,
                "discarding propagated context for work that will not run"
            );
        }
    }
}
