// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span handles and finished span records.
//!
//! A [`Span`] is a cheaply cloneable, thread-safe handle to one traced unit
//! of work. Any clone may mutate tags or finish the span, but the finish is
//! guarded by an atomic first-wins latch: the finished [`SpanData`] record is
//! handed to the sink exactly once, and every later mutation or finish call
//! is an inert no-op. Double-finishing is a logic bug in the caller, so the
//! losing call is logged at `debug` for diagnosis but otherwise ignored.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime};

use tracing::debug;

use crate::context::SpanContext;
use crate::sink::SpanSink;

/// Tag key set when a span is finished through cancellation rather than
/// normal or exceptional completion.
pub const CANCELED_TAG: &str = "canceled";
/// Tag key carrying the message of the error that finished a span.
pub const ERROR_MESSAGE_TAG: &str = "error.message";

/// Immutable record of a finished span, handed to the [`SpanSink`].
#[derive(Debug, Clone)]
pub struct SpanData {
    pub trace_id: u64,
    pub span_id: u64,
    pub parent_id: Option<u64>,
    pub operation_name: String,
    pub resource_name: String,
    pub service_name: String,
    pub span_type: Option<String>,
    pub sampling_priority: i8,
    pub start: SystemTime,
    pub duration: Duration,
    pub tags: HashMap<String, String>,
    pub error: bool,
}

struct SpanState {
    operation_name: String,
    resource_name: String,
    service_name: String,
    span_type: Option<String>,
    tags: HashMap<String, String>,
    error: bool,
}

struct SpanInner {
    context: SpanContext,
    parent_id: Option<u64>,
    start: SystemTime,
    started_at: Instant,
    enabled: bool,
    finished: AtomicBool,
    state: Mutex<SpanState>,
    sink: Arc<dyn SpanSink>,
}

impl Drop for SpanInner {
    fn drop(&mut self) {
        // Last handle gone without a finish: the trace will be incomplete.
        if self.enabled && !self.finished.load(Ordering::Acquire) {
            debug!(
                trace_id = self.context.trace_id,
                span_id = self.context.span_id,
                "span dropped without being finished"
            );
        }
    }
}

/// Handle to an in-flight span.
#[derive(Clone)]
pub struct Span {
    inner: Arc<SpanInner>,
}

impl Span {
    pub(crate) fn start(
        context: SpanContext,
        parent_id: Option<u64>,
        operation_name: &str,
        service_name: &str,
        enabled: bool,
        sink: Arc<dyn SpanSink>,
    ) -> Self {
        Self {
            inner: Arc::new(SpanInner {
                context,
                parent_id,
                start: SystemTime::now(),
                started_at: Instant::now(),
                enabled,
                finished: AtomicBool::new(false),
                state: Mutex::new(SpanState {
                    operation_name: operation_name.to_string(),
                    resource_name: operation_name.to_string(),
                    service_name: service_name.to_string(),
                    span_type: None,
                    tags: HashMap::new(),
                    error: false,
                }),
                sink,
            }),
        }
    }

    pub fn context(&self) -> SpanContext {
        self.inner.context
    }

    pub fn is_finished(&self) -> bool {
        self.inner.finished.load(Ordering::Acquire)
    }

    /// Two handles referring to the same underlying span.
    pub fn same_span(&self, other: &Span) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn set_tag(&self, key: &str, value: &str) {
        self.mutate(|state| {
            state.tags.insert(key.to_string(), value.to_string());
        });
    }

    pub fn set_error(&self, error: bool) {
        self.mutate(|state| state.error = error);
    }

    pub fn set_resource(&self, resource_name: &str) {
        self.mutate(|state| state.resource_name = resource_name.to_string());
    }

    pub fn set_service(&self, service_name: &str) {
        self.mutate(|state| state.service_name = service_name.to_string());
    }

    pub fn set_span_type(&self, span_type: &str) {
        self.mutate(|state| state.span_type = Some(span_type.to_string()));
    }

    /// Finishes the span and reports it to the sink.
    ///
    /// Only the first finish (through any clone of this handle) takes
    /// effect; later calls are no-ops.
    pub fn finish(&self) {
        self.finish_inner(None, false);
    }

    /// Finishes the span flagged as failed, recording the error message.
    pub fn finish_with_error(&self, message: &str) {
        self.finish_inner(Some(message), false);
    }

    /// Finishes a span whose work was canceled before completion.
    ///
    /// Cancellation is a terminal signal like any other: the span must not
    /// be left open, it is tagged and reported on the spot.
    pub fn finish_canceled(&self) {
        self.finish_inner(None, true);
    }

    fn mutate(&self, f: impl FnOnce(&mut SpanState)) {
        if !self.inner.enabled || self.is_finished() {
            return;
        }
        if let Ok(mut state) = self.inner.state.lock() {
            f(&mut state);
        }
    }

    fn finish_inner(&self, error_message: Option<&str>, canceled: bool) {
        if self.inner.finished.swap(true, Ordering::AcqRel) {
            debug!(
                trace_id = self.inner.context.trace_id,
                span_id = self.inner.context.span_id,
                "ignoring duplicate finish of an already finished span"
            );
            return;
        }
        if !self.inner.enabled {
            return;
        }
        let duration = self.inner.started_at.elapsed();
        let Ok(mut state) = self.inner.state.lock() else {
            return;
        };
        if let Some(message) = error_message {
            state.error = true;
            state
                .tags
                .insert(ERROR_MESSAGE_TAG.to_string(), message.to_string());
        }
        if canceled {
            state.tags.insert(CANCELED_TAG.to_string(), "true".to_string());
        }
        let data = SpanData {
            trace_id: self.inner.context.trace_id,
            span_id: self.inner.context.span_id,
            parent_id: self.inner.parent_id,
            operation_name: std::mem::take(&mut state.operation_name),
            resource_name: std::mem::take(&mut state.resource_name),
            service_name: std::mem::take(&mut state.service_name),
            span_type: state.span_type.take(),
            sampling_priority: self.inner.context.sampling_priority,
            start: self.inner.start,
            duration,
            tags: std::mem::take(&mut state.tags),
            error: state.error,
        };
        drop(state);
        self.inner.sink.accept(data);
    }
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("trace_id", &self.inner.context.trace_id)
            .field("span_id", &self.inner.context.span_id)
            .field("finished", &self.is_finished())
            .finish()
    }
}
