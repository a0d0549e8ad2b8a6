// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span factory wired to a sink and a configuration.
//!
//! The tracer is an explicit value, not a process-wide singleton: embedders
//! construct one at startup and hand clones to whatever needs to start
//! spans. Tests instantiate isolated tracers with in-memory sinks.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::Config;
use crate::context::SpanContext;
use crate::scope::{self, Scope};
use crate::sink::SpanSink;
use crate::span::Span;

/// Creates spans parented from the active context and reports them to the
/// injected sink. Cloning is cheap and clones share the same sink.
#[derive(Clone)]
pub struct Tracer {
    inner: Arc<TracerInner>,
}

struct TracerInner {
    config: Arc<Config>,
    sink: Arc<dyn SpanSink>,
}

impl Tracer {
    pub fn new(config: Arc<Config>, sink: Arc<dyn SpanSink>) -> Self {
        Self {
            inner: Arc::new(TracerInner { config, sink }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Starts a span parented from the context active on this thread, or a
    /// new root span when none is active.
    pub fn start_span(&self, operation_name: &str) -> Span {
        self.start_span_with_parent(operation_name, scope::current().map(|span| span.context()))
    }

    /// Starts a span with an explicit parent, e.g. one extracted from an
    /// incoming request or restored from a propagated snapshot.
    pub fn start_span_with_parent(
        &self,
        operation_name: &str,
        parent: Option<SpanContext>,
    ) -> Span {
        let context = match parent {
            Some(parent) => SpanContext::new(parent.trace_id, next_id())
                .with_priority(parent.sampling_priority),
            None => SpanContext::new(next_id(), next_id()),
        };
        Span::start(
            context,
            parent.map(|parent| parent.span_id),
            operation_name,
            &self.inner.config.service_name,
            self.inner.config.trace_enabled,
            self.inner.sink.clone(),
        )
    }

    /// Makes `span` the active context on this thread for the lifetime of
    /// the returned scope.
    pub fn activate(&self, span: &Span) -> Scope {
        scope::activate(span.clone())
    }

    /// The currently active span on this thread, if any.
    pub fn active_span(&self) -> Option<Span> {
        scope::current()
    }
}

/// Nonzero 63-bit identifier; the sign bit stays clear for backends that
/// store ids as signed integers.
fn next_id() -> u64 {
    loop {
        let id = (Uuid::new_v4().as_u128() as u64) & (u64::MAX >> 1);
        if id != 0 {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn tracer() -> (Tracer, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        let tracer = Tracer::new(Arc::new(Config::default()), sink.clone());
        (tracer, sink)
    }

    #[test]
    fn root_span_has_no_parent() {
        let (tracer, sink) = tracer();
        let span = tracer.start_span("root.op");
        span.finish();
        let spans = sink.spans();
        assert_eq!(spans[0].parent_id, None);
        assert_ne!(spans[0].trace_id, 0);
        assert_eq!(spans[0].service_name, "unnamed-app");
    }

    #[test]
    fn child_inherits_trace_and_parent_from_active_scope() {
        let (tracer, sink) = tracer();
        let parent = tracer.start_span("parent.op");
        let parent_context = parent.context();
        {
            let _scope = tracer.activate(&parent);
            let child = tracer.start_span("child.op");
            assert_eq!(child.context().trace_id, parent_context.trace_id);
            child.finish();
        }
        parent.finish();
        let spans = sink.spans();
        assert_eq!(spans[0].operation_name, "child.op");
        assert_eq!(spans[0].parent_id, Some(parent_context.span_id));
    }

    #[test]
    fn explicit_parent_overrides_scope() {
        let (tracer, sink) = tracer();
        let remote = SpanContext::new(77, 88).with_priority(2);
        let span = tracer.start_span_with_parent("server.request", Some(remote));
        span.finish();
        let spans = sink.spans();
        assert_eq!(spans[0].trace_id, 77);
        assert_eq!(spans[0].parent_id, Some(88));
        assert_eq!(spans[0].sampling_priority, 2);
    }

    #[test]
    fn disabled_tracer_reports_nothing() {
        let sink = Arc::new(MemorySink::default());
        let config = Config {
            trace_enabled: false,
            ..Config::default()
        };
        let tracer = Tracer::new(Arc::new(config), sink.clone());
        let span = tracer.start_span("ignored.op");
        span.set_tag("key", "value");
        span.finish();
        assert!(sink.is_empty());
    }

    #[test]
    fn generated_ids_are_positive() {
        for _ in 0..64 {
            let id = next_id();
            assert!(id != 0);
            assert!(id <= u64::MAX >> 1);
        }
    }
}
