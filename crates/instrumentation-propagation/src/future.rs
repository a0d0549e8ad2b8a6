// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Context propagation and span completion for futures.
//!
//! A future's polls land on whatever thread the runtime chooses. The
//! wrappers reinstall the captured context around every poll and restore
//! the polling thread's previous context before yielding back to the
//! runtime, so pooled runtime threads never bleed contexts between tasks.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use pin_project_lite::pin_project;

use instrumentation_core::Span;

use crate::completion::CompletionGuard;
use crate::snapshot::ContextSnapshot;

pin_project! {
    /// A future polled under the context captured at creation time.
    pub struct Traced<F> {
        #[pin]
        inner: F,
        snapshot: ContextSnapshot,
    }
}

impl<F: Future> Future for Traced<F> {
    type Output = F::Output;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _scope = this.snapshot.activate();
        this.inner.poll(cx)
    }
}

pin_project! {
    /// A fallible future that owns its span's completion: finished with
    /// the first outcome — `Ok`, `Err`, or drop-before-ready
    /// (cancellation) — exactly once.
    pub struct SpanFuture<F> {
        #[pin]
        inner: F,
        snapshot: ContextSnapshot,
        completion: CompletionGuard,
    }
}

impl<F, T, E> Future for SpanFuture<F>
where
    F: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let _scope = this.snapshot.activate();
        match this.inner.poll(cx) {
            Poll::Ready(Ok(value)) => {
                this.completion.complete();
                Poll::Ready(Ok(value))
            }
            Poll::Ready(Err(error)) => {
                this.completion.fail(&error);
                Poll::Ready(Err(error))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Wrapping combinators for futures crossing an instrumented boundary.
pub trait TracedFutureExt: Future + Sized {
    /// Polls under the context active on the constructing thread.
    fn in_current_context(self) -> Traced<Self> {
        Traced {
            inner: self,
            snapshot: ContextSnapshot::capture(),
        }
    }

    /// Like [`TracedFutureExt::in_current_context`], additionally
    /// finishing `span` exactly once with the future's first outcome.
    fn complete_span(self, span: Span) -> SpanFuture<Self> {
        SpanFuture {
            inner: self,
            snapshot: ContextSnapshot::capture(),
            completion: CompletionGuard::new(span),
        }
    }
}

impl<F: Future> TracedFutureExt for F {}

#[cfg(test)]
mod tests {
    use super::*;
    use instrumentation_core::{scope, Config, MemorySink, Tracer};
    use std::sync::Arc;

    fn tracer_with_sink() -> (Tracer, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::default());
        (
            Tracer::new(Arc::new(Config::default()), sink.clone()),
            sink,
        )
    }

    #[tokio::test]
    async fn polls_run_under_the_captured_context() {
        let (tracer, _sink) = tracer_with_sink();
        let span = tracer.start_span("async.op");
        let expected = span.context().span_id;
        let future = {
            let _scope = tracer.activate(&span);
            async move { scope::current().map(|s| s.context().span_id) }.in_current_context()
        };
        assert!(scope::current().is_none());
        assert_eq!(future.await, Some(expected));
        assert!(scope::current().is_none());
    }

    #[tokio::test]
    async fn success_finishes_the_span_once() {
        let (tracer, sink) = tracer_with_sink();
        let span = tracer.start_span("async.op");
        let result: Result<u32, std::io::Error> =
            async { Ok(5) }.complete_span(span.clone()).await;
        assert_eq!(result.unwrap(), 5);
        assert_eq!(sink.len(), 1);
        assert!(span.is_finished());
    }

    #[tokio::test]
    async fn failure_finishes_the_span_flagged() {
        let (tracer, sink) = tracer_with_sink();
        let span = tracer.start_span("async.op");
        let result: Result<u32, String> =
            async { Err("timed out".to_string()) }.complete_span(span).await;
        assert!(result.is_err());
        let spans = sink.spans();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].error);
        assert_eq!(
            spans[0].tags.get("error.message").map(String::as_str),
            Some("timed out")
        );
    }

    #[tokio::test]
    async fn dropping_an_unfinished_future_cancels_the_span() {
        let (tracer, sink) = tracer_with_sink();
        let span = tracer.start_span("async.op");
        let future = std::future::pending::<Result<u32, String>>().complete_span(span);
        drop(future);
        let spans = sink.spans();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].tags.get("canceled").map(String::as_str), Some("true"));
    }
}
