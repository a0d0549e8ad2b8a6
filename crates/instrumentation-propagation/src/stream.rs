// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Context propagation and span completion for streams.
//!
//! Subscribing to a stream is the submission boundary; every subsequent
//! notification — an item, the end of the stream, an error, or the
//! subscriber walking away — is an execution boundary that can land on a
//! different thread. Both wrappers reinstall the subscription-time context
//! around every `poll_next`. The span-owning variants finish on the first
//! terminal signal only: end of stream, first error ([`SpanStream`]), or
//! drop before either (cancellation, e.g. an abandoned subscription).

use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use pin_project_lite::pin_project;

use instrumentation_core::Span;

use crate::completion::CompletionGuard;
use crate::snapshot::ContextSnapshot;

pin_project! {
    /// A stream polled under the context captured at wrap time, optionally
    /// finishing a span on its terminal signal.
    pub struct TracedStream<S> {
        #[pin]
        inner: S,
        snapshot: ContextSnapshot,
        completion: Option<CompletionGuard>,
    }
}

impl<S> TracedStream<S> {
    /// Context propagation only; span lifecycle stays with the caller.
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            snapshot: ContextSnapshot::capture(),
            completion: None,
        }
    }

    /// Additionally finishes `span` when the stream ends or is dropped
    /// before ending.
    pub fn with_span(inner: S, span: Span) -> Self {
        Self {
            inner,
            snapshot: ContextSnapshot::capture(),
            completion: Some(CompletionGuard::new(span)),
        }
    }
}

impl<S: Stream> Stream for TracedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _scope = this.snapshot.activate();
        let polled = this.inner.poll_next(cx);
        if let Poll::Ready(None) = polled {
            if let Some(completion) = this.completion {
                completion.complete();
            }
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

pin_project! {
    /// A fallible stream owning its span's completion: the span finishes
    /// on the first error, the end of the stream, or drop — whichever
    /// comes first. Items keep flowing after the first error; later
    /// signals no longer touch the span.
    pub struct SpanStream<S> {
        #[pin]
        inner: S,
        snapshot: ContextSnapshot,
        completion: CompletionGuard,
    }
}

impl<S> SpanStream<S> {
    pub fn new(inner: S, span: Span) -> Self {
        Self {
            inner,
            snapshot: ContextSnapshot::capture(),
            completion: CompletionGuard::new(span),
        }
    }
}

impl<S, T, E> Stream for SpanStream<S>
where
    S: Stream<Item = Result<T, E>>,
    E: std::fmt::Display,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        let _scope = this.snapshot.activate();
        match this.inner.poll_next(cx) {
            Poll::Ready(Some(Err(error))) => {
                this.completion.fail(&error);
                Poll::Ready(Some(Err(error)))
            }
            Poll::Ready(None) => {
                this.completion.complete();
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
