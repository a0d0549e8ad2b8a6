// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Destination for finished span records.
//!
//! The exporter proper (batching, serialization, transport) lives outside
//! this repository; the core hands each finished [`SpanData`] to a
//! [`SpanSink`] exactly once and moves on. Sinks must not block: the accept
//! call happens on whatever application thread finished the span.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::debug;

use crate::span::SpanData;

/// Receives each finished span exactly once.
pub trait SpanSink: Send + Sync {
    fn accept(&self, span: SpanData);
}

/// Forwards finished spans into an unbounded channel, typically drained by
/// an exporter task. Dropping the receiver quietly discards further spans;
/// a tracing pipeline shutting down must never take the application with it.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SpanData>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SpanData>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl SpanSink for ChannelSink {
    fn accept(&self, span: SpanData) {
        if self.tx.send(span).is_err() {
            debug!("span receiver dropped, discarding finished span");
        }
    }
}

/// Collects spans in memory; the sink used throughout the test suites.
#[derive(Default)]
pub struct MemorySink {
    spans: Mutex<Vec<SpanData>>,
}

impl MemorySink {
    /// Snapshot of everything accepted so far.
    pub fn spans(&self) -> Vec<SpanData> {
        self.spans.lock().map(|spans| spans.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.spans.lock().map(|spans| spans.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SpanSink for MemorySink {
    fn accept(&self, span: SpanData) {
        if let Ok(mut spans) = self.spans.lock() {
            spans.push(span);
        }
    }
}

/// Discards everything; the sink behind a disabled tracer.
#[derive(Default, Clone, Copy)]
pub struct NoopSink;

impl SpanSink for NoopSink {
    fn accept(&self, _span: SpanData) {}
}
