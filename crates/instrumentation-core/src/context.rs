// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Propagation identity of a span.
//!
//! A [`SpanContext`] is the minimal value carried across process, thread and
//! task boundaries to link child spans to their parents: the 64-bit trace and
//! span identifiers plus the sampling decision. All spans of one distributed
//! trace share the same `trace_id`.

/// Standard sampling priority values.
///
/// - `-1`: user reject (drop)
/// - `0`: auto reject (sampled out)
/// - `1`: auto keep (sampled in, default)
/// - `2`: user keep (explicit retention)
pub mod priority {
    pub const USER_REJECT: i8 = -1;
    pub const AUTO_REJECT: i8 = 0;
    pub const AUTO_KEEP: i8 = 1;
    pub const USER_KEEP: i8 = 2;
}

/// Trace-linkage identity of a single span.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpanContext {
    /// Identifier shared by every span in the trace.
    pub trace_id: u64,
    /// Identifier of this span within the trace.
    pub span_id: u64,
    /// Sampling priority propagated from the root span.
    pub sampling_priority: i8,
}

impl SpanContext {
    pub fn new(trace_id: u64, span_id: u64) -> Self {
        Self {
            trace_id,
            span_id,
            sampling_priority: priority::AUTO_KEEP,
        }
    }

    pub fn with_priority(mut self, sampling_priority: i8) -> Self {
        self.sampling_priority = sampling_priority;
        self
    }
}
