// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Core runtime for the instrumentation components.
//!
//! This crate carries the pieces every integration adapter builds on:
//! - [`Span`] / [`Tracer`]: span handles with exactly-once finish semantics
//!   and a constructor-injected sink for finished span records
//! - [`scope`]: the thread-local "currently active context" stack with RAII
//!   restoration on every exit path
//! - [`CallDepth`]: per-thread, per-marker nesting counters used to suppress
//!   duplicate spans for nested instrumented calls
//! - [`ContextStore`]: a concurrent, weakly-keyed association table attaching
//!   agent state to instances owned by instrumented libraries
//! - [`Config`]: environment-driven configuration read once at startup
//!
//! Nothing in this crate installs process-global state; registries, stores
//! and tracers are plain values handed to the code that needs them, so tests
//! and embedders can run isolated instances side by side.
//!
//! The overriding design rule is that instrumentation must be invisible on
//! failure: internal errors are logged at `debug` and swallowed, and no
//! operation here ever panics into the instrumented application's call path.

#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(unused_extern_crates)]

pub mod call_depth;
pub mod config;
pub mod context;
pub mod decorator;
pub mod error;
pub mod scope;
pub mod sink;
pub mod span;
pub mod store;
pub mod tracer;

pub use call_depth::{CallDepth, DepthGuard};
pub use config::Config;
pub use context::SpanContext;
pub use decorator::Decorator;
pub use error::ConfigError;
pub use scope::Scope;
pub use sink::{ChannelSink, MemorySink, NoopSink, SpanSink};
pub use span::{Span, SpanData};
pub use store::ContextStore;
pub use tracer::Tracer;
