// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Instrumentation selection: which types get which advice.
//!
//! The bytecode-rewriting agent decided per loaded class whether to rewrite
//! it; here the same decision is made over explicit type descriptors, and
//! the "rewriting" is an explicit, statically-composed dispatch through the
//! selected advice chain. The moving parts:
//!
//! - [`types`]: descriptors for types/methods and the reachable-type index
//!   of one library universe (the classloader analogue)
//! - [`matcher`]: the predicate trees evaluated per type and per method,
//!   with a cached per-index fast-reject path
//! - [`module`]: the contract an integration module implements
//! - [`registry`]: the ordered module list, built once at startup, and the
//!   planner producing per-type advice bindings
//! - [`advice`] / [`dispatch`]: the enter/exit hook contract and the
//!   panic-isolated dispatcher that runs a bound chain around a call
//!
//! Matching runs on the application's class-resolution path, so it never
//! propagates failures: an unresolvable supertype is "no match", a
//! panicking advice hook is logged and ignored, and the wrapped call's own
//! semantics are preserved bit for bit.

#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(unused_extern_crates)]

pub mod advice;
pub mod dispatch;
pub mod error;
pub mod matcher;
pub mod module;
pub mod registry;
pub mod types;

pub use advice::{Advice, CallOutcome, EnterState, MethodCall};
pub use dispatch::{dispatch, MethodBinding};
pub use error::RegistryError;
pub use matcher::{IndexMatcher, MethodMatcher, TypeMatcher};
pub use module::{InstrumentationModule, StoreAssociation, TypeInstrumentation};
pub use registry::{InstrumentationPlan, Registry, RegistryBuilder};
pub use types::{MethodDescriptor, TypeDescriptor, TypeIndex};
