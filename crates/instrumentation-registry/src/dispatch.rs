// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runs a bound advice chain around an intercepted call.
//!
//! This is the statically-composed stand-in for injected bytecode: the
//! generated (or hand-written) wrapper at a call site looks up its
//! [`MethodBinding`] in the instrumentation plan and routes the original
//! body through [`dispatch`]. The dispatcher owns the two hard guarantees:
//!
//! - advice failure is invisible: every hook runs under `catch_unwind`,
//!   and a panicking hook changes nothing about the call
//! - exit advice always runs: on normal return, on error, and on unwind
//!   (the panic resumes after the exits have fired)
//!
//! Enter hooks run in binding order, exit hooks in reverse order, so
//! advice nests like the call frames it decorates.

use std::any::{Any, TypeId};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use crate::advice::{Advice, BoxedValue, CallOutcome, EnterState, MethodCall, MethodRef};

/// One advice attached to a method, remembering the module that bound it.
pub struct BoundAdvice {
    pub module: String,
    pub hook: Arc<dyn Advice>,
}

/// The ordered advice chain selected for one method of one type.
pub struct MethodBinding {
    method: MethodRef,
    advice: Vec<BoundAdvice>,
}

impl MethodBinding {
    pub(crate) fn new(method: MethodRef) -> Self {
        Self {
            method,
            advice: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, module: &str, hook: Arc<dyn Advice>) {
        self.advice.push(BoundAdvice {
            module: module.to_string(),
            hook,
        });
    }

    /// Whether `module` already contributed this exact advice; the planner
    /// uses this to keep bindings idempotent when a module's matchers
    /// overlap.
    pub(crate) fn contains(&self, module: &str, hook: &Arc<dyn Advice>) -> bool {
        self.advice
            .iter()
            .any(|bound| bound.module == module && Arc::ptr_eq(&bound.hook, hook))
    }

    pub fn method(&self) -> &MethodRef {
        &self.method
    }

    pub fn advice(&self) -> &[BoundAdvice] {
        &self.advice
    }

    pub fn is_empty(&self) -> bool {
        self.advice.is_empty()
    }
}

/// Invokes `body` with the binding's advice chain wrapped around it.
///
/// `args` are the call's arguments, boxed so enter advice can inspect or
/// replace them; the body receives the (possibly modified) slots back and
/// downcasts to its real parameter types. The wrapped call's result is
/// returned unchanged unless exit advice explicitly replaced the return
/// value or suppressed the error with a type-checked substitute.
pub fn dispatch<V, E, F>(
    binding: &MethodBinding,
    target: Option<&dyn Any>,
    mut args: Vec<BoxedValue>,
    body: F,
) -> Result<V, E>
where
    V: Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
    F: FnOnce(&mut Vec<BoxedValue>) -> Result<V, E>,
{
    let expected_return = TypeId::of::<V>();

    let mut enter_states: Vec<Option<EnterState>> = Vec::with_capacity(binding.advice.len());
    for bound in &binding.advice {
        let mut call = MethodCall::new(&binding.method, target, &mut args);
        let state = panic::catch_unwind(AssertUnwindSafe(|| bound.hook.on_enter(&mut call)))
            .unwrap_or_else(|_| {
                debug!(
                    module = %bound.module,
                    method = %binding.method,
                    "enter advice panicked, ignoring"
                );
                None
            });
        enter_states.push(state);
    }

    let body_result = panic::catch_unwind(AssertUnwindSafe(|| body(&mut args)));
    let (mut outcome, panic_payload) = match body_result {
        Ok(Ok(value)) => (
            CallOutcome::returned(expected_return, Box::new(value)),
            None,
        ),
        Ok(Err(error)) => (
            CallOutcome::errored(expected_return, Box::new(error)),
            None,
        ),
        Err(payload) => (CallOutcome::panicked(expected_return), Some(payload)),
    };

    for (bound, state) in binding.advice.iter().zip(enter_states).rev() {
        let mut call = MethodCall::new(&binding.method, target, &mut args);
        let hook_run = panic::catch_unwind(AssertUnwindSafe(|| {
            bound.hook.on_exit(&mut call, state, &mut outcome);
        }));
        if hook_run.is_err() {
            debug!(
                module = %bound.module,
                method = %binding.method,
                "exit advice panicked, ignoring"
            );
        }
    }

    if let Some(payload) = panic_payload {
        panic::resume_unwind(payload);
    }

    match outcome.into_kind() {
        crate::advice::OutcomeInner::Return { value } => match value.downcast::<V>() {
            Ok(value) => Ok(*value),
            // Replacements are type-checked before installation; the
            // original value was boxed from V above.
            Err(_) => unreachable!("return slot holds a type-checked value"),
        },
        crate::advice::OutcomeInner::Error { error } => match error.downcast::<E>() {
            Ok(error) => Err(*error),
            Err(_) => unreachable!("error slot holds the body's own error type"),
        },
        crate::advice::OutcomeInner::Panic => {
            unreachable!("panic outcomes resume before resolution")
        }
    }
}
