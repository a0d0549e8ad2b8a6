// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The enter/exit hook contract advice classes implement.
//!
//! Advice sees the intercepted call through [`MethodCall`] (identity,
//! target, argument slots) and — on exit — through [`CallOutcome`] (return
//! value or error). Values cross this boundary type-erased; advice
//! downcasts to the concrete types its matchers guaranteed. Return-value
//! replacement is checked against the call's real return type and silently
//! dropped on mismatch: a buggy advice must never corrupt the call.

use std::any::{Any, TypeId};
use std::fmt;

use tracing::debug;

/// Boxed argument or return value.
pub type BoxedValue = Box<dyn Any + Send>;
/// Boxed error produced by the wrapped call.
pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;
/// Opaque state handed from an advice's enter hook to its exit hook.
pub type EnterState = Box<dyn Any>;

/// Identity of an instrumented method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodRef {
    pub type_name: String,
    pub method_name: String,
}

impl MethodRef {
    pub fn new(type_name: &str, method_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            method_name: method_name.to_string(),
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.type_name, self.method_name)
    }
}

/// View of an intercepted call handed to advice hooks.
pub struct MethodCall<'a> {
    method: &'a MethodRef,
    target: Option<&'a dyn Any>,
    args: &'a mut Vec<BoxedValue>,
}

impl<'a> MethodCall<'a> {
    pub(crate) fn new(
        method: &'a MethodRef,
        target: Option<&'a dyn Any>,
        args: &'a mut Vec<BoxedValue>,
    ) -> Self {
        Self { method, target, args }
    }

    pub fn method(&self) -> &MethodRef {
        self.method
    }

    /// The receiver of the intercepted call, when it has one.
    pub fn target(&self) -> Option<&dyn Any> {
        self.target
    }

    pub fn args_len(&self) -> usize {
        self.args.len()
    }

    pub fn arg(&self, position: usize) -> Option<&(dyn Any + Send)> {
        self.args.get(position).map(|value| value.as_ref())
    }

    /// Downcast view of one argument.
    pub fn arg_ref<T: 'static>(&self, position: usize) -> Option<&T> {
        self.args.get(position)?.downcast_ref::<T>()
    }

    /// Replaces an argument slot, e.g. swapping a submitted task for its
    /// context-propagating wrapper. The replacement must be of a type the
    /// call site can consume; the original value is returned so advice can
    /// wrap rather than discard it.
    pub fn replace_arg(&mut self, position: usize, value: BoxedValue) -> Option<BoxedValue> {
        let slot = self.args.get_mut(position)?;
        Some(std::mem::replace(slot, value))
    }
}

enum OutcomeKind {
    Return {
        value: BoxedValue,
        replaced: Option<BoxedValue>,
    },
    Error {
        error: BoxedError,
        replacement: Option<BoxedValue>,
    },
    Panic,
}

/// Result of the wrapped call as visible to exit advice.
pub struct CallOutcome {
    expected_return: TypeId,
    kind: OutcomeKind,
}

impl CallOutcome {
    pub(crate) fn returned(expected_return: TypeId, value: BoxedValue) -> Self {
        Self {
            expected_return,
            kind: OutcomeKind::Return {
                value,
                replaced: None,
            },
        }
    }

    pub(crate) fn errored(expected_return: TypeId, error: BoxedError) -> Self {
        Self {
            expected_return,
            kind: OutcomeKind::Error {
                error,
                replacement: None,
            },
        }
    }

    pub(crate) fn panicked(expected_return: TypeId) -> Self {
        Self {
            expected_return,
            kind: OutcomeKind::Panic,
        }
    }

    /// Whether the call failed with an error (panics are reported
    /// separately by [`CallOutcome::is_panic`]).
    pub fn is_error(&self) -> bool {
        matches!(self.kind, OutcomeKind::Error { .. })
    }

    /// Whether the call is unwinding; the panic always resumes after exit
    /// advice runs, it cannot be suppressed.
    pub fn is_panic(&self) -> bool {
        matches!(self.kind, OutcomeKind::Panic)
    }

    /// The error the call produced, if any.
    pub fn error(&self) -> Option<&(dyn std::error::Error + Send + Sync + 'static)> {
        match &self.kind {
            OutcomeKind::Error { error, .. } => Some(error.as_ref()),
            _ => None,
        }
    }

    /// The value the call will return: the replacement when one was
    /// installed, the original otherwise.
    pub fn return_value(&self) -> Option<&(dyn Any + Send)> {
        match &self.kind {
            OutcomeKind::Return { value, replaced } => {
                Some(replaced.as_deref().unwrap_or(value.as_ref()))
            }
            _ => None,
        }
    }

    /// Installs a replacement return value. Ignored (with a debug log)
    /// when the call errored/panicked or the replacement's type does not
    /// match the call's return type.
    pub fn replace_return(&mut self, value: BoxedValue) -> bool {
        if (*value).type_id() != self.expected_return {
            debug!("discarding return replacement of mismatched type");
            return false;
        }
        match &mut self.kind {
            OutcomeKind::Return { replaced, .. } => {
                *replaced = Some(value);
                true
            }
            _ => {
                debug!("cannot replace the return value of a failed call");
                false
            }
        }
    }

    /// Swallows the call's error, substituting `replacement` as the return
    /// value. The replacement must match the call's return type or the
    /// error propagates unchanged.
    pub fn suppress_error(&mut self, replacement: BoxedValue) -> bool {
        if (*replacement).type_id() != self.expected_return {
            debug!("discarding error suppression with mismatched replacement type");
            return false;
        }
        match &mut self.kind {
            OutcomeKind::Error {
                replacement: slot, ..
            } => {
                *slot = Some(replacement);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn into_kind(self) -> OutcomeInner {
        match self.kind {
            OutcomeKind::Return { value, replaced } => OutcomeInner::Return {
                value: replaced.unwrap_or(value),
            },
            OutcomeKind::Error { error, replacement } => match replacement {
                Some(value) => OutcomeInner::Return { value },
                None => OutcomeInner::Error { error },
            },
            OutcomeKind::Panic => OutcomeInner::Panic,
        }
    }
}

/// Resolved outcome after exit advice has run; internal to the dispatcher.
pub(crate) enum OutcomeInner {
    Return { value: BoxedValue },
    Error { error: BoxedError },
    Panic,
}

/// Code injected around a matched method.
///
/// Hooks must be fast and must never fail; the dispatcher isolates panics,
/// but a hook that panics is a bug and is logged as such.
pub trait Advice: Send + Sync {
    /// Runs before the wrapped body. State returned here is handed to
    /// [`Advice::on_exit`]; returning `None` typically means "suppressed"
    /// (e.g. a nested call) and makes the exit hook a no-op by convention.
    fn on_enter(&self, _call: &mut MethodCall<'_>) -> Option<EnterState> {
        None
    }

    /// Runs after the wrapped body on every path: normal return, error,
    /// or unwind.
    fn on_exit(
        &self,
        _call: &mut MethodCall<'_>,
        _enter: Option<EnterState>,
        _outcome: &mut CallOutcome,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arg_access_and_replacement() {
        let method = MethodRef::new("db::Client", "execute");
        let mut args: Vec<BoxedValue> = vec![Box::new("select 1".to_string()), Box::new(5u32)];
        let mut call = MethodCall::new(&method, None, &mut args);

        assert_eq!(call.args_len(), 2);
        assert_eq!(call.arg_ref::<String>(0).map(String::as_str), Some("select 1"));
        assert_eq!(call.arg_ref::<u32>(1), Some(&5));
        assert!(call.arg_ref::<u32>(0).is_none());
        assert!(call.arg(9).is_none());

        let original = call.replace_arg(0, Box::new("select 2".to_string()));
        assert!(original.is_some());
        assert_eq!(call.arg_ref::<String>(0).map(String::as_str), Some("select 2"));
    }

    #[test]
    fn return_replacement_is_type_checked() {
        let mut outcome = CallOutcome::returned(TypeId::of::<u32>(), Box::new(1u32));
        assert!(!outcome.replace_return(Box::new("wrong".to_string())));
        assert!(outcome.replace_return(Box::new(2u32)));
        let value = outcome.return_value().and_then(|v| v.downcast_ref::<u32>());
        assert_eq!(value, Some(&2));
    }

    #[test]
    fn error_suppression_requires_matching_replacement() {
        let error: BoxedError = "broken".to_string().into();
        let mut outcome = CallOutcome::errored(TypeId::of::<u32>(), error);
        assert!(outcome.is_error());
        assert!(!outcome.suppress_error(Box::new("nope".to_string())));
        assert!(outcome.suppress_error(Box::new(7u32)));
        match outcome.into_kind() {
            OutcomeInner::Return { value } => {
                assert_eq!(value.downcast_ref::<u32>(), Some(&7));
            }
            _ => panic!("suppressed error should resolve to a return"),
        }
    }
}
