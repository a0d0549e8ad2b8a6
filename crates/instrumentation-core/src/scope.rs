// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The thread-local "currently active context" stack.
//!
//! Activating a span pushes it onto the calling thread's stack and returns a
//! [`Scope`] guard; dropping the guard restores the previously active
//! context. Guards restore on every exit path, including panic unwinding, so
//! a pooled worker thread never keeps another request's context after its
//! task body exits.
//!
//! Scopes are expected to close in LIFO order, which the guard pattern
//! enforces naturally; an out-of-order close (possible when guards are
//! stored in structs) removes its own entry and logs at `debug` instead of
//! corrupting the rest of the stack.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;

use crate::span::Span;

thread_local! {
    static ACTIVE: RefCell<Vec<ScopeEntry>> = RefCell::new(Vec::new());
}

static NEXT_SCOPE_ID: AtomicU64 = AtomicU64::new(1);

struct ScopeEntry {
    span: Span,
    scope_id: u64,
}

/// RAII guard for an activated context; restores the previous context on
/// drop. Deliberately `!Send`: a scope belongs to the thread that opened it.
#[must_use = "dropping the scope immediately deactivates the context"]
pub struct Scope {
    scope_id: u64,
    _not_send: PhantomData<*const ()>,
}

/// Returns the innermost active span on this thread, if any.
pub fn current() -> Option<Span> {
    ACTIVE
        .try_with(|stack| stack.borrow().last().map(|entry| entry.span.clone()))
        .ok()
        .flatten()
}

/// Number of contexts stacked on this thread; a diagnostic used to detect
/// double-activation in tests and debug logging.
pub fn depth() -> usize {
    ACTIVE.try_with(|stack| stack.borrow().len()).unwrap_or(0)
}

/// Makes `span` the active context for the calling thread until the
/// returned scope is dropped.
pub fn activate(span: Span) -> Scope {
    let scope_id = NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed);
    ACTIVE.with(|stack| {
        stack.borrow_mut().push(ScopeEntry { span, scope_id });
    });
    Scope {
        scope_id,
        _not_send: PhantomData,
    }
}

impl Drop for Scope {
    fn drop(&mut self) {
        // try_with: the thread-local may already be torn down during thread
        // exit, in which case there is nothing left to restore.
        let _ = ACTIVE.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.iter().rposition(|entry| entry.scope_id == self.scope_id) {
                Some(index) => {
                    if index != stack.len() - 1 {
                        debug!("closing context scope out of order");
                    }
                    stack.remove(index);
                }
                None => debug!("context scope already removed"),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SpanContext;
    use crate::sink::MemorySink;
    use std::sync::Arc;

    fn make_span(span_id: u64) -> Span {
        Span::start(
            SpanContext::new(1, span_id),
            None,
            "scope.test",
            "svc",
            true,
            Arc::new(MemorySink::default()),
        )
    }

    #[test]
    fn activation_nests_and_restores() {
        assert!(current().is_none());
        let outer = make_span(1);
        let scope_outer = activate(outer.clone());
        assert_eq!(current().map(|span| span.context().span_id), Some(1));
        {
            let inner = make_span(2);
            let _scope_inner = activate(inner);
            assert_eq!(current().map(|span| span.context().span_id), Some(2));
        }
        assert_eq!(current().map(|span| span.context().span_id), Some(1));
        drop(scope_outer);
        assert!(current().is_none());
    }

    #[test]
    fn restores_on_panic_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _scope = activate(make_span(3));
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(current().is_none());
        assert_eq!(depth(), 0);
    }

    #[test]
    fn out_of_order_close_keeps_stack_consistent() {
        let first = activate(make_span(4));
        let second = activate(make_span(5));
        drop(first);
        assert_eq!(current().map(|span| span.context().span_id), Some(5));
        drop(second);
        assert!(current().is_none());
    }

    #[test]
    fn threads_have_independent_stacks() {
        let _scope = activate(make_span(6));
        let handle = std::thread::spawn(|| current().is_none());
        assert!(handle.join().expect("thread should not panic"));
    }
}
