// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Per-thread, per-marker nesting counters for span suppression.
//!
//! When an instrumented method internally calls another instrumented method
//! of the same integration on the same thread, only the outermost call may
//! create a span; the inner ones must be no-ops or every logical operation
//! would produce a cascade of duplicates. The counter is scoped by a marker
//! type — conventionally a zero-sized type owned by the integration — so
//! unrelated integrations sharing a thread never interfere with each other.
//!
//! The exit discipline matches the enter site: advice that checked
//! `enter() == 0` resets the counter on its (outermost) exit, which also
//! clears any depth accumulated by suppressed inner calls. Suppressed inner
//! exits run harmlessly and touch nothing. An unbalanced counter would
//! permanently suppress (or stop suppressing) tracing for the thread, so
//! exit paths that can unwind should hold a [`DepthGuard`].

use std::any::TypeId;
use std::cell::RefCell;
use std::collections::HashMap;
use std::marker::PhantomData;

thread_local! {
    static CALL_DEPTHS: RefCell<HashMap<TypeId, usize>> = RefCell::new(HashMap::new());
}

/// Nesting counter for marker type `M` on the current thread.
pub struct CallDepth<M: 'static>(PhantomData<fn() -> M>);

impl<M: 'static> CallDepth<M> {
    /// Increments the counter and returns the pre-increment depth; a return
    /// of `0` means the caller is the outermost call for this marker.
    pub fn enter() -> usize {
        enter_key(TypeId::of::<M>())
    }

    /// Decrements the counter (saturating at zero) and returns the new
    /// depth. The alternative exit discipline for call sites that pair
    /// every enter with a decrement instead of resetting at the outermost
    /// exit.
    pub fn decrement() -> usize {
        decrement_key(TypeId::of::<M>())
    }

    /// Returns the counter to its baseline of zero.
    pub fn reset() {
        reset_key(TypeId::of::<M>());
    }

    /// Current depth without modification.
    pub fn current() -> usize {
        current_key(TypeId::of::<M>())
    }

    /// Guard that resets this marker's counter when dropped; used around
    /// bodies that may unwind past the explicit exit call.
    pub fn reset_on_drop() -> DepthGuard {
        DepthGuard {
            key: TypeId::of::<M>(),
            _not_send: PhantomData,
        }
    }
}

/// Resets a marker's counter on drop, unwinding included.
#[must_use = "the guard resets the counter when dropped"]
pub struct DepthGuard {
    key: TypeId,
    _not_send: PhantomData<*const ()>,
}

impl Drop for DepthGuard {
    fn drop(&mut self) {
        reset_key(self.key);
    }
}

fn enter_key(key: TypeId) -> usize {
    CALL_DEPTHS
        .try_with(|depths| {
            let mut depths = depths.borrow_mut();
            let depth = depths.entry(key).or_insert(0);
            let previous = *depth;
            *depth += 1;
            previous
        })
        .unwrap_or(0)
}

fn decrement_key(key: TypeId) -> usize {
    CALL_DEPTHS
        .try_with(|depths| {
            let mut depths = depths.borrow_mut();
            let depth = depths.entry(key).or_insert(0);
            *depth = depth.saturating_sub(1);
            *depth
        })
        .unwrap_or(0)
}

fn reset_key(key: TypeId) {
    let _ = CALL_DEPTHS.try_with(|depths| {
        depths.borrow_mut().remove(&key);
    });
}

fn current_key(key: TypeId) -> usize {
    CALL_DEPTHS
        .try_with(|depths| depths.borrow().get(&key).copied().unwrap_or(0))
        .unwrap_or(0)
}
