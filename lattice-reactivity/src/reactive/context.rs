//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a tracked value is read,
//! the current computation is registered as a dependent.
//!
//! # Implementation
//!
//! Each [`Runtime`](super::Runtime) owns one context holding a stack of
//! running jobs. Running an effect pushes its job; the returned guard pops it
//! when dropped, including during unwinding.
//!
//! This design supports nested computations (an effect created or run while
//! another effect runs, or a derived cell read inside an effect): reads are
//! always recorded against the innermost job.

use std::cell::{Cell, RefCell};

use super::subscriber::{EffectId, Job};

/// Stack of running jobs plus the tracking switch.
pub(crate) struct ReactiveContext {
    stack: RefCell<Vec<Job>>,
    /// Cleared by `pause_tracking`, set again for every effect run.
    tracking: Cell<bool>,
}

impl ReactiveContext {
    pub(crate) fn new() -> Self {
        Self {
            stack: RefCell::new(Vec::new()),
            tracking: Cell::new(true),
        }
    }

    /// Enter a new reactive context for `job`.
    ///
    /// While the guard lives, reads register `job` as a dependent.
    pub(crate) fn enter(&self, job: Job) -> ContextGuard<'_> {
        let id = job.id();
        self.stack.borrow_mut().push(job);
        let was_tracking = self.tracking.replace(true);
        ContextGuard {
            context: self,
            id,
            was_tracking,
        }
    }

    /// Suspend tracking until the guard is dropped.
    pub(crate) fn pause_tracking(&self) -> TrackingGuard<'_> {
        let was_tracking = self.tracking.replace(false);
        TrackingGuard {
            context: self,
            was_tracking,
        }
    }

    /// Check if there is a running job.
    pub(crate) fn is_active(&self) -> bool {
        !self.stack.borrow().is_empty()
    }

    /// Whether a read right now would be recorded.
    pub(crate) fn is_tracking(&self) -> bool {
        self.tracking.get() && self.is_active()
    }

    /// The innermost running job, if any.
    pub(crate) fn current(&self) -> Option<Job> {
        self.stack.borrow().last().cloned()
    }

    /// Whether `id` is anywhere on the stack.
    pub(crate) fn contains(&self, id: EffectId) -> bool {
        self.stack.borrow().iter().any(|job| job.id() == id)
    }

    pub(crate) fn depth(&self) -> usize {
        self.stack.borrow().len()
    }
}

/// Pops the context when dropped.
pub(crate) struct ContextGuard<'a> {
    context: &'a ReactiveContext,
    id: EffectId,
    was_tracking: bool,
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        let popped = self.context.stack.borrow_mut().pop();
        self.context.tracking.set(self.was_tracking);

        if let Some(job) = popped {
            debug_assert_eq!(
                job.id(),
                self.id,
                "ReactiveContext mismatch: expected {:?}, got {:?}",
                self.id,
                job.id()
            );
        }
    }
}

/// Restores the previous tracking state when dropped.
pub(crate) struct TrackingGuard<'a> {
    context: &'a ReactiveContext,
    was_tracking: bool,
}

impl Drop for TrackingGuard<'_> {
    fn drop(&mut self) {
        self.context.tracking.set(self.was_tracking);
    }
}
