//! Effect Implementation
//!
//! An Effect is a computation that re-runs whenever state it read changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazy).
//!
//! 2. Before every run, the effect unsubscribes from everything it read last
//!    time. Reads during the run subscribe it again, so the dependency set
//!    always mirrors the most recent run. Branches that stop reading a value
//!    stop being woken by it.
//!
//! 3. When any dependency changes, the effect re-runs synchronously, or is
//!    handed to its scheduler if it has one.
//!
//! # Stopping
//!
//! [`Effect::stop`] drops every subscription immediately. A stopped effect
//! can still be run by hand, but it tracks nothing and is never woken again.
//!
//! # Panics
//!
//! A panicking effect body unwinds through the caller of `run` (or of the
//! write that triggered it). Subscriptions were cleared before the body ran,
//! so the effect is left subscribed to nothing rather than to stale state.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexSet;
use tracing::{debug, trace};

use super::runtime::RuntimeInner;
use super::subscriber::{DebugHook, DebuggerEvent, EffectId, Job, Runnable, Scheduler};
use crate::graph::DepId;

/// Options recognised by [`Runtime::effect_with_options`](super::Runtime::effect_with_options).
#[derive(Clone, Default)]
pub struct EffectOptions {
    pub(crate) lazy: bool,
    pub(crate) computed: bool,
    pub(crate) scheduler: Option<Scheduler>,
    pub(crate) on_track: Option<DebugHook>,
    pub(crate) on_trigger: Option<DebugHook>,
    pub(crate) on_stop: Option<Rc<dyn Fn()>>,
}

impl EffectOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Do not run on creation.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Dispatch re-runs through `scheduler` instead of running synchronously.
    pub fn scheduler(mut self, scheduler: impl Fn(&Job) + 'static) -> Self {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Called whenever the effect subscribes to a new (target, key).
    pub fn on_track(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_track = Some(Rc::new(hook));
        self
    }

    /// Called whenever a write is about to re-run or schedule the effect.
    pub fn on_trigger(mut self, hook: impl Fn(&DebuggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Rc::new(hook));
        self
    }

    /// Called once when the effect is stopped.
    pub fn on_stop(mut self, hook: impl Fn() + 'static) -> Self {
        self.on_stop = Some(Rc::new(hook));
        self
    }

    /// Mark the effect as the backing computation of a derived cell.
    pub(crate) fn computed(mut self) -> Self {
        self.computed = true;
        self
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("lazy", &self.lazy)
            .field("computed", &self.computed)
            .field("scheduler", &self.scheduler.is_some())
            .field("on_track", &self.on_track.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .field("on_stop", &self.on_stop.is_some())
            .finish()
    }
}

struct EffectInner<T: 'static> {
    id: EffectId,
    runtime: Weak<RuntimeInner>,
    func: Box<dyn Fn() -> T>,
    /// Deps subscribed to during the most recent run.
    deps: RefCell<IndexSet<DepId>>,
    active: Cell<bool>,
    run_count: Cell<usize>,
    options: EffectOptions,
}

impl<T: 'static> EffectInner<T> {
    fn run(self: &Rc<Self>) -> T {
        if !self.active.get() {
            return (self.func)();
        }
        let Some(runtime) = self.runtime.upgrade() else {
            return (self.func)();
        };

        runtime.cleanup(self.id, &self.deps);
        let _ctx = runtime.context.enter(Job::new(self.clone()));

        let run = self.run_count.get() + 1;
        self.run_count.set(run);
        trace!(effect = %self.id, run, "running effect");

        (self.func)()
    }

    fn stop(&self) {
        if !self.active.replace(false) {
            return;
        }
        match self.runtime.upgrade() {
            Some(runtime) => runtime.cleanup(self.id, &self.deps),
            None => self.deps.borrow_mut().clear(),
        }
        debug!(effect = %self.id, "effect stopped");

        if let Some(on_stop) = &self.options.on_stop {
            on_stop();
        }
    }
}

impl<T: 'static> Runnable for EffectInner<T> {
    fn id(&self) -> EffectId {
        self.id
    }

    fn run_job(self: Rc<Self>) {
        let _ = self.run();
    }

    fn stop_job(&self) {
        self.stop();
    }

    fn is_active(&self) -> bool {
        self.active.get()
    }

    fn is_computed(&self) -> bool {
        self.options.computed
    }

    fn deps(&self) -> &RefCell<IndexSet<DepId>> {
        &self.deps
    }

    fn scheduler(&self) -> Option<Scheduler> {
        self.options.scheduler.clone()
    }

    fn on_track(&self, event: &DebuggerEvent) {
        if let Some(hook) = &self.options.on_track {
            hook(event);
        }
    }

    fn on_trigger(&self, event: &DebuggerEvent) {
        if let Some(hook) = &self.options.on_trigger {
            hook(event);
        }
    }
}

/// A tracked computation returning `T`.
///
/// # Example
///
/// ```rust
/// use lattice_reactivity::Runtime;
///
/// let rt = Runtime::new();
/// let count = rt.cell(0);
///
/// let count_clone = count.clone();
/// let effect = rt.effect(move || {
///     println!("Count is: {:?}", count_clone.value());
/// });
///
/// count.set_value(5).unwrap(); // Prints: "Count is: Number(5)"
/// assert_eq!(effect.run_count(), 2);
/// ```
pub struct Effect<T: 'static = ()> {
    inner: Rc<EffectInner<T>>,
}

impl<T: 'static> Effect<T> {
    pub(crate) fn with_options<F>(runtime: &Rc<RuntimeInner>, func: F, options: EffectOptions) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let lazy = options.lazy;
        let effect = Self {
            inner: Rc::new(EffectInner {
                id: EffectId::new(),
                runtime: Rc::downgrade(runtime),
                func: Box::new(func),
                deps: RefCell::new(IndexSet::new()),
                active: Cell::new(true),
                run_count: Cell::new(0),
                options,
            }),
        };

        if !lazy {
            let _ = effect.run();
        }
        effect
    }

    /// Get the effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.inner.id
    }

    /// Run the effect now, re-deriving its dependencies, and return the
    /// body's result.
    pub fn run(&self) -> T {
        self.inner.run()
    }

    /// Unsubscribe from everything and never re-run automatically again.
    pub fn stop(&self) {
        self.inner.stop();
    }

    /// Check if the effect has not been stopped.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Number of tracked runs so far.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.get()
    }

    /// Number of (target, key) pairs read during the most recent run.
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// The type-erased handle the store and schedulers see.
    pub fn job(&self) -> Job {
        Job::new(self.inner.clone())
    }
}

impl<T: 'static> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: 'static> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("active", &self.is_active())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};

    use serde_json::json;

    use crate::operations::OperationKind;
    use crate::reactive::{Runtime, Value};

    fn counter() -> (Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let count = Rc::new(Cell::new(0));
        (count.clone(), count)
    }

    #[test]
    fn effect_runs_on_creation() {
        let rt = Runtime::new();
        let (runs, runs_clone) = counter();

        let _effect = rt.effect(move || runs_clone.set(runs_clone.get() + 1));

        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn effect_lazy_does_not_run_on_creation() {
        let rt = Runtime::new();
        let (runs, runs_clone) = counter();

        let effect = rt.effect_with_options(
            move || runs_clone.set(runs_clone.get() + 1),
            EffectOptions::new().lazy(true),
        );

        assert_eq!(runs.get(), 0);
        assert_eq!(effect.run_count(), 0);

        effect.run();
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.run_count(), 1);
    }

    #[test]
    fn run_returns_the_body_result() {
        let rt = Runtime::new();
        let effect = rt.effect_with_options(|| 21 * 2, EffectOptions::new().lazy(true));
        assert_eq!(effect.run(), 42);
    }

    #[test]
    fn stale_branches_are_forgotten() {
        let rt = Runtime::new();
        let state = rt.reactive(json!({ "flag": true, "a": 1, "b": 2 }));
        let state = state.as_reactive().cloned().unwrap();
        let (runs, runs_clone) = counter();

        let state_clone = state.clone();
        let _effect = rt.effect(move || {
            runs_clone.set(runs_clone.get() + 1);
            if state_clone.get("flag") == Value::from(true) {
                state_clone.get("a");
            } else {
                state_clone.get("b");
            }
        });
        assert_eq!(runs.get(), 1);

        state.set("flag", false).unwrap();
        assert_eq!(runs.get(), 2);

        // "a" is no longer read, so writing it does nothing.
        state.set("a", 10).unwrap();
        assert_eq!(runs.get(), 2);

        state.set("b", 20).unwrap();
        assert_eq!(runs.get(), 3);
    }

    #[test]
    fn effect_does_not_run_after_stop() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let (runs, runs_clone) = counter();

        let count_clone = count.clone();
        let effect = rt.effect(move || {
            count_clone.value();
            runs_clone.set(runs_clone.get() + 1);
        });
        assert_eq!(effect.dependency_count(), 1);

        effect.stop();
        assert!(!effect.is_active());
        assert_eq!(effect.dependency_count(), 0);

        count.set_value(1).unwrap();
        assert_eq!(runs.get(), 1);

        // Running by hand still executes the body, without tracking.
        effect.run();
        assert_eq!(runs.get(), 2);
        assert_eq!(effect.dependency_count(), 0);
    }

    #[test]
    fn on_stop_fires_once() {
        let rt = Runtime::new();
        let (stops, stops_clone) = counter();

        let effect = rt.effect_with_options(
            || {},
            EffectOptions::new().on_stop(move || stops_clone.set(stops_clone.get() + 1)),
        );

        effect.stop();
        effect.stop();
        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn scheduler_replaces_synchronous_rerun() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let (runs, runs_clone) = counter();
        let queue: Rc<RefCell<Vec<Job>>> = Rc::new(RefCell::new(Vec::new()));

        let count_clone = count.clone();
        let queue_clone = queue.clone();
        let _effect = rt.effect_with_options(
            move || {
                count_clone.value();
                runs_clone.set(runs_clone.get() + 1);
            },
            EffectOptions::new().scheduler(move |job| queue_clone.borrow_mut().push(job.clone())),
        );
        assert_eq!(runs.get(), 1);

        count.set_value(1).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(queue.borrow().len(), 1);

        let jobs: Vec<Job> = queue.borrow_mut().drain(..).collect();
        for job in jobs {
            job.run();
        }
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn debugger_hooks_observe_track_and_trigger() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let tracked = Rc::new(RefCell::new(Vec::new()));
        let triggered = Rc::new(RefCell::new(Vec::new()));

        let count_clone = count.clone();
        let tracked_clone = tracked.clone();
        let triggered_clone = triggered.clone();
        let _effect = rt.effect_with_options(
            move || {
                count_clone.value();
            },
            EffectOptions::new()
                .on_track(move |event| tracked_clone.borrow_mut().push(event.op))
                .on_trigger(move |event| triggered_clone.borrow_mut().push(event.op)),
        );

        count.set_value(1).unwrap();

        assert_eq!(tracked.borrow()[0], OperationKind::Get);
        assert_eq!(*triggered.borrow(), vec![OperationKind::Set]);
    }

    #[test]
    fn effect_writing_its_own_dependency_does_not_recurse() {
        let rt = Runtime::new();
        let count = rt.cell(0);

        let count_clone = count.clone();
        let effect = rt.effect(move || {
            let next = count_clone.value().as_f64().unwrap_or_default() + 1.0;
            count_clone.set_value(next).unwrap();
        });

        assert_eq!(effect.run_count(), 1);
        assert_eq!(count.value(), Value::from(1));
    }

    #[test]
    fn nested_effects_track_innermost() {
        let rt = Runtime::new();
        let outer_source = rt.cell(0);
        let inner_source = rt.cell(0);
        let (outer_runs, outer_clone) = counter();
        let (inner_runs, inner_clone) = counter();
        let inner_slot: Rc<RefCell<Option<Effect>>> = Rc::new(RefCell::new(None));

        let rt_clone = rt.clone();
        let outer_source_clone = outer_source.clone();
        let inner_source_clone = inner_source.clone();
        let inner_slot_clone = inner_slot.clone();
        let _outer = rt.effect(move || {
            outer_clone.set(outer_clone.get() + 1);
            outer_source_clone.value();

            if let Some(previous) = inner_slot_clone.borrow_mut().take() {
                previous.stop();
            }
            let source = inner_source_clone.clone();
            let runs = inner_clone.clone();
            let inner = rt_clone.effect(move || {
                runs.set(runs.get() + 1);
                source.value();
            });
            *inner_slot_clone.borrow_mut() = Some(inner);
        });
        assert_eq!((outer_runs.get(), inner_runs.get()), (1, 1));

        // Only the inner effect read this.
        inner_source.set_value(1).unwrap();
        assert_eq!((outer_runs.get(), inner_runs.get()), (1, 2));

        outer_source.set_value(1).unwrap();
        assert_eq!((outer_runs.get(), inner_runs.get()), (2, 3));
    }

    #[test]
    fn panicking_effect_is_left_without_subscriptions() {
        let rt = Runtime::new();
        let count = rt.cell(0);
        let fail = Rc::new(Cell::new(false));

        let count_clone = count.clone();
        let fail_clone = fail.clone();
        let effect = rt.effect(move || {
            if fail_clone.get() {
                panic!("boom");
            }
            count_clone.value();
        });
        assert_eq!(effect.dependency_count(), 1);

        fail.set(true);
        let result = panic::catch_unwind(AssertUnwindSafe(|| count.set_value(1)));
        assert!(result.is_err());

        assert_eq!(effect.dependency_count(), 0);
        assert_eq!(rt.active_effect(), None);

        // Nothing is subscribed any more, so this write is inert.
        fail.set(false);
        count.set_value(2).unwrap();
        assert_eq!(effect.run_count(), 2);
    }

    #[test]
    fn effect_clone_shares_state() {
        let rt = Runtime::new();
        let effect1 = rt.effect(|| {});
        let effect2 = effect1.clone();

        assert_eq!(effect1.id(), effect2.id());
        effect1.run();
        assert_eq!(effect2.run_count(), 2);

        effect1.stop();
        assert!(!effect2.is_active());
    }
}
