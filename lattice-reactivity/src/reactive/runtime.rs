//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects reactive objects,
//! cells, derived cells and effects. It owns the dependency store, the proxy
//! cache and the active-effect stack.
//!
//! # How It Works
//!
//! 1. When an effect runs, it clears its previous subscriptions and pushes
//!    itself onto the context stack.
//!
//! 2. When a reactive object or cell is read, the runtime records the
//!    (target, key) pair against the innermost running effect.
//!
//! 3. When a reactive object or cell is written, the runtime:
//!    a. Collects every effect subscribed to the written key
//!    b. Widens the set for structural writes (add, delete, clear)
//!    c. Invalidates derived cells, folding the effects they wake into the
//!       same batch
//!    d. Hands each effect to its scheduler, or runs it synchronously
//!
//! # Ownership
//!
//! There is no hidden global: every table lives in a [`Runtime`] value.
//! Handles created by the runtime keep only a weak reference back to it, so
//! dropping the runtime releases the whole graph. Handles that outlive their
//! runtime still read and write their data; they just stop tracking.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::trace;

use super::cell::{Ref, StoredRef};
use super::computed::Computed;
use super::context::ReactiveContext;
use super::effect::{Effect, EffectOptions};
use super::proxy::{ProxyCache, Reactive};
use super::subscriber::{DebuggerEvent, EffectId, Job};
use super::target::{PropKey, Target};
use super::to_refs;
use super::value::Value;
use crate::error::Result;
use crate::graph::{DepId, DepKey, DepStore, TargetId};
use crate::operations::OperationKind;

/// Shared state behind a [`Runtime`] handle.
pub(crate) struct RuntimeInner {
    store: RefCell<DepStore>,
    proxies: RefCell<ProxyCache>,
    pub(crate) context: ReactiveContext,
    /// Effects woken during the current write's invalidation pass.
    deferred: RefCell<Option<IndexMap<EffectId, (Job, DebuggerEvent)>>>,
}

/// Opens the deferred batch; clears it again on drop, including on unwind.
struct InvalidationPass<'a> {
    runtime: &'a RuntimeInner,
}

impl<'a> InvalidationPass<'a> {
    fn begin(runtime: &'a RuntimeInner) -> Self {
        *runtime.deferred.borrow_mut() = Some(IndexMap::new());
        Self { runtime }
    }
}

impl Drop for InvalidationPass<'_> {
    fn drop(&mut self) {
        self.runtime.deferred.borrow_mut().take();
    }
}

impl RuntimeInner {
    /// Record that the running effect depends on `(target, key)`.
    ///
    /// No-op when no effect is running or tracking is paused.
    pub(crate) fn track(&self, target: TargetId, key: DepKey, op: OperationKind) {
        if !self.context.is_tracking() {
            return;
        }
        let Some(job) = self.context.current() else {
            return;
        };

        let (dep, added) = {
            let mut store = self.store.borrow_mut();
            let dep = store.dep_for(target, key.clone());
            (dep, store.subscribe(dep, &job))
        };
        if !added {
            return;
        }

        job.runnable().deps().borrow_mut().insert(dep);
        trace!(%target, %key, %op, effect = %job.id(), "track");
        job.runnable().on_track(&DebuggerEvent {
            effect: job.id(),
            target,
            key,
            op,
        });
    }

    /// Wake every effect that depends on `(target, key)`.
    ///
    /// Derived cells are invalidated first. Effects they wake are folded into
    /// this write's batch rather than run on the spot, so an effect that
    /// reaches the written key along several paths still runs once.
    pub(crate) fn trigger(&self, target: TargetId, key: DepKey, op: OperationKind) {
        let jobs = self.store.borrow().collect(target, &key, op);
        if jobs.is_empty() {
            return;
        }
        trace!(%target, %key, %op, count = jobs.len(), "trigger");

        let event_for = |job: &Job| DebuggerEvent {
            effect: job.id(),
            target,
            key: key.clone(),
            op,
        };

        // Nested inside another write's invalidation pass: defer plain effects
        // to that pass and keep invalidating.
        let nested = self.deferred.borrow().is_some();
        if nested {
            for job in jobs {
                let event = event_for(&job);
                if job.is_computed() {
                    self.dispatch(&job, &event);
                } else {
                    self.defer(job, event);
                }
            }
            return;
        }

        let _pass = InvalidationPass::begin(self);
        let (derived, plain): (Vec<Job>, Vec<Job>) =
            jobs.into_iter().partition(|job| job.is_computed());
        for job in plain {
            let event = event_for(&job);
            self.defer(job, event);
        }
        for job in derived {
            self.dispatch(&job, &event_for(&job));
        }

        let batch = self.deferred.borrow_mut().take().unwrap_or_default();
        for (job, event) in batch.into_values() {
            self.dispatch(&job, &event);
        }
    }

    fn defer(&self, job: Job, event: DebuggerEvent) {
        if let Some(batch) = self.deferred.borrow_mut().as_mut() {
            batch.entry(job.id()).or_insert((job, event));
        }
    }

    /// Hand one job to its scheduler, or run it.
    fn dispatch(&self, job: &Job, event: &DebuggerEvent) {
        // An earlier job in this batch may have stopped this one, and an
        // effect that writes its own dependency must not recurse.
        if !job.is_active() || self.context.contains(job.id()) {
            return;
        }

        job.runnable().on_trigger(event);
        match job.runnable().scheduler() {
            Some(scheduler) => scheduler(job),
            None => job.run(),
        }
    }

    /// Unsubscribe `effect` from every dep in `deps`, leaving `deps` empty.
    pub(crate) fn cleanup(&self, effect: EffectId, deps: &RefCell<IndexSet<DepId>>) {
        let deps = std::mem::take(&mut *deps.borrow_mut());
        if deps.is_empty() {
            return;
        }

        let mut store = self.store.borrow_mut();
        for dep in &deps {
            store.unsubscribe(*dep, effect);
        }
        trace!(%effect, count = deps.len(), "cleanup");
    }

    /// The cached wrapper for `target`, created on first request.
    pub(crate) fn wrap(self: &Rc<Self>, target: &Target) -> Reactive {
        let cached = self.proxies.borrow().lookup(target.id());
        if let Some(reactive) = cached {
            return reactive;
        }

        let reactive = Reactive::new(target.clone(), Rc::downgrade(self));
        self.proxies.borrow_mut().insert(&reactive);
        reactive
    }

    /// Wrap raw targets, leave everything else untouched.
    pub(crate) fn to_reactive(self: &Rc<Self>, value: Value) -> Value {
        match value {
            Value::Object(target) => Value::Reactive(self.wrap(&target)),
            other => other,
        }
    }
}

/// Handle to a reactive runtime.
///
/// Cloning the handle shares the runtime.
///
/// # Example
///
/// ```rust
/// use lattice_reactivity::{Runtime, Value};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let rt = Runtime::new();
/// let count = rt.cell(1);
///
/// let seen = Rc::new(Cell::new(0.0));
/// let seen_clone = seen.clone();
/// let count_clone = count.clone();
/// let _effect = rt.effect(move || {
///     seen_clone.set(count_clone.value().as_f64().unwrap_or_default());
/// });
///
/// count.set_value(2).unwrap();
/// assert_eq!(seen.get(), 2.0);
/// ```
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a new runtime with empty tables.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                store: RefCell::new(DepStore::new()),
                proxies: RefCell::new(ProxyCache::new()),
                context: ReactiveContext::new(),
                deferred: RefCell::new(None),
            }),
        }
    }

    /// Wrap a raw target.
    ///
    /// Raw targets come back as `Value::Reactive`; wrapping the same target
    /// twice returns the same wrapper. Values that are already wrapped, and
    /// values that are not targets at all, are returned unchanged.
    pub fn reactive(&self, value: impl Into<Value>) -> Value {
        self.inner.to_reactive(value.into())
    }

    /// Wrap a raw target, returning the wrapper directly.
    pub fn wrap(&self, target: &Target) -> Reactive {
        self.inner.wrap(target)
    }

    /// Create a cell holding `value`.
    ///
    /// Raw targets are stored wrapped. Passing a cell returns that cell.
    pub fn cell(&self, value: impl Into<Value>) -> Ref {
        match value.into() {
            Value::Ref(cell) => cell,
            value => StoredRef::new(&self.inner, value),
        }
    }

    /// Create a read-only derived cell.
    pub fn computed<F>(&self, getter: F) -> Computed
    where
        F: Fn() -> Value + 'static,
    {
        Computed::new(&self.inner, getter, None)
    }

    /// Create a derived cell whose writes are forwarded to `setter`.
    pub fn computed_with_setter<F, S>(&self, getter: F, setter: S) -> Computed
    where
        F: Fn() -> Value + 'static,
        S: Fn(Value) + 'static,
    {
        Computed::new(&self.inner, getter, Some(Box::new(setter)))
    }

    /// Split a reactive object (or array) into one cell per first-level key.
    ///
    /// The cells have no storage of their own: reads and writes go straight
    /// through to the object.
    pub fn to_refs(&self, value: &Value) -> Result<IndexMap<PropKey, Ref>> {
        to_refs::to_refs(value)
    }

    /// One pass-through cell for `object[key]`.
    pub fn to_ref(&self, object: &Reactive, key: impl Into<PropKey>) -> Ref {
        to_refs::object_ref(object, key.into())
    }

    /// Create an effect and run it once.
    pub fn effect<T, F>(&self, func: F) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        Effect::with_options(&self.inner, func, EffectOptions::default())
    }

    /// Create an effect with explicit options.
    ///
    /// With `lazy`, the effect does not run until [`Effect::run`] is called.
    pub fn effect_with_options<T, F>(&self, func: F, options: EffectOptions) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        Effect::with_options(&self.inner, func, options)
    }

    /// Record a dependency of the running effect on `(target, key)`.
    ///
    /// Reactive objects and cells call this automatically; it is public so
    /// that custom containers can take part in tracking.
    pub fn track(&self, target: TargetId, key: DepKey, op: OperationKind) {
        self.inner.track(target, key, op);
    }

    /// Wake the effects that depend on `(target, key)`.
    pub fn trigger(&self, target: TargetId, key: DepKey, op: OperationKind) {
        self.inner.trigger(target, key, op);
    }

    /// Run `f` without recording any reads.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        let _paused = self.inner.context.pause_tracking();
        f()
    }

    /// The innermost running effect, if any.
    pub fn active_effect(&self) -> Option<EffectId> {
        self.inner.context.current().map(|job| job.id())
    }

    /// Whether a read right now would be recorded.
    pub fn is_tracking(&self) -> bool {
        self.inner.context.is_tracking()
    }

    /// Number of live deps in the store.
    pub fn dep_count(&self) -> usize {
        self.inner.store.borrow().dep_count()
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(&self, target: TargetId, key: &DepKey) -> usize {
        self.inner.store.borrow().subscriber_count(target, key)
    }

    /// Number of live wrappers in the proxy cache.
    pub fn proxy_count(&self) -> usize {
        self.inner.proxies.borrow().live_count()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("deps", &self.dep_count())
            .field("proxies", &self.proxy_count())
            .field("depth", &self.inner.context.depth())
            .finish()
    }
}
