//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: plain
//! effects, and the lazy effects that back derived cells. The dependency
//! store sees them only through the type-erased [`Job`] handle.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexSet;

use crate::graph::{DepId, DepKey, TargetId};
use crate::operations::OperationKind;

/// Unique identifier for an effect.
///
/// Each effect (including the hidden effect behind a derived cell) gets a
/// unique ID when created. The ID is used to deduplicate subscriptions and
/// to detect re-entrant triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EffectId(u64);

impl EffectId {
    /// Generate a new unique effect ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect#{}", self.0)
    }
}

/// Describes one track or trigger, passed to `on_track`/`on_trigger` hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerEvent {
    pub effect: EffectId,
    pub target: TargetId,
    pub key: DepKey,
    pub op: OperationKind,
}

/// Replaces the synchronous re-run of an effect when one of its
/// dependencies changes. Receives the job to run (or defer, or drop).
pub type Scheduler = Rc<dyn Fn(&Job)>;

/// Observer for track/trigger debugger events.
pub type DebugHook = Rc<dyn Fn(&DebuggerEvent)>;

/// The behaviour the store needs from a subscribed computation.
pub(crate) trait Runnable {
    fn id(&self) -> EffectId;

    /// Run the computation, discarding its result.
    fn run_job(self: Rc<Self>);

    fn stop_job(&self);

    fn is_active(&self) -> bool;

    /// Whether this job backs a derived cell.
    fn is_computed(&self) -> bool;

    /// Deps this job is currently subscribed to.
    fn deps(&self) -> &RefCell<IndexSet<DepId>>;

    fn scheduler(&self) -> Option<Scheduler>;

    fn on_track(&self, event: &DebuggerEvent);

    fn on_trigger(&self, event: &DebuggerEvent);
}

/// Type-erased handle to an effect.
///
/// This is what schedulers receive: call [`Job::run`] to execute the effect
/// now, or hold on to the job and run it later.
#[derive(Clone)]
pub struct Job(Rc<dyn Runnable>);

impl Job {
    pub(crate) fn new(runnable: Rc<dyn Runnable>) -> Self {
        Self(runnable)
    }

    /// The effect's unique ID.
    pub fn id(&self) -> EffectId {
        self.0.id()
    }

    /// Run the effect, re-deriving its dependencies.
    pub fn run(&self) {
        Rc::clone(&self.0).run_job();
    }

    /// Stop the effect and drop all of its subscriptions.
    pub fn stop(&self) {
        self.0.stop_job();
    }

    pub fn is_active(&self) -> bool {
        self.0.is_active()
    }

    pub(crate) fn is_computed(&self) -> bool {
        self.0.is_computed()
    }

    pub(crate) fn runnable(&self) -> &dyn Runnable {
        &*self.0
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id())
            .field("active", &self.is_active())
            .finish()
    }
}
