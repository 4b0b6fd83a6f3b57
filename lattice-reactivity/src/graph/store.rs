//! Dependency Store
//!
//! The store owns every subscription set in the engine. Sets live in an
//! arena addressed by `DepId`; an index resolves `(target, key)` to the id.
//! Effects keep their own ordered list of `DepId`s so they can unsubscribe
//! from everything before re-running, but they never own the sets.
//!
//! # Lifecycle
//!
//! 1. `track` resolves (or creates) the dep for a read and subscribes the
//!    active effect to it.
//! 2. `trigger` collects the subscribers of the written key, widened to the
//!    iteration key for structural writes and to every key for `Clear`.
//! 3. When an effect unsubscribes and leaves a dep empty, the dep is removed
//!    from both the arena and the index. Targets nobody reads leave no trace.

use std::collections::HashMap;

use indexmap::IndexMap;
use smallvec::SmallVec;

use super::node::{Dep, DepId, DepKey, TargetId};
use crate::operations::OperationKind;
use crate::reactive::{EffectId, Job};

/// Jobs collected by one trigger. Most writes wake only a handful.
pub(crate) type JobBatch = SmallVec<[Job; 8]>;

/// Arena of subscription sets plus the `(target, key)` index.
#[derive(Default)]
pub struct DepStore {
    /// All deps, indexed by ID.
    deps: HashMap<DepId, Dep>,

    /// Per-target key table.
    index: HashMap<TargetId, HashMap<DepKey, DepId>>,
}

impl DepStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve the dep for `(target, key)`, creating it if needed.
    pub(crate) fn dep_for(&mut self, target: TargetId, key: DepKey) -> DepId {
        let keys = self.index.entry(target).or_default();
        if let Some(id) = keys.get(&key) {
            return *id;
        }
        let dep = Dep::new(target, key.clone());
        let id = dep.id();
        keys.insert(key, id);
        self.deps.insert(id, dep);
        id
    }

    /// Subscribe `job` to a dep. Returns `true` if this is a new subscription.
    pub(crate) fn subscribe(&mut self, dep: DepId, job: &Job) -> bool {
        self.deps
            .get_mut(&dep)
            .map(|dep| dep.subscribe(job))
            .unwrap_or(false)
    }

    /// Remove `effect` from a dep, dropping the dep once nobody listens.
    pub(crate) fn unsubscribe(&mut self, dep: DepId, effect: EffectId) {
        let Some(entry) = self.deps.get_mut(&dep) else {
            return;
        };
        entry.unsubscribe(effect);
        if !entry.is_empty() {
            return;
        }

        if let Some(entry) = self.deps.remove(&dep) {
            if let Some(keys) = self.index.get_mut(&entry.target()) {
                keys.remove(entry.key());
                if keys.is_empty() {
                    self.index.remove(&entry.target());
                }
            }
        }
    }

    /// Get a dep by ID.
    pub fn get(&self, dep: DepId) -> Option<&Dep> {
        self.deps.get(&dep)
    }

    /// Find the dep recorded for `(target, key)`, if any effect reads it.
    pub fn lookup(&self, target: TargetId, key: &DepKey) -> Option<&Dep> {
        self.index
            .get(&target)
            .and_then(|keys| keys.get(key))
            .and_then(|id| self.deps.get(id))
    }

    /// Collect the jobs a write of `op` on `(target, key)` must wake.
    ///
    /// The result is deduplicated. Derived-cell jobs come first so that
    /// cached values are invalidated before any ordinary effect re-reads them.
    pub(crate) fn collect(&self, target: TargetId, key: &DepKey, op: OperationKind) -> JobBatch {
        let Some(keys) = self.index.get(&target) else {
            return JobBatch::new();
        };

        let mut picked: IndexMap<EffectId, Job> = IndexMap::new();
        let mut add = |id: &DepId| {
            if let Some(dep) = self.deps.get(id) {
                for job in dep.subscribers() {
                    picked.entry(job.id()).or_insert_with(|| job.clone());
                }
            }
        };

        if op == OperationKind::Clear {
            keys.values().for_each(&mut add);
        } else {
            if let Some(id) = keys.get(key) {
                add(id);
            }
            if op.triggers_iteration() {
                for sentinel in [DepKey::Iterate, DepKey::Length] {
                    if let Some(id) = keys.get(&sentinel) {
                        add(id);
                    }
                }
            }
        }

        let (derived, plain): (JobBatch, JobBatch) =
            picked.into_values().partition(|job| job.is_computed());
        derived.into_iter().chain(plain).collect()
    }

    /// Number of live deps in the arena.
    pub fn dep_count(&self) -> usize {
        self.deps.len()
    }

    /// Number of effects subscribed to `(target, key)`.
    pub fn subscriber_count(&self, target: TargetId, key: &DepKey) -> usize {
        self.lookup(target, key).map(Dep::len).unwrap_or(0)
    }

    /// Number of targets with at least one live dep.
    pub fn target_count(&self) -> usize {
        self.index.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use indexmap::IndexSet;

    use crate::reactive::{DebuggerEvent, PropKey, Runnable, Scheduler};

    struct MockEffect {
        id: EffectId,
        computed: bool,
        runs: Cell<usize>,
        deps: RefCell<IndexSet<DepId>>,
    }

    impl MockEffect {
        fn job(computed: bool) -> Job {
            Job::new(Rc::new(Self {
                id: EffectId::new(),
                computed,
                runs: Cell::new(0),
                deps: RefCell::new(IndexSet::new()),
            }))
        }
    }

    impl Runnable for MockEffect {
        fn id(&self) -> EffectId {
            self.id
        }

        fn run_job(self: Rc<Self>) {
            self.runs.set(self.runs.get() + 1);
        }

        fn stop_job(&self) {}

        fn is_active(&self) -> bool {
            true
        }

        fn is_computed(&self) -> bool {
            self.computed
        }

        fn deps(&self) -> &RefCell<IndexSet<DepId>> {
            &self.deps
        }

        fn scheduler(&self) -> Option<Scheduler> {
            None
        }

        fn on_track(&self, _event: &DebuggerEvent) {}

        fn on_trigger(&self, _event: &DebuggerEvent) {}
    }

    fn prop(name: &str) -> DepKey {
        DepKey::Prop(PropKey::from(name))
    }

    #[test]
    fn dep_for_is_stable_per_key() {
        let mut store = DepStore::new();
        let target = TargetId::new();

        let a = store.dep_for(target, prop("a"));
        let again = store.dep_for(target, prop("a"));
        let b = store.dep_for(target, prop("b"));

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(store.dep_count(), 2);
    }

    #[test]
    fn subscribe_is_idempotent() {
        let mut store = DepStore::new();
        let target = TargetId::new();
        let job = MockEffect::job(false);

        let dep = store.dep_for(target, prop("a"));
        assert!(store.subscribe(dep, &job));
        assert!(!store.subscribe(dep, &job));
        assert_eq!(store.subscriber_count(target, &prop("a")), 1);
    }

    #[test]
    fn unsubscribing_last_effect_prunes_dep() {
        let mut store = DepStore::new();
        let target = TargetId::new();
        let job = MockEffect::job(false);

        let dep = store.dep_for(target, prop("a"));
        store.subscribe(dep, &job);
        store.unsubscribe(dep, job.id());

        assert_eq!(store.dep_count(), 0);
        assert_eq!(store.target_count(), 0);
        assert!(store.lookup(target, &prop("a")).is_none());
    }

    #[test]
    fn collect_on_unknown_target_is_empty() {
        let store = DepStore::new();
        let jobs = store.collect(TargetId::new(), &prop("a"), OperationKind::Set);
        assert!(jobs.is_empty());
    }

    #[test]
    fn set_does_not_wake_iteration() {
        let mut store = DepStore::new();
        let target = TargetId::new();
        let reader = MockEffect::job(false);
        let iterator = MockEffect::job(false);

        let a = store.dep_for(target, prop("a"));
        store.subscribe(a, &reader);
        let iter = store.dep_for(target, DepKey::Iterate);
        store.subscribe(iter, &iterator);

        let jobs = store.collect(target, &prop("a"), OperationKind::Set);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id(), reader.id());

        let jobs = store.collect(target, &prop("b"), OperationKind::Add);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id(), iterator.id());
    }

    #[test]
    fn clear_wakes_every_key_once() {
        let mut store = DepStore::new();
        let target = TargetId::new();
        let job = MockEffect::job(false);

        for key in [prop("a"), prop("b"), DepKey::Iterate] {
            let dep = store.dep_for(target, key);
            store.subscribe(dep, &job);
        }

        let jobs = store.collect(target, &DepKey::Iterate, OperationKind::Clear);
        assert_eq!(jobs.len(), 1);
    }

    #[test]
    fn derived_jobs_are_collected_first() {
        let mut store = DepStore::new();
        let target = TargetId::new();
        let plain = MockEffect::job(false);
        let derived = MockEffect::job(true);

        let dep = store.dep_for(target, DepKey::Value);
        store.subscribe(dep, &plain);
        store.subscribe(dep, &derived);

        let jobs = store.collect(target, &DepKey::Value, OperationKind::Set);
        let ids: Vec<_> = jobs.iter().map(Job::id).collect();
        assert_eq!(ids, vec![derived.id(), plain.id()]);
    }
}
