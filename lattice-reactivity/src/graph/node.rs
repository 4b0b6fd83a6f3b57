//! Graph Nodes
//!
//! This module defines the identities and entries that live in the
//! dependency arena: targets, the keys read on them, and the subscription
//! set (`Dep`) recorded for each (target, key) pair.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::reactive::{EffectId, Job, PropKey};

/// Identity of anything that can be tracked: a raw target, a cell, or a
/// derived cell.
///
/// Two handles refer to the same reactive state iff their ids are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<u64> for TargetId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle to a `Dep` stored in the arena.
///
/// Effects hold lists of these instead of references to the sets
/// themselves, so the arena stays the single owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    pub(crate) fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The key a read was recorded against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A named or indexed property.
    Prop(PropKey),
    /// Enumeration of an object, map or set.
    Iterate,
    /// Length of an array. Arrays use this as their iteration key.
    Length,
    /// The single value held by a cell or derived cell.
    Value,
}

impl DepKey {
    /// Whether this key stands for "the whole key set" rather than one slot.
    pub fn is_iteration(&self) -> bool {
        matches!(self, DepKey::Iterate | DepKey::Length)
    }
}

impl From<PropKey> for DepKey {
    fn from(key: PropKey) -> Self {
        DepKey::Prop(key)
    }
}

impl fmt::Display for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Prop(key) => write!(f, "{key}"),
            DepKey::Iterate => f.write_str("<iterate>"),
            DepKey::Length => f.write_str("<length>"),
            DepKey::Value => f.write_str("<value>"),
        }
    }
}

/// The set of effects subscribed to one (target, key) pair.
pub struct Dep {
    id: DepId,
    target: TargetId,
    key: DepKey,
    /// Insertion-ordered so that triggers visit subscribers deterministically.
    subscribers: IndexMap<EffectId, Job>,
}

impl Dep {
    pub(crate) fn new(target: TargetId, key: DepKey) -> Self {
        Self {
            id: DepId::new(),
            target,
            key,
            subscribers: IndexMap::new(),
        }
    }

    pub fn id(&self) -> DepId {
        self.id
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn key(&self) -> &DepKey {
        &self.key
    }

    /// Add a subscriber. Returns `false` if it was already present.
    pub(crate) fn subscribe(&mut self, job: &Job) -> bool {
        if self.subscribers.contains_key(&job.id()) {
            return false;
        }
        self.subscribers.insert(job.id(), job.clone());
        true
    }

    pub(crate) fn unsubscribe(&mut self, effect: EffectId) {
        self.subscribers.shift_remove(&effect);
    }

    pub(crate) fn subscribers(&self) -> impl Iterator<Item = &Job> {
        self.subscribers.values()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

impl fmt::Debug for Dep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id)
            .field("target", &self.target)
            .field("key", &self.key)
            .field("subscribers", &self.subscribers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_ids_are_unique() {
        let id1 = TargetId::new();
        let id2 = TargetId::new();
        assert_ne!(id1, id2);
        assert_eq!(TargetId::from(id1.raw()), id1);
    }

    #[test]
    fn iteration_keys() {
        assert!(DepKey::Iterate.is_iteration());
        assert!(DepKey::Length.is_iteration());
        assert!(!DepKey::Value.is_iteration());
        assert!(!DepKey::from(PropKey::from("x")).is_iteration());
    }

    #[test]
    fn new_dep_is_empty() {
        let target = TargetId::new();
        let dep = Dep::new(target, DepKey::Value);
        assert!(dep.is_empty());
        assert_eq!(dep.target(), target);
        assert_eq!(dep.key(), &DepKey::Value);
    }

    #[test]
    fn dep_key_display() {
        assert_eq!(DepKey::Prop(PropKey::from("count")).to_string(), "count");
        assert_eq!(DepKey::Prop(PropKey::from(3usize)).to_string(), "3");
        assert_eq!(DepKey::Iterate.to_string(), "<iterate>");
    }
}
