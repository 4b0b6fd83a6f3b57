//! Reactive Objects
//!
//! A [`Reactive`] is the interception layer over one raw [`Target`]. Every
//! read goes through `track`, every write through `trigger`, and nested
//! targets are wrapped lazily as they are read.
//!
//! # Interception Rules
//!
//! - Reads of a key track `(target, key)`. A raw target found in the slot is
//!   returned wrapped; a cell found in an object or array slot is unwrapped
//!   to its value. Map values are returned as stored.
//! - Writes store the raw form of the new value. If the slot currently holds
//!   a cell and the new value is not a cell, the cell is written instead, so
//!   external handles to the cell stay valid. A write of an equal value
//!   triggers nothing.
//! - `has` tracks the key; `keys`, `len` and `values` track the target's
//!   iteration key (`Length` for arrays), which structural writes wake.
//!
//! # Identity
//!
//! The runtime keeps a weak cache from target to wrapper: wrapping the same
//! target twice yields the same wrapper for as long as one is alive.

use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::RuntimeInner;
use super::target::{PropKey, Shape, Target, TargetData};
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, TargetId};
use crate::operations::OperationKind;

pub(crate) struct ReactiveInner {
    target: Target,
    runtime: Weak<RuntimeInner>,
}

/// A tracked view over a raw target.
///
/// Cloning the handle keeps the same identity.
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ReactiveInner>,
}

impl Reactive {
    pub(crate) fn new(target: Target, runtime: Weak<RuntimeInner>) -> Self {
        Self {
            inner: Rc::new(ReactiveInner { target, runtime }),
        }
    }

    /// The raw target behind this wrapper.
    pub fn target(&self) -> &Target {
        &self.inner.target
    }

    pub fn id(&self) -> TargetId {
        self.inner.target.id()
    }

    pub fn shape(&self) -> Shape {
        self.inner.target.shape()
    }

    /// Whether both handles are the same wrapper.
    pub fn ptr_eq(&self, other: &Reactive) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read `key`.
    ///
    /// Missing keys read as `Value::Undefined`.
    pub fn get(&self, key: impl Into<PropKey>) -> Value {
        let key = key.into();
        self.track(DepKey::Prop(key.clone()), OperationKind::Get);

        let (slot, shape) = {
            let data = self.inner.target.data();
            (data.slot(&key), data.shape())
        };
        match slot {
            None => Value::Undefined,
            Some(Value::Ref(cell)) if shape != Shape::Map => cell.value(),
            Some(value) => self.to_reactive(value),
        }
    }

    /// Write `key`.
    ///
    /// Writing an array index at or past the end appends, leaving holes for
    /// any skipped indices. Indices above `2^32 - 2` are rejected.
    pub fn set(&self, key: impl Into<PropKey>, value: impl Into<Value>) -> Result<()> {
        let key = key.into();
        let value = value.into().to_raw();

        let existing = {
            let data = self.inner.target.data();
            match data.shape() {
                Shape::Set => return Err(unsupported("set", Shape::Set)),
                Shape::Map => None,
                Shape::Object | Shape::Array => data.slot(&key),
            }
        };
        if let (Some(Value::Ref(cell)), false) = (&existing, matches!(value, Value::Ref(_))) {
            return cell.set_value(value);
        }

        let previous = {
            let mut data = self.inner.target.data_mut();
            match &mut *data {
                TargetData::Object(fields) | TargetData::Map(fields) => {
                    fields.insert(key.clone(), value.clone())
                }
                TargetData::Array(items) => {
                    let index = array_index(&key)?;
                    if index >= items.len() {
                        items.try_reserve(index + 1 - items.len()).map_err(|_| {
                            ReactiveError::InvalidArgument(format!(
                                "array index {index} cannot be allocated"
                            ))
                        })?;
                        items.resize(index + 1, None);
                    }
                    items[index].replace(value.clone())
                }
                TargetData::Set(_) => None,
            }
        };

        match previous {
            None => self.trigger(DepKey::Prop(key), OperationKind::Add),
            Some(old) if old.has_changed(&value) => {
                self.trigger(DepKey::Prop(key), OperationKind::Set)
            }
            Some(_) => {}
        }
        Ok(())
    }

    /// Remove `key`. Returns whether it existed.
    ///
    /// Deleting an array index leaves a hole; the length is unchanged and the
    /// index is no longer present.
    pub fn delete(&self, key: impl Into<PropKey>) -> Result<bool> {
        let key = key.into();
        let existed = {
            let mut data = self.inner.target.data_mut();
            match &mut *data {
                TargetData::Object(fields) | TargetData::Map(fields) => {
                    fields.shift_remove(&key).is_some()
                }
                TargetData::Array(items) => match key.as_index() {
                    Some(index) if index < items.len() => items[index].take().is_some(),
                    _ => false,
                },
                TargetData::Set(members) => members.shift_remove(&key),
            }
        };

        if existed {
            self.trigger(DepKey::Prop(key), OperationKind::Delete);
        }
        Ok(existed)
    }

    /// Whether `key` is present.
    pub fn has(&self, key: impl Into<PropKey>) -> bool {
        let key = key.into();
        self.track(DepKey::Prop(key.clone()), OperationKind::Has);
        self.inner.target.data().contains(&key)
    }

    /// Enumerate the keys (indices for arrays, members for sets).
    pub fn keys(&self) -> Vec<PropKey> {
        self.track_iteration();
        self.inner.target.data().keys()
    }

    /// Enumerate the values, read through the same rules as [`get`](Self::get).
    ///
    /// For sets, the members themselves are returned.
    pub fn values(&self) -> Vec<Value> {
        let keys = self.keys();
        if self.shape() == Shape::Set {
            return keys.into_iter().map(Value::from).collect();
        }
        keys.into_iter().map(|key| self.get(key)).collect()
    }

    /// Number of fields, elements or members.
    pub fn len(&self) -> usize {
        self.track_iteration();
        self.inner.target.data().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append to an array. Returns the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize> {
        let index = {
            let data = self.inner.target.data();
            match &*data {
                TargetData::Array(items) => items.len(),
                other => return Err(unsupported("push", other.shape())),
            }
        };
        self.set(index, value)?;
        Ok(index + 1)
    }

    /// Remove and return the last element of an array.
    pub fn pop(&self) -> Result<Option<Value>> {
        let popped = {
            let mut data = self.inner.target.data_mut();
            match &mut *data {
                TargetData::Array(items) => items
                    .pop()
                    .map(|slot| (items.len(), slot.unwrap_or_default())),
                other => return Err(unsupported("pop", other.shape())),
            }
        };

        Ok(popped.map(|(index, value)| {
            self.trigger(DepKey::Prop(PropKey::from(index)), OperationKind::Delete);
            self.to_reactive(value)
        }))
    }

    /// Add a member to a set. Returns whether it was newly inserted.
    pub fn add(&self, member: impl Into<PropKey>) -> Result<bool> {
        let member = member.into();
        let inserted = {
            let mut data = self.inner.target.data_mut();
            match &mut *data {
                TargetData::Set(members) => members.insert(member.clone()),
                other => return Err(unsupported("add", other.shape())),
            }
        };

        if inserted {
            self.trigger(DepKey::Prop(member), OperationKind::Add);
        }
        Ok(inserted)
    }

    /// Remove every entry of a map or set.
    pub fn clear(&self) -> Result<()> {
        let had_entries = {
            let mut data = self.inner.target.data_mut();
            match &mut *data {
                TargetData::Map(entries) => {
                    let had = !entries.is_empty();
                    entries.clear();
                    had
                }
                TargetData::Set(members) => {
                    let had = !members.is_empty();
                    members.clear();
                    had
                }
                other => return Err(unsupported("clear", other.shape())),
            }
        };

        if had_entries {
            self.trigger(DepKey::Iterate, OperationKind::Clear);
        }
        Ok(())
    }

    fn track(&self, key: DepKey, op: OperationKind) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.track(self.id(), key, op);
        }
    }

    fn track_iteration(&self) {
        let key = match self.shape() {
            Shape::Array => DepKey::Length,
            _ => DepKey::Iterate,
        };
        self.track(key, OperationKind::Iterate);
    }

    fn trigger(&self, key: DepKey, op: OperationKind) {
        if let Some(runtime) = self.inner.runtime.upgrade() {
            runtime.trigger(self.id(), key, op);
        }
    }

    fn to_reactive(&self, value: Value) -> Value {
        match self.inner.runtime.upgrade() {
            Some(runtime) => runtime.to_reactive(value),
            None => value,
        }
    }

}

/// Largest index an array accepts, matching the `2^32 - 1` length limit.
const MAX_ARRAY_INDEX: usize = u32::MAX as usize - 1;

fn array_index(key: &PropKey) -> Result<usize> {
    match key.as_index() {
        Some(index) if index <= MAX_ARRAY_INDEX => Ok(index),
        Some(index) => Err(ReactiveError::InvalidArgument(format!(
            "array index {index} exceeds the maximum of {MAX_ARRAY_INDEX}"
        ))),
        None => Err(ReactiveError::InvalidArgument(format!(
            "`{key}` is not an array index"
        ))),
    }
}

fn unsupported(op: &'static str, shape: Shape) -> ReactiveError {
    ReactiveError::UnsupportedOperation { op, shape }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.id())
            .field("shape", &self.shape())
            .finish()
    }
}

/// Weak identity cache from target to wrapper.
///
/// Entries whose wrapper has been dropped are swept whenever the table grows
/// past its high-water mark.
pub(crate) struct ProxyCache {
    entries: HashMap<TargetId, Weak<ReactiveInner>>,
    sweep_at: usize,
}

impl ProxyCache {
    const MIN_SWEEP: usize = 64;

    pub(crate) fn new() -> Self {
        Self {
            entries: HashMap::new(),
            sweep_at: Self::MIN_SWEEP,
        }
    }

    pub(crate) fn lookup(&self, id: TargetId) -> Option<Reactive> {
        self.entries
            .get(&id)
            .and_then(Weak::upgrade)
            .map(|inner| Reactive { inner })
    }

    pub(crate) fn insert(&mut self, reactive: &Reactive) {
        if self.entries.len() >= self.sweep_at {
            self.entries.retain(|_, weak| weak.strong_count() > 0);
            self.sweep_at = (self.entries.len() * 2).max(Self::MIN_SWEEP);
        }
        self.entries
            .insert(reactive.id(), Rc::downgrade(&reactive.inner));
    }

    pub(crate) fn live_count(&self) -> usize {
        self.entries
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
