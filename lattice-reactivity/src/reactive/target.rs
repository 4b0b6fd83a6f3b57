//! Raw Targets
//!
//! A target is the raw, unwrapped data a proxy intercepts: a plain object,
//! an array, a map or a set. Targets are shared and interior-mutable, and
//! their identity (`TargetId`) is the key into every side table.
//!
//! Mutating a target directly does not notify anyone. Only writes routed
//! through a [`Reactive`](super::Reactive) wrapper trigger effects.

use std::cell::{Ref as Borrowed, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::value::Value;
use crate::graph::TargetId;

/// A property key: a field name or an integer index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropKey {
    Str(Rc<str>),
    Int(i64),
}

impl PropKey {
    /// The key as an array index, if it is a non-negative integer.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropKey::Int(i) => usize::try_from(*i).ok(),
            PropKey::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropKey::Str(s) => Some(&**s),
            PropKey::Int(_) => None,
        }
    }
}

impl fmt::Display for PropKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropKey::Str(s) => f.write_str(s),
            PropKey::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for PropKey {
    fn from(key: &str) -> Self {
        PropKey::Str(Rc::from(key))
    }
}

impl From<String> for PropKey {
    fn from(key: String) -> Self {
        PropKey::Str(Rc::from(key))
    }
}

impl From<Rc<str>> for PropKey {
    fn from(key: Rc<str>) -> Self {
        PropKey::Str(key)
    }
}

impl From<i64> for PropKey {
    fn from(key: i64) -> Self {
        PropKey::Int(key)
    }
}

impl From<i32> for PropKey {
    fn from(key: i32) -> Self {
        PropKey::Int(i64::from(key))
    }
}

impl From<usize> for PropKey {
    fn from(key: usize) -> Self {
        PropKey::Int(key as i64)
    }
}

impl From<&PropKey> for PropKey {
    fn from(key: &PropKey) -> Self {
        key.clone()
    }
}

/// The structural kind of a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Object,
    Array,
    Map,
    Set,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::Object => "object",
            Shape::Array => "array",
            Shape::Map => "map",
            Shape::Set => "set",
        })
    }
}

/// Storage for each shape. Objects and maps keep insertion order.
///
/// Array slots are `None` where an element was deleted or skipped over; such
/// holes count toward the length but are not present keys.
pub(crate) enum TargetData {
    Object(IndexMap<PropKey, Value>),
    Array(Vec<Option<Value>>),
    Map(IndexMap<PropKey, Value>),
    Set(IndexSet<PropKey>),
}

impl TargetData {
    pub(crate) fn shape(&self) -> Shape {
        match self {
            TargetData::Object(_) => Shape::Object,
            TargetData::Array(_) => Shape::Array,
            TargetData::Map(_) => Shape::Map,
            TargetData::Set(_) => Shape::Set,
        }
    }

    /// The stored value at `key`, without any unwrapping.
    pub(crate) fn slot(&self, key: &PropKey) -> Option<Value> {
        match self {
            TargetData::Object(fields) | TargetData::Map(fields) => fields.get(key).cloned(),
            TargetData::Array(items) => key.as_index().and_then(|i| items.get(i).cloned().flatten()),
            TargetData::Set(_) => None,
        }
    }

    pub(crate) fn contains(&self, key: &PropKey) -> bool {
        match self {
            TargetData::Object(fields) | TargetData::Map(fields) => fields.contains_key(key),
            TargetData::Array(items) => key
                .as_index()
                .is_some_and(|i| items.get(i).is_some_and(Option::is_some)),
            TargetData::Set(members) => members.contains(key),
        }
    }

    pub(crate) fn keys(&self) -> Vec<PropKey> {
        match self {
            TargetData::Object(fields) | TargetData::Map(fields) => fields.keys().cloned().collect(),
            TargetData::Array(items) => items
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .map(|(i, _)| PropKey::from(i))
                .collect(),
            TargetData::Set(members) => members.iter().cloned().collect(),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            TargetData::Object(fields) | TargetData::Map(fields) => fields.len(),
            TargetData::Array(items) => items.len(),
            TargetData::Set(members) => members.len(),
        }
    }
}

struct TargetInner {
    id: TargetId,
    data: RefCell<TargetData>,
}

/// A raw object, array, map or set.
///
/// Cloning a `Target` clones the handle, not the data.
#[derive(Clone)]
pub struct Target {
    inner: Rc<TargetInner>,
}

impl Target {
    fn from_data(data: TargetData) -> Self {
        Self {
            inner: Rc::new(TargetInner {
                id: TargetId::new(),
                data: RefCell::new(data),
            }),
        }
    }

    /// An empty plain object.
    pub fn object() -> Self {
        Self::from_data(TargetData::Object(IndexMap::new()))
    }

    /// A plain object with the given fields, in order.
    pub fn from_fields<K, I>(fields: I) -> Self
    where
        K: Into<PropKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::from_data(TargetData::Object(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// An array holding `items`.
    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Self::from_data(TargetData::Array(items.into_iter().map(Some).collect()))
    }

    /// A map with the given entries.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<PropKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Self::from_data(TargetData::Map(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// A set with the given members.
    pub fn set<K, I>(members: I) -> Self
    where
        K: Into<PropKey>,
        I: IntoIterator<Item = K>,
    {
        Self::from_data(TargetData::Set(members.into_iter().map(Into::into).collect()))
    }

    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    pub fn shape(&self) -> Shape {
        self.inner.data.borrow().shape()
    }

    /// Whether both handles point at the same target.
    pub fn ptr_eq(&self, other: &Target) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read a slot directly. Nothing is tracked and nothing is unwrapped.
    pub fn get_raw(&self, key: impl Into<PropKey>) -> Option<Value> {
        self.inner.data.borrow().slot(&key.into())
    }

    /// Number of fields, elements or members. Not tracked.
    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn data(&self) -> Borrowed<'_, TargetData> {
        self.inner.data.borrow()
    }

    pub(crate) fn data_mut(&self) -> RefMut<'_, TargetData> {
        self.inner.data.borrow_mut()
    }
}

impl PartialEq for Target {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Target {}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("id", &self.id())
            .field("shape", &self.shape())
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_compare_by_identity() {
        let a = Target::object();
        let b = Target::object();

        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn array_slots_use_integer_keys() {
        let t = Target::array([Value::from(1), Value::from(2)]);

        assert_eq!(t.shape(), Shape::Array);
        assert_eq!(t.get_raw(1usize), Some(Value::from(2)));
        assert_eq!(t.get_raw("1"), None);
        assert_eq!(t.get_raw(-1), None);
    }

    #[test]
    fn array_holes_are_not_present() {
        let t = Target::array([Value::from(1), Value::from(2)]);
        if let TargetData::Array(items) = &mut *t.data_mut() {
            items[0] = None;
        }

        assert_eq!(t.len(), 2);
        assert_eq!(t.get_raw(0usize), None);
        assert!(!t.data().contains(&PropKey::from(0usize)));
        assert_eq!(t.data().keys(), vec![PropKey::from(1usize)]);
    }

    #[test]
    fn set_keys_preserve_insertion_order() {
        let t = Target::set(["b", "a", "b"]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.data().keys(), vec![PropKey::from("b"), PropKey::from("a")]);
    }
}
