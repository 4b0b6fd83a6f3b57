//! Dynamic Values
//!
//! `Value` is what flows through reactive objects and cells: scalars, raw
//! targets, wrapped targets, and cells. Keeping raw and wrapped forms as
//! distinct variants lets the engine decide when to wrap (on read) and when
//! to unwrap (on write) without guessing.

use std::fmt;
use std::rc::Rc;

use super::cell::Ref;
use super::computed::Computed;
use super::proxy::Reactive;
use super::target::{PropKey, Target};

/// A dynamically typed value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
    /// A raw, unwrapped target.
    Object(Target),
    /// A target seen through its reactive wrapper.
    Reactive(Reactive),
    /// A cell of any flavour.
    Ref(Ref),
}

impl Value {
    /// A raw plain object with the given fields.
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<PropKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Target::from_fields(fields))
    }

    /// A raw array.
    pub fn array<I: IntoIterator<Item = Value>>(items: I) -> Self {
        Value::Object(Target::array(items))
    }

    /// A raw map.
    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<PropKey>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(Target::map(entries))
    }

    /// A raw set.
    pub fn set<K, I>(members: I) -> Self
    where
        K: Into<PropKey>,
        I: IntoIterator<Item = K>,
    {
        Value::Object(Target::set(members))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Whether this is a target, raw or wrapped.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_) | Value::Reactive(_))
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64()
            .filter(|n| n.fract() == 0.0)
            .map(|n| n as i64)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(&**s),
            _ => None,
        }
    }

    /// The underlying target of a raw or wrapped object.
    pub fn as_target(&self) -> Option<&Target> {
        match self {
            Value::Object(target) => Some(target),
            Value::Reactive(reactive) => Some(reactive.target()),
            _ => None,
        }
    }

    pub fn as_reactive(&self) -> Option<&Reactive> {
        match self {
            Value::Reactive(reactive) => Some(reactive),
            _ => None,
        }
    }

    pub fn as_ref_cell(&self) -> Option<&Ref> {
        match self {
            Value::Ref(cell) => Some(cell),
            _ => None,
        }
    }

    /// Strip the reactive wrapper, if any.
    pub fn to_raw(&self) -> Value {
        match self {
            Value::Reactive(reactive) => Value::Object(reactive.target().clone()),
            other => other.clone(),
        }
    }

    /// Change detection used by every write path.
    ///
    /// NaN is the same as NaN, `+0` is the same as `-0`, and targets,
    /// wrappers and cells compare by identity. A wrapper is the same as the
    /// raw target it wraps.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            (a, b) => match (a.as_target(), b.as_target()) {
                (Some(a), Some(b)) => a.ptr_eq(b),
                _ => false,
            },
        }
    }

    /// Whether writing `new` over `self` is an observable change.
    pub fn has_changed(&self, new: &Value) -> bool {
        !self.is_same(new)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("Undefined"),
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Object(target) => write!(f, "Object({:?})", target),
            Value::Reactive(reactive) => write!(f, "Reactive({:?})", reactive),
            Value::Ref(cell) => write!(f, "Ref({:?})", cell),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Rc::from(s))
    }
}

impl From<PropKey> for Value {
    fn from(key: PropKey) -> Self {
        match key {
            PropKey::Str(s) => Value::String(s),
            PropKey::Int(i) => Value::from(i),
        }
    }
}

impl From<Target> for Value {
    fn from(target: Target) -> Self {
        Value::Object(target)
    }
}

impl From<Reactive> for Value {
    fn from(reactive: Reactive) -> Self {
        Value::Reactive(reactive)
    }
}

impl From<Ref> for Value {
    fn from(cell: Ref) -> Self {
        Value::Ref(cell)
    }
}

impl From<&Ref> for Value {
    fn from(cell: &Ref) -> Self {
        Value::Ref(cell.clone())
    }
}

impl From<Computed> for Value {
    fn from(computed: Computed) -> Self {
        Value::Ref(computed.into())
    }
}

/// Builds raw targets from JSON literals: objects become plain objects and
/// arrays become arrays, recursively.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => Value::array(items.into_iter().map(Value::from)),
            serde_json::Value::Object(fields) => {
                Value::object(fields.into_iter().map(|(k, v)| (k, Value::from(v))))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_is_same_as_nan() {
        let nan = Value::from(f64::NAN);
        assert!(nan.is_same(&Value::from(f64::NAN)));
        assert!(!nan.has_changed(&nan.clone()));
    }

    #[test]
    fn signed_zeroes_are_same() {
        assert!(Value::from(0.0).is_same(&Value::from(-0.0)));
    }

    #[test]
    fn targets_compare_by_identity() {
        let a = Value::object([("x", Value::from(1))]);
        let b = Value::object([("x", Value::from(1))]);

        assert!(a.is_same(&a.clone()));
        assert!(!a.is_same(&b));
    }

    #[test]
    fn different_kinds_are_never_same() {
        assert!(!Value::Undefined.is_same(&Value::Null));
        assert!(!Value::from(1).is_same(&Value::from("1")));
        assert!(!Value::from(true).is_same(&Value::from(1)));
    }

    #[test]
    fn json_literals_become_raw_targets() {
        let value = Value::from(json!({ "a": 1, "b": { "c": [true, "x"] } }));

        let target = value.as_target().unwrap();
        assert_eq!(target.get_raw("a"), Some(Value::from(1)));

        let nested = target.get_raw("b").unwrap();
        let list = nested.as_target().unwrap().get_raw("c").unwrap();
        let list = list.as_target().unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.get_raw(1usize), Some(Value::from("x")));
    }

    #[test]
    fn integer_accessor_rejects_fractions() {
        assert_eq!(Value::from(3).as_i64(), Some(3));
        assert_eq!(Value::from(3.5).as_i64(), None);
        assert_eq!(Value::from("3").as_i64(), None);
    }
}
