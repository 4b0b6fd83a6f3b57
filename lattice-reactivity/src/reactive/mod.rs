//! Reactive Primitives
//!
//! This module implements the core reactive system: reactive objects, cells,
//! derived cells, and effects. These primitives form the foundation of
//! Lattice's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Reactive Objects
//!
//! A reactive object wraps a raw object, array, map or set. Reads inside an
//! effect subscribe the effect to the key that was read; writes wake the
//! effects subscribed to the key that was written. Nested targets are wrapped
//! on first access.
//!
//! ## Cells
//!
//! A cell holds a single value behind the same protocol. Cells stored inside
//! reactive objects are unwrapped on read and written through on write, so a
//! cell and the object field holding it never disagree.
//!
//! ## Derived Cells
//!
//! A derived cell caches the result of a getter and recomputes only when read
//! after one of the getter's inputs changed.
//!
//! ## Effects
//!
//! An effect is a computation that re-runs whenever state it read changes.
//! Its dependency set is rebuilt on every run.
//!
//! # Implementation Notes
//!
//! All tracking state lives in an explicit [`Runtime`]. When a value is read,
//! the runtime checks its active-effect stack and, if an effect is running,
//! records the dependency.
//!
//! This approach (sometimes called "automatic dependency tracking" or
//! "transparent reactivity") is used by SolidJS, Vue 3, and Leptos.

mod cell;
mod computed;
mod context;
mod effect;
mod proxy;
mod runtime;
mod subscriber;
mod target;
mod to_refs;
mod value;

pub use cell::{Ref, RefKind};
pub use computed::Computed;
pub use effect::{Effect, EffectOptions};
pub use proxy::Reactive;
pub use runtime::Runtime;
pub use subscriber::{DebugHook, DebuggerEvent, EffectId, Job, Scheduler};
pub use target::{PropKey, Shape, Target};
pub use value::Value;

pub(crate) use subscriber::Runnable;

/// Whether `value` is a cell (stored, derived, or field cell).
///
/// Structural look-alikes, such as an object with a `value` field, are not.
pub fn is_ref(value: &Value) -> bool {
    matches!(value, Value::Ref(_))
}

/// Whether `value` is a reactive wrapper.
pub fn is_reactive(value: &Value) -> bool {
    matches!(value, Value::Reactive(_))
}

/// Strip the reactive wrapper from `value`, if any.
pub fn to_raw(value: &Value) -> Value {
    value.to_raw()
}

/// The value held by a cell, or `value` itself if it is not a cell.
pub fn unref(value: &Value) -> Value {
    match value {
        Value::Ref(cell) => cell.value(),
        other => other.clone(),
    }
}
