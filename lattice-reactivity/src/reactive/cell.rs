//! Cell Implementation
//!
//! A cell (`Ref`) holds a single value behind the same track/trigger protocol
//! as reactive objects. It is its own target: reads track
//! `(cell id, DepKey::Value)` and writes trigger the same pair.
//!
//! # Flavours
//!
//! `Ref` is a type-erased handle over three sources:
//!
//! - stored cells, created by [`Runtime::cell`](super::Runtime::cell), which
//!   own their value
//! - derived cells, created by [`Runtime::computed`](super::Runtime::computed)
//! - field cells, created by [`Runtime::to_refs`](super::Runtime::to_refs),
//!   which forward to a field of a reactive object
//!
//! Only values built by these constructors are cells. A plain object that
//! happens to have a `value` field is not.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::runtime::RuntimeInner;
use super::value::Value;
use crate::error::Result;
use crate::graph::{DepKey, TargetId};
use crate::operations::OperationKind;

/// Which kind of source a [`Ref`] reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefKind {
    Stored,
    Computed,
    ObjectField,
}

/// A readable, possibly writable, single value.
pub(crate) trait RefSource {
    fn id(&self) -> TargetId;

    fn kind(&self) -> RefKind;

    /// Read the value, tracking the read.
    fn get(&self) -> Value;

    fn set(&self, value: Value) -> Result<()>;
}

/// Handle to a cell.
///
/// Cloning the handle shares the cell.
#[derive(Clone)]
pub struct Ref(pub(crate) Rc<dyn RefSource>);

impl Ref {
    /// Read the value. Inside an effect, this subscribes the effect.
    pub fn value(&self) -> Value {
        self.0.get()
    }

    /// Write the value. Effects are woken only if it changed.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.0.set(value.into())
    }

    /// Replace the value with `f(current)`.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&Value) -> Value,
    {
        let current = self.value();
        self.set_value(f(&current))
    }

    pub fn id(&self) -> TargetId {
        self.0.id()
    }

    pub fn kind(&self) -> RefKind {
        self.0.kind()
    }

    /// Whether both handles are the same cell.
    pub fn ptr_eq(&self, other: &Ref) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ref")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// A cell that owns its value.
pub(crate) struct StoredRef {
    id: TargetId,
    runtime: Weak<RuntimeInner>,
    /// The value as written, with any wrapper stripped. Used for change
    /// detection.
    raw: RefCell<Value>,
    /// The value as read: raw targets are held wrapped.
    value: RefCell<Value>,
}

impl StoredRef {
    pub(crate) fn new(runtime: &Rc<RuntimeInner>, value: Value) -> Ref {
        let raw = value.to_raw();
        let value = runtime.to_reactive(raw.clone());
        Ref(Rc::new(Self {
            id: TargetId::new(),
            runtime: Rc::downgrade(runtime),
            raw: RefCell::new(raw),
            value: RefCell::new(value),
        }))
    }
}

impl RefSource for StoredRef {
    fn id(&self) -> TargetId {
        self.id
    }

    fn kind(&self) -> RefKind {
        RefKind::Stored
    }

    fn get(&self) -> Value {
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track(self.id, DepKey::Value, OperationKind::Get);
        }
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) -> Result<()> {
        let raw = value.to_raw();
        if !self.raw.borrow().has_changed(&raw) {
            return Ok(());
        }

        let runtime = self.runtime.upgrade();
        let value = match &runtime {
            Some(runtime) => runtime.to_reactive(raw.clone()),
            None => raw.clone(),
        };
        *self.raw.borrow_mut() = raw;
        *self.value.borrow_mut() = value;

        if let Some(runtime) = runtime {
            trace!(cell = %self.id, "cell changed");
            runtime.trigger(self.id, DepKey::Value, OperationKind::Set);
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
