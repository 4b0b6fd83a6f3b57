//! Derived Cell Implementation
//!
//! A `Computed` is a cached value produced by a getter. It is backed by a
//! lazy effect whose scheduler, instead of re-running the getter, marks the
//! cache dirty and wakes whoever reads the derived cell.
//!
//! # How Derived Cells Work
//!
//! 1. Nothing is computed on creation. The cache starts dirty.
//!
//! 2. On read, a dirty cache is refreshed by running the backing effect,
//!    which tracks the getter's reads against the derived cell.
//!
//! 3. The outer read is then tracked against the derived cell's own
//!    identity. Effects reading a derived cell subscribe to it, not to its
//!    inputs.
//!
//! 4. When an input changes, the scheduler flips the cache to dirty and
//!    triggers the derived cell's own readers. The getter does not run until
//!    somebody reads again.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{debug, warn};

use super::cell::{Ref, RefKind, RefSource};
use super::effect::{Effect, EffectOptions};
use super::runtime::RuntimeInner;
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::graph::{DepKey, TargetId};
use crate::operations::OperationKind;

pub(crate) type Setter = Box<dyn Fn(Value)>;

struct ComputedInner {
    id: TargetId,
    runtime: Weak<RuntimeInner>,
    effect: Effect<Value>,
    /// Last computed value.
    value: RefCell<Value>,
    dirty: Cell<bool>,
    setter: Option<Setter>,
}

impl ComputedInner {
    /// Called by the backing effect's scheduler when an input changed.
    fn invalidate(&self) {
        if self.dirty.replace(true) {
            return;
        }
        debug!(computed = %self.id, "derived value invalidated");
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.trigger(self.id, DepKey::Value, OperationKind::Set);
        }
    }
}

impl RefSource for ComputedInner {
    fn id(&self) -> TargetId {
        self.id
    }

    fn kind(&self) -> RefKind {
        RefKind::Computed
    }

    fn get(&self) -> Value {
        if self.dirty.get() {
            let value = self.effect.run();
            *self.value.borrow_mut() = value;
            self.dirty.set(false);
        }
        if let Some(runtime) = self.runtime.upgrade() {
            runtime.track(self.id, DepKey::Value, OperationKind::Get);
        }
        self.value.borrow().clone()
    }

    fn set(&self, value: Value) -> Result<()> {
        match &self.setter {
            Some(setter) => {
                setter(value);
                Ok(())
            }
            None => {
                warn!(computed = %self.id, "write to read-only derived value rejected");
                Err(ReactiveError::ReadOnly { id: self.id })
            }
        }
    }
}

/// A lazily evaluated, cached derived cell.
///
/// # Example
///
/// ```rust
/// use lattice_reactivity::{Runtime, Value};
///
/// let rt = Runtime::new();
/// let count = rt.cell(2);
///
/// let count_clone = count.clone();
/// let doubled = rt.computed(move || {
///     Value::from(count_clone.value().as_f64().unwrap_or_default() * 2.0)
/// });
///
/// assert_eq!(doubled.value(), Value::from(4));
/// count.set_value(5).unwrap();
/// assert!(doubled.is_dirty());
/// assert_eq!(doubled.value(), Value::from(10));
/// ```
#[derive(Clone)]
pub struct Computed {
    inner: Rc<ComputedInner>,
}

impl Computed {
    pub(crate) fn new<F>(runtime: &Rc<RuntimeInner>, getter: F, setter: Option<Setter>) -> Self
    where
        F: Fn() -> Value + 'static,
    {
        let inner = Rc::new_cyclic(|weak: &Weak<ComputedInner>| {
            let weak = weak.clone();
            let options = EffectOptions::new()
                .lazy(true)
                .computed()
                .scheduler(move |job| match weak.upgrade() {
                    Some(computed) => computed.invalidate(),
                    // The derived cell is gone; nobody can read it again.
                    None => job.stop(),
                });

            ComputedInner {
                id: TargetId::new(),
                runtime: Rc::downgrade(runtime),
                effect: Effect::with_options(runtime, getter, options),
                value: RefCell::new(Value::Undefined),
                dirty: Cell::new(true),
                setter,
            }
        });
        Self { inner }
    }

    /// Get the unique ID used to track reads of this derived cell.
    pub fn id(&self) -> TargetId {
        self.inner.id
    }

    /// Read the value, recomputing if an input changed since the last read.
    pub fn value(&self) -> Value {
        self.inner.get()
    }

    /// Forward a write to the setter. Fails if there is none.
    pub fn set_value(&self, value: impl Into<Value>) -> Result<()> {
        self.inner.set(value.into())
    }

    /// Whether the next read will run the getter.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn is_readonly(&self) -> bool {
        self.inner.setter.is_none()
    }

    /// The lazy effect that runs the getter.
    pub fn effect(&self) -> &Effect<Value> {
        &self.inner.effect
    }

    /// Type-erased cell handle to this derived cell.
    pub fn as_ref_cell(&self) -> Ref {
        Ref(self.inner.clone())
    }
}

impl From<Computed> for Ref {
    fn from(computed: Computed) -> Self {
        Ref(computed.inner)
    }
}

impl From<&Computed> for Ref {
    fn from(computed: &Computed) -> Self {
        computed.as_ref_cell()
    }
}

impl fmt::Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("dirty", &self.is_dirty())
            .field("readonly", &self.is_readonly())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
