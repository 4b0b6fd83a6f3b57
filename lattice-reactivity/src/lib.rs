//! Lattice Reactivity
//!
//! This crate provides the dependency-tracking core of the Lattice reactive
//! UI framework. It records which computations ("effects") read which pieces
//! of state, and re-runs exactly those computations when that state changes.
//! It implements:
//!
//! - Reactive objects over raw objects, arrays, maps and sets
//! - Cells and derived cells sharing the same track/trigger protocol
//! - Effects with dynamic re-subscription, stop, and pluggable scheduling
//! - Field splitting of reactive objects into pass-through cells
//!
//! Rendering, templating and scheduling policy live outside this crate.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives, the runtime, and dependency tracking
//! - `graph`: The dependency store (an arena of subscription sets)
//! - `operations`: The read/write operation taxonomy
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use lattice_reactivity::{Runtime, Value};
//! use serde_json::json;
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let rt = Runtime::new();
//! let state = rt.reactive(json!({ "count": 1 }));
//! let state = state.as_reactive().cloned().unwrap();
//!
//! let seen = Rc::new(Cell::new(0.0));
//! let seen_clone = seen.clone();
//! let state_clone = state.clone();
//! let _effect = rt.effect(move || {
//!     seen_clone.set(state_clone.get("count").as_f64().unwrap_or_default());
//! });
//!
//! state.set("count", 5).unwrap();
//! // Effect automatically ran again
//! assert_eq!(seen.get(), 5.0);
//! ```

pub mod error;
pub mod graph;
pub mod operations;
pub mod reactive;

pub use error::{ReactiveError, Result};
pub use graph::{DepKey, TargetId};
pub use operations::OperationKind;
pub use reactive::{
    is_reactive, is_ref, to_raw, unref, Computed, DebuggerEvent, Effect, EffectId,
    EffectOptions, Job, PropKey, Reactive, Ref, RefKind, Runtime, Shape, Target, Value,
};
