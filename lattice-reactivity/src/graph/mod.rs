//! Dependency Graph
//!
//! This module implements the side table that records which effects read
//! which (target, key) pairs.
//!
//! # Overview
//!
//! The graph is bipartite:
//!
//! - Deps represent one readable slot: a property of a raw target, the key
//!   set of a target, or the value of a cell
//! - Effects represent computations that read slots
//!
//! An edge exists when an effect read a slot during its most recent run.
//! Edges are stored twice: the dep holds the effect, and the effect holds the
//! dep's id. Both sides are cleared together before every re-run.
//!
//! # Design Decisions
//!
//! 1. Deps live in an arena addressed by `DepId` rather than behind shared
//!    pointers, so effects and the store never form ownership cycles.
//!
//! 2. The arena is indexed by `(TargetId, DepKey)` for O(1) lookups.
//!
//! 3. Empty deps are removed eagerly so the store only grows with the number
//!    of live subscriptions.

mod node;
mod store;

pub use node::{Dep, DepId, DepKey, TargetId};
pub use store::DepStore;
pub(crate) use store::JobBatch;
