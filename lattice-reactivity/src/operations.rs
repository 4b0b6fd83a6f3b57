//! Operation Taxonomy
//!
//! Every tracked access is classified by one of these tags. Reads (`Get`,
//! `Has`, `Iterate`) are passed to `track`; writes (`Set`, `Add`, `Delete`,
//! `Clear`) are passed to `trigger`. The tags serialize to short lowercase
//! strings so that debugger events stay readable when logged or exported.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of access that caused a `track` or `trigger` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// An existing key was overwritten with a different value.
    Set,
    /// A key that did not exist before was written.
    Add,
    /// A key was removed.
    Delete,
    /// Every member of a collection was removed.
    Clear,
    /// A key was read.
    Get,
    /// A key was tested for membership.
    Has,
    /// The key set of a target was enumerated.
    Iterate,
}

impl OperationKind {
    /// All operation kinds, writes first.
    pub const ALL: [OperationKind; 7] = [
        OperationKind::Set,
        OperationKind::Add,
        OperationKind::Delete,
        OperationKind::Clear,
        OperationKind::Get,
        OperationKind::Has,
        OperationKind::Iterate,
    ];

    /// The lowercase name used in logs and serialized events.
    pub const fn as_str(self) -> &'static str {
        match self {
            OperationKind::Set => "set",
            OperationKind::Add => "add",
            OperationKind::Delete => "delete",
            OperationKind::Clear => "clear",
            OperationKind::Get => "get",
            OperationKind::Has => "has",
            OperationKind::Iterate => "iterate",
        }
    }

    /// Whether this kind is reported through `track`.
    pub const fn is_read(self) -> bool {
        matches!(
            self,
            OperationKind::Get | OperationKind::Has | OperationKind::Iterate
        )
    }

    /// Whether this kind is reported through `trigger`.
    pub const fn is_write(self) -> bool {
        !self.is_read()
    }

    /// Structural writes change the key set, so they must also wake
    /// computations that only enumerated the target.
    pub const fn triggers_iteration(self) -> bool {
        matches!(
            self,
            OperationKind::Add | OperationKind::Delete | OperationKind::Clear
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
