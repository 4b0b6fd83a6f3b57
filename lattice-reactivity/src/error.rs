//! Error types for the reactive engine.
//!
//! Almost every operation in this crate degrades gracefully: reading a key
//! that does not exist yields `Value::Undefined`, tracking outside an effect
//! is inert, and triggering a key nobody subscribed to does nothing. The
//! variants below cover the few cases that are genuine programmer errors.

use thiserror::Error;

use crate::graph::TargetId;
use crate::reactive::Shape;

/// Errors reported by the reactive engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// An operation received an argument outside the domain it is defined on,
    /// e.g. `to_refs` over a raw object or a string key used to index an array.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A write was attempted on a derived value that has no setter.
    #[error("derived value {id} is read-only")]
    ReadOnly { id: TargetId },

    /// A collection method was invoked on a target shape that lacks it.
    #[error("`{op}` is not supported on {shape} targets")]
    UnsupportedOperation { op: &'static str, shape: Shape },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_operation() {
        let err = ReactiveError::UnsupportedOperation {
            op: "push",
            shape: Shape::Object,
        };
        assert_eq!(err.to_string(), "`push` is not supported on object targets");

        let err = ReactiveError::InvalidArgument("expected a reactive object".into());
        assert!(err.to_string().starts_with("invalid argument"));
    }
}
