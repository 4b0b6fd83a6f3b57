//! Field Splitter
//!
//! Turns the first-level fields of a reactive object into cells. The cells
//! own nothing: each one reads and writes `object[key]` through the object's
//! wrapper, so the object's deps stay the single source of truth and both
//! write paths wake the same effects.

use std::rc::Rc;

use indexmap::IndexMap;

use super::cell::{Ref, RefKind, RefSource};
use super::proxy::Reactive;
use super::target::{PropKey, Shape};
use super::value::Value;
use crate::error::{ReactiveError, Result};
use crate::graph::TargetId;

/// A cell that forwards to one field of a reactive object.
struct ObjectFieldRef {
    id: TargetId,
    object: Reactive,
    key: PropKey,
}

impl RefSource for ObjectFieldRef {
    fn id(&self) -> TargetId {
        self.id
    }

    fn kind(&self) -> RefKind {
        RefKind::ObjectField
    }

    fn get(&self) -> Value {
        self.object.get(&self.key)
    }

    fn set(&self, value: Value) -> Result<()> {
        self.object.set(&self.key, value)
    }
}

pub(crate) fn object_ref(object: &Reactive, key: PropKey) -> Ref {
    Ref(Rc::new(ObjectFieldRef {
        id: TargetId::new(),
        object: object.clone(),
        key,
    }))
}

pub(crate) fn to_refs(value: &Value) -> Result<IndexMap<PropKey, Ref>> {
    let object = match value {
        Value::Reactive(object) => object,
        other => {
            return Err(ReactiveError::InvalidArgument(format!(
                "to_refs expects a reactive object, got {}",
                describe(other)
            )))
        }
    };

    match object.shape() {
        Shape::Object | Shape::Array => {}
        shape => {
            return Err(ReactiveError::InvalidArgument(format!(
                "to_refs expects a reactive object or array, got a reactive {shape}"
            )))
        }
    }

    // Enumerating the key set here is not a tracked read.
    let keys = object.target().data().keys();
    Ok(keys
        .into_iter()
        .map(|key| {
            let cell = object_ref(object, key.clone());
            (key, cell)
        })
        .collect())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Undefined => "undefined",
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Object(_) => "a raw object",
        Value::Reactive(_) => "a reactive object",
        Value::Ref(_) => "a cell",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    use serde_json::json;

    use crate::reactive::{is_ref, Runtime};

    #[test]
    fn splits_first_level_fields() {
        let rt = Runtime::new();
        let obj = rt.reactive(json!({ "x": 1, "y": { "z": 2 } }));

        let refs = rt.to_refs(&obj).unwrap();
        let keys: Vec<_> = refs.keys().cloned().collect();
        assert_eq!(keys, vec![PropKey::from("x"), PropKey::from("y")]);

        for cell in refs.values() {
            assert!(is_ref(&Value::Ref(cell.clone())));
            assert_eq!(cell.kind(), RefKind::ObjectField);
        }

        // Nested objects are read through the wrapper.
        assert!(refs[&PropKey::from("y")].value().as_reactive().is_some());
    }

    #[test]
    fn field_cells_are_two_way_views() {
        let rt = Runtime::new();
        let obj = rt.reactive(json!({ "x": 1 }));
        let object = obj.as_reactive().unwrap();
        let x = rt.to_ref(object, "x");

        object.set("x", 2).unwrap();
        assert_eq!(x.value(), Value::from(2));

        x.set_value(3).unwrap();
        assert_eq!(object.get("x"), Value::from(3));
    }

    #[test]
    fn arrays_split_by_index() {
        let rt = Runtime::new();
        let list = rt.reactive(json!(["a", "b"]));

        let refs = rt.to_refs(&list).unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[&PropKey::from(1usize)].value(), Value::from("b"));
    }

    #[test]
    fn rejects_values_that_are_not_reactive_objects() {
        let rt = Runtime::new();

        for value in [
            Value::from(json!({ "x": 1 })),
            Value::from(1),
            Value::Ref(rt.cell(1)),
            rt.reactive(Value::map([("k", Value::from(1))])),
        ] {
            let err = rt.to_refs(&value).unwrap_err();
            assert!(matches!(err, ReactiveError::InvalidArgument(_)), "{err}");
        }
    }

    #[test]
    fn splitting_inside_an_effect_does_not_track() {
        let rt = Runtime::new();
        let obj = rt.reactive(json!({ "x": 1 }));
        let runs = Rc::new(Cell::new(0));

        let rt_clone = rt.clone();
        let obj_clone = obj.clone();
        let runs_clone = runs.clone();
        let effect = rt.effect(move || {
            runs_clone.set(runs_clone.get() + 1);
            let _ = rt_clone.to_refs(&obj_clone);
        });

        obj.as_reactive().unwrap().set("y", 2).unwrap();
        assert_eq!(runs.get(), 1);
        assert_eq!(effect.dependency_count(), 0);
    }
}
