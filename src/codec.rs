//! Import/export of the todo collection.
//!
//! Export is a plain pretty-printed dump of the persisted shape. Import takes
//! arbitrary text: it is rejected only when it is not JSON or not an array;
//! every element of an array is coerced field by field into a valid [`Todo`]
//! and never rejected.

use std::collections::HashSet;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::model::{generate_id, Collection, Subtask, Todo};
use crate::progress::DEFAULT_WEIGHT;

/// Fixed name of the export artifact.
pub const EXPORT_FILE_NAME: &str = "progress-backup.json";

/// Title given to imported todos that have none.
pub const UNTITLED: &str = "Untitled";

/// Why an import was refused. The store is never touched when this is returned.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("expected a JSON array of todos, found {0}")]
    Shape(&'static str),
}

/// Serialize the collection as two-space indented JSON.
pub fn export(todos: &[Todo]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(todos)
}

/// Compact, deterministic form used for the persisted value.
pub fn to_raw(todos: &[Todo]) -> serde_json::Result<String> {
    serde_json::to_string(todos)
}

/// Parse and sanitize externally supplied text.
pub fn import(raw: &str) -> Result<Collection, ImportError> {
    let value: Value = serde_json::from_str(raw).map_err(ImportError::Parse)?;
    let items = match value {
        Value::Array(items) => items,
        other => return Err(ImportError::Shape(kind_of(&other))),
    };

    Ok(sanitize(&items))
}

/// Coerce each element into a [`Todo`], regenerating missing or duplicate ids.
pub(crate) fn sanitize(items: &[Value]) -> Collection {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|item| {
            let mut todo = sanitize_todo(item);
            if !seen.insert(todo.id.clone()) {
                todo.id = generate_id();
                seen.insert(todo.id.clone());
            }
            todo
        })
        .collect()
}

fn sanitize_todo(value: &Value) -> Todo {
    let fields = as_record(value);
    let mut seen = HashSet::new();
    let subtasks = match fields.and_then(|f| f.get("subtasks")) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                let mut sub = sanitize_subtask(item);
                if !seen.insert(sub.id.clone()) {
                    sub.id = generate_id();
                    seen.insert(sub.id.clone());
                }
                sub
            })
            .collect(),
        _ => Vec::new(),
    };

    Todo {
        id: coerce_id(field(fields, "id")),
        title: coerce_string(field(fields, "title")).unwrap_or_else(|| UNTITLED.to_string()),
        subtasks,
    }
}

fn sanitize_subtask(value: &Value) -> Subtask {
    let fields = as_record(value);
    Subtask {
        id: coerce_id(field(fields, "id")),
        text: coerce_string(field(fields, "text")).unwrap_or_default(),
        done: truthy(field(fields, "done")),
        weight: coerce_weight(field(fields, "weight")),
    }
}

// Non-object elements behave like records with no fields.
fn as_record(value: &Value) -> Option<&Map<String, Value>> {
    value.as_object()
}

fn field<'a>(fields: Option<&'a Map<String, Value>>, name: &str) -> Option<&'a Value> {
    fields.and_then(|f| f.get(name))
}

fn coerce_id(value: Option<&Value>) -> String {
    coerce_string(value).unwrap_or_else(generate_id)
}

fn coerce_string(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|v| v != 0.0).unwrap_or(true),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn coerce_weight(value: Option<&Value>) -> f64 {
    let number = to_number(value);
    if number.is_finite() {
        number.max(0.0)
    } else {
        DEFAULT_WEIGHT
    }
}

/// Numeric conversion with the usual loose rules: `null` and `""` are 0,
/// booleans are 0/1, numeric strings parse, everything else is NaN.
fn to_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse::<f64>().unwrap_or(f64::NAN)
            }
        }
        Some(Value::Bool(b)) => {
            if *b {
                1.0
            } else {
                0.0
            }
        }
        Some(Value::Null) => 0.0,
        None | Some(Value::Array(_)) | Some(Value::Object(_)) => f64::NAN,
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Collection {
        vec![Todo {
            id: "t1".to_string(),
            title: "Write paper".to_string(),
            subtasks: vec![
                Subtask {
                    id: "s2".to_string(),
                    text: "Edit".to_string(),
                    done: true,
                    weight: 1.0,
                },
                Subtask {
                    id: "s1".to_string(),
                    text: "Draft".to_string(),
                    done: false,
                    weight: 2.5,
                },
            ],
        }]
    }

    #[test]
    fn export_is_two_space_pretty() {
        let text = export(&sample()).unwrap();
        assert!(text.starts_with("[\n  {\n    \"id\": \"t1\",\n    \"title\": \"Write paper\""));
        assert!(text.contains("\"weight\": 1\n"));
        assert!(text.contains("\"weight\": 2.5\n"));
    }

    #[test]
    fn export_then_import_is_lossless() {
        let todos = sample();
        let back = import(&export(&todos).unwrap()).unwrap();
        assert_eq!(back, todos);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = import("[{").unwrap_err();
        assert!(matches!(err, ImportError::Parse(_)));
    }

    #[test]
    fn non_array_is_shape_error() {
        for (raw, kind) in [
            ("\"hello\"", "string"),
            ("{}", "object"),
            ("42", "number"),
            ("null", "null"),
            ("true", "boolean"),
        ] {
            match import(raw) {
                Err(ImportError::Shape(found)) => assert_eq!(found, kind),
                other => panic!("unexpected result for {raw}: {other:?}"),
            }
        }
    }

    #[test]
    fn missing_fields_are_filled() {
        let todos = import(r#"[{"title":"X"}]"#).unwrap();
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title, "X");
        assert!(!todos[0].id.is_empty());
        assert!(todos[0].subtasks.is_empty());
    }

    #[test]
    fn wrong_typed_fields_are_replaced() {
        let raw = r#"[{"id": 7, "title": null, "subtasks": "nope"}, 5]"#;
        let todos = import(raw).unwrap();
        assert_eq!(todos.len(), 2);
        assert_ne!(todos[0].id, "7");
        assert_eq!(todos[0].title, UNTITLED);
        assert!(todos[0].subtasks.is_empty());
        assert_eq!(todos[1].title, UNTITLED);
    }

    #[test]
    fn subtask_fields_are_coerced() {
        let raw = r#"[{"id":"t","title":"T","subtasks":[
            {"id":"a","text":"A","done":1,"weight":"2.5"},
            {"id":"b","text":3,"done":"","weight":-4},
            {"text":"C","done":"yes","weight":"abc"},
            {"id":"d","done":0,"weight":null},
            {"id":"e","text":"E","done":[],"weight":true},
            {"id":"f","text":"F"}
        ]}]"#;
        let todos = import(raw).unwrap();
        let subs = &todos[0].subtasks;
        assert_eq!(subs.len(), 6);

        assert_eq!((subs[0].done, subs[0].weight), (true, 2.5));
        assert_eq!(subs[1].text, "");
        assert_eq!((subs[1].done, subs[1].weight), (false, 0.0));
        assert!(!subs[2].id.is_empty());
        assert_eq!((subs[2].done, subs[2].weight), (true, 1.0));
        assert_eq!((subs[3].done, subs[3].weight), (false, 0.0));
        assert_eq!((subs[4].done, subs[4].weight), (true, 1.0));
        assert_eq!((subs[5].done, subs[5].weight), (false, 1.0));
    }

    #[test]
    fn duplicate_ids_are_regenerated() {
        let raw = r#"[
            {"id":"same","title":"A","subtasks":[{"id":"s","text":"1"},{"id":"s","text":"2"}]},
            {"id":"same","title":"B","subtasks":[{"id":"s","text":"3"}]}
        ]"#;
        let todos = import(raw).unwrap();
        assert_eq!(todos[0].id, "same");
        assert_ne!(todos[1].id, "same");
        assert_eq!(todos[0].subtasks[0].id, "s");
        assert_ne!(todos[0].subtasks[1].id, "s");
        // Subtask ids only need to be unique within their todo.
        assert_eq!(todos[1].subtasks[0].id, "s");
    }

    #[test]
    fn empty_array_imports_empty() {
        assert!(import("[]").unwrap().is_empty());
    }
}
