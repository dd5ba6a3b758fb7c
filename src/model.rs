//! Data model for tracked progress
//!
//! A [`Collection`] is an ordered list of [`Todo`]s, each owning an ordered
//! list of weighted [`Subtask`]s. New entries are prepended, so both lists
//! read most-recent-first.

use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

use crate::progress::effective_weight;

/// Root persisted value.
pub type Collection = Vec<Todo>;

/// A top-level tracked item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: String,
    pub title: String,
    pub subtasks: Vec<Subtask>,
}

impl Todo {
    /// Create a todo with a fresh id and no subtasks.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: generate_id(),
            title: title.into(),
            subtasks: Vec::new(),
        }
    }

    pub fn subtask_mut(&mut self, subtask_id: &str) -> Option<&mut Subtask> {
        self.subtasks.iter_mut().find(|sub| sub.id == subtask_id)
    }
}

/// A leaf unit of work carrying a completion flag and a relative weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub text: String,
    pub done: bool,
    #[serde(serialize_with = "serialize_weight")]
    pub weight: f64,
}

impl Subtask {
    /// Create an open subtask; the weight is coerced to a finite value >= 0.
    pub fn new(text: impl Into<String>, weight: f64) -> Self {
        Self {
            id: generate_id(),
            text: text.into(),
            done: false,
            weight: effective_weight(weight),
        }
    }
}

/// Generate an opaque unique id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

// Whole weights are written as integers (`2`, not `2.0`).
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn serialize_weight<S: Serializer>(weight: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let weight = effective_weight(*weight);
    if weight.fract() == 0.0 && weight <= MAX_EXACT_INTEGER {
        serializer.serialize_u64(weight as u64)
    } else {
        serializer.serialize_f64(weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_weights_serialize_as_integers() {
        let mut sub = Subtask::new("Draft", 2.0);
        sub.id = "s1".to_string();
        let json = serde_json::to_string(&sub).unwrap();
        assert_eq!(json, r#"{"id":"s1","text":"Draft","done":false,"weight":2}"#);
    }

    #[test]
    fn fractional_weights_keep_fraction() {
        let sub = Subtask::new("Edit", 0.5);
        let json = serde_json::to_value(&sub).unwrap();
        assert_eq!(json["weight"], serde_json::json!(0.5));
    }

    #[test]
    fn new_subtask_coerces_weight() {
        assert_eq!(Subtask::new("a", f64::NAN).weight, 1.0);
        assert_eq!(Subtask::new("b", -3.0).weight, 0.0);
        assert_eq!(Subtask::new("c", 4.25).weight, 4.25);
    }

    #[test]
    fn todo_field_order_matches_persisted_shape() {
        let todo = Todo {
            id: "t1".to_string(),
            title: "Write paper".to_string(),
            subtasks: Vec::new(),
        };
        let json = serde_json::to_string(&todo).unwrap();
        assert_eq!(json, r#"{"id":"t1","title":"Write paper","subtasks":[]}"#);
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = generate_id();
        let b = generate_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }
}
