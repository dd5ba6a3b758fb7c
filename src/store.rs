//! The persisted, cached todo store
//!
//! [`ProgressStore`] owns the canonical [`Collection`]. It keeps the last raw
//! text seen on the medium next to the parsed snapshot and only re-parses when
//! the raw text changes, so [`ProgressStore::read`] hands out the same `Arc`
//! for as long as nothing was written.
//!
//! Durability is best effort: a failed persist is logged and the in-memory
//! snapshot moves on anyway. Corrupt persisted data reads as an empty
//! collection. Neither is reported to the caller.
//!
//! Every `write`, `reset` and `replace` publishes on the store's
//! [`ChangeBus`] after the cache is updated.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::bus::ChangeBus;
use crate::codec;
use crate::error::{Error, Result};
use crate::medium::Medium;
use crate::model::{Collection, Subtask, Todo};
use crate::progress::effective_weight;

/// Default medium key for the collection.
pub const DEFAULT_KEY: &str = "progress-v1";

struct Snapshot {
    // Last text observed on (or successfully written to) the medium.
    seen: Option<String>,
    // What this store itself last put on the medium; `Some(None)` after a
    // successful removal, `None` before its first persist.
    written: Option<Option<String>>,
    // The latest write or reset did not reach the medium.
    unsaved: bool,
    todos: Arc<Collection>,
}

pub struct ProgressStore {
    medium: Box<dyn Medium>,
    key: String,
    cache: Mutex<Snapshot>,
    bus: ChangeBus,
}

impl ProgressStore {
    pub fn new(medium: impl Medium + 'static, key: impl Into<String>) -> Self {
        Self {
            medium: Box::new(medium),
            key: key.into(),
            cache: Mutex::new(Snapshot {
                seen: None,
                written: None,
                unsaved: false,
                todos: Arc::new(Vec::new()),
            }),
            bus: ChangeBus::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bus that receives this store's same-context change signal.
    pub fn bus(&self) -> &ChangeBus {
        &self.bus
    }

    /// Current snapshot, re-parsed only if the medium's raw text changed.
    pub fn read(&self) -> Arc<Collection> {
        let mut cache = self.cache();
        self.refresh(&mut cache);
        Arc::clone(&cache.todos)
    }

    /// True when the medium holds different text than the cache last saw.
    pub fn is_stale(&self) -> bool {
        let current = match self.medium.get(&self.key) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(key = %self.key, error = %err, "stale check could not read medium");
                return false;
            }
        };
        self.cache().seen != current
    }

    /// True unless the medium holds exactly what this store last wrote or
    /// removed. A change another context made is reported even after a
    /// `read` has already picked it up.
    pub fn has_foreign_change(&self) -> bool {
        let current = match self.medium.get(&self.key) {
            Ok(raw) => raw,
            Err(err) => {
                debug!(key = %self.key, error = %err, "foreign change check could not read medium");
                return false;
            }
        };
        self.cache().written.as_ref() != Some(&current)
    }

    /// False when the latest write or reset failed to reach the medium.
    pub fn is_saved(&self) -> bool {
        !self.cache().unsaved
    }

    /// Persist `next` (best effort), make it the cached snapshot, notify.
    pub fn write(&self, next: Collection) {
        self.store(next);
        self.bus.publish();
    }

    /// Wholesale replacement used by import; one write, one notification.
    pub fn replace(&self, next: Collection) {
        self.write(next);
    }

    /// Drop the persisted value and empty the cache.
    pub fn reset(&self) {
        let removed = match self.medium.remove(&self.key) {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to remove persisted progress");
                false
            }
        };
        {
            let mut cache = self.cache();
            if removed {
                cache.seen = None;
                cache.written = Some(None);
            }
            cache.unsaved = !removed;
            cache.todos = Arc::new(Vec::new());
        }
        debug!(key = %self.key, "progress reset");
        self.bus.publish();
    }

    /// Apply `edit` to a copy of the current collection and write the result.
    ///
    /// Nothing is written and nobody is notified when `edit` fails.
    pub fn update<T>(&self, edit: impl FnOnce(&mut Collection) -> Result<T>) -> Result<T> {
        let mut next = (*self.read()).clone();
        let out = edit(&mut next)?;
        self.write(next);
        Ok(out)
    }

    pub fn add_todo(&self, title: &str) -> Result<Todo> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidArgument("todo title cannot be empty".to_string()));
        }
        let todo = Todo::new(title);
        let created = todo.clone();
        self.update(move |todos| {
            todos.insert(0, todo);
            Ok(())
        })?;
        Ok(created)
    }

    pub fn remove_todo(&self, todo_id: &str) -> Result<()> {
        self.update(|todos| {
            let before = todos.len();
            todos.retain(|todo| todo.id != todo_id);
            if todos.len() == before {
                return Err(Error::TodoNotFound(todo_id.to_string()));
            }
            Ok(())
        })
    }

    pub fn add_subtask(&self, todo_id: &str, text: &str, weight: f64) -> Result<Subtask> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidArgument("subtask text cannot be empty".to_string()));
        }
        let sub = Subtask::new(text, weight);
        let created = sub.clone();
        self.update(move |todos| {
            find_todo(todos, todo_id)?.subtasks.insert(0, sub);
            Ok(())
        })?;
        Ok(created)
    }

    /// Flip a subtask's completion flag; returns the new value.
    pub fn toggle_subtask(&self, todo_id: &str, subtask_id: &str) -> Result<bool> {
        self.update(|todos| {
            let sub = find_subtask(todos, todo_id, subtask_id)?;
            sub.done = !sub.done;
            Ok(sub.done)
        })
    }

    pub fn remove_subtask(&self, todo_id: &str, subtask_id: &str) -> Result<()> {
        self.update(|todos| {
            let todo = find_todo(todos, todo_id)?;
            let before = todo.subtasks.len();
            todo.subtasks.retain(|sub| sub.id != subtask_id);
            if todo.subtasks.len() == before {
                return Err(subtask_not_found(todo_id, subtask_id));
            }
            Ok(())
        })
    }

    /// Store the coerced weight and return it.
    pub fn set_subtask_weight(&self, todo_id: &str, subtask_id: &str, weight: f64) -> Result<f64> {
        let weight = effective_weight(weight);
        self.update(|todos| {
            find_subtask(todos, todo_id, subtask_id)?.weight = weight;
            Ok(weight)
        })
    }

    /// Resolve a full todo id or a unique prefix of one.
    pub fn resolve_todo_id(&self, input: &str) -> Result<String> {
        let todos = self.read();
        resolve_id(input, todos.iter().map(|todo| todo.id.as_str()))
            .ok_or_else(|| Error::TodoNotFound(input.to_string()))?
    }

    /// Resolve a full subtask id or a unique prefix within one todo.
    pub fn resolve_subtask_id(&self, todo_id: &str, input: &str) -> Result<String> {
        let todos = self.read();
        let todo = todos
            .iter()
            .find(|todo| todo.id == todo_id)
            .ok_or_else(|| Error::TodoNotFound(todo_id.to_string()))?;
        resolve_id(input, todo.subtasks.iter().map(|sub| sub.id.as_str()))
            .ok_or_else(|| subtask_not_found(todo_id, input))?
    }

    /// Pretty-printed backup of the current collection.
    pub fn export(&self) -> Result<String> {
        Ok(codec::export(&self.read())?)
    }

    /// Replace the collection with sanitized `raw`; returns the todo count.
    ///
    /// Unparsable or non-array input is rejected before anything is written.
    pub fn import(&self, raw: &str) -> Result<usize> {
        let todos = codec::import(raw)?;
        let count = todos.len();
        self.replace(todos);
        debug!(key = %self.key, todos = count, "imported progress");
        Ok(count)
    }

    fn cache(&self) -> MutexGuard<'_, Snapshot> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refresh(&self, cache: &mut Snapshot) {
        let raw = match self.medium.get(&self.key) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to read persisted progress; keeping cached state");
                return;
            }
        };
        if raw == cache.seen {
            return;
        }

        let todos = match raw.as_deref() {
            None => Vec::new(),
            Some(text) => parse_persisted(text).unwrap_or_else(|err| {
                warn!(key = %self.key, error = %err, "persisted progress is corrupt; starting empty");
                Vec::new()
            }),
        };
        debug!(key = %self.key, todos = todos.len(), "refreshed progress cache");
        cache.seen = raw;
        cache.todos = Arc::new(todos);
    }

    // The cache lock is not held while the medium is written, so foreign
    // listeners fired by the medium may read any store. After a failed
    // persist `seen` keeps the medium's old text, so the unpersisted
    // snapshot survives reads until the medium changes again.
    fn store(&self, next: Collection) {
        let raw = match codec::to_raw(&next) {
            Ok(raw) => raw,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to serialize progress; write dropped");
                self.cache().unsaved = true;
                return;
            }
        };

        let persisted = match self.medium.set(&self.key, &raw) {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %self.key, error = %err, "failed to persist progress; keeping in-memory state");
                false
            }
        };

        let mut cache = self.cache();
        if persisted {
            cache.seen = Some(raw.clone());
            cache.written = Some(Some(raw));
        }
        cache.unsaved = !persisted;
        cache.todos = Arc::new(next);
        debug!(key = %self.key, todos = cache.todos.len(), "progress written");
    }
}

impl std::fmt::Debug for ProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressStore")
            .field("key", &self.key)
            .field("bus", &self.bus)
            .finish()
    }
}

// Corrupt means unparsable, not an array, or holding a non-record element.
// Records with missing or mistyped fields are kept and coerced field by field.
fn parse_persisted(text: &str) -> std::result::Result<Collection, String> {
    let value: Value = serde_json::from_str(text).map_err(|err| err.to_string())?;
    let Value::Array(items) = value else {
        return Err("persisted value is not an array".to_string());
    };
    if let Some(index) = items.iter().position(|item| !item.is_object()) {
        return Err(format!("element {index} is not a todo record"));
    }
    Ok(codec::sanitize(&items))
}

fn find_todo<'a>(todos: &'a mut Collection, todo_id: &str) -> Result<&'a mut Todo> {
    todos
        .iter_mut()
        .find(|todo| todo.id == todo_id)
        .ok_or_else(|| Error::TodoNotFound(todo_id.to_string()))
}

fn find_subtask<'a>(
    todos: &'a mut Collection,
    todo_id: &str,
    subtask_id: &str,
) -> Result<&'a mut Subtask> {
    find_todo(todos, todo_id)?
        .subtask_mut(subtask_id)
        .ok_or_else(|| subtask_not_found(todo_id, subtask_id))
}

fn subtask_not_found(todo_id: &str, subtask_id: &str) -> Error {
    Error::SubtaskNotFound {
        todo: todo_id.to_string(),
        subtask: subtask_id.to_string(),
    }
}

// `None` when nothing matches; `Some(Err)` when a prefix is ambiguous.
fn resolve_id<'a>(input: &str, ids: impl Iterator<Item = &'a str>) -> Option<Result<String>> {
    let input = input.trim();
    if input.is_empty() {
        return Some(Err(Error::InvalidArgument("id cannot be empty".to_string())));
    }

    let mut matches = Vec::new();
    for id in ids {
        if id == input {
            return Some(Ok(id.to_string()));
        }
        if id.starts_with(input) {
            matches.push(id);
        }
    }

    match matches.len() {
        0 => None,
        1 => Some(Ok(matches[0].to_string())),
        n => Some(Err(Error::AmbiguousId {
            prefix: input.to_string(),
            matches: n,
        })),
    }
}
