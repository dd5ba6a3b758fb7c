//! progress sub command implementations

use serde::Serialize;

use crate::error::Result;
use crate::output::{emit_success, format_weight, HumanOutput, OutputOptions};
use crate::progress::weighted_percentage;
use crate::storage::Storage;
use crate::store::ProgressStore;

use super::{short_id, warn_if_unsaved};

/// Options for `progress sub add`
pub struct AddOptions {
    pub todo: String,
    pub text: String,
    pub weight: f64,
    pub output: OutputOptions,
}

/// Options for `progress sub toggle` and `progress sub rm`
pub struct TargetOptions {
    pub todo: String,
    pub subtask: String,
    pub output: OutputOptions,
}

/// Options for `progress sub weight`
pub struct WeightOptions {
    pub todo: String,
    pub subtask: String,
    pub weight: f64,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct SubtaskReport {
    todo_id: String,
    subtask_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    weight: Option<f64>,
    todo_percentage: u8,
}

fn todo_percentage(store: &ProgressStore, todo_id: &str) -> u8 {
    store
        .read()
        .iter()
        .find(|todo| todo.id == todo_id)
        .map(|todo| weighted_percentage(&todo.subtasks))
        .unwrap_or(0)
}

pub fn run_add(storage: &Storage, options: AddOptions) -> Result<()> {
    let store = storage.store();
    let todo_id = store.resolve_todo_id(&options.todo)?;
    let sub = store.add_subtask(&todo_id, &options.text, options.weight)?;

    let report = SubtaskReport {
        todo_percentage: todo_percentage(&store, &todo_id),
        todo_id,
        subtask_id: sub.id.clone(),
        done: Some(sub.done),
        weight: Some(sub.weight),
    };

    let mut human = HumanOutput::new(format!("progress sub add: {}", sub.text));
    human.push_summary("id", sub.id.clone());
    human.push_summary("weight", format_weight(sub.weight));
    human.push_summary("todo", format!("{}%", report.todo_percentage));
    human.push_next_step(format!(
        "progress sub toggle {} {}",
        short_id(&report.todo_id),
        short_id(&sub.id)
    ));

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "sub add", &report, Some(&human))
}

pub fn run_toggle(storage: &Storage, options: TargetOptions) -> Result<()> {
    let store = storage.store();
    let todo_id = store.resolve_todo_id(&options.todo)?;
    let subtask_id = store.resolve_subtask_id(&todo_id, &options.subtask)?;
    let done = store.toggle_subtask(&todo_id, &subtask_id)?;

    let report = SubtaskReport {
        todo_percentage: todo_percentage(&store, &todo_id),
        todo_id,
        subtask_id,
        done: Some(done),
        weight: None,
    };

    let state = if done { "done" } else { "open" };
    let mut human = HumanOutput::new(format!("progress sub toggle: {state}"));
    human.push_summary("subtask", report.subtask_id.clone());
    human.push_summary("todo", format!("{}%", report.todo_percentage));

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "sub toggle", &report, Some(&human))
}

pub fn run_weight(storage: &Storage, options: WeightOptions) -> Result<()> {
    let store = storage.store();
    let todo_id = store.resolve_todo_id(&options.todo)?;
    let subtask_id = store.resolve_subtask_id(&todo_id, &options.subtask)?;
    let weight = store.set_subtask_weight(&todo_id, &subtask_id, options.weight)?;

    let report = SubtaskReport {
        todo_percentage: todo_percentage(&store, &todo_id),
        todo_id,
        subtask_id,
        done: None,
        weight: Some(weight),
    };

    let mut human = HumanOutput::new(format!("progress sub weight: {}", format_weight(weight)));
    human.push_summary("subtask", report.subtask_id.clone());
    human.push_summary("todo", format!("{}%", report.todo_percentage));
    if weight != options.weight {
        human.push_warning(format!(
            "weight {} adjusted to {}",
            options.weight,
            format_weight(weight)
        ));
    }

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "sub weight", &report, Some(&human))
}

pub fn run_rm(storage: &Storage, options: TargetOptions) -> Result<()> {
    let store = storage.store();
    let todo_id = store.resolve_todo_id(&options.todo)?;
    let subtask_id = store.resolve_subtask_id(&todo_id, &options.subtask)?;
    store.remove_subtask(&todo_id, &subtask_id)?;

    let report = SubtaskReport {
        todo_percentage: todo_percentage(&store, &todo_id),
        todo_id,
        subtask_id,
        done: None,
        weight: None,
    };

    let mut human = HumanOutput::new("progress sub rm: removed");
    human.push_summary("subtask", report.subtask_id.clone());
    human.push_summary("todo", format!("{}%", report.todo_percentage));

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "sub rm", &report, Some(&human))
}
