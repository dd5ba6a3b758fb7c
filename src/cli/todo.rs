//! progress show/add/rm command implementations

use serde::Serialize;

use crate::error::Result;
use crate::model::{Subtask, Todo};
use crate::output::{emit_success, format_weight, HumanOutput, OutputOptions};
use crate::progress::{overall_percentage, weight_totals};
use crate::storage::Storage;

use super::{short_id, warn_if_unsaved};

/// Options for `progress show`
pub struct ShowOptions {
    pub todo: Option<String>,
    pub output: OutputOptions,
}

/// Options for `progress add`
pub struct AddOptions {
    pub title: String,
    pub output: OutputOptions,
}

/// Options for `progress rm`
pub struct RmOptions {
    pub todo: String,
    pub output: OutputOptions,
}

#[derive(Serialize)]
pub(crate) struct ProgressReport {
    pub overall: u8,
    pub todos: Vec<TodoReport>,
}

#[derive(Serialize)]
pub(crate) struct TodoReport {
    pub id: String,
    pub title: String,
    pub percentage: u8,
    pub done_weight: f64,
    pub total_weight: f64,
    pub subtasks: Vec<Subtask>,
}

impl ProgressReport {
    pub(crate) fn build(todos: &[Todo]) -> Self {
        Self {
            overall: overall_percentage(todos),
            todos: todos.iter().map(TodoReport::build).collect(),
        }
    }
}

impl TodoReport {
    fn build(todo: &Todo) -> Self {
        let totals = weight_totals(&todo.subtasks);
        Self {
            id: todo.id.clone(),
            title: todo.title.clone(),
            percentage: totals.percentage(),
            done_weight: totals.done,
            total_weight: totals.total,
            subtasks: todo.subtasks.clone(),
        }
    }

    fn headline(&self) -> String {
        format!(
            "{}% (done {}/{})",
            self.percentage,
            format_weight(self.done_weight),
            format_weight(self.total_weight)
        )
    }
}

pub fn run_show(storage: &Storage, options: ShowOptions) -> Result<()> {
    let store = storage.store();
    let todos = store.read();

    let mut report = ProgressReport::build(&todos);
    if let Some(input) = options.todo.as_deref() {
        let id = store.resolve_todo_id(input)?;
        report.todos.retain(|todo| todo.id == id);
    }

    if options.output.json {
        return emit_success(options.output, "show", &report, None);
    }
    if options.output.quiet {
        return Ok(());
    }

    print_report(&report);
    Ok(())
}

fn print_report(report: &ProgressReport) {
    println!("Overall (weighted): {}%", report.overall);

    if report.todos.is_empty() {
        println!();
        println!("No todos yet. Add one with: progress add \"<title>\"");
        return;
    }

    for todo in &report.todos {
        println!();
        println!("[{}] {}  {}", short_id(&todo.id), todo.title, todo.headline());
        if todo.subtasks.is_empty() {
            println!("    No subtasks yet.");
            continue;
        }
        for sub in &todo.subtasks {
            let mark = if sub.done { "x" } else { " " };
            println!(
                "    [{mark}] {}  {}  (weight {})",
                short_id(&sub.id),
                sub.text,
                format_weight(sub.weight)
            );
        }
    }
}

pub fn run_add(storage: &Storage, options: AddOptions) -> Result<()> {
    storage.ensure_dirs()?;
    let store = storage.store();
    let todo = store.add_todo(&options.title)?;

    let mut human = HumanOutput::new(format!("progress add: {}", todo.title));
    human.push_summary("id", todo.id.clone());
    human.push_summary(
        "overall",
        format!("{}%", overall_percentage(&store.read())),
    );
    human.push_next_step(format!(
        "progress sub add {} \"<subtask>\" --weight 1",
        short_id(&todo.id)
    ));

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "add", &todo, Some(&human))
}

pub fn run_rm(storage: &Storage, options: RmOptions) -> Result<()> {
    let store = storage.store();
    let id = store.resolve_todo_id(&options.todo)?;
    let title = store
        .read()
        .iter()
        .find(|todo| todo.id == id)
        .map(|todo| todo.title.clone())
        .unwrap_or_default();
    store.remove_todo(&id)?;

    #[derive(Serialize)]
    struct Removed {
        id: String,
        title: String,
    }

    let mut human = HumanOutput::new(format!("progress rm: {title}"));
    human.push_summary("id", id.clone());
    human.push_summary(
        "overall",
        format!("{}%", overall_percentage(&store.read())),
    );

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "rm", &Removed { id, title }, Some(&human))
}
