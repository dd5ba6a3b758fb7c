//! progress export/import/reset command implementations

use std::io::Read;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::lock;
use crate::output::{emit_success, HumanOutput, OutputOptions};
use crate::progress::{overall_percentage, weighted_percentage};
use crate::storage::Storage;

use super::warn_if_unsaved;

/// Options for `progress export`
pub struct ExportOptions {
    pub out: Option<PathBuf>,
    pub stdout: bool,
    pub output: OutputOptions,
}

/// Options for `progress import`
pub struct ImportOptions {
    pub file: PathBuf,
    pub output: OutputOptions,
}

/// Options for `progress reset`
pub struct ResetOptions {
    pub confirm: Option<String>,
    pub output: OutputOptions,
}

#[derive(Serialize)]
struct ExportReport {
    path: PathBuf,
    todos: usize,
    subtasks: usize,
}

#[derive(Serialize)]
struct ImportReport {
    todos: usize,
    subtasks: usize,
    overall: u8,
}

#[derive(Serialize)]
struct ResetReport {
    path: PathBuf,
}

pub fn run_export(storage: &Storage, options: ExportOptions) -> Result<()> {
    let store = storage.store();
    let todos = store.read();
    let text = store.export()?;

    if options.stdout {
        println!("{text}");
        return Ok(());
    }

    let path = match options.out {
        Some(path) => path,
        None => std::env::current_dir()?.join(&storage.config().export.file_name),
    };
    lock::write_atomic(&path, text.as_bytes())?;

    let report = ExportReport {
        path: path.clone(),
        todos: todos.len(),
        subtasks: todos.iter().map(|todo| todo.subtasks.len()).sum(),
    };

    let mut human = HumanOutput::new(format!("progress export: {}", path.display()));
    human.push_summary("todos", report.todos.to_string());
    human.push_summary("subtasks", report.subtasks.to_string());
    human.push_next_step(format!("progress import {}", path.display()));

    emit_success(options.output, "export", &report, Some(&human))
}

pub fn run_import(storage: &Storage, options: ImportOptions) -> Result<()> {
    let raw = if options.file.to_str() == Some("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&options.file)?
    };

    storage.ensure_dirs()?;
    let store = storage.store();
    let count = store.import(&raw)?;
    let todos = store.read();

    let report = ImportReport {
        todos: count,
        subtasks: todos.iter().map(|todo| todo.subtasks.len()).sum(),
        overall: overall_percentage(&todos),
    };

    let mut human = HumanOutput::new(format!("progress import: {} todos", report.todos));
    human.push_summary("subtasks", report.subtasks.to_string());
    human.push_summary("overall", format!("{}%", report.overall));
    for todo in todos.iter() {
        human.push_detail(format!("{}: {}%", todo.title, weighted_percentage(&todo.subtasks)));
    }
    human.push_next_step("progress show");

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "import", &report, Some(&human))
}

pub fn run_reset(storage: &Storage, options: ResetOptions) -> Result<()> {
    let phrase = &storage.config().reset.confirm_phrase;
    if options.confirm.as_deref() != Some(phrase.as_str()) {
        return Err(Error::ResetNotConfirmed(phrase.clone()));
    }

    let store = storage.store();
    store.reset();

    let report = ResetReport {
        path: storage.data_path(),
    };

    let mut human = HumanOutput::new("progress reset: all todos and subtasks deleted");
    human.push_summary("removed", report.path.display().to_string());

    warn_if_unsaved(storage, &store, &mut human);

    emit_success(options.output, "reset", &report, Some(&human))
}
