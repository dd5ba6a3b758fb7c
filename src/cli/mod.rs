//! Command-line interface for progress
//!
//! This module defines the CLI structure using clap derive macros.
//! Each group of subcommands is implemented in its own submodule.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;
use crate::output::{HumanOutput, OutputOptions};
use crate::storage::Storage;
use crate::store::ProgressStore;

mod backup;
mod subtask;
mod todo;
mod watch;

/// progress - weighted progress tracking
///
/// Track todos made of weighted subtasks; completion is
/// sum(done weights) / sum(all weights).
#[derive(Parser, Debug)]
#[command(name = "progress")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to the platform data directory)
    #[arg(long, global = true, env = "PROGRESS_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show todos with their weighted progress
    #[command(visible_alias = "ls")]
    Show {
        /// Only show this todo (id or unique id prefix)
        #[arg(long)]
        todo: Option<String>,
    },

    /// Add a todo
    Add {
        /// Todo title
        title: String,
    },

    /// Remove a todo and all of its subtasks
    Rm {
        /// Todo id or unique id prefix
        todo: String,
    },

    /// Subtask management
    #[command(subcommand)]
    Sub(SubCommands),

    /// Export all progress as pretty-printed JSON
    Export {
        /// Output path (default: ./progress-backup.json)
        #[arg(long, short)]
        out: Option<PathBuf>,

        /// Write the export to stdout instead of a file
        #[arg(long, conflicts_with = "out")]
        stdout: bool,
    },

    /// Replace all progress with the contents of an export file
    Import {
        /// File to import, or "-" for stdin
        file: PathBuf,
    },

    /// Delete all todos and subtasks
    Reset {
        /// Confirmation phrase (default: RESET)
        #[arg(long)]
        confirm: Option<String>,
    },

    /// Print a line whenever progress changes, in this or another process
    Watch {
        /// Exit after this many changes
        #[arg(long)]
        count: Option<usize>,

        /// Exit after this many seconds without reaching --count
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Subtask subcommands
#[derive(Subcommand, Debug)]
pub enum SubCommands {
    /// Add a subtask to a todo
    Add {
        /// Todo id or unique id prefix
        todo: String,

        /// Subtask text
        text: String,

        /// Relative weight
        #[arg(long, short, default_value = "1", allow_negative_numbers = true)]
        weight: f64,
    },

    /// Toggle a subtask between done and open
    Toggle {
        /// Todo id or unique id prefix
        todo: String,

        /// Subtask id or unique id prefix
        subtask: String,
    },

    /// Change a subtask's weight
    Weight {
        /// Todo id or unique id prefix
        todo: String,

        /// Subtask id or unique id prefix
        subtask: String,

        /// New weight
        #[arg(allow_negative_numbers = true)]
        weight: f64,
    },

    /// Remove a subtask
    Rm {
        /// Todo id or unique id prefix
        todo: String,

        /// Subtask id or unique id prefix
        subtask: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions {
            json: self.json,
            quiet: self.quiet,
        };
        let storage = Storage::open(self.dir.as_deref())?;

        match self.command {
            Commands::Show { todo } => todo::run_show(&storage, todo::ShowOptions { todo, output }),
            Commands::Add { title } => todo::run_add(&storage, todo::AddOptions { title, output }),
            Commands::Rm { todo } => todo::run_rm(&storage, todo::RmOptions { todo, output }),
            Commands::Sub(cmd) => match cmd {
                SubCommands::Add { todo, text, weight } => subtask::run_add(
                    &storage,
                    subtask::AddOptions {
                        todo,
                        text,
                        weight,
                        output,
                    },
                ),
                SubCommands::Toggle { todo, subtask } => subtask::run_toggle(
                    &storage,
                    subtask::TargetOptions {
                        todo,
                        subtask,
                        output,
                    },
                ),
                SubCommands::Weight {
                    todo,
                    subtask,
                    weight,
                } => subtask::run_weight(
                    &storage,
                    subtask::WeightOptions {
                        todo,
                        subtask,
                        weight,
                        output,
                    },
                ),
                SubCommands::Rm { todo, subtask } => subtask::run_rm(
                    &storage,
                    subtask::TargetOptions {
                        todo,
                        subtask,
                        output,
                    },
                ),
            },
            Commands::Export { out, stdout } => {
                backup::run_export(&storage, backup::ExportOptions { out, stdout, output })
            }
            Commands::Import { file } => {
                backup::run_import(&storage, backup::ImportOptions { file, output })
            }
            Commands::Reset { confirm } => {
                backup::run_reset(&storage, backup::ResetOptions { confirm, output })
            }
            Commands::Watch { count, timeout } => watch::run(
                &storage,
                watch::WatchOptions {
                    count,
                    timeout,
                    output,
                },
            ),
        }
    }
}

/// First eight characters of an id, for display.
pub(crate) fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

/// Warn when the last edit never reached the data file.
pub(crate) fn warn_if_unsaved(storage: &Storage, store: &ProgressStore, human: &mut HumanOutput) {
    if !store.is_saved() {
        human.push_warning(format!(
            "change was not saved to {}; it is lost when this command exits",
            storage.data_path().display()
        ));
    }
}
