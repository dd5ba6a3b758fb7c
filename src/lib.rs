//! progress - weighted progress tracking library
//!
//! A persisted, cache-coherent store of todos with weighted subtasks, shared
//! between every process pointed at the same data directory.
//!
//! # Core Concepts
//!
//! - **Todo / Subtask**: the tracked items; subtasks carry a `done` flag and a
//!   non-negative weight
//! - **Weighted percentage**: `sum(done weights) / sum(all weights)`, rounded
//!   half-up, 0 when nothing carries weight
//! - **Medium**: whole-value key-value storage the collection is persisted to
//! - **Change notification**: one signal for local writes and writes made by
//!   other processes
//!
//! # Module Organization
//!
//! - `model`: Todo, Subtask and Collection types
//! - `progress`: weighted completion metrics
//! - `codec`: JSON export and sanitizing import
//! - `medium`: file-backed and in-memory key-value media
//! - `lock`: file locking and atomic writes for the file medium
//! - `store`: the cached, persisted collection and its mutation helpers
//! - `bus`: payload-free change bus
//! - `notifier`: merges local and cross-process change signals
//! - `storage`: data directory layout
//! - `config`: configuration loading from `progress.toml`
//! - `cli`: command-line interface using clap
//! - `output`: human and JSON output for the CLI
//! - `error`: error types and result aliases

pub mod bus;
pub mod cli;
pub mod codec;
pub mod config;
pub mod error;
pub mod lock;
pub mod medium;
pub mod model;
pub mod notifier;
pub mod output;
pub mod progress;
pub mod storage;
pub mod store;

pub use error::{Error, Result};
