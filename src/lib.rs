//! taskview - Task View Composition Library
//!
//! This library provides the core of the taskview CLI: deciding which tasks
//! are visible, in what order, and keeping the visible state consistent while
//! remote updates are in flight.
//!
//! # Core Concepts
//!
//! - **Criteria**: composable multi-dimensional filters, AND-ed across dimensions
//! - **Search**: debounced, sequence-tagged relevance search with stale-response dropping
//! - **Board moves**: optimistic status transitions with rollback on failure
//! - **Saved filters**: named per-user criteria snapshots with a single default
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.taskview.toml`
//! - `error`: Error types and result aliases
//! - `task`: Task records and the owning collection
//! - `filter`: Filter criteria, quick filters and the predicate engine
//! - `search`: Search orchestration and history
//! - `board`: Board transition controller
//! - `saved`: Saved filter persistence
//! - `prefs`: Key/value preference storage
//! - `store`: Record store clients (local file, REST)
//! - `engine`: Event loop wiring the components together
//! - `notify`: User-visible notifications
//! - `lock`: File locking and atomic writes for file-backed stores
//! - `output`: CLI output envelopes

pub mod board;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod lock;
pub mod notify;
pub mod output;
pub mod prefs;
pub mod saved;
pub mod search;
pub mod store;
pub mod task;

pub use error::{Error, Result};
