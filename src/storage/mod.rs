//! # Storage Layer
//!
//! Local relational store for CueFlow with git-friendly file formats.
//!
//! ## Storage Formats
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Shows | JSONL (one JSON per line) | `.cueflow/shows.jsonl` |
//! | Cues | JSONL | `.cueflow/cues.jsonl` |
//! | Team permissions | JSONL | `.cueflow/permissions.jsonl` |
//! | Config | TOML | `.cueflow/config.toml` |
//!
//! ## Concurrency Safety
//!
//! - [`JsonlTable`] uses file locking (`fs2`) for concurrent access
//! - All writes are atomic (temp file + rename)
//! - [`FileFeed`] turns table rewrites by other processes into change events
//!
//! ## Key Types
//!
//! - [`Project`] - Entry point for accessing a CueFlow project
//! - [`Store`] / [`LocalStore`] - Typed select/insert/update/delete
//! - [`Subscription`] - Receiver for [`ChangeEvent`]s
//! - [`Config`] - Project and global configuration

mod table;
mod feed;
mod store;
mod config;
mod project;

pub use table::{JsonlTable, Record, Table};
pub use feed::{ChangeEvent, ChangeHub, ChangeKind, FileFeed, Subscription, SubscriptionFilter};
pub use store::{LocalStore, Store};
pub use config::{
    Config, ConfigError, CueConfig, GlobalConfig, OutputFormat, ProjectConfig, WatchConfig,
    DATA_DIR,
};
pub use project::{Project, ProjectError};
