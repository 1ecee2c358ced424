//! # Command-Line Interface
//!
//! User-facing CLI commands and output formatting.
//!
//! ## Command Groups
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Core | Project setup | `init` |
//! | Show | Dashboard and show settings | `show new`, `show list`, `show stats` |
//! | Team | Show membership | `team add`, `team role` |
//! | Cue | Run sheet editing | `cue add`, `cue move`, `cue watch` |
//! | Time | Clock arithmetic | `time add`, `time end` |
//!
//! ## Output Formats
//!
//! All commands support `--format` flag:
//! - `text` (default) - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! ## Verbose Mode
//!
//! Use `--verbose` (or `-v`) for debug output and debug-level logs:
//! ```bash
//! cueflow --verbose cue move Gala A105 1
//! ```
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod output;
mod show;
mod team;
mod cue;
mod time_cmd;

pub use app::{Cli, Commands, run};
pub use output::{Output, OutputFormat};
