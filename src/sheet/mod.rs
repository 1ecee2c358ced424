//! Run sheet management
//!
//! Sits between the store and the CLI: [`CueSheet`] performs list
//! operations on one show's cues and [`LiveSheet`] keeps a sorted copy
//! current from the change feed.

mod cue_sheet;
mod live;

pub use cue_sheet::{CueDraft, CueSheet, SheetError};
pub use live::LiveSheet;
