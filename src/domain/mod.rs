//! Domain models for CueFlow
//!
//! Contains the core business logic without any I/O concerns.

pub mod time;
mod cue_number;
mod ordering;
mod id;
mod cue;
mod show;

pub use cue::{Cue, CueFields, CueStatus};
pub use cue_number::{
    is_valid_cue_number, next_prefix, normalize_prefix, parse_cue_number, parse_prefix,
    CueNumber, CueNumberError, SECTION_END, SECTION_START,
};
pub use id::{CueId, IdError, ShowId};
pub use ordering::{
    compare_cues, cue_number_for_position, cues_with_prefix, find_duplicate,
    first_cue_number_for_prefix, generate_next_cue_number, last_cue_number_for_prefix,
    next_cue_number_for_prefix, sort_cues, Numbered, FIRST_CUE_NUMBER, MOVE_TO_FRONT_NUMBER,
};
pub use show::{format_last_updated, search_shows, Permission, Role, Show, ShowStats};
pub use time::{TimeError, TimeParts};
