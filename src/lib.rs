//! CueFlow - run sheets for live-event shows
//!
//! A show holds an ordered list of cues, each a timed row with notes for
//! graphics, video, audio and lighting. Cue order is carried by cue numbers
//! (`A101`, `A102`, `B101`) that can be assigned mid-list without touching
//! neighbouring rows, and cue end times are derived from `HH:MM:SS` start
//! and run times.

pub mod domain;
pub mod storage;
pub mod sheet;
pub mod cli;

pub use domain::{Cue, CueId, CueNumber, CueStatus, Show, ShowId};
