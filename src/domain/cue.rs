//! Cue domain model
//!
//! A cue is one timed row of a show's run sheet. Its position in the sheet
//! is given entirely by its cue number; reordering only rewrites that field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::cue_number::{CueNumber, CueNumberError};
use super::id::{CueId, ShowId};
use super::ordering::Numbered;
use super::time::{calculate_end_time, parse_time_strict, TimeError};

/// Lifecycle status of a cue during a show
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CueStatus {
    #[default]
    Upcoming,
    Standby,
    Active,
    Completed,
}

impl CueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CueStatus::Upcoming => "upcoming",
            CueStatus::Standby => "standby",
            CueStatus::Active => "active",
            CueStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for CueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for CueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "upcoming" => Ok(CueStatus::Upcoming),
            "standby" => Ok(CueStatus::Standby),
            "active" => Ok(CueStatus::Active),
            "completed" => Ok(CueStatus::Completed),
            other => Err(format!(
                "Invalid cue status '{}' (expected upcoming, standby, active or completed)",
                other
            )),
        }
    }
}

/// Editable cue fields
///
/// Used both to fill a new cue and to patch an existing one. When patching,
/// `None` leaves a field alone and an empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CueFields {
    pub start_time: Option<String>,
    pub run_time: Option<String>,
    pub activity: Option<String>,
    pub graphics: Option<String>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub lighting: Option<String>,
    pub notes: Option<String>,
}

impl CueFields {
    /// Checks that any supplied time is a valid clock time
    ///
    /// Empty strings are allowed since they clear the field.
    pub fn validate(&self) -> Result<(), TimeError> {
        for time in [&self.start_time, &self.run_time].into_iter().flatten() {
            if !time.is_empty() {
                parse_time_strict(time)?;
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        *self == CueFields::default()
    }
}

fn patch_field(field: &mut Option<String>, value: Option<String>) {
    match value {
        None => {}
        Some(v) if v.is_empty() => *field = None,
        Some(v) => *field = Some(v),
    }
}

/// A row in a show's run sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    /// Unique identifier
    pub id: CueId,

    /// Show this cue belongs to
    pub show_id: ShowId,

    /// Position in the sheet, e.g. `A101`
    pub cue_number: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,

    /// Duration of the cue
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_time: Option<String>,

    /// Derived from `start_time + run_time`; recomputed, never trusted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphics: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lighting: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    #[serde(default)]
    pub status: CueStatus,
}

impl Cue {
    /// Creates an empty upcoming cue
    pub fn new(id: CueId, show_id: ShowId, cue_number: impl Into<String>) -> Self {
        Self {
            id,
            show_id,
            cue_number: cue_number.into(),
            start_time: None,
            run_time: None,
            end_time: None,
            activity: None,
            graphics: None,
            video: None,
            audio: None,
            lighting: None,
            notes: None,
            status: CueStatus::default(),
        }
    }

    /// Parses the stored cue number
    pub fn number(&self) -> Result<CueNumber, CueNumberError> {
        self.cue_number.parse()
    }

    /// Applies a patch and re-derives the end time
    pub fn apply(&mut self, fields: CueFields) {
        patch_field(&mut self.start_time, fields.start_time);
        patch_field(&mut self.run_time, fields.run_time);
        patch_field(&mut self.activity, fields.activity);
        patch_field(&mut self.graphics, fields.graphics);
        patch_field(&mut self.video, fields.video);
        patch_field(&mut self.audio, fields.audio);
        patch_field(&mut self.lighting, fields.lighting);
        patch_field(&mut self.notes, fields.notes);
        self.derive_end_time();
    }

    /// Recomputes `end_time` from `start_time` and `run_time`
    pub fn derive_end_time(&mut self) {
        self.end_time = match (&self.start_time, &self.run_time) {
            (Some(start), Some(run)) => calculate_end_time(start, run),
            _ => None,
        };
    }

    /// Returns the cue with its end time recomputed
    pub fn with_derived_end_time(mut self) -> Self {
        self.derive_end_time();
        self
    }
}

impl Numbered for Cue {
    fn cue_number(&self) -> &str {
        &self.cue_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_cue(number: &str) -> Cue {
        let show = ShowId::new("Gala", Utc::now());
        let id = CueId::new(&show, number, Utc::now());
        Cue::new(id, show, number)
    }

    #[test]
    fn new_cue_is_upcoming() {
        let cue = make_cue("A101");

        assert_eq!(cue.status, CueStatus::Upcoming);
        assert_eq!(cue.number().unwrap().to_string(), "A101");
        assert!(cue.end_time.is_none());
    }

    #[test]
    fn applying_times_derives_end_time() {
        let mut cue = make_cue("A101");
        cue.apply(CueFields {
            start_time: Some("19:30:00".to_string()),
            run_time: Some("00:05:00".to_string()),
            ..Default::default()
        });

        assert_eq!(cue.end_time.as_deref(), Some("19:35:00"));
    }

    #[test]
    fn stored_end_time_is_not_authoritative() {
        let json = r#"{"id":"c-1234567","show_id":"s-1234567","cue_number":"A101",
            "start_time":"10:00:00","run_time":"00:01:00","end_time":"23:59:59"}"#;
        let cue: Cue = serde_json::from_str(json).unwrap();

        assert_eq!(cue.clone().with_derived_end_time().end_time.as_deref(), Some("10:01:00"));
        assert_eq!(cue.status, CueStatus::Upcoming);
    }

    #[test]
    fn empty_patch_value_clears_field() {
        let mut cue = make_cue("A101");
        cue.apply(CueFields {
            activity: Some("Walk-in".to_string()),
            start_time: Some("19:00:00".to_string()),
            run_time: Some("00:10:00".to_string()),
            ..Default::default()
        });
        cue.apply(CueFields {
            run_time: Some(String::new()),
            ..Default::default()
        });

        assert_eq!(cue.activity.as_deref(), Some("Walk-in"));
        assert!(cue.run_time.is_none());
        assert!(cue.end_time.is_none());
    }

    #[test]
    fn validates_supplied_times() {
        let fields = CueFields {
            start_time: Some("24:00:00".to_string()),
            ..Default::default()
        };
        assert!(fields.validate().is_err());

        let fields = CueFields {
            start_time: Some(String::new()),
            run_time: Some("00:00:30".to_string()),
            ..Default::default()
        };
        assert!(fields.validate().is_ok());
    }

    #[test]
    fn status_parses_and_serializes() {
        assert_eq!("Standby".parse::<CueStatus>(), Ok(CueStatus::Standby));
        assert!("paused".parse::<CueStatus>().is_err());
        assert_eq!(serde_json::to_string(&CueStatus::Completed).unwrap(), "\"completed\"");
    }

    #[test]
    fn serialization_skips_empty_fields() {
        let cue = make_cue("B101");
        let json = serde_json::to_string(&cue).unwrap();

        assert!(!json.contains("graphics"));
        assert!(json.contains("\"status\":\"upcoming\""));
    }
}
