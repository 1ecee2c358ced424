//! Show domain model
//!
//! Shows own a run sheet of cues and a team of members with roles. This
//! module also holds the dashboard helpers: search, statistics and the
//! "last updated" phrasing.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cue::Cue;
use super::id::ShowId;
use super::time::{format_clock, time_to_seconds};

/// A live event with its own run sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Show {
    pub id: ShowId,
    pub name: String,
    /// User who created the show
    pub owner: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Show {
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        let name = name.into();
        let now = Utc::now();
        Self {
            id: ShowId::new(&name, now),
            name,
            owner: owner.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// Team role on a show, from most to least privileged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    #[default]
    Member,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Member => "member",
            Role::Viewer => "viewer",
        }
    }

    /// Whether members with this role may edit the run sheet
    pub fn can_edit(&self) -> bool {
        !matches!(self, Role::Viewer)
    }

    /// Whether members with this role may manage the team
    pub fn can_manage_team(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "owner" => Ok(Role::Owner),
            "admin" => Ok(Role::Admin),
            "member" => Ok(Role::Member),
            "viewer" => Ok(Role::Viewer),
            other => Err(format!(
                "Invalid role '{}' (expected owner, admin, member or viewer)",
                other
            )),
        }
    }
}

/// A user's role on one show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub show_id: ShowId,
    /// User name or email
    pub user: String,
    pub role: Role,
}

impl Permission {
    pub fn new(show_id: ShowId, user: impl Into<String>, role: Role) -> Self {
        Self {
            show_id,
            user: user.into(),
            role,
        }
    }
}

/// Shows whose name contains `term` (case-insensitive), most recently updated first
pub fn search_shows<'a>(shows: &'a [Show], term: &str) -> Vec<&'a Show> {
    let term = term.to_lowercase();
    let mut matches: Vec<&Show> = shows
        .iter()
        .filter(|show| show.name.to_lowercase().contains(&term))
        .collect();
    matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    matches
}

/// Dashboard statistics across all shows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowStats {
    pub total_shows: usize,
    /// Shows with at least one cue
    pub active_shows: usize,
    /// Mean of summed cue run times over shows that have any, as `H:MM:SS`
    pub avg_show_duration: String,
}

impl ShowStats {
    pub fn compute(shows: &[Show], cues: &[Cue]) -> Self {
        let mut active_shows = 0;
        let mut total_seconds = 0u64;
        let mut shows_with_duration = 0u64;

        for show in shows {
            let show_cues: Vec<&Cue> = cues.iter().filter(|c| c.show_id == show.id).collect();
            if show_cues.is_empty() {
                continue;
            }
            active_shows += 1;

            let duration: u64 = show_cues
                .iter()
                .filter_map(|c| c.run_time.as_deref())
                .filter_map(time_to_seconds)
                .sum();

            if duration > 0 {
                total_seconds += duration;
                shows_with_duration += 1;
            }
        }

        let average = total_seconds.checked_div(shows_with_duration).unwrap_or(0);

        Self {
            total_shows: shows.len(),
            active_shows,
            avg_show_duration: format_clock(average),
        }
    }
}

/// Phrases how long ago `updated_at` was, e.g. `3 hours ago`
pub fn format_last_updated(updated_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(updated_at);

    let (count, unit) = if elapsed.num_minutes() < 1 {
        return "just now".to_string();
    } else if elapsed.num_hours() < 1 {
        (elapsed.num_minutes(), "minute")
    } else if elapsed.num_days() < 1 {
        (elapsed.num_hours(), "hour")
    } else if elapsed.num_days() < 30 {
        (elapsed.num_days(), "day")
    } else if elapsed.num_days() < 365 {
        (elapsed.num_days() / 30, "month")
    } else {
        (elapsed.num_days() / 365, "year")
    };

    let plural = if count == 1 { "" } else { "s" };
    format!("{} {}{} ago", count, unit, plural)
}
