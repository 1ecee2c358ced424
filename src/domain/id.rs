//! Record identifiers
//!
//! ID Format:
//! - Show IDs: `s-{7-char-hash}` (e.g., `s-7f2b4c1`)
//! - Cue IDs: `c-{7-char-hash}` (e.g., `c-9d3e5f2`)
//!
//! Hash is derived from a seed (show name or activity) plus the creation
//! timestamp. Same seed at different times produces different IDs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum IdError {
    #[error("Invalid show ID format: expected 's-{{7-char-hash}}', got '{0}'")]
    InvalidShowId(String),

    #[error("Invalid cue ID format: expected 'c-{{7-char-hash}}', got '{0}'")]
    InvalidCueId(String),
}

/// Generates a 7-character hash from a seed and timestamp
fn generate_hash(seed: &str, timestamp: DateTime<Utc>) -> String {
    let input = format!("{}{}", seed, timestamp.timestamp_nanos_opt().unwrap_or(0));
    let hash = blake3::hash(input.as_bytes());
    let hex = hash.to_hex();
    hex[..7].to_string()
}

/// Extracts the hash after `tag`, checking it is 7 hex characters
fn parse_hash<'a>(s: &'a str, tag: &str) -> Option<&'a str> {
    let hash = s.strip_prefix(tag)?;
    (hash.len() == 7 && hash.chars().all(|c| c.is_ascii_hexdigit())).then_some(hash)
}

/// Show ID in the format `s-{7-char-hash}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShowId {
    hash: String,
}

impl ShowId {
    pub fn new(name: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(name, timestamp),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for ShowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("s-{}", self.hash))
    }
}

impl FromStr for ShowId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hash = parse_hash(s, "s-").ok_or_else(|| IdError::InvalidShowId(s.to_string()))?;
        Ok(Self {
            hash: hash.to_string(),
        })
    }
}

impl TryFrom<String> for ShowId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShowId> for String {
    fn from(id: ShowId) -> Self {
        id.to_string()
    }
}

/// Cue ID in the format `c-{7-char-hash}`
///
/// Cue IDs are stable across renumbering; the cue number is what moves.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CueId {
    hash: String,
}

impl CueId {
    /// Creates a cue ID; the show ID is mixed in so equal seeds in two shows differ
    pub fn new(show_id: &ShowId, seed: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            hash: generate_hash(&format!("{}{}", show_id, seed), timestamp),
        }
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }
}

impl fmt::Display for CueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("c-{}", self.hash))
    }
}

impl FromStr for CueId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let hash = parse_hash(s, "c-").ok_or_else(|| IdError::InvalidCueId(s.to_string()))?;
        Ok(Self {
            hash: hash.to_string(),
        })
    }
}

impl TryFrom<String> for CueId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CueId> for String {
    fn from(id: CueId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_id_generation_is_unique_for_different_timestamps() {
        let ts1 = Utc::now();
        let ts2 = ts1 + chrono::Duration::nanoseconds(1);

        assert_ne!(ShowId::new("Gala", ts1), ShowId::new("Gala", ts2));
    }

    #[test]
    fn show_id_format_is_correct() {
        let s = ShowId::new("Gala", Utc::now()).to_string();

        assert!(s.starts_with("s-"));
        assert_eq!(s.len(), 9); // "s-" + 7 chars
    }

    #[test]
    fn show_id_parses_correctly() {
        let original = ShowId::new("Gala", Utc::now());
        let parsed: ShowId = original.to_string().parse().unwrap();

        assert_eq!(original, parsed);
    }

    #[test]
    fn show_id_rejects_invalid_format() {
        assert!("invalid".parse::<ShowId>().is_err());
        assert!("s-short".parse::<ShowId>().is_err());
        assert!("s-toolonggg".parse::<ShowId>().is_err());
        assert!("s-gggggg1".parse::<ShowId>().is_err()); // 'g' is not hex
        assert!("c-1234567".parse::<ShowId>().is_err());
    }

    #[test]
    fn cue_ids_differ_between_shows() {
        let ts = Utc::now();
        let show_a = ShowId::new("A", ts);
        let show_b = ShowId::new("B", ts);

        assert_ne!(CueId::new(&show_a, "Walk-in", ts), CueId::new(&show_b, "Walk-in", ts));
    }

    #[test]
    fn cue_id_parses_correctly() {
        let show = ShowId::new("Gala", Utc::now());
        let original = CueId::new(&show, "Opening", Utc::now());
        let parsed: CueId = original.to_string().parse().unwrap();

        assert_eq!(original, parsed);
        assert!("s-1234567".parse::<CueId>().is_err());
    }

    #[test]
    fn serde_roundtrip_ids() {
        let show = ShowId::new("Gala", Utc::now());
        let cue = CueId::new(&show, "Opening", Utc::now());

        let json = serde_json::to_string(&(show.clone(), cue.clone())).unwrap();
        let parsed: (ShowId, CueId) = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, (show, cue));
    }
}
