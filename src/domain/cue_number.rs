//! Cue numbers
//!
//! A cue number is a section letter followed by a decimal suffix (`A101`).
//! Sections start at `101` and run to `999`; the ordering compares the
//! letter first and then the suffix numerically, so `A99 < A100 < B101`.
//!
//! Parsing accepts any suffix length (`A1` parses), while
//! [`is_valid_cue_number`] requires at least three digits. The looser rule
//! is what sorting and numbering use internally; the stricter one gates
//! numbers typed in by users.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix of the first cue in every section
pub const SECTION_START: u32 = 101;

/// Suffix at which a section is considered full
pub const SECTION_END: u32 = 999;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CueNumberError {
    #[error("Invalid cue number format: {0}")]
    InvalidFormat(String),

    #[error("Invalid section prefix: '{0}' (expected a single letter A-Z)")]
    InvalidPrefix(String),

    #[error("No section follows '{0}'")]
    PrefixExhausted(char),
}

/// A parsed cue number such as `A101`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CueNumber {
    // Field order matters: the derived Ord compares prefix, then number.
    prefix: char,
    number: u32,
}

impl CueNumber {
    /// Creates a cue number, upper-casing the prefix
    pub fn new(prefix: char, number: u32) -> Result<Self, CueNumberError> {
        Ok(Self {
            prefix: normalize_prefix(prefix)?,
            number,
        })
    }

    /// First number of a section (`{prefix}101`)
    pub fn section_start(prefix: char) -> Result<Self, CueNumberError> {
        Self::new(prefix, SECTION_START)
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    /// Same section, different suffix
    pub fn with_number(&self, number: u32) -> Self {
        Self {
            prefix: self.prefix,
            number,
        }
    }

    /// Next number within the same section
    pub fn successor(&self) -> Self {
        self.with_number(self.number.saturating_add(1))
    }

    /// Returns true once the section has reached its last canonical suffix
    pub fn is_section_full(&self) -> bool {
        self.number >= SECTION_END
    }
}

impl fmt::Display for CueNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&format!("{}{}", self.prefix, self.number))
    }
}

impl FromStr for CueNumber {
    type Err = CueNumberError;

    /// Parses `^([A-Z])(\d+)$`, case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CueNumberError::InvalidFormat(s.to_string());

        let mut chars = s.chars();
        let prefix = chars.next().filter(char::is_ascii_alphabetic).ok_or_else(invalid)?;
        let digits = chars.as_str();

        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        // Leading zeros are accepted; overlong suffixes are not representable
        let number = digits.parse::<u32>().map_err(|_| invalid())?;

        Ok(Self {
            prefix: prefix.to_ascii_uppercase(),
            number,
        })
    }
}

impl TryFrom<String> for CueNumber {
    type Error = CueNumberError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CueNumber> for String {
    fn from(number: CueNumber) -> Self {
        number.to_string()
    }
}

/// Parses a cue number string
pub fn parse_cue_number(cue_number: &str) -> Result<CueNumber, CueNumberError> {
    cue_number.parse()
}

/// Checks the input rule for cue numbers: one letter and at least three digits
pub fn is_valid_cue_number(cue_number: &str) -> bool {
    let mut chars = cue_number.chars();
    let Some(prefix) = chars.next() else {
        return false;
    };
    let digits = chars.as_str();

    prefix.is_ascii_alphabetic() && digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Validates and upper-cases a section letter
pub fn normalize_prefix(prefix: char) -> Result<char, CueNumberError> {
    if prefix.is_ascii_alphabetic() {
        Ok(prefix.to_ascii_uppercase())
    } else {
        Err(CueNumberError::InvalidPrefix(prefix.to_string()))
    }
}

/// Parses a section letter given as text (`"b"` -> `'B'`)
pub fn parse_prefix(prefix: &str) -> Result<char, CueNumberError> {
    let mut chars = prefix.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => normalize_prefix(c),
        _ => Err(CueNumberError::InvalidPrefix(prefix.to_string())),
    }
}

/// The section letter after `prefix` (`A` -> `B`)
pub fn next_prefix(prefix: char) -> Result<char, CueNumberError> {
    let prefix = normalize_prefix(prefix)?;
    if prefix == 'Z' {
        return Err(CueNumberError::PrefixExhausted(prefix));
    }
    Ok((prefix as u8 + 1) as char)
}
