//! Sorted cue list of one show
//!
//! [`CueSheet`] wraps a [`Store`] with the list operations a run sheet
//! needs: numbering new cues, opening sections, editing, moving by
//! position and deleting. Every write goes through the store and is
//! followed by a reload, so the in-memory list always reflects the tables.

use anyhow::Result;
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use crate::domain::time::{sum_durations, TimeError};
use crate::domain::{
    cue_number_for_position, cues_with_prefix, find_duplicate, first_cue_number_for_prefix,
    generate_next_cue_number, is_valid_cue_number, next_cue_number_for_prefix, normalize_prefix,
    parse_cue_number, sort_cues, Cue, CueFields, CueId, CueNumberError, CueStatus, ShowId,
};
use crate::storage::Store;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Invalid cue number '{0}': expected a letter followed by at least three digits, e.g. A101")]
    InvalidCueNumber(String),

    #[error(transparent)]
    InvalidTime(#[from] TimeError),

    #[error(transparent)]
    Numbering(#[from] CueNumberError),

    #[error("Cue not found: {0}")]
    CueNotFound(String),

    #[error("Section {0} already has cues")]
    SectionInUse(char),

    #[error("Cue number {number} is already used by cue {existing}")]
    DuplicateCueNumber { number: String, existing: CueId },
}

/// A cue to be created
#[derive(Debug, Clone, Default)]
pub struct CueDraft {
    /// Section to append to; the sheet's next number when absent
    pub prefix: Option<char>,
    /// Explicit cue number, overriding `prefix`
    pub cue_number: Option<String>,
    pub fields: CueFields,
}

/// The cues of one show, kept in cue order
pub struct CueSheet<S> {
    store: S,
    show_id: ShowId,
    cues: Vec<Cue>,
}

/// Loads the cues of a show in cue order
///
/// Stored end times are ignored and derived again from start and run time.
pub(crate) fn load_sorted<S: Store>(store: &S, show_id: &ShowId) -> Result<Vec<Cue>> {
    let cues: Vec<Cue> = store
        .select::<Cue>(|cue| cue.show_id == *show_id)?
        .into_iter()
        .map(Cue::with_derived_end_time)
        .collect();
    Ok(sort_cues(&cues))
}

impl<S: Store> CueSheet<S> {
    pub fn load(store: S, show_id: ShowId) -> Result<Self> {
        let cues = load_sorted(&store, &show_id)?;
        debug!(show = %show_id, count = cues.len(), "Loaded cue sheet");
        Ok(Self {
            store,
            show_id,
            cues,
        })
    }

    /// Re-reads the show's cues from the store
    pub fn reload(&mut self) -> Result<()> {
        self.cues = load_sorted(&self.store, &self.show_id)?;
        debug!(show = %self.show_id, count = self.cues.len(), "Reloaded cue sheet");
        Ok(())
    }

    pub fn show_id(&self) -> &ShowId {
        &self.show_id
    }

    /// Cues in cue order
    pub fn cues(&self) -> &[Cue] {
        &self.cues
    }

    pub fn get(&self, id: &CueId) -> Option<&Cue> {
        self.cues.iter().find(|cue| cue.id == *id)
    }

    /// Index of a cue in cue order
    pub fn position(&self, id: &CueId) -> Option<usize> {
        self.cues.iter().position(|cue| cue.id == *id)
    }

    /// Finds a cue by id or by cue number
    pub fn find(&self, reference: &str) -> Option<&Cue> {
        match reference.parse::<CueId>() {
            Ok(id) => self.get(&id),
            Err(_) => find_duplicate(&self.cues, reference),
        }
    }

    /// Like [`find`](Self::find) but fails when nothing matches
    pub fn resolve(&self, reference: &str) -> Result<CueId> {
        self.find(reference)
            .map(|cue| cue.id.clone())
            .ok_or_else(|| SheetError::CueNotFound(reference.to_string()).into())
    }

    fn require(&self, id: &CueId) -> Result<&Cue> {
        self.get(id)
            .ok_or_else(|| SheetError::CueNotFound(id.to_string()).into())
    }

    /// Creates a cue, numbering it after everything else unless told otherwise
    pub fn create_cue(&mut self, draft: CueDraft) -> Result<Cue> {
        draft.fields.validate().map_err(SheetError::from)?;

        let number = match (&draft.cue_number, draft.prefix) {
            (Some(number), _) => {
                if !is_valid_cue_number(number) {
                    return Err(SheetError::InvalidCueNumber(number.clone()).into());
                }
                parse_cue_number(number).map_err(SheetError::from)?.to_string()
            }
            (None, Some(prefix)) => {
                next_cue_number_for_prefix(&self.cues, prefix).map_err(SheetError::from)?
            }
            (None, None) => generate_next_cue_number(&self.cues).map_err(SheetError::from)?,
        };

        self.insert_cue(number, draft.fields)
    }

    /// Opens a new section with its first cue
    pub fn start_section(&mut self, prefix: char, fields: CueFields) -> Result<Cue> {
        fields.validate().map_err(SheetError::from)?;

        let prefix = normalize_prefix(prefix).map_err(SheetError::from)?;
        if !cues_with_prefix(&self.cues, prefix).is_empty() {
            return Err(SheetError::SectionInUse(prefix).into());
        }

        let number = first_cue_number_for_prefix(prefix).map_err(SheetError::from)?;
        self.insert_cue(number, fields)
    }

    fn insert_cue(&mut self, number: String, fields: CueFields) -> Result<Cue> {
        let id = CueId::new(&self.show_id, &number, Utc::now());
        let mut cue = Cue::new(id, self.show_id.clone(), number);
        cue.apply(fields);

        self.store.insert(vec![cue.clone()])?;
        debug!(cue = %cue.id, number = %cue.cue_number, "Created cue");

        self.reload()?;
        Ok(cue)
    }

    /// Applies a patch to a cue's fields and re-derives its end time
    pub fn update_cue(&mut self, id: &CueId, fields: CueFields) -> Result<Cue> {
        fields.validate().map_err(SheetError::from)?;
        self.write(id, |cue| cue.apply(fields))
    }

    pub fn set_status(&mut self, id: &CueId, status: CueStatus) -> Result<Cue> {
        self.write(id, |cue| cue.status = status)
    }

    /// Moves a cue so it lands at `target_index` of the sheet
    ///
    /// The new number is computed over the sheet without the moving cue.
    /// A collapsed gap between neighbours yields a number that is already
    /// in use; with `strict` that is rejected instead of written.
    pub fn move_cue(&mut self, id: &CueId, target_index: usize, strict: bool) -> Result<Cue> {
        let current = self.require(id)?.clone();

        let others: Vec<Cue> = self.cues.iter().filter(|c| c.id != *id).cloned().collect();
        let number = cue_number_for_position(&others, target_index).map_err(SheetError::from)?;

        if strict {
            if let Some(existing) = find_duplicate(&others, &number) {
                return Err(SheetError::DuplicateCueNumber {
                    number,
                    existing: existing.id.clone(),
                }
                .into());
            }
        }

        if number == current.cue_number {
            debug!(cue = %id, number = %number, "Cue already at target position");
            return Ok(current);
        }

        debug!(cue = %id, from = %current.cue_number, to = %number, target_index, "Moving cue");
        self.write(id, |cue| cue.cue_number = number)
    }

    pub fn delete_cue(&mut self, id: &CueId) -> Result<Cue> {
        let deleted = self.store.delete::<Cue>(|cue| cue.id == *id)?;
        let cue = deleted
            .into_iter()
            .next()
            .ok_or_else(|| SheetError::CueNotFound(id.to_string()))?;

        self.reload()?;
        Ok(cue)
    }

    /// Sum of all run times in seconds; invalid or missing run times count as zero
    pub fn total_run_time(&self) -> u64 {
        sum_durations(self.cues.iter().filter_map(|cue| cue.run_time.as_deref()))
    }

    fn write(&mut self, id: &CueId, patch: impl FnOnce(&mut Cue)) -> Result<Cue> {
        let updated = self
            .store
            .update::<Cue>(&id.to_string(), patch)?
            .ok_or_else(|| SheetError::CueNotFound(id.to_string()))?;

        self.reload()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::storage::LocalStore;

    fn sheet(dir: &TempDir) -> CueSheet<LocalStore> {
        let show = ShowId::new("Gala", Utc::now());
        CueSheet::load(LocalStore::new(dir.path()), show).unwrap()
    }

    fn numbers(sheet: &CueSheet<LocalStore>) -> Vec<&str> {
        sheet.cues().iter().map(|c| c.cue_number.as_str()).collect()
    }

    fn add(sheet: &mut CueSheet<LocalStore>, number: &str) -> Cue {
        sheet
            .create_cue(CueDraft {
                cue_number: Some(number.to_string()),
                ..Default::default()
            })
            .unwrap()
    }

    fn timed(start: &str, run: &str) -> CueFields {
        CueFields {
            start_time: Some(start.to_string()),
            run_time: Some(run.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn first_cue_is_a101() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);

        let cue = sheet.create_cue(CueDraft::default()).unwrap();
        assert_eq!(cue.cue_number, "A101");
        assert_eq!(sheet.cues().len(), 1);
    }

    #[test]
    fn create_appends_after_last() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        add(&mut sheet, "A101");
        add(&mut sheet, "B105");

        let cue = sheet.create_cue(CueDraft::default()).unwrap();
        assert_eq!(cue.cue_number, "B106");
    }

    #[test]
    fn create_in_section() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        add(&mut sheet, "A101");
        add(&mut sheet, "B101");

        let cue = sheet
            .create_cue(CueDraft {
                prefix: Some('a'),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cue.cue_number, "A102");
        assert_eq!(numbers(&sheet), vec!["A101", "A102", "B101"]);
    }

    #[test]
    fn explicit_numbers_are_validated_and_normalized() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);

        let err = sheet
            .create_cue(CueDraft {
                cue_number: Some("A1".to_string()),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SheetError>(),
            Some(SheetError::InvalidCueNumber(_))
        ));

        let cue = add(&mut sheet, "c250");
        assert_eq!(cue.cue_number, "C250");
    }

    #[test]
    fn invalid_times_are_rejected() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);

        let err = sheet
            .create_cue(CueDraft {
                fields: timed("25:00:00", "00:01:00"),
                ..Default::default()
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SheetError>(),
            Some(SheetError::InvalidTime(_))
        ));
        assert!(sheet.cues().is_empty());
    }

    #[test]
    fn end_time_is_derived() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);

        let cue = sheet
            .create_cue(CueDraft {
                fields: timed("19:30:00", "00:05:30"),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(cue.end_time.as_deref(), Some("19:35:30"));

        let cue = sheet
            .update_cue(
                &cue.id,
                CueFields {
                    run_time: Some("00:10:00".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cue.end_time.as_deref(), Some("19:40:00"));

        let cue = sheet
            .update_cue(
                &cue.id,
                CueFields {
                    start_time: Some(String::new()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(cue.end_time, None);
    }

    #[test]
    fn load_ignores_stored_end_time() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let show = ShowId::new("Gala", Utc::now());

        let mut stale = Cue::new(CueId::new(&show, "A101", Utc::now()), show.clone(), "A101");
        stale.start_time = Some("10:00:00".to_string());
        stale.run_time = Some("00:01:00".to_string());
        stale.end_time = Some("23:59:59".to_string());
        let mut untimed = Cue::new(CueId::new(&show, "A102", Utc::now()), show.clone(), "A102");
        untimed.end_time = Some("12:00:00".to_string());
        store.insert(vec![stale, untimed]).unwrap();

        let sheet = CueSheet::load(store, show).unwrap();
        assert_eq!(sheet.cues()[0].end_time.as_deref(), Some("10:01:00"));
        assert_eq!(sheet.cues()[1].end_time, None);
    }

    #[test]
    fn start_section_rejects_used_prefix() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        add(&mut sheet, "A101");

        let cue = sheet.start_section('b', CueFields::default()).unwrap();
        assert_eq!(cue.cue_number, "B101");

        let err = sheet.start_section('A', CueFields::default()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SheetError>(),
            Some(SheetError::SectionInUse('A'))
        ));
    }

    #[test]
    fn move_between_neighbours_takes_midpoint() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        add(&mut sheet, "A101");
        add(&mut sheet, "A110");
        let last = add(&mut sheet, "A120");

        let moved = sheet.move_cue(&last.id, 1, false).unwrap();
        assert_eq!(moved.cue_number, "A105");
        assert_eq!(numbers(&sheet), vec!["A101", "A105", "A110"]);
        assert_eq!(sheet.position(&last.id), Some(1));
    }

    #[test]
    fn move_to_front_and_end() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        let first = add(&mut sheet, "A101");
        add(&mut sheet, "A102");
        let last = add(&mut sheet, "A103");

        let moved = sheet.move_cue(&last.id, 0, false).unwrap();
        assert_eq!(moved.cue_number, "A100");

        let moved = sheet.move_cue(&first.id, 99, false).unwrap();
        assert_eq!(moved.cue_number, "A103");
        assert_eq!(numbers(&sheet), vec!["A100", "A102", "A103"]);
    }

    #[test]
    fn collapsed_gap_duplicates_unless_strict() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        add(&mut sheet, "A101");
        add(&mut sheet, "A102");
        let last = add(&mut sheet, "A103");

        let err = sheet.move_cue(&last.id, 1, true).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SheetError>(),
            Some(SheetError::DuplicateCueNumber { .. })
        ));
        assert_eq!(sheet.get(&last.id).unwrap().cue_number, "A103");

        let moved = sheet.move_cue(&last.id, 1, false).unwrap();
        assert_eq!(moved.cue_number, "A101");
    }

    #[test]
    fn move_unknown_cue_fails() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        let other = CueId::new(sheet.show_id(), "x", Utc::now());

        let err = sheet.move_cue(&other, 0, false).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SheetError>(),
            Some(SheetError::CueNotFound(_))
        ));
    }

    #[test]
    fn status_and_delete() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        let cue = add(&mut sheet, "A101");

        let cue = sheet.set_status(&cue.id, CueStatus::Standby).unwrap();
        assert_eq!(cue.status, CueStatus::Standby);

        sheet.delete_cue(&cue.id).unwrap();
        assert!(sheet.cues().is_empty());
        assert!(sheet.delete_cue(&cue.id).is_err());
    }

    #[test]
    fn find_by_id_or_number() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        let cue = add(&mut sheet, "B150");

        assert_eq!(sheet.find(&cue.id.to_string()).map(|c| &c.id), Some(&cue.id));
        assert_eq!(sheet.find("b150").map(|c| &c.id), Some(&cue.id));
        assert!(sheet.find("A101").is_none());
        assert!(sheet.resolve("A101").is_err());
    }

    #[test]
    fn sheets_are_scoped_to_their_show() {
        let dir = TempDir::new().unwrap();
        let mut gala = sheet(&dir);
        add(&mut gala, "A101");

        let other = ShowId::new("Matinee", Utc::now());
        let matinee = CueSheet::load(LocalStore::new(dir.path()), other).unwrap();
        assert!(matinee.cues().is_empty());
    }

    #[test]
    fn total_run_time_skips_invalid() {
        let dir = TempDir::new().unwrap();
        let mut sheet = sheet(&dir);
        sheet
            .create_cue(CueDraft {
                fields: timed("19:00:00", "00:05:00"),
                ..Default::default()
            })
            .unwrap();
        sheet
            .create_cue(CueDraft {
                fields: timed("19:05:00", "01:00:30"),
                ..Default::default()
            })
            .unwrap();
        add(&mut sheet, "A200");

        assert_eq!(sheet.total_run_time(), 3930);
    }
}
