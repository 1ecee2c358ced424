//! Relational store interface
//!
//! [`Store`] is the seam between the run sheet logic and persistence: typed
//! select/insert/update/delete over tables plus a change subscription.
//! [`LocalStore`] implements it over the JSONL tables of a data directory
//! and publishes a [`ChangeEvent`] for every row it writes.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use super::feed::{ChangeEvent, ChangeHub, Subscription, SubscriptionFilter};
use super::table::{JsonlTable, Record, Table};
use crate::domain::ShowId;

/// Row storage with change notifications
pub trait Store {
    /// Rows of `R`'s table matching `filter`, in storage order
    fn select<R: Record>(&self, filter: impl Fn(&R) -> bool) -> Result<Vec<R>>;

    /// Inserts new rows; fails without writing if any key already exists
    fn insert<R: Record>(&self, rows: Vec<R>) -> Result<()>;

    /// Patches the row with `key`, returning the updated row if it exists
    fn update<R: Record>(&self, key: &str, patch: impl FnOnce(&mut R)) -> Result<Option<R>>;

    /// Deletes every row matching `filter`, returning the deleted rows
    fn delete<R: Record>(&self, filter: impl Fn(&R) -> bool) -> Result<Vec<R>>;

    /// Subscribes to changes in `table`, optionally for a single show
    fn subscribe(&self, table: Table, show_id: Option<ShowId>) -> Subscription;

    /// Selects matching rows and sorts them with `order`
    fn select_ordered<R: Record>(
        &self,
        filter: impl Fn(&R) -> bool,
        order: impl FnMut(&R, &R) -> Ordering,
    ) -> Result<Vec<R>> {
        let mut rows = self.select(filter)?;
        rows.sort_by(order);
        Ok(rows)
    }

    /// Looks up one row by key
    fn get<R: Record>(&self, key: &str) -> Result<Option<R>> {
        Ok(self.select::<R>(|row| row.key() == key)?.into_iter().next())
    }
}

/// File-backed store rooted at a data directory
#[derive(Clone)]
pub struct LocalStore {
    dir: PathBuf,
    hub: Arc<ChangeHub>,
}

impl LocalStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            hub: Arc::new(ChangeHub::new()),
        }
    }

    /// Returns the data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of live in-process subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn table<R: Record>(&self) -> JsonlTable<R> {
        JsonlTable::in_dir(&self.dir)
    }

    fn publish(&self, events: &[ChangeEvent]) {
        for event in events {
            self.hub.publish(event);
        }
    }
}

impl Store for LocalStore {
    fn select<R: Record>(&self, filter: impl Fn(&R) -> bool) -> Result<Vec<R>> {
        let rows = self.table::<R>().read_all()?;
        Ok(rows.into_iter().filter(|row| filter(row)).collect())
    }

    fn insert<R: Record>(&self, new_rows: Vec<R>) -> Result<()> {
        if new_rows.is_empty() {
            return Ok(());
        }

        let events = self.table::<R>().modify(|rows| {
            let mut keys: HashSet<String> = rows.iter().map(Record::key).collect();
            for row in &new_rows {
                if !keys.insert(row.key()) {
                    anyhow::bail!("Duplicate key in {} table: {}", R::TABLE, row.key());
                }
            }

            let events = new_rows
                .iter()
                .map(ChangeEvent::inserted)
                .collect::<Result<Vec<_>>>()?;
            rows.extend(new_rows);
            Ok((events, true))
        })?;

        debug!(table = %R::TABLE, count = events.len(), "Inserted rows");
        self.publish(&events);
        Ok(())
    }

    fn update<R: Record>(&self, key: &str, patch: impl FnOnce(&mut R)) -> Result<Option<R>> {
        let outcome = self.table::<R>().modify(|rows| {
            let Some(row) = rows.iter_mut().find(|row| row.key() == key) else {
                return Ok((None, false));
            };

            let old = row.clone();
            patch(row);
            if row.key() != key {
                anyhow::bail!("Update may not change the key of {} row {}", R::TABLE, key);
            }

            let event = ChangeEvent::updated(&old, row)?;
            Ok((Some((row.clone(), event)), true))
        })?;

        Ok(outcome.map(|(row, event)| {
            debug!(table = %R::TABLE, key, "Updated row");
            self.publish(std::slice::from_ref(&event));
            row
        }))
    }

    fn delete<R: Record>(&self, filter: impl Fn(&R) -> bool) -> Result<Vec<R>> {
        let deleted = self.table::<R>().modify(|rows| {
            let (deleted, kept): (Vec<R>, Vec<R>) = rows.drain(..).partition(|row| filter(row));
            *rows = kept;
            let changed = !deleted.is_empty();
            Ok((deleted, changed))
        })?;

        let events = deleted
            .iter()
            .map(ChangeEvent::deleted)
            .collect::<Result<Vec<_>>>()?;
        if !events.is_empty() {
            debug!(table = %R::TABLE, count = events.len(), "Deleted rows");
        }
        self.publish(&events);

        Ok(deleted)
    }

    fn subscribe(&self, table: Table, show_id: Option<ShowId>) -> Subscription {
        self.hub.subscribe(SubscriptionFilter { table, show_id })
    }
}
