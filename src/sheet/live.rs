//! Live-updating cue list
//!
//! A [`LiveSheet`] keeps the sorted cues of one show current while other
//! writers change them. A worker thread consumes change events, reloads and
//! re-sorts the whole list on each burst, and publishes the result for
//! readers to snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, warn};

use super::cue_sheet::load_sorted;
use crate::domain::{Cue, ShowId};
use crate::storage::{Store, Subscription};

/// How often the worker checks for shutdown while idle
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Sorted cues of one show, refreshed in the background
pub struct LiveSheet {
    cues: Arc<RwLock<Vec<Cue>>>,
    updates: Receiver<usize>,
    abort_flag: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl LiveSheet {
    /// Loads the show's cues, then follows `subscription` until dropped
    pub fn start<S>(store: S, show_id: ShowId, subscription: Subscription) -> Result<Self>
    where
        S: Store + Send + 'static,
    {
        let cues = Arc::new(RwLock::new(load_sorted(&store, &show_id)?));
        let abort_flag = Arc::new(AtomicBool::new(false));
        let (update_tx, updates) = mpsc::channel();

        let worker_cues = Arc::clone(&cues);
        let worker_abort = Arc::clone(&abort_flag);
        let events = subscription.into_receiver();
        let worker = thread::Builder::new()
            .name("cueflow-live-sheet".to_string())
            .spawn(move || loop {
                if worker_abort.load(Ordering::Relaxed) {
                    break;
                }

                match events.recv_timeout(POLL_INTERVAL) {
                    Ok(_) => {}
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
                let burst = 1 + events.try_iter().count();

                match load_sorted(&store, &show_id) {
                    Ok(reloaded) => {
                        let count = reloaded.len();
                        *worker_cues.write().unwrap_or_else(|e| e.into_inner()) = reloaded;
                        debug!(show = %show_id, events = burst, count, "Live sheet refreshed");
                        let _ = update_tx.send(count);
                    }
                    Err(error) => {
                        warn!(show = %show_id, error = %format!("{:#}", error), "Failed to reload cues");
                    }
                }
            })
            .context("Failed to spawn live sheet thread")?;

        Ok(Self {
            cues,
            updates,
            abort_flag,
            worker: Some(worker),
        })
    }

    /// Current cues in cue order
    pub fn snapshot(&self) -> Vec<Cue> {
        self.cues.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Waits up to `timeout` for the next refresh, returning the new snapshot
    ///
    /// Refreshes that queued up while nobody was waiting are collapsed.
    pub fn wait_for_update(&self, timeout: Duration) -> Option<Vec<Cue>> {
        self.updates.recv_timeout(timeout).ok()?;
        while self.updates.try_recv().is_ok() {}
        Some(self.snapshot())
    }

    /// Returns true while the worker is still following changes
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }
}

impl Drop for LiveSheet {
    fn drop(&mut self) {
        self.abort_flag.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::sheet::{CueDraft, CueSheet};
    use crate::storage::{LocalStore, Table};

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn follows_writes_from_another_sheet() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let show = ShowId::new("Gala", Utc::now());

        let sub = store.subscribe(Table::Cues, Some(show.clone()));
        let live = LiveSheet::start(store.clone(), show.clone(), sub).unwrap();
        assert!(live.snapshot().is_empty());

        let mut sheet = CueSheet::load(store, show).unwrap();
        let first = sheet.create_cue(CueDraft::default()).unwrap();
        sheet.create_cue(CueDraft::default()).unwrap();
        sheet.move_cue(&first.id, 2, false).unwrap();

        let mut latest = live.wait_for_update(WAIT).unwrap();
        while latest.first().map(|c| c.cue_number.as_str()) != Some("A102") {
            latest = live.wait_for_update(WAIT).unwrap();
        }
        let numbers: Vec<_> = latest.iter().map(|c| c.cue_number.as_str()).collect();
        assert_eq!(numbers, vec!["A102", "A103"]);
    }

    #[test]
    fn ignores_other_shows() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let show = ShowId::new("Gala", Utc::now());
        let other = ShowId::new("Matinee", Utc::now());

        let sub = store.subscribe(Table::Cues, Some(show.clone()));
        let live = LiveSheet::start(store.clone(), show, sub).unwrap();

        let mut sheet = CueSheet::load(store, other).unwrap();
        sheet.create_cue(CueDraft::default()).unwrap();

        assert!(live.wait_for_update(Duration::from_millis(300)).is_none());
        assert!(live.snapshot().is_empty());
    }

    #[test]
    fn stops_when_dropped() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        let show = ShowId::new("Gala", Utc::now());

        let sub = store.subscribe(Table::Cues, None);
        let live = LiveSheet::start(store.clone(), show, sub).unwrap();
        assert!(live.is_running());
        drop(live);

        // The dead subscription is pruned on the next publish
        let mut sheet = CueSheet::load(store.clone(), ShowId::new("Other", Utc::now())).unwrap();
        sheet.create_cue(CueDraft::default()).unwrap();
        assert_eq!(store.subscriber_count(), 0);
    }
}
