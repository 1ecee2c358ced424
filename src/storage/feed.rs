//! Change feed
//!
//! Writers publish a [`ChangeEvent`] for every inserted, updated or deleted
//! row. Subscribers register a table (and optionally a show) and receive
//! matching events over a channel. Events carry rows as JSON; consumers
//! decode them into typed records with [`ChangeEvent::decode_new`] and
//! [`ChangeEvent::decode_old`].
//!
//! Two sources feed subscribers:
//! - [`ChangeHub`] is fed in-process by [`LocalStore`](super::LocalStore)
//!   writes.
//! - [`FileFeed`] watches the data directory and turns edits made by other
//!   processes into events by diffing each table against its last snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Context, Result};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};
use notify_debouncer_mini::{new_debouncer, DebounceEventResult, Debouncer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::table::{JsonlTable, Record, Table};
use crate::domain::{Cue, Permission, Show, ShowId};

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    /// Show the changed row belongs to
    pub show_id: ShowId,
    /// Row after the change (absent for deletes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<Value>,
    /// Row before the change (absent for inserts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<Value>,
}

impl ChangeEvent {
    fn encode<R: Record>(row: &R) -> Result<Value> {
        serde_json::to_value(row).with_context(|| format!("Failed to encode {} row", R::TABLE))
    }

    pub fn inserted<R: Record>(row: &R) -> Result<Self> {
        Ok(Self {
            table: R::TABLE,
            kind: ChangeKind::Insert,
            show_id: row.show_id().clone(),
            new: Some(Self::encode(row)?),
            old: None,
        })
    }

    pub fn updated<R: Record>(old: &R, new: &R) -> Result<Self> {
        Ok(Self {
            table: R::TABLE,
            kind: ChangeKind::Update,
            show_id: new.show_id().clone(),
            new: Some(Self::encode(new)?),
            old: Some(Self::encode(old)?),
        })
    }

    pub fn deleted<R: Record>(row: &R) -> Result<Self> {
        Ok(Self {
            table: R::TABLE,
            kind: ChangeKind::Delete,
            show_id: row.show_id().clone(),
            new: None,
            old: Some(Self::encode(row)?),
        })
    }

    fn decode<R: Record>(&self, value: &Option<Value>) -> Result<Option<R>> {
        if self.table != R::TABLE {
            anyhow::bail!("Event for {} table decoded as {}", self.table, R::TABLE);
        }
        value
            .as_ref()
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .with_context(|| format!("Malformed {} row in change event", self.table))
    }

    /// The row after the change, validated as `R`
    pub fn decode_new<R: Record>(&self) -> Result<Option<R>> {
        self.decode(&self.new)
    }

    /// The row before the change, validated as `R`
    pub fn decode_old<R: Record>(&self) -> Result<Option<R>> {
        self.decode(&self.old)
    }
}

/// Which events a subscriber wants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub table: Table,
    pub show_id: Option<ShowId>,
}

impl SubscriptionFilter {
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        event.table == self.table
            && self.show_id.as_ref().map_or(true, |show| *show == event.show_id)
    }
}

/// Receiving end of a subscription
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) tears the
/// subscription down; the hub forgets it on its next publish.
pub struct Subscription {
    id: u64,
    receiver: Receiver<ChangeEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Blocks until the next event, or `None` once the feed has shut down
    pub fn recv(&self) -> Option<ChangeEvent> {
        self.receiver.recv().ok()
    }

    /// Returns a pending event without blocking
    pub fn try_recv(&self) -> Option<ChangeEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ChangeEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains every pending event
    pub fn drain(&self) -> Vec<ChangeEvent> {
        self.receiver.try_iter().collect()
    }

    pub fn into_receiver(self) -> Receiver<ChangeEvent> {
        self.receiver
    }

    pub fn unsubscribe(self) {}
}

struct Subscriber {
    id: u64,
    filter: SubscriptionFilter,
    sender: Sender<ChangeEvent>,
}

/// Fan-out point for change events
#[derive(Default)]
pub struct ChangeHub {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ChangeHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, filter: SubscriptionFilter) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel();

        debug!(id, table = %filter.table, show = ?filter.show_id, "Subscribed to change feed");
        self.lock().push(Subscriber { id, filter, sender });

        Subscription { id, receiver }
    }

    /// Delivers an event to every matching subscriber, dropping dead ones
    pub fn publish(&self, event: &ChangeEvent) {
        self.lock().retain(|sub| {
            if !sub.filter.matches(event) {
                return true;
            }
            let alive = sub.sender.send(event.clone()).is_ok();
            if !alive {
                debug!(id = sub.id, "Dropped closed subscription");
            }
            alive
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        // A panic while holding the lock leaves the list itself intact
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Last known rows of every table, keyed by primary key
type Snapshot = HashMap<Table, HashMap<String, (ShowId, Value)>>;

fn snapshot_table<R: Record>(dir: &Path) -> Result<HashMap<String, (ShowId, Value)>> {
    JsonlTable::<R>::in_dir(dir)
        .read_all()?
        .into_iter()
        .map(|row| -> Result<_> {
            let value = serde_json::to_value(&row)?;
            Ok((row.key(), (row.show_id().clone(), value)))
        })
        .collect()
}

fn snapshot(dir: &Path, table: Table) -> Result<HashMap<String, (ShowId, Value)>> {
    match table {
        Table::Shows => snapshot_table::<Show>(dir),
        Table::Cues => snapshot_table::<Cue>(dir),
        Table::Permissions => snapshot_table::<Permission>(dir),
    }
}

/// Compares two snapshots of one table and describes the difference as events
fn diff_table(
    table: Table,
    before: &HashMap<String, (ShowId, Value)>,
    after: &HashMap<String, (ShowId, Value)>,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for (key, (show_id, new)) in after {
        match before.get(key) {
            None => events.push(ChangeEvent {
                table,
                kind: ChangeKind::Insert,
                show_id: show_id.clone(),
                new: Some(new.clone()),
                old: None,
            }),
            Some((_, old)) if old != new => events.push(ChangeEvent {
                table,
                kind: ChangeKind::Update,
                show_id: show_id.clone(),
                new: Some(new.clone()),
                old: Some(old.clone()),
            }),
            Some(_) => {}
        }
    }

    for (key, (show_id, old)) in before {
        if !after.contains_key(key) {
            events.push(ChangeEvent {
                table,
                kind: ChangeKind::Delete,
                show_id: show_id.clone(),
                new: None,
                old: Some(old.clone()),
            });
        }
    }

    events
}

/// Watches the data directory and publishes changes made by any process
pub struct FileFeed {
    hub: Arc<ChangeHub>,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    worker: Option<JoinHandle<()>>,
}

impl FileFeed {
    /// Starts watching `dir`; file events within `debounce` are batched
    pub fn start(dir: impl Into<PathBuf>, debounce: Duration) -> Result<Self> {
        let dir = dir.into();
        let hub = Arc::new(ChangeHub::new());

        let mut last: Snapshot = HashMap::new();
        for table in Table::ALL {
            last.insert(table, snapshot(&dir, table)?);
        }

        let (tx, rx) = mpsc::channel::<DebounceEventResult>();
        let mut debouncer = new_debouncer(debounce, tx).context("Failed to create file watcher")?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch {}", dir.display()))?;

        debug!(dir = %dir.display(), ?debounce, "Watching data directory");

        let worker_hub = Arc::clone(&hub);
        let worker = thread::Builder::new()
            .name("cueflow-file-feed".to_string())
            .spawn(move || run_feed_loop(&dir, rx, last, &worker_hub))
            .context("Failed to spawn file feed thread")?;

        Ok(Self {
            hub,
            debouncer: Some(debouncer),
            worker: Some(worker),
        })
    }

    pub fn subscribe(&self, table: Table, show_id: Option<ShowId>) -> Subscription {
        self.hub.subscribe(SubscriptionFilter { table, show_id })
    }
}

impl Drop for FileFeed {
    fn drop(&mut self) {
        // Dropping the debouncer closes the event channel and ends the worker
        self.debouncer.take();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_feed_loop(
    dir: &Path,
    rx: Receiver<DebounceEventResult>,
    mut last: Snapshot,
    hub: &ChangeHub,
) {
    for result in rx {
        let events = match result {
            Ok(events) => events,
            Err(error) => {
                warn!(?error, "Watch error");
                continue;
            }
        };

        let mut touched: Vec<Table> = events
            .iter()
            .filter_map(|e| e.path.file_name()?.to_str().and_then(Table::from_file_name))
            .collect();
        touched.sort_by_key(|t| t.as_str());
        touched.dedup();

        for table in touched {
            let current = match snapshot(dir, table) {
                Ok(current) => current,
                Err(error) => {
                    // Likely caught mid-write; the rename will trigger another event
                    warn!(%table, error = %format!("{:#}", error), "Failed to re-read table");
                    continue;
                }
            };

            let previous = last.remove(&table).unwrap_or_default();
            let changes = diff_table(table, &previous, &current);
            debug!(%table, changes = changes.len(), "Table changed on disk");

            for event in &changes {
                hub.publish(event);
            }
            last.insert(table, current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tempfile::TempDir;

    use crate::domain::CueId;

    fn make_cue(show: &ShowId, number: &str) -> Cue {
        Cue::new(CueId::new(show, number, Utc::now()), show.clone(), number)
    }

    #[test]
    fn hub_delivers_matching_events_only() {
        let hub = ChangeHub::new();
        let show_a = ShowId::new("A", Utc::now());
        let show_b = ShowId::new("B", Utc::now());

        let cues_a = hub.subscribe(SubscriptionFilter {
            table: Table::Cues,
            show_id: Some(show_a.clone()),
        });
        let shows = hub.subscribe(SubscriptionFilter {
            table: Table::Shows,
            show_id: None,
        });

        hub.publish(&ChangeEvent::inserted(&make_cue(&show_a, "A101")).unwrap());
        hub.publish(&ChangeEvent::inserted(&make_cue(&show_b, "A101")).unwrap());

        let events = cues_a.drain();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].show_id, show_a);
        assert!(shows.try_recv().is_none());
    }

    #[test]
    fn dropped_subscriptions_are_pruned() {
        let hub = ChangeHub::new();
        let show = ShowId::new("A", Utc::now());
        let sub = hub.subscribe(SubscriptionFilter {
            table: Table::Cues,
            show_id: None,
        });
        assert_eq!(hub.subscriber_count(), 1);

        sub.unsubscribe();
        hub.publish(&ChangeEvent::inserted(&make_cue(&show, "A101")).unwrap());
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn events_decode_into_typed_rows() {
        let show = ShowId::new("A", Utc::now());
        let old = make_cue(&show, "A101");
        let mut new = old.clone();
        new.cue_number = "A150".to_string();

        let event = ChangeEvent::updated(&old, &new).unwrap();
        assert_eq!(event.kind, ChangeKind::Update);
        assert_eq!(event.decode_new::<Cue>().unwrap(), Some(new));
        assert_eq!(event.decode_old::<Cue>().unwrap(), Some(old));
        assert!(event.decode_new::<Show>().is_err());
    }

    #[test]
    fn event_kinds_serialize_uppercase() {
        assert_eq!(serde_json::to_string(&ChangeKind::Delete).unwrap(), "\"DELETE\"");
    }

    #[test]
    fn diff_reports_inserts_updates_and_deletes() {
        let dir = TempDir::new().unwrap();
        let table: JsonlTable<Cue> = JsonlTable::in_dir(dir.path());
        let show = ShowId::new("A", Utc::now());

        let kept = make_cue(&show, "A101");
        let mut moved = make_cue(&show, "A102");
        let removed = make_cue(&show, "A103");
        table.write_all(&[kept.clone(), moved.clone(), removed.clone()]).unwrap();
        let before = snapshot(dir.path(), Table::Cues).unwrap();

        moved.cue_number = "A100".to_string();
        let added = make_cue(&show, "A104");
        table.write_all(&[kept, moved, added]).unwrap();
        let after = snapshot(dir.path(), Table::Cues).unwrap();

        let mut kinds: Vec<ChangeKind> = diff_table(Table::Cues, &before, &after)
            .into_iter()
            .map(|e| e.kind)
            .collect();
        kinds.sort_by_key(|k| format!("{:?}", k));
        assert_eq!(kinds, vec![ChangeKind::Delete, ChangeKind::Insert, ChangeKind::Update]);
    }

    #[test]
    fn file_feed_reports_external_writes() {
        let dir = TempDir::new().unwrap();
        let show = ShowId::new("A", Utc::now());
        let feed = FileFeed::start(dir.path(), Duration::from_millis(50)).unwrap();
        let sub = feed.subscribe(Table::Cues, Some(show.clone()));

        let table: JsonlTable<Cue> = JsonlTable::in_dir(dir.path());
        table.write_all(&[make_cue(&show, "A101")]).unwrap();

        let event = sub.recv_timeout(Duration::from_secs(10)).expect("change event");
        assert_eq!(event.kind, ChangeKind::Insert);
        assert_eq!(event.show_id, show);
    }
}
