//! JSONL table files
//!
//! Each table lives in `.cueflow/{table}.jsonl` with one JSON object per
//! line. Reads take a shared lock on the table file; read-modify-write
//! cycles hold an exclusive lock on a sibling `.lock` file so concurrent
//! processes cannot interleave updates. Full rewrites go through a temp
//! file and an atomic rename.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::{Cue, Permission, Show, ShowId};

/// The tables of the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Shows,
    Cues,
    Permissions,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Shows, Table::Cues, Table::Permissions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Table::Shows => "shows",
            Table::Cues => "cues",
            Table::Permissions => "permissions",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.as_str())
    }

    /// Maps a table file name back to its table
    pub fn from_file_name(name: &str) -> Option<Table> {
        Table::ALL.into_iter().find(|t| t.file_name() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row type stored in one table
pub trait Record: Serialize + DeserializeOwned + Clone + Send + 'static {
    const TABLE: Table;

    /// Primary key, unique within the table
    fn key(&self) -> String;

    /// Show the row belongs to (the show itself for show rows)
    fn show_id(&self) -> &ShowId;
}

impl Record for Show {
    const TABLE: Table = Table::Shows;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn show_id(&self) -> &ShowId {
        &self.id
    }
}

impl Record for Cue {
    const TABLE: Table = Table::Cues;

    fn key(&self) -> String {
        self.id.to_string()
    }

    fn show_id(&self) -> &ShowId {
        &self.show_id
    }
}

impl Record for Permission {
    const TABLE: Table = Table::Permissions;

    fn key(&self) -> String {
        format!("{}/{}", self.show_id, self.user.to_lowercase())
    }

    fn show_id(&self) -> &ShowId {
        &self.show_id
    }
}

/// Store for one table in JSONL format
pub struct JsonlTable<R> {
    path: PathBuf,
    _record: std::marker::PhantomData<fn() -> R>,
}

impl<R: Record> JsonlTable<R> {
    /// Creates a table at the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: std::marker::PhantomData,
        }
    }

    /// Creates the table inside a data directory
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(R::TABLE.file_name()))
    }

    /// Returns the path to the table file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        Ok(())
    }

    /// Reads all rows in file order
    ///
    /// A key that appears on several lines keeps its last version, at the
    /// position of its first occurrence.
    pub fn read_all(&self) -> Result<Vec<R>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {} table: {}", R::TABLE, self.path.display()))?;

        // Acquire shared lock for reading
        file.lock_shared()
            .with_context(|| format!("Failed to acquire read lock on {} table", R::TABLE))?;

        let reader = BufReader::new(&file);
        let mut rows: Vec<R> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("Failed to read line {}", line_num + 1))?;

            if line.trim().is_empty() {
                continue;
            }

            let row: R = serde_json::from_str(&line).with_context(|| {
                format!("Failed to parse {} row at line {}", R::TABLE, line_num + 1)
            })?;

            match positions.get(&row.key()) {
                Some(&pos) => rows[pos] = row,
                None => {
                    positions.insert(row.key(), rows.len());
                    rows.push(row);
                }
            }
        }

        // Lock is released when file is dropped
        Ok(rows)
    }

    /// Writes all rows to the table (full rewrite)
    pub fn write_all(&self, rows: &[R]) -> Result<()> {
        self.ensure_parent()?;

        // Write to temp file first
        let temp_path = self.path.with_extension("jsonl.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            // Acquire exclusive lock
            file.lock_exclusive()
                .with_context(|| format!("Failed to acquire write lock on {} table", R::TABLE))?;

            let mut writer = BufWriter::new(&file);

            for row in rows {
                let line = serde_json::to_string(row)
                    .with_context(|| format!("Failed to serialize {} row", R::TABLE))?;
                writeln!(writer, "{}", line).context("Failed to write row")?;
            }

            writer.flush().context("Failed to flush table")?;
        }

        // Atomic rename
        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Runs a read-modify-write cycle under the table's exclusive lock
    ///
    /// The rows are written back only when `f` reports a change.
    pub fn modify<T>(&self, f: impl FnOnce(&mut Vec<R>) -> Result<(T, bool)>) -> Result<T> {
        self.ensure_parent()?;

        let lock_path = self.lock_path();
        let lock = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        lock.lock_exclusive()
            .with_context(|| format!("Failed to lock {} table", R::TABLE))?;

        let mut rows = self.read_all()?;
        let (result, changed) = f(&mut rows)?;
        if changed {
            self.write_all(&rows)?;
        }

        Ok(result)
    }
}
