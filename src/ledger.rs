//! History ledger of sort passes.
//!
//! Each completed pass that moved something becomes one [`OperationEntry`]
//! holding the [`MoveRecord`]s of that pass. Entries are kept newest first
//! and persisted as JSON after every mutation, so the ledger on disk is
//! always what undo works from.
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// One completed relocation, `source` → `destination`.
///
/// Serialized as a two-element array `["source", "destination"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(PathBuf, PathBuf)", into = "(PathBuf, PathBuf)")]
pub struct MoveRecord {
    /// Where the item was before the move.
    pub source: PathBuf,
    /// Where the item was moved to.
    pub destination: PathBuf,
}

impl MoveRecord {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Name of the directory the item was moved into.
    pub fn category(&self) -> Option<String> {
        self.destination
            .parent()
            .and_then(|parent| parent.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
}

impl From<(PathBuf, PathBuf)> for MoveRecord {
    fn from((source, destination): (PathBuf, PathBuf)) -> Self {
        Self {
            source,
            destination,
        }
    }
}

impl From<MoveRecord> for (PathBuf, PathBuf) {
    fn from(record: MoveRecord) -> Self {
        (record.source, record.destination)
    }
}

/// All moves of one sort pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationEntry {
    /// RFC 3339 time the pass completed.
    pub timestamp: String,
    #[serde(alias = "moved_files")]
    pub moves: Vec<MoveRecord>,
}

impl OperationEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(moves: Vec<MoveRecord>) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            moves,
        }
    }

    /// Groups the moves by destination category, in order of first appearance.
    pub fn categories(&self) -> Vec<CategoryGroup> {
        let mut groups: Vec<CategoryGroup> = Vec::new();
        for record in &self.moves {
            let name = record.category().unwrap_or_default();
            match groups.iter_mut().find(|g| g.name == name) {
                Some(group) => group.moves.push(record.clone()),
                None => groups.push(CategoryGroup {
                    name,
                    moves: vec![record.clone()],
                }),
            }
        }
        groups
    }
}

/// Moves of one entry that share a destination category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub name: String,
    pub moves: Vec<MoveRecord>,
}

/// Errors that can occur reading, writing or addressing the ledger.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Failed to read the history file.
    #[error("failed to read history file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Failed to write the history file.
    #[error("failed to write history file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// History file exists but is not a valid ledger.
    #[error("invalid history file {}: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },
    /// No entry at the requested index.
    #[error("no history entry at index {index} (history has {len})")]
    EntryNotFound { index: usize, len: usize },
    /// The entry does not contain the requested move.
    #[error("entry {index} has no move {} -> {}", .source_path.display(), .destination.display())]
    RecordNotFound {
        index: usize,
        source_path: PathBuf,
        destination: PathBuf,
    },
}

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Ordered, persisted sequence of operation entries, newest first.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    entries: Vec<OperationEntry>,
}

impl Ledger {
    /// Loads the ledger from `path`.
    ///
    /// A missing or blank file is an empty ledger. A file that does not
    /// parse is reported as [`LedgerError::Corrupt`] and left untouched.
    pub fn load(path: &Path) -> LedgerResult<Self> {
        let mut ledger = Self {
            path: path.to_path_buf(),
            entries: Vec::new(),
        };

        if !path.exists() {
            return Ok(ledger);
        }

        let content = fs::read_to_string(path).map_err(|source| LedgerError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(ledger);
        }

        ledger.entries =
            serde_json::from_str(&content).map_err(|e| LedgerError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        // A crash between a revert and its prune could leave an empty entry.
        ledger.entries.retain(|entry| !entry.moves.is_empty());

        tracing::debug!(path = %path.display(), entries = ledger.entries.len(), "ledger loaded");
        Ok(ledger)
    }

    /// Path the ledger persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[OperationEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at `index` or [`LedgerError::EntryNotFound`].
    pub fn entry(&self, index: usize) -> LedgerResult<&OperationEntry> {
        self.entries.get(index).ok_or(LedgerError::EntryNotFound {
            index,
            len: self.entries.len(),
        })
    }

    pub(crate) fn entry_mut(&mut self, index: usize) -> LedgerResult<&mut OperationEntry> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(LedgerError::EntryNotFound { index, len })
    }

    /// Inserts a new entry at the front and persists. Empty batches are ignored.
    pub fn record(&mut self, moves: Vec<MoveRecord>) -> LedgerResult<()> {
        if moves.is_empty() {
            return Ok(());
        }
        let entry = OperationEntry::new(moves);
        tracing::info!(timestamp = %entry.timestamp, moves = entry.moves.len(), "history entry added");
        self.entries.insert(0, entry);
        self.save()
    }

    /// Drops the entry at `index` if it no longer holds any move.
    /// Returns true if it was removed.
    pub(crate) fn prune(&mut self, index: usize) -> bool {
        if self
            .entries
            .get(index)
            .is_some_and(|entry| entry.moves.is_empty())
        {
            self.entries.remove(index);
            tracing::debug!(index, "empty history entry removed");
            return true;
        }
        false
    }

    /// Writes the ledger atomically: a sibling temp file renamed into place.
    pub fn save(&self) -> LedgerResult<()> {
        let write_err = |source| LedgerError::Write {
            path: self.path.clone(),
            source,
        };

        let json = serde_json::to_string_pretty(&self.entries).map_err(|e| {
            write_err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            ))
        })?;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = self.path.with_file_name(tmp_name);

        fs::write(&tmp_path, json).map_err(write_err)?;
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;
        Ok(())
    }
}
