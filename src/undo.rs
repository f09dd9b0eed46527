/// Undo functionality for reverting recorded moves.
///
/// Moves can be reverted for a whole history entry, for one destination
/// category of an entry, or one at a time. Every successfully reverted move
/// is removed from its entry; moves that could not be reverted stay in the
/// ledger so they can be retried. Entries left without moves are pruned,
/// and the ledger is persisted after every call.
use crate::ledger::{Ledger, LedgerError, LedgerResult, MoveRecord};
use crate::mover::move_path;
use std::fs;
use std::path::{Path, PathBuf};

/// Why a single move could not be reverted.
#[derive(Debug, thiserror::Error)]
pub enum RevertError {
    /// The item is no longer at its recorded destination.
    #[error("not found at recorded location {}", .0.display())]
    NotFound(PathBuf),
    /// Something already occupies the original location.
    #[error("original location is occupied: {}", .0.display())]
    SourceOccupied(PathBuf),
    /// The filesystem refused the move back.
    #[error("failed to restore {} to {}: {source}", .destination.display(), .original.display())]
    Io {
        destination: PathBuf,
        original: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Represents the result of a revert call.
#[derive(Debug, Default)]
pub struct RevertReport {
    /// Moves that were reverted and removed from the ledger.
    pub restored: Vec<MoveRecord>,
    /// Moves whose item was not found at its destination (left in the ledger).
    pub skipped: Vec<(MoveRecord, RevertError)>,
    /// Moves that failed for any other reason (left in the ledger).
    pub failed: Vec<(MoveRecord, RevertError)>,
    /// True if the entry became empty and was removed from the ledger.
    pub entry_removed: bool,
}

impl RevertReport {
    /// Returns the total number of moves processed.
    pub fn total_processed(&self) -> usize {
        self.restored.len() + self.skipped.len() + self.failed.len()
    }

    /// Returns true if every selected move was reverted.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Which moves of an entry a revert targets.
#[derive(Debug, Clone, Copy)]
enum Selection<'a> {
    All,
    Category(&'a str),
    Single {
        source: &'a Path,
        destination: &'a Path,
    },
}

impl Selection<'_> {
    fn includes(&self, record: &MoveRecord) -> bool {
        match self {
            Selection::All => true,
            Selection::Category(name) => record.category().as_deref() == Some(*name),
            Selection::Single {
                source,
                destination,
            } => record.source == *source && record.destination == *destination,
        }
    }
}

/// Reverts recorded moves against a [`Ledger`].
pub struct UndoManager;

impl UndoManager {
    /// Reverts every move of the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EntryNotFound`] for a bad index and
    /// [`LedgerError::Write`] if the updated ledger cannot be persisted.
    /// Per-move problems are reported in the [`RevertReport`], not as errors.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sortdesk::ledger::Ledger;
    /// use sortdesk::undo::UndoManager;
    /// use std::path::Path;
    ///
    /// let mut ledger = Ledger::load(Path::new("history.json")).unwrap();
    /// let report = UndoManager::revert_operation(&mut ledger, 0).unwrap();
    /// println!("Restored {} items", report.restored.len());
    /// ```
    pub fn revert_operation(ledger: &mut Ledger, index: usize) -> LedgerResult<RevertReport> {
        Self::revert(ledger, index, Selection::All)
    }

    /// Reverts the moves of entry `index` whose destination directory is
    /// named `category`.
    pub fn revert_category(
        ledger: &mut Ledger,
        index: usize,
        category: &str,
    ) -> LedgerResult<RevertReport> {
        Self::revert(ledger, index, Selection::Category(category))
    }

    /// Reverts exactly one move of entry `index`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::RecordNotFound`] if the entry has no such move.
    pub fn revert_single(
        ledger: &mut Ledger,
        index: usize,
        source: &Path,
        destination: &Path,
    ) -> LedgerResult<RevertReport> {
        let entry = ledger.entry(index)?;
        if !entry
            .moves
            .iter()
            .any(|r| r.source == source && r.destination == destination)
        {
            return Err(LedgerError::RecordNotFound {
                index,
                source_path: source.to_path_buf(),
                destination: destination.to_path_buf(),
            });
        }
        Self::revert(
            ledger,
            index,
            Selection::Single {
                source,
                destination,
            },
        )
    }

    fn revert(
        ledger: &mut Ledger,
        index: usize,
        selection: Selection<'_>,
    ) -> LedgerResult<RevertReport> {
        let entry = ledger.entry_mut(index)?;
        let selected: Vec<MoveRecord> = entry
            .moves
            .iter()
            .filter(|record| selection.includes(record))
            .cloned()
            .collect();

        // Undo is LIFO within the entry.
        let mut report = RevertReport::default();
        for record in selected.into_iter().rev() {
            match Self::restore(&record) {
                Ok(()) => {
                    if let Some(pos) = entry.moves.iter().position(|r| *r == record) {
                        entry.moves.remove(pos);
                    }
                    report.restored.push(record);
                }
                Err(err @ RevertError::NotFound(_)) => {
                    tracing::warn!(
                        destination = %record.destination.display(),
                        "item to revert not found, keeping history record"
                    );
                    report.skipped.push((record, err));
                }
                Err(err) => {
                    tracing::warn!(error = %err, "revert failed, keeping history record");
                    report.failed.push((record, err));
                }
            }
        }

        report.entry_removed = ledger.prune(index);
        ledger.save()?;

        tracing::info!(
            index,
            restored = report.restored.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "revert finished"
        );
        Ok(report)
    }

    /// Moves one item back to where it came from, recreating the original
    /// parent directory if needed. Never overwrites.
    fn restore(record: &MoveRecord) -> Result<(), RevertError> {
        if fs::symlink_metadata(&record.destination).is_err() {
            return Err(RevertError::NotFound(record.destination.clone()));
        }

        if fs::symlink_metadata(&record.source).is_ok() {
            return Err(RevertError::SourceOccupied(record.source.clone()));
        }

        let io_err = |source| RevertError::Io {
            destination: record.destination.clone(),
            original: record.source.clone(),
            source,
        };

        if let Some(parent) = record.source.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        move_path(&record.destination, &record.source).map_err(io_err)?;
        tracing::info!(item = %record.source.display(), "restored");
        Ok(())
    }
}
