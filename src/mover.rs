//! Move executor: relocates one watched item into its category directory.
//!
//! The executor resolves the destination (rule category or fallback),
//! creates the category directory under the managed root if needed, refuses
//! to overwrite anything already there, moves the item and returns the
//! [`MoveRecord`] for the history ledger.
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::config::{FallbackPolicy, is_plain_component};
use crate::ledger::MoveRecord;
use crate::notify::Notifier;

/// Shared category for unmatched items under [`FallbackPolicy::Others`].
pub const OTHERS_CATEGORY: &str = "Others";

/// Errors that can occur while moving a single item.
#[derive(Debug, thiserror::Error)]
pub enum MoveError {
    /// The item path has no usable name component.
    #[error("{} has no file name", .0.display())]
    InvalidItem(PathBuf),
    /// The category is not a single plain name and would leave the
    /// managed root.
    #[error("invalid category '{0}'")]
    InvalidCategory(String),
    /// Failed to create the category directory.
    #[error("failed to create directory {}: {source}", .path.display())]
    DirectoryCreation {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Something already exists at the destination; nothing was moved.
    #[error("destination already exists: {}", .0.display())]
    DestinationExists(PathBuf),
    /// The filesystem move itself failed.
    #[error("failed to move {} to {}: {source}", .item.display(), .destination.display())]
    Failed {
        item: PathBuf,
        destination: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Result type for move operations.
pub type MoveResult<T> = Result<T, MoveError>;

/// Category used for an item no rule matched.
///
/// `per_item` names the category after the file stem (`b.png` → `b`);
/// directories and names without a usable stem keep their full name.
pub fn fallback_category(policy: FallbackPolicy, item_name: &str, is_dir: bool) -> String {
    match policy {
        FallbackPolicy::Others => OTHERS_CATEGORY.to_string(),
        FallbackPolicy::PerItem => {
            if is_dir {
                return item_name.to_string();
            }
            Path::new(item_name)
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .filter(|stem| is_plain_component(stem))
                .unwrap_or_else(|| item_name.to_string())
        }
    }
}

/// Moves items for one sort pass.
///
/// Tracks which categories have already been announced so the notifier
/// fires once per category per pass, not once per item.
pub struct MoveExecutor<'a> {
    managed_root: &'a Path,
    fallback: FallbackPolicy,
    notifier: &'a dyn Notifier,
    notified: HashSet<String>,
}

impl<'a> MoveExecutor<'a> {
    pub fn new(managed_root: &'a Path, fallback: FallbackPolicy, notifier: &'a dyn Notifier) -> Self {
        Self {
            managed_root,
            fallback,
            notifier,
            notified: HashSet::new(),
        }
    }

    /// Resolves the category for an item: the matched one, or the fallback.
    pub fn resolve_category(&self, item: &Path, matched: Option<&str>) -> MoveResult<String> {
        if let Some(category) = matched {
            return Ok(category.to_string());
        }
        let name = item
            .file_name()
            .ok_or_else(|| MoveError::InvalidItem(item.to_path_buf()))?
            .to_string_lossy();
        Ok(fallback_category(self.fallback, &name, item.is_dir()))
    }

    /// Moves `item` into its category directory and records the move.
    ///
    /// # Errors
    ///
    /// * [`MoveError::InvalidCategory`] if the category is not a single
    ///   plain name.
    /// * [`MoveError::DestinationExists`] if the category already holds an
    ///   entry with the same name. Nothing is overwritten.
    /// * [`MoveError::DirectoryCreation`] if the category directory cannot
    ///   be created.
    /// * [`MoveError::Failed`] for any other filesystem failure.
    pub fn execute(&mut self, item: &Path, matched: Option<&str>) -> MoveResult<MoveRecord> {
        let category = self.resolve_category(item, matched)?;
        if !is_plain_component(&category) {
            return Err(MoveError::InvalidCategory(category));
        }
        let category_path = self.managed_root.join(&category);

        fs::create_dir_all(&category_path).map_err(|source| MoveError::DirectoryCreation {
            path: category_path.clone(),
            source,
        })?;

        let file_name = item
            .file_name()
            .ok_or_else(|| MoveError::InvalidItem(item.to_path_buf()))?;
        let destination = category_path.join(file_name);

        if fs::symlink_metadata(&destination).is_ok() {
            return Err(MoveError::DestinationExists(destination));
        }

        move_path(item, &destination).map_err(|source| MoveError::Failed {
            item: item.to_path_buf(),
            destination: destination.clone(),
            source,
        })?;
        tracing::info!(item = %item.display(), category = %category, "moved");

        if self.notified.insert(category.clone())
            && let Err(e) = self.notifier.notify(&category_path, &category)
        {
            tracing::warn!(category = %category, error = %e, "notification failed");
        }

        Ok(MoveRecord::new(item, destination))
    }
}

/// Moves a file or directory.
///
/// Tries `rename` first and falls back to copy + delete when source and
/// destination are on different filesystems.
pub(crate) fn move_path(src: &Path, dest: &Path) -> io::Result<()> {
    match fs::rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::debug!(src = %src.display(), "cross-device move, copying");
            if let Err(copy_err) = copy_recursive(src, dest) {
                // Leave the source intact and drop the partial copy.
                let _ = remove_path(dest);
                return Err(copy_err);
            }
            remove_path(src)
        }
        Err(e) => Err(e),
    }
}

fn copy_recursive(src: &Path, dest: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if meta.is_dir() {
        fs::create_dir(dest)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_recursive(&entry.path(), &dest.join(entry.file_name()))?;
        }
        Ok(())
    } else if meta.file_type().is_symlink() {
        let target = fs::read_link(src)?;
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(target, dest)
        }
        #[cfg(not(unix))]
        {
            fs::copy(target, dest).map(|_| ())
        }
    } else {
        fs::copy(src, dest).map(|_| ())
    }
}

fn remove_path(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}
