//! Notification hook fired once per destination category per pass.
//!
//! The default desktop behaviour is to drop a link to the category next to
//! the items that were sorted away, so the user can still find them.

use std::path::{Path, PathBuf};

/// Errors from a notifier. Never fatal to the move that triggered it.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("cannot create link {}: {source}", .path.display())]
    Link {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Side-effect invoked after a successful move into a category.
pub trait Notifier: Send + Sync {
    /// Announces `target_dir` under the human-readable `label`.
    ///
    /// Implementations must be idempotent.
    fn notify(&self, target_dir: &Path, label: &str) -> Result<(), NotifyError>;
}

/// Does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _target_dir: &Path, _label: &str) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Suffix of the links [`LinkNotifier`] creates.
///
/// A sorted item never carries it, so a link cannot take the place an item
/// is reverted to.
pub const LINK_SUFFIX: &str = ".lnk";

/// Creates a symlink `<category>.lnk` inside `link_dir`.
///
/// Links are skipped by the scanner, so they are never sorted themselves.
#[derive(Debug, Clone)]
pub struct LinkNotifier {
    link_dir: PathBuf,
}

impl LinkNotifier {
    pub fn new(link_dir: impl Into<PathBuf>) -> Self {
        Self {
            link_dir: link_dir.into(),
        }
    }
}

impl Notifier for LinkNotifier {
    fn notify(&self, target_dir: &Path, label: &str) -> Result<(), NotifyError> {
        let link_path = self.link_dir.join(format!("{label}{LINK_SUFFIX}"));

        // Anything already there, including a dangling link, is left alone.
        if std::fs::symlink_metadata(&link_path).is_ok() {
            return Ok(());
        }

        create_link(target_dir, &link_path).map_err(|source| NotifyError::Link {
            path: link_path.clone(),
            source,
        })?;
        tracing::debug!(link = %link_path.display(), target = %target_dir.display(), "link created");
        Ok(())
    }
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_link(target: &Path, link: &Path) -> std::io::Result<()> {
    tracing::debug!(
        link = %link.display(),
        target = %target.display(),
        "links are not supported on this platform"
    );
    Ok(())
}
