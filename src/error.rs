//! Crate-level error type.
//!
//! Each layer has its own error enum; [`Error`] is what the public
//! [`crate::Organizer`] operations and the CLI return.

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::ledger::LedgerError;

/// Unified error for top-level operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded, validated or saved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The history ledger could not be read, written or addressed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The watched directory could not be listed.
    #[error("cannot scan {}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Logging could not be initialised.
    #[error("logging setup failed: {0}")]
    Logging(String),

    /// The background monitor thread could not be spawned.
    #[error("cannot start monitor: {0}")]
    Monitor(#[source] std::io::Error),

    /// A command-line argument names something that does not exist.
    #[error("{0}")]
    InvalidArgument(String),
}

/// Convenience alias used by the public API.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_displays_path() {
        let err = Error::Scan {
            path: PathBuf::from("/missing"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert_eq!(err.to_string(), "cannot scan /missing: gone");
    }

    #[test]
    fn ledger_error_converts() {
        let err: Error = LedgerError::EntryNotFound { index: 3, len: 1 }.into();
        assert!(matches!(err, Error::Ledger(_)));
        assert!(err.to_string().contains('3'));
    }
}
