//! sortdesk - keeps a watched directory tidy
//!
//! This library scans a watched directory, classifies each item with an
//! ordered rule set, moves it into a category folder under a managed root,
//! and records every pass in a persistent history so passes, categories or
//! single items can be moved back later. Settings live in a TOML file.

pub mod cli;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod monitor;
pub mod mover;
pub mod notify;
pub mod organizer;
pub mod output;
pub mod rules;
pub mod sorter;
pub mod undo;

pub use config::{Config, ConfigError, FallbackPolicy, IgnoreRules, ItemFilter};
pub use error::{Error, Result};
pub use ledger::{CategoryGroup, Ledger, LedgerError, MoveRecord, OperationEntry};
pub use monitor::{Monitor, MonitorHandle};
pub use mover::{MoveError, MoveExecutor};
pub use notify::{LinkNotifier, NoopNotifier, Notifier, NotifyError};
pub use organizer::{Organizer, PassOutcome};
pub use rules::{FolderMatch, ItemKind, Rule, RuleKind, match_item};
pub use sorter::{PassReport, PlannedMove, SortSettings};
pub use undo::{RevertError, RevertReport, UndoManager};
