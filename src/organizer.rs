//! The organizer context: settings, rules and ledger behind a single lock.
//!
//! Every pass and every revert holds the lock for its whole
//! read-modify-persist sequence, so a scheduled pass, a manual "sort now"
//! and an undo can never interleave.

use parking_lot::Mutex;
use std::path::Path;

use crate::config::{Config, validate_rule};
use crate::error::Result;
use crate::ledger::{CategoryGroup, Ledger, OperationEntry};
use crate::notify::{LinkNotifier, NoopNotifier, Notifier};
use crate::rules::Rule;
use crate::sorter::{self, PassReport, PlannedMove, SortSettings};
use crate::undo::{RevertReport, UndoManager};

/// Result of a pass that does not wait for the lock.
#[derive(Debug)]
pub enum PassOutcome {
    Completed(PassReport),
    /// Another pass or revert was running; nothing was done.
    Busy,
}

struct State {
    rules: Vec<Rule>,
    ledger: Ledger,
}

/// Entry point for sorting and undoing.
///
/// Construct once at startup and share (e.g. in an `Arc`) between the
/// background monitor and on-demand callers.
pub struct Organizer {
    settings: SortSettings,
    notifier: Box<dyn Notifier>,
    state: Mutex<State>,
}

impl Organizer {
    /// Builds an organizer from configuration, loading the history ledger.
    ///
    /// Uses a [`LinkNotifier`] in the watched directory when
    /// `create_links` is set, otherwise no notifications.
    pub fn from_config(config: &Config) -> Result<Self> {
        let notifier: Box<dyn Notifier> = if config.create_links {
            Box::new(LinkNotifier::new(&config.watched_dir))
        } else {
            Box::new(NoopNotifier)
        };
        Self::open(config, notifier)
    }

    /// Builds an organizer with an explicit notifier.
    pub fn open(config: &Config, notifier: Box<dyn Notifier>) -> Result<Self> {
        let settings = SortSettings {
            watched_dir: config.watched_dir.clone(),
            managed_root: config.managed_root(),
            history_file: config.history_path(),
            fallback: config.fallback,
            folder_match: config.folder_match,
            filter: config.ignore.compile()?,
        };
        let ledger = Ledger::load(&settings.history_file)?;
        tracing::debug!(
            watched = %settings.watched_dir.display(),
            managed = %settings.managed_root.display(),
            "organizer ready"
        );

        Ok(Self {
            settings,
            notifier,
            state: Mutex::new(State {
                rules: config.rules.clone(),
                ledger,
            }),
        })
    }

    pub fn settings(&self) -> &SortSettings {
        &self.settings
    }

    /// Runs a pass, waiting for any pass or revert in progress to finish.
    pub fn run_pass(&self) -> Result<PassReport> {
        let mut state = self.state.lock();
        self.pass_locked(&mut state)
    }

    /// Runs a pass unless another pass or revert currently holds the lock.
    pub fn try_run_pass(&self) -> Result<PassOutcome> {
        match self.state.try_lock() {
            Some(mut state) => self.pass_locked(&mut state).map(PassOutcome::Completed),
            None => {
                tracing::debug!("pass skipped, organizer busy");
                Ok(PassOutcome::Busy)
            }
        }
    }

    fn pass_locked(&self, state: &mut State) -> Result<PassReport> {
        let State { rules, ledger } = state;
        sorter::run_pass(&self.settings, rules, self.notifier.as_ref(), ledger)
    }

    /// What a pass would do right now, without moving anything.
    pub fn plan(&self) -> Result<Vec<PlannedMove>> {
        let state = self.state.lock();
        sorter::plan(&self.settings, &state.rules)
    }

    /// Reverts every move of history entry `index` (0 = newest).
    pub fn revert_operation(&self, index: usize) -> Result<RevertReport> {
        let mut state = self.state.lock();
        Ok(UndoManager::revert_operation(&mut state.ledger, index)?)
    }

    /// Reverts the moves of entry `index` that went into `category`.
    pub fn revert_category(&self, index: usize, category: &str) -> Result<RevertReport> {
        let mut state = self.state.lock();
        Ok(UndoManager::revert_category(
            &mut state.ledger,
            index,
            category,
        )?)
    }

    /// Reverts one recorded move of entry `index`.
    pub fn revert_single(
        &self,
        index: usize,
        source: &Path,
        destination: &Path,
    ) -> Result<RevertReport> {
        let mut state = self.state.lock();
        Ok(UndoManager::revert_single(
            &mut state.ledger,
            index,
            source,
            destination,
        )?)
    }

    /// Snapshot of the history, newest first.
    pub fn history(&self) -> Vec<OperationEntry> {
        self.state.lock().ledger.entries().to_vec()
    }

    /// Moves of entry `index` grouped by destination category.
    pub fn categories(&self, index: usize) -> Result<Vec<CategoryGroup>> {
        let state = self.state.lock();
        Ok(state.ledger.entry(index)?.categories())
    }

    pub fn rules(&self) -> Vec<Rule> {
        self.state.lock().rules.clone()
    }

    /// Swaps the rule set. Takes effect from the next pass.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ConfigError::Invalid`] if any rule has an empty
    /// pattern or a category that is not a single plain name; the current
    /// rules are then kept.
    pub fn replace_rules(&self, rules: Vec<Rule>) -> Result<()> {
        for rule in &rules {
            validate_rule(rule)?;
        }
        self.state.lock().rules = rules;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn config(root: &Path) -> Config {
        let watched = root.join("watched");
        fs::create_dir_all(&watched).unwrap();
        let text = format!(
            r#"
            watched_dir = '{}'
            managed_root = '{}'

            [[rules]]
            kind = "extension"
            pattern = ".txt"
            category = "Documents"
            "#,
            watched.display(),
            root.join("managed").display()
        );
        Config::from_toml(&text).unwrap()
    }

    #[test]
    fn test_try_run_pass_reports_busy_while_locked() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let organizer = Organizer::from_config(&config(temp_dir.path())).unwrap();

        let guard = organizer.state.lock();
        assert!(matches!(organizer.try_run_pass(), Ok(PassOutcome::Busy)));
        drop(guard);

        assert!(matches!(
            organizer.try_run_pass(),
            Ok(PassOutcome::Completed(_))
        ));
    }

    #[test]
    fn test_concurrent_passes_move_each_item_once() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cfg = config(temp_dir.path());
        for i in 0..20 {
            fs::write(cfg.watched_dir.join(format!("f{i}.txt")), "x").unwrap();
        }
        let organizer = Arc::new(Organizer::from_config(&cfg).unwrap());

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let organizer = Arc::clone(&organizer);
                std::thread::spawn(move || organizer.run_pass().map(|r| r.moved()))
            })
            .collect();
        let total: usize = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .sum();

        assert_eq!(total, 20);
        assert_eq!(organizer.history().len(), 1);
    }

    #[test]
    fn test_replace_rules_applies_to_next_pass() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cfg = config(temp_dir.path());
        fs::write(cfg.watched_dir.join("a.txt"), "a").unwrap();
        let organizer = Organizer::from_config(&cfg).unwrap();

        organizer
            .replace_rules(vec![Rule::extension("txt", "Text")])
            .unwrap();
        let report = organizer.run_pass().unwrap();

        assert_eq!(
            report.moves[0].destination,
            temp_dir.path().join("managed").join("Text").join("a.txt")
        );
        assert_eq!(organizer.rules().len(), 1);
    }

    #[test]
    fn test_replace_rules_rejects_escaping_category() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cfg = config(temp_dir.path());
        fs::write(cfg.watched_dir.join("a.txt"), "a").unwrap();
        let organizer = Organizer::from_config(&cfg).unwrap();

        for category in ["..", "a/b", ""] {
            let result = organizer.replace_rules(vec![Rule::extension(".txt", category)]);
            assert!(
                matches!(result, Err(crate::Error::Config(_))),
                "category {category:?} should be rejected"
            );
        }
        assert_eq!(organizer.rules()[0].category, "Documents");

        let report = organizer.run_pass().unwrap();
        assert_eq!(
            report.moves[0].destination,
            temp_dir.path().join("managed").join("Documents").join("a.txt")
        );
        assert!(!temp_dir.path().join("a.txt").exists());
    }

    #[test]
    fn test_corrupt_history_fails_open() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cfg = config(temp_dir.path());
        fs::create_dir_all(cfg.managed_root()).unwrap();
        fs::write(cfg.history_path(), "garbage").unwrap();

        assert!(Organizer::from_config(&cfg).is_err());
    }
}
