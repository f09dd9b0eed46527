//! Sort pass: scan the watched directory, classify each item, move it and
//! commit the batch to the history ledger.
//!
//! These functions assume the caller holds the organizer lock; use
//! [`crate::Organizer`] rather than calling them directly from several
//! threads.

use std::fs;
use std::path::PathBuf;

use crate::config::{FallbackPolicy, ItemFilter};
use crate::error::{Error, Result};
use crate::ledger::{Ledger, MoveRecord};
use crate::mover::{MoveError, MoveExecutor, fallback_category};
use crate::notify::Notifier;
use crate::rules::{FolderMatch, ItemKind, Rule, match_item};

/// Resolved settings a pass runs with.
#[derive(Debug, Clone)]
pub struct SortSettings {
    pub watched_dir: PathBuf,
    pub managed_root: PathBuf,
    pub history_file: PathBuf,
    pub fallback: FallbackPolicy,
    pub folder_match: FolderMatch,
    pub filter: ItemFilter,
}

/// An entry of the watched directory that is a candidate for sorting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanItem {
    pub name: String,
    pub path: PathBuf,
    pub kind: ItemKind,
}

/// What a pass would do with one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedMove {
    pub item: PathBuf,
    pub category: String,
    /// False when the category comes from the fallback policy.
    pub matched: bool,
}

/// Outcome of one completed pass.
#[derive(Debug, Default)]
pub struct PassReport {
    /// Moves committed to the ledger as one entry.
    pub moves: Vec<MoveRecord>,
    /// Items that could not be moved; the pass carried on without them.
    pub failures: Vec<(PathBuf, MoveError)>,
}

impl PassReport {
    /// Number of items moved.
    pub fn moved(&self) -> usize {
        self.moves.len()
    }
}

/// Shortcut files and office/editor lock files.
pub fn is_reserved_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.ends_with(".lnk")
        || lower.ends_with(".url")
        || lower.starts_with("~$")
        || lower.starts_with(".~lock.")
}

/// Lists the watched directory, sorted by name, without reserved artifacts,
/// ignored names, symlinks, or the managed root and history file themselves.
pub fn scan(settings: &SortSettings) -> Result<Vec<ScanItem>> {
    let watched = &settings.watched_dir;
    let scan_err = |source| Error::Scan {
        path: watched.clone(),
        source,
    };

    let canonical_watched = fs::canonicalize(watched).map_err(scan_err)?;
    let own_paths: Vec<PathBuf> = [&settings.managed_root, &settings.history_file]
        .into_iter()
        .map(|p| fs::canonicalize(p).unwrap_or_else(|_| p.clone()))
        .collect();

    let mut items = Vec::new();
    for entry in fs::read_dir(watched).map_err(scan_err)? {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                continue;
            }
        };
        let name = entry.file_name().to_string_lossy().into_owned();

        let file_type = match entry.file_type() {
            Ok(t) => t,
            Err(_) => continue,
        };
        if file_type.is_symlink() || is_reserved_name(&name) {
            continue;
        }
        let path = entry.path();
        if own_paths.contains(&canonical_watched.join(&name)) || own_paths.contains(&path) {
            continue;
        }
        if !settings.filter.should_include(&name) {
            tracing::trace!(item = %name, "ignored by filter");
            continue;
        }

        let kind = if file_type.is_dir() {
            ItemKind::Directory
        } else {
            ItemKind::File
        };
        items.push(ScanItem { name, path, kind });
    }

    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(items)
}

/// Computes the destination category of every candidate without moving.
pub fn plan(settings: &SortSettings, rules: &[Rule]) -> Result<Vec<PlannedMove>> {
    Ok(scan(settings)?
        .into_iter()
        .map(|item| {
            let matched = match_item(&item.name, item.kind, rules, settings.folder_match);
            let category = match matched {
                Some(category) => category.to_string(),
                None => fallback_category(
                    settings.fallback,
                    &item.name,
                    item.kind == ItemKind::Directory,
                ),
            };
            PlannedMove {
                item: item.path,
                category,
                matched: matched.is_some(),
            }
        })
        .collect())
}

/// Runs one full pass and commits its moves to `ledger` as one entry.
///
/// A failed move is logged and recorded in the report; the pass continues.
///
/// # Errors
///
/// Returns [`Error::Scan`] if the watched directory cannot be listed and
/// [`Error::Ledger`] if the new entry cannot be persisted.
pub fn run_pass(
    settings: &SortSettings,
    rules: &[Rule],
    notifier: &dyn Notifier,
    ledger: &mut Ledger,
) -> Result<PassReport> {
    let items = scan(settings)?;
    tracing::debug!(candidates = items.len(), dir = %settings.watched_dir.display(), "pass started");

    let mut executor = MoveExecutor::new(&settings.managed_root, settings.fallback, notifier);
    let mut report = PassReport::default();

    for item in items {
        let matched = match_item(&item.name, item.kind, rules, settings.folder_match);
        match executor.execute(&item.path, matched) {
            Ok(record) => report.moves.push(record),
            Err(e) => {
                tracing::warn!(item = %item.path.display(), error = %e, "could not move item");
                report.failures.push((item.path, e));
            }
        }
    }

    if report.moves.is_empty() {
        tracing::info!("nothing to sort");
    } else {
        ledger.record(report.moves.clone())?;
        tracing::info!(moved = report.moved(), failed = report.failures.len(), "pass finished");
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IgnoreRules;
    use crate::notify::NoopNotifier;
    use std::path::Path;
    use tempfile::TempDir;

    fn settings(root: &Path, fallback: FallbackPolicy) -> SortSettings {
        let watched = root.join("watched");
        fs::create_dir_all(&watched).unwrap();
        let managed = watched.join("Organized");
        SortSettings {
            history_file: managed.join(".history.json"),
            watched_dir: watched,
            managed_root: managed,
            fallback,
            folder_match: FolderMatch::Exact,
            filter: IgnoreRules::default().compile().unwrap(),
        }
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved_name("Documents.lnk"));
        assert!(is_reserved_name("site.URL"));
        assert!(is_reserved_name("~$report.docx"));
        assert!(is_reserved_name(".~lock.sheet.ods#"));
        assert!(!is_reserved_name("report.docx"));
    }

    #[test]
    fn test_scan_skips_reserved_and_own_paths() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let s = settings(temp_dir.path(), FallbackPolicy::Others);
        fs::create_dir_all(&s.managed_root).unwrap();
        for name in ["b.txt", "a.txt", "Docs.lnk", "~$a.docx", ".hidden", "desktop.ini"] {
            fs::write(s.watched_dir.join(name), "x").unwrap();
        }
        fs::create_dir(s.watched_dir.join("folder")).unwrap();

        let items = scan(&s).unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "folder"]);
        assert_eq!(items[2].kind, ItemKind::Directory);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_skips_symlinks() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let s = settings(temp_dir.path(), FallbackPolicy::Others);
        std::os::unix::fs::symlink(temp_dir.path(), s.watched_dir.join("link")).unwrap();
        assert!(scan(&s).unwrap().is_empty());
    }

    #[test]
    fn test_scan_missing_directory() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut s = settings(temp_dir.path(), FallbackPolicy::Others);
        s.watched_dir = temp_dir.path().join("gone");
        assert!(matches!(scan(&s), Err(Error::Scan { .. })));
    }

    #[test]
    fn test_plan_does_not_move() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let s = settings(temp_dir.path(), FallbackPolicy::PerItem);
        fs::write(s.watched_dir.join("a.txt"), "a").unwrap();
        fs::write(s.watched_dir.join("b.png"), "b").unwrap();

        let rules = vec![Rule::extension(".txt", "Documents")];
        let planned = plan(&s, &rules).unwrap();

        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].category, "Documents");
        assert!(planned[0].matched);
        assert_eq!(planned[1].category, "b");
        assert!(!planned[1].matched);
        assert!(s.watched_dir.join("a.txt").exists());
        assert!(!s.managed_root.exists());
    }

    #[test]
    fn test_run_pass_continues_after_failure() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let s = settings(temp_dir.path(), FallbackPolicy::Others);
        fs::write(s.watched_dir.join("a.txt"), "a").unwrap();
        fs::write(s.watched_dir.join("b.txt"), "b").unwrap();
        let docs = s.managed_root.join("Documents");
        fs::create_dir_all(&docs).unwrap();
        fs::write(docs.join("a.txt"), "older").unwrap();

        let mut ledger = Ledger::load(&s.history_file).unwrap();
        let rules = vec![Rule::extension(".txt", "Documents")];
        let report = run_pass(&s, &rules, &NoopNotifier, &mut ledger).unwrap();

        assert_eq!(report.moved(), 1);
        assert_eq!(report.failures.len(), 1);
        assert!(matches!(report.failures[0].1, MoveError::DestinationExists(_)));
        assert!(s.watched_dir.join("a.txt").exists());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entry(0).unwrap().moves.len(), 1);
    }

    #[test]
    fn test_run_pass_without_moves_adds_no_entry() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let s = settings(temp_dir.path(), FallbackPolicy::Others);
        let mut ledger = Ledger::load(&s.history_file).unwrap();

        let report = run_pass(&s, &[], &NoopNotifier, &mut ledger).unwrap();
        assert_eq!(report.moved(), 0);
        assert!(ledger.is_empty());
        assert!(!s.history_file.exists());
    }
}
