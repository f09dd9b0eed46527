//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status
//! lines, the rule table, the history tree and revert summaries.

use colored::*;
use std::path::Path;

use crate::ledger::OperationEntry;
use crate::rules::Rule;
use crate::sorter::{PassReport, PlannedMove};
use crate::undo::RevertReport;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a dry-run notice message.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Prints the outcome of a sort pass.
    pub fn pass_report(report: &PassReport) {
        for record in &report.moves {
            let category = record.category().unwrap_or_default();
            Self::success(&format!("{} → {}/", file_name(&record.source), category));
        }
        for (item, err) in &report.failures {
            Self::error(&format!("{}: {}", file_name(item), err));
        }
        match (report.moved(), report.failures.len()) {
            (0, 0) => Self::info("Nothing to sort."),
            (moved, 0) => Self::info(&format!("Moved {} {}.", moved, items_word(moved))),
            (moved, failed) => Self::warning(&format!(
                "Moved {} {}, {} could not be moved.",
                moved,
                items_word(moved),
                failed
            )),
        }
    }

    /// Prints what a pass would do.
    pub fn plan(planned: &[PlannedMove]) {
        if planned.is_empty() {
            Self::dry_run_notice("Nothing to sort.");
            return;
        }
        for step in planned {
            let source = if step.matched { "rule" } else { "fallback" };
            println!(
                " - {} → {}/ {}",
                file_name(&step.item),
                step.category,
                format!("({})", source).dimmed()
            );
        }
        Self::dry_run_notice(&format!(
            "{} {} would be moved. No files were modified.",
            planned.len(),
            items_word(planned.len())
        ));
    }

    /// Prints the rule list, numbered from 1.
    pub fn rules(rules: &[Rule]) {
        if rules.is_empty() {
            Self::info("No sorting rules configured.");
            return;
        }
        Self::header("RULES");
        let width = rules.iter().map(|r| r.pattern.len()).max().unwrap_or(0).max(7);
        for (i, rule) in rules.iter().enumerate() {
            println!(
                "{:>3}. {:<9} {:<width$} → {}",
                i + 1,
                rule.kind.to_string(),
                rule.pattern,
                rule.category.green(),
                width = width
            );
        }
    }

    /// Prints the history as entry → category → item, newest first,
    /// numbered from 1.
    pub fn history(entries: &[OperationEntry]) {
        if entries.is_empty() {
            Self::info("History is empty.");
            return;
        }
        for (i, entry) in entries.iter().enumerate() {
            println!(
                "{} {}  {}",
                format!("#{}", i + 1).bold(),
                entry.timestamp,
                format!("({} {})", entry.moves.len(), items_word(entry.moves.len())).dimmed()
            );
            for group in entry.categories() {
                println!("  {} {}", "▸".cyan(), group.name.cyan());
                for record in &group.moves {
                    println!(
                        "      {}  {}",
                        file_name(&record.destination),
                        format!("← {}", record.source.display()).dimmed()
                    );
                }
            }
        }
    }

    /// Prints the outcome of a revert.
    pub fn revert_report(report: &RevertReport) {
        for record in &report.restored {
            Self::success(&format!("restored {}", record.source.display()));
        }
        for (_, err) in &report.skipped {
            Self::warning(&format!("skipped: {}", err));
        }
        for (_, err) in &report.failed {
            Self::error(&format!("failed: {}", err));
        }

        if report.total_processed() == 0 {
            Self::info("Nothing to revert.");
        } else if report.is_complete_success() {
            Self::info(&format!(
                "Reverted {} {}.",
                report.restored.len(),
                items_word(report.restored.len())
            ));
        } else {
            Self::warning(&format!(
                "Reverted {} of {}; the rest stay in history.",
                report.restored.len(),
                report.total_processed()
            ));
        }
        if report.entry_removed {
            Self::info("History entry fully reverted and removed.");
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn items_word(count: usize) -> &'static str {
    if count == 1 { "item" } else { "items" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_word() {
        assert_eq!(items_word(1), "item");
        assert_eq!(items_word(0), "items");
        assert_eq!(items_word(3), "items");
    }

    #[test]
    fn test_file_name_falls_back_to_path() {
        assert_eq!(file_name(Path::new("/a/b.txt")), "b.txt");
        assert_eq!(file_name(Path::new("/")), "/");
    }
}
