//! Command-line interface for sortdesk.
//!
//! This module handles all CLI-related functionality:
//! - Command parsing (clap derive)
//! - Sorting on demand and in the background
//! - Browsing and reverting history
//! - Editing rules and settings in the configuration file

use clap::{Parser, Subcommand};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, ConfigError, FallbackPolicy};
use crate::error::{Error, Result};
use crate::monitor::Monitor;
use crate::organizer::Organizer;
use crate::output::OutputFormatter;
use crate::rules::{Rule, RuleKind};

#[derive(Parser, Debug)]
#[command(name = "sortdesk")]
#[command(about = "Keeps a directory tidy by sorting its items into category folders", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file to use instead of the default lookup
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sort the watched directory now
    Sort {
        /// Show what would be moved without touching anything
        #[arg(long)]
        dry_run: bool,
    },

    /// Sort every poll interval until Enter is pressed
    Watch,

    /// Show the history, newest first
    #[command(alias = "log")]
    History,

    /// Move items of a history entry back where they came from
    #[command(alias = "undo")]
    Revert {
        /// Entry number as shown by `history` (1 = newest)
        entry: usize,

        /// Only revert the items sorted into this category
        #[arg(long, conflicts_with = "item")]
        category: Option<String>,

        /// Only revert this item (original path or file name)
        #[arg(long)]
        item: Option<String>,
    },

    /// Manage sorting rules
    #[command(subcommand)]
    Rules(RulesCommand),

    /// Set the seconds between scheduled passes
    SetInterval { seconds: u64 },

    /// Set where unmatched items go: "others" or "per_item"
    SetFallback { mode: String },

    /// Set the log level (error, warn, info, debug, trace)
    SetLogLevel { level: String },
}

#[derive(Subcommand, Debug)]
pub enum RulesCommand {
    /// List rules in match order
    #[command(alias = "ls")]
    List,

    /// Append a rule
    Add {
        /// "extension" or "folder"
        kind: String,
        /// Extension (e.g. ".pdf") or folder name
        pattern: String,
        /// Destination category
        category: String,
    },

    /// Remove every rule with this pattern
    #[command(alias = "rm")]
    Remove { pattern: String },
}

/// Runs one command against `config`, which was loaded from `config_path`.
///
/// Setting commands write the updated configuration back to `config_path`.
pub fn run(command: Commands, mut config: Config, config_path: &Path) -> Result<()> {
    match command {
        Commands::Sort { dry_run } => sort(&config, dry_run),
        Commands::Watch => watch(&config),
        Commands::History => {
            let organizer = Organizer::from_config(&config)?;
            OutputFormatter::history(&organizer.history());
            Ok(())
        }
        Commands::Revert {
            entry,
            category,
            item,
        } => revert(&config, entry, category.as_deref(), item.as_deref()),
        Commands::Rules(RulesCommand::List) => {
            OutputFormatter::rules(&config.rules);
            Ok(())
        }
        Commands::Rules(RulesCommand::Add {
            kind,
            pattern,
            category,
        }) => {
            let kind = RuleKind::parse(&kind).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown rule kind '{kind}', expected 'extension' or 'folder'"
                ))
            })?;
            let rule = Rule {
                kind,
                pattern,
                category,
            };
            let summary = format!("{} {} → {}", rule.kind, rule.pattern, rule.category);
            config.add_rule(rule)?;
            config.save(config_path)?;
            OutputFormatter::success(&format!("Added rule {summary}"));
            Ok(())
        }
        Commands::Rules(RulesCommand::Remove { pattern }) => {
            let removed = config.remove_rule(&pattern);
            if removed == 0 {
                OutputFormatter::warning(&format!("No rule with pattern '{pattern}'"));
                return Ok(());
            }
            config.save(config_path)?;
            OutputFormatter::success(&format!("Removed {removed} rule(s) for '{pattern}'"));
            Ok(())
        }
        Commands::SetInterval { seconds } => {
            config.set_poll_interval(seconds)?;
            config.save(config_path)?;
            OutputFormatter::success(&format!("Poll interval set to {seconds}s"));
            Ok(())
        }
        Commands::SetFallback { mode } => {
            config.fallback = FallbackPolicy::parse(&mode).ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "unknown fallback '{mode}', expected 'others' or 'per_item'"
                ))
            })?;
            config.save(config_path)?;
            OutputFormatter::success(&format!("Fallback set to {}", config.fallback));
            Ok(())
        }
        Commands::SetLogLevel { level } => {
            config.set_log_level(&level)?;
            config.save(config_path)?;
            OutputFormatter::success(&format!("Log level set to {}", config.log_level));
            Ok(())
        }
    }
}

fn sort(config: &Config, dry_run: bool) -> Result<()> {
    let organizer = Organizer::from_config(config)?;
    OutputFormatter::info(&format!(
        "Sorting {} into {}",
        organizer.settings().watched_dir.display(),
        organizer.settings().managed_root.display()
    ));

    if dry_run {
        OutputFormatter::plan(&organizer.plan()?);
        return Ok(());
    }

    let report = organizer.run_pass()?;
    OutputFormatter::pass_report(&report);
    if report.moved() > 0 {
        OutputFormatter::info("Use 'sortdesk revert 1' to undo this pass.");
    }
    Ok(())
}

fn watch(config: &Config) -> Result<()> {
    let organizer = Arc::new(Organizer::from_config(config)?);
    let interval = Duration::from_secs(config.poll_interval_secs);
    let handle = Monitor::start(Arc::clone(&organizer), interval).map_err(Error::Monitor)?;

    OutputFormatter::info(&format!(
        "Watching {} every {}s. Press Enter to stop.",
        organizer.settings().watched_dir.display(),
        config.poll_interval_secs
    ));
    if !wait_for_enter(&mut std::io::stdin().lock()) {
        // No terminal to stop from: keep sorting until the process is
        // terminated.
        tracing::info!("stdin is not interactive, watching until terminated");
        loop {
            std::thread::park();
        }
    }

    handle.stop();
    OutputFormatter::success("Stopped watching.");
    Ok(())
}

/// Blocks until a line is read. Returns false when `input` is at EOF or
/// unreadable, so no stop request can ever arrive from it.
fn wait_for_enter(input: &mut impl BufRead) -> bool {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => false,
        Ok(_) => true,
        Err(e) => {
            tracing::warn!(error = %e, "cannot read stdin");
            false
        }
    }
}

fn revert(config: &Config, entry: usize, category: Option<&str>, item: Option<&str>) -> Result<()> {
    let organizer = Organizer::from_config(config)?;
    let index = entry_index(entry, organizer.history().len())?;

    let report = match (category, item) {
        (Some(category), _) => organizer.revert_category(index, category)?,
        (None, Some(item)) => {
            let record = organizer
                .history()
                .get(index)
                .and_then(|e| {
                    e.moves
                        .iter()
                        .find(|record| record_matches(&record.source, item))
                        .cloned()
                })
                .ok_or_else(|| {
                    Error::InvalidArgument(format!("entry #{entry} has no item '{item}'"))
                })?;
            organizer.revert_single(index, &record.source, &record.destination)?
        }
        (None, None) => organizer.revert_operation(index)?,
    };

    OutputFormatter::revert_report(&report);
    Ok(())
}

/// Converts a 1-based entry number into a ledger index.
fn entry_index(entry: usize, len: usize) -> Result<usize> {
    match entry.checked_sub(1) {
        Some(index) if index < len => Ok(index),
        _ if len == 0 => Err(Error::InvalidArgument("history is empty".to_string())),
        _ => Err(Error::InvalidArgument(format!(
            "no history entry #{entry}, expected 1 to {len}"
        ))),
    }
}

/// An item argument matches a recorded source by full path or file name.
fn record_matches(source: &Path, item: &str) -> bool {
    source == Path::new(item)
        || source
            .file_name()
            .is_some_and(|name| name.to_string_lossy() == item)
}
