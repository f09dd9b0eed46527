//! Classification rules and the rule matcher.
//!
//! A rule maps either a file extension or a folder name to a destination
//! category. Matching is a pure function over the rule list: the first rule
//! that applies wins.
//!
//! # Examples
//!
//! ```
//! use sortdesk::rules::{FolderMatch, ItemKind, Rule, match_item};
//!
//! let rules = vec![
//!     Rule::extension(".pdf", "Documents"),
//!     Rule::folder("projects", "Work"),
//! ];
//! assert_eq!(
//!     match_item("report.PDF", ItemKind::File, &rules, FolderMatch::Exact),
//!     Some("Documents")
//! );
//! assert_eq!(
//!     match_item("Projects", ItemKind::Directory, &rules, FolderMatch::Exact),
//!     Some("Work")
//! );
//! assert_eq!(match_item("photo.png", ItemKind::File, &rules, FolderMatch::Exact), None);
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a rule looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Matches files by extension.
    Extension,
    /// Matches directories by name.
    #[serde(alias = "folder_name")]
    Folder,
}

impl RuleKind {
    /// Parses a user-supplied kind name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "extension" | "ext" => Some(Self::Extension),
            "folder" | "folder_name" | "dir" => Some(Self::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleKind::Extension => write!(f, "extension"),
            RuleKind::Folder => write!(f, "folder"),
        }
    }
}

/// How folder rules compare their pattern with a directory name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderMatch {
    /// Whole name, case-insensitive.
    #[default]
    Exact,
    /// Pattern anywhere in the name, case-insensitive.
    Contains,
}

/// Whether a watched item is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    File,
    Directory,
}

/// A single classification rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub kind: RuleKind,
    /// Extension (with or without the leading dot) or folder name.
    pub pattern: String,
    /// Name of the destination sub-directory under the managed root.
    pub category: String,
}

impl Rule {
    /// Creates an extension rule.
    pub fn extension(pattern: &str, category: &str) -> Self {
        Self {
            kind: RuleKind::Extension,
            pattern: pattern.to_string(),
            category: category.to_string(),
        }
    }

    /// Creates a folder-name rule.
    pub fn folder(pattern: &str, category: &str) -> Self {
        Self {
            kind: RuleKind::Folder,
            pattern: pattern.to_string(),
            category: category.to_string(),
        }
    }

    /// Returns true if this rule applies to the given item.
    pub fn matches(&self, name: &str, kind: ItemKind, folder_match: FolderMatch) -> bool {
        match (self.kind, kind) {
            (RuleKind::Extension, ItemKind::File) => match extension_of(name) {
                Some(ext) => ext.eq_ignore_ascii_case(strip_dot(&self.pattern)),
                None => false,
            },
            (RuleKind::Folder, ItemKind::Directory) => {
                let name = name.to_lowercase();
                let pattern = self.pattern.to_lowercase();
                match folder_match {
                    FolderMatch::Exact => name == pattern,
                    FolderMatch::Contains => name.contains(&pattern),
                }
            }
            _ => false,
        }
    }

    /// True if `pattern` names this rule, ignoring case and a leading dot.
    pub fn has_pattern(&self, pattern: &str) -> bool {
        strip_dot(&self.pattern).eq_ignore_ascii_case(strip_dot(pattern))
    }
}

/// Returns the category of the first rule matching the item, if any.
///
/// Pure: no I/O and no hidden state, so the same inputs always give the
/// same answer.
pub fn match_item<'r>(
    name: &str,
    kind: ItemKind,
    rules: &'r [Rule],
    folder_match: FolderMatch,
) -> Option<&'r str> {
    rules
        .iter()
        .find(|rule| rule.matches(name, kind, folder_match))
        .map(|rule| rule.category.as_str())
}

/// Extension of a file name without the dot. Dotfiles have none.
fn extension_of(name: &str) -> Option<&str> {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
}

fn strip_dot(pattern: &str) -> &str {
    pattern.strip_prefix('.').unwrap_or(pattern)
}

/// The stock rule set used when the configuration does not list any.
pub fn default_rules() -> Vec<Rule> {
    [
        (".txt", "Documents"),
        (".pdf", "Documents"),
        (".doc", "Documents"),
        (".docx", "Documents"),
        (".jpg", "Images"),
        (".jpeg", "Images"),
        (".png", "Images"),
        (".mp3", "Music"),
        (".wav", "Music"),
        (".mp4", "Videos"),
        (".avi", "Videos"),
        (".zip", "Archives"),
        (".rar", "Archives"),
        (".7z", "Archives"),
    ]
    .iter()
    .map(|(ext, category)| Rule::extension(ext, category))
    .collect()
}
