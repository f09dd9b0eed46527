//! Configuration: directories, rules, fallback policy and ignore filters.
//!
//! Configuration lives in a TOML file. Every key is optional; omitted keys
//! fall back to the defaults documented on [`Config`].
//!
//! # Configuration File Format
//!
//! ```toml
//! watched_dir = "/home/me/Desktop"
//! managed_root = "/home/me/Desktop/Organized"
//! fallback = "others"          # or "per_item"
//! folder_match = "exact"       # or "contains"
//! poll_interval_secs = 300
//! create_links = false
//! log_level = "info"
//!
//! [[rules]]
//! kind = "extension"
//! pattern = ".pdf"
//! category = "Documents"
//!
//! [ignore]
//! enable_hidden_files = false
//! filenames = ["desktop.ini", "Thumbs.db"]
//! extensions = ["tmp"]
//! patterns = ["*.part"]
//! regex = []
//! include = []
//! ```

use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::rules::{FolderMatch, Rule, default_rules};

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_NAME: &str = ".sortdeskrc.toml";

/// Name of the history file created under the managed root by default.
pub const HISTORY_FILE_NAME: &str = ".sortdesk_history.json";

/// Errors that can occur while loading, validating or saving configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file not found at an explicitly requested path.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Invalid glob pattern in the ignore rules.
    #[error("invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),
    /// Invalid regex pattern in the ignore rules.
    #[error("invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern {
        /// The regex pattern that failed to compile.
        pattern: String,
        /// The reason why the pattern is invalid.
        reason: String,
    },
    /// IO error while reading or writing the configuration file.
    #[error("cannot access configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happens to items that no rule matches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Everything unmatched goes to a shared `Others` category.
    #[default]
    #[serde(alias = "Others")]
    Others,
    /// Each unmatched item gets a category of its own, named after it.
    #[serde(alias = "per_folder")]
    PerItem,
}

impl FallbackPolicy {
    /// Parses a user-supplied policy name.
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "others" => Some(Self::Others),
            "per_item" | "per-item" | "per_folder" => Some(Self::PerItem),
            _ => None,
        }
    }
}

impl fmt::Display for FallbackPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackPolicy::Others => write!(f, "others"),
            FallbackPolicy::PerItem => write!(f, "per_item"),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned on every pass. Defaults to `$HOME/Desktop`.
    #[serde(default = "default_watched_dir")]
    pub watched_dir: PathBuf,

    /// Root under which categories are created. Defaults to
    /// `<watched_dir>/Organized`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub managed_root: Option<PathBuf>,

    /// History ledger location. Defaults to
    /// `<managed_root>/.sortdesk_history.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_file: Option<PathBuf>,

    #[serde(default)]
    pub fallback: FallbackPolicy,

    #[serde(default)]
    pub folder_match: FolderMatch,

    /// Seconds between scheduled passes.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Whether to create a link to each destination category in the
    /// watched directory.
    #[serde(default)]
    pub create_links: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Append log output to this file instead of stderr.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    /// Ordered classification rules; the first match wins.
    #[serde(default = "default_rules")]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub ignore: IgnoreRules,
}

fn default_watched_dir() -> PathBuf {
    home_dir()
        .map(|home| home.join("Desktop"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_poll_interval() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}

/// Names that are never worth sorting.
fn default_ignored_filenames() -> Vec<String> {
    vec![
        "desktop.ini".to_string(),
        "Thumbs.db".to_string(),
        ".DS_Store".to_string(),
    ]
}

/// Rules for skipping items in the watched directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IgnoreRules {
    /// Whether hidden items (starting with ".") are sorted. Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Exact names to skip.
    #[serde(default = "default_ignored_filenames")]
    pub filenames: Vec<String>,

    /// Extensions to skip, without the dot.
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Glob patterns to skip.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Regex patterns to skip.
    #[serde(default)]
    pub regex: Vec<String>,

    /// Glob patterns that override every skip rule above.
    #[serde(default)]
    pub include: Vec<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            filenames: default_ignored_filenames(),
            extensions: Vec::new(),
            patterns: Vec::new(),
            regex: Vec::new(),
            include: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watched_dir: default_watched_dir(),
            managed_root: None,
            history_file: None,
            fallback: FallbackPolicy::default(),
            folder_match: FolderMatch::default(),
            poll_interval_secs: default_poll_interval(),
            create_links: false,
            log_level: default_log_level(),
            log_file: None,
            rules: default_rules(),
            ignore: IgnoreRules::default(),
        }
    }
}

impl Config {
    /// Resolves which configuration file to use.
    ///
    /// Lookup order:
    /// 1. `explicit`, if provided
    /// 2. `.sortdeskrc.toml` in the current directory, if it exists
    /// 3. `~/.config/sortdesk/config.toml` (also the path new settings are
    ///    written to when nothing exists yet)
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_NAME);
        if local_config.exists() {
            return local_config;
        }

        match home_dir() {
            Some(home) => home.join(".config").join("sortdesk").join("config.toml"),
            None => local_config,
        }
    }

    /// Loads configuration from `path`, falling back to defaults when the
    /// file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file exists but cannot be read, and
    /// `ConfigError::Invalid` (or a pattern error) if it does not parse or
    /// validate. A broken file is never replaced by defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Loads configuration from a file that must exist.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if file does not exist.
    /// Returns `ConfigError::Invalid` if TOML parsing or validation fails.
    /// Returns `ConfigError::Io` if file cannot be read.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_toml(&content)?;
        tracing::debug!(path = %path.display(), rules = config.rules.len(), "configuration loaded");
        Ok(config)
    }

    /// Parses and validates configuration text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, content).map_err(io_err)?;
        tracing::info!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Checks the settings that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        for rule in &self.rules {
            validate_rule(rule)?;
        }
        self.ignore.compile().map(|_| ())
    }

    /// Root directory categories are created under.
    pub fn managed_root(&self) -> PathBuf {
        self.managed_root
            .clone()
            .unwrap_or_else(|| self.watched_dir.join("Organized"))
    }

    /// Location of the history ledger.
    pub fn history_path(&self) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(|| self.managed_root().join(HISTORY_FILE_NAME))
    }

    /// Appends a rule after validating it.
    pub fn add_rule(&mut self, rule: Rule) -> Result<(), ConfigError> {
        validate_rule(&rule)?;
        self.rules.push(rule);
        Ok(())
    }

    /// Removes every rule with the given pattern. Returns how many were removed.
    pub fn remove_rule(&mut self, pattern: &str) -> usize {
        let before = self.rules.len();
        self.rules.retain(|rule| !rule.has_pattern(pattern));
        before - self.rules.len()
    }

    /// Sets the interval between scheduled passes.
    pub fn set_poll_interval(&mut self, seconds: u64) -> Result<(), ConfigError> {
        if seconds == 0 {
            return Err(ConfigError::Invalid(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        self.poll_interval_secs = seconds;
        Ok(())
    }

    /// Sets the log level, checking that the tracing filter understands it.
    pub fn set_log_level(&mut self, level: &str) -> Result<(), ConfigError> {
        let level = level.to_ascii_lowercase();
        level
            .parse::<tracing::Level>()
            .map_err(|_| ConfigError::Invalid(format!("unknown log level '{level}'")))?;
        self.log_level = level;
        Ok(())
    }
}

/// A category must be a single plain path component so moves stay inside
/// the managed root.
pub(crate) fn validate_rule(rule: &Rule) -> Result<(), ConfigError> {
    if rule.pattern.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "rule for category '{}' has an empty pattern",
            rule.category
        )));
    }
    if !is_plain_component(&rule.category) {
        return Err(ConfigError::Invalid(format!(
            "rule '{}' has an invalid category '{}'",
            rule.pattern, rule.category
        )));
    }
    Ok(())
}

pub(crate) fn is_plain_component(name: &str) -> bool {
    if name.trim().is_empty() {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

impl IgnoreRules {
    /// Compile the rules into an [`ItemFilter`].
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob patterns are invalid.
    pub fn compile(&self) -> Result<ItemFilter, ConfigError> {
        ItemFilter::new(self)
    }
}

/// Compiled ignore rules, ready for matching names in the watched directory.
#[derive(Debug, Clone)]
pub struct ItemFilter {
    enable_hidden_files: bool,
    filenames: HashSet<String>,
    extensions: HashSet<String>,
    patterns: Vec<Pattern>,
    regexes: Vec<Regex>,
    include: Vec<Pattern>,
}

impl ItemFilter {
    fn new(rules: &IgnoreRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let regexes = rules
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            filenames: rules.filenames.iter().map(|n| n.to_lowercase()).collect(),
            extensions: rules
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            patterns: compile_globs(&rules.patterns)?,
            regexes,
            include: compile_globs(&rules.include)?,
        })
    }

    /// Check if an item with this name should be sorted.
    ///
    /// Checks are performed in this order, with early termination:
    /// 1. Include patterns - if matched, always sort
    /// 2. Hidden filter - if hidden and disabled, skip
    /// 3. Exact name match (case-insensitive) - skip
    /// 4. Extension match - skip
    /// 5. Glob pattern match - skip
    /// 6. Regex match - skip
    pub fn should_include(&self, name: &str) -> bool {
        if self.include.iter().any(|p| p.matches(name)) {
            return true;
        }

        if !self.enable_hidden_files && name.starts_with('.') {
            return false;
        }

        if self.filenames.contains(&name.to_lowercase()) {
            return false;
        }

        if let Some(ext) = Path::new(name).extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self.patterns.iter().any(|p| p.matches(name)) {
            return false;
        }

        !self.regexes.iter().any(|r| r.is_match(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleKind;
    use tempfile::TempDir;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.fallback, FallbackPolicy::Others);
        assert_eq!(config.folder_match, FolderMatch::Exact);
        assert_eq!(config.poll_interval_secs, 300);
        assert_eq!(config.rules, default_rules());
        assert!(!config.create_links);
    }

    #[test]
    fn test_explicit_empty_rules_are_kept() {
        let config = Config::from_toml("rules = []").unwrap();
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            watched_dir = "/tmp/watched"
            managed_root = "/tmp/sorted"
            fallback = "per_item"
            folder_match = "contains"
            poll_interval_secs = 60

            [[rules]]
            kind = "extension"
            pattern = ".txt"
            category = "Documents"

            [[rules]]
            kind = "folder"
            pattern = "photos"
            category = "Pictures"
        "#;
        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.watched_dir, PathBuf::from("/tmp/watched"));
        assert_eq!(config.managed_root(), PathBuf::from("/tmp/sorted"));
        assert_eq!(
            config.history_path(),
            PathBuf::from("/tmp/sorted").join(HISTORY_FILE_NAME)
        );
        assert_eq!(config.fallback, FallbackPolicy::PerItem);
        assert_eq!(config.folder_match, FolderMatch::Contains);
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules[1].kind, RuleKind::Folder);
    }

    #[test]
    fn test_legacy_fallback_spellings() {
        let config = Config::from_toml(r#"fallback = "per_folder""#).unwrap();
        assert_eq!(config.fallback, FallbackPolicy::PerItem);
        let config = Config::from_toml(r#"fallback = "Others""#).unwrap();
        assert_eq!(config.fallback, FallbackPolicy::Others);
    }

    #[test]
    fn test_unknown_fallback_is_error() {
        let result = Config::from_toml(r#"fallback = "bydate""#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_interval_is_error() {
        assert!(Config::from_toml("poll_interval_secs = 0").is_err());
    }

    #[test]
    fn test_category_with_separator_is_error() {
        let toml = r#"
            [[rules]]
            kind = "extension"
            pattern = ".txt"
            category = "../escape"
        "#;
        assert!(Config::from_toml(toml).is_err());
    }

    #[test]
    fn test_default_managed_root_under_watched_dir() {
        let config = Config::from_toml(r#"watched_dir = "/w""#).unwrap();
        assert_eq!(config.managed_root(), PathBuf::from("/w/Organized"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let config = Config::load_or_default(&temp_dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.rules, default_rules());
    }

    #[test]
    fn test_corrupt_file_is_error() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("config.toml");
        fs::write(&path, "rules = [ this is not toml").unwrap();
        assert!(matches!(
            Config::load_or_default(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::from_toml(r#"watched_dir = "/w""#).unwrap();
        config.add_rule(Rule::folder("projects", "Work")).unwrap();
        config.fallback = FallbackPolicy::PerItem;
        config.save(&path).unwrap();

        let loaded = Config::load_from_file(&path).unwrap();
        assert_eq!(loaded.rules, config.rules);
        assert_eq!(loaded.fallback, FallbackPolicy::PerItem);
        assert_eq!(loaded.watched_dir, PathBuf::from("/w"));
    }

    #[test]
    fn test_remove_rule_by_pattern() {
        let mut config = Config::default();
        let before = config.rules.len();
        assert_eq!(config.remove_rule("PDF"), 1);
        assert_eq!(config.rules.len(), before - 1);
        assert_eq!(config.remove_rule(".pdf"), 0);
    }

    #[test]
    fn test_add_invalid_rule_rejected() {
        let mut config = Config::default();
        assert!(config.add_rule(Rule::extension("", "Docs")).is_err());
        assert!(config.add_rule(Rule::extension(".x", "")).is_err());
    }

    #[test]
    fn test_set_log_level() {
        let mut config = Config::default();
        assert!(config.set_log_level("DEBUG").is_ok());
        assert_eq!(config.log_level, "debug");
        assert!(config.set_log_level("loud").is_err());
    }

    #[test]
    fn test_filter_skips_hidden_and_default_names() {
        let filter = IgnoreRules::default().compile().unwrap();
        assert!(!filter.should_include(".hidden"));
        assert!(!filter.should_include("desktop.ini"));
        assert!(!filter.should_include("thumbs.db"));
        assert!(filter.should_include("notes.txt"));
    }

    #[test]
    fn test_filter_extensions_and_globs() {
        let rules = IgnoreRules {
            extensions: vec![".TMP".to_string()],
            patterns: vec!["*.part".to_string()],
            ..Default::default()
        };
        let filter = rules.compile().unwrap();
        assert!(!filter.should_include("download.tmp"));
        assert!(!filter.should_include("movie.part"));
        assert!(filter.should_include("movie.mp4"));
    }

    #[test]
    fn test_filter_regex_and_include_override() {
        let rules = IgnoreRules {
            regex: vec![r"^draft_.*".to_string()],
            include: vec![".keep*".to_string()],
            ..Default::default()
        };
        let filter = rules.compile().unwrap();
        assert!(!filter.should_include("draft_letter.docx"));
        assert!(filter.should_include(".keepme"));
        assert!(!filter.should_include(".other"));
    }

    #[test]
    fn test_invalid_patterns_rejected() {
        let rules = IgnoreRules {
            regex: vec!["[invalid(".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            rules.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let rules = IgnoreRules {
            patterns: vec!["[invalid".to_string()],
            ..Default::default()
        };
        assert!(matches!(
            rules.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }

    #[test]
    fn test_plain_component() {
        assert!(is_plain_component("Documents"));
        assert!(is_plain_component("My Files"));
        assert!(!is_plain_component(".."));
        assert!(!is_plain_component("a/b"));
        assert!(!is_plain_component(""));
    }
}
