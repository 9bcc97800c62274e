//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! entry = "^index\\.[tj]s$"      # Entry file name pattern
//! debounce_ms = 300               # Quiet period before a rebuild
//! include_hidden_entries = false  # Let hidden files be the entry
//! color = true                    # ANSI colors in diagnostics
//! out_dir = "dist"                # Where bundle.js and index.html go
//! ```

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::reload::{DEBOUNCE_MS, DEFAULT_ENTRY_PATTERN, SchedulerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Regex matched against file names to pick the entry point.
    pub entry: String,

    pub debounce_ms: u64,

    pub include_hidden_entries: bool,

    /// Color formatted diagnostics. The `--color` flag still decides
    /// whether the terminal shows them.
    pub color: bool,

    pub out_dir: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            entry: DEFAULT_ENTRY_PATTERN.to_string(),
            debounce_ms: DEBOUNCE_MS,
            include_hidden_entries: false,
            color: true,
            out_dir: PathBuf::from("dist"),
        }
    }
}

impl BuildConfig {
    pub const ENTRY: FieldPath = FieldPath::new("build.entry");
    pub const DEBOUNCE_MS: FieldPath = FieldPath::new("build.debounce_ms");
    pub const OUT_DIR: FieldPath = FieldPath::new("build.out_dir");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        if let Err(e) = Regex::new(&self.entry) {
            diag.error_with_hint(
                Self::ENTRY,
                format!("invalid pattern: {e}"),
                format!("the default is \"{}\"", DEFAULT_ENTRY_PATTERN.escape_default()),
            );
        }
        if self.debounce_ms == 0 {
            diag.error(Self::DEBOUNCE_MS, "must be greater than zero");
        } else if self.debounce_ms > 10_000 {
            diag.warn(
                Self::DEBOUNCE_MS,
                format!("{}ms is a long wait before every rebuild", self.debounce_ms),
            );
        }
        if self.out_dir.as_os_str().is_empty() {
            diag.error(Self::OUT_DIR, "must not be empty");
        }
    }

    /// Scheduler settings. Falls back to the default entry pattern when
    /// `entry` does not compile; [`validate`](Self::validate) reports that.
    pub fn scheduler_config(&self) -> SchedulerConfig {
        let defaults = SchedulerConfig::default();
        SchedulerConfig {
            entry: Regex::new(&self.entry).unwrap_or(defaults.entry),
            debounce: Duration::from_millis(self.debounce_ms.max(1)),
            include_hidden_entries: self.include_hidden_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_parse_config;

    #[test]
    fn test_build_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.entry, DEFAULT_ENTRY_PATTERN);
        assert_eq!(config.build.debounce_ms, 300);
        assert!(!config.build.include_hidden_entries);
        assert!(config.build.color);
        assert_eq!(config.build.out_dir, PathBuf::from("dist"));
    }

    #[test]
    fn test_build_config_override() {
        let config = test_parse_config(
            "[build]\nentry = '^main\\.js$'\ndebounce_ms = 50\ninclude_hidden_entries = true\nout_dir = \"public\"",
        );
        let scheduler = config.build.scheduler_config();
        assert!(scheduler.entry.is_match("main.js"));
        assert!(!scheduler.entry.is_match("index.js"));
        assert_eq!(scheduler.debounce, Duration::from_millis(50));
        assert!(scheduler.include_hidden_entries);
        assert_eq!(config.build.out_dir, PathBuf::from("public"));
    }

    #[test]
    fn test_build_config_validation() {
        let config = test_parse_config("[build]\nentry = \"(\"\ndebounce_ms = 0\nout_dir = \"\"");
        let mut diag = ConfigDiagnostics::new();
        config.build.validate(&mut diag);
        let fields: Vec<_> = diag.errors().iter().map(|d| d.field).collect();
        assert_eq!(
            fields,
            [BuildConfig::ENTRY, BuildConfig::DEBOUNCE_MS, BuildConfig::OUT_DIR]
        );
    }

    #[test]
    fn test_long_debounce_warns() {
        let config = test_parse_config("[build]\ndebounce_ms = 60000");
        let mut diag = ConfigDiagnostics::new();
        config.build.validate(&mut diag);
        assert!(diag.is_empty());
        assert_eq!(diag.warnings().len(), 1);
    }

    #[test]
    fn test_bad_entry_falls_back_to_default() {
        let config = test_parse_config("[build]\nentry = \"(\"");
        assert!(config.build.scheduler_config().entry.is_match("index.ts"));
    }
}
