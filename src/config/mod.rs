//! Project configuration (`sandpit.toml`).
//!
//! ```toml
//! [build]
//! entry = "^index\\.[tj]s$"
//! debounce_ms = 300
//! out_dir = "dist"
//!
//! [resolve]
//! cdn_origin = "https://cdn.skypack.dev"
//!
//! [template]
//! command = ["ixc", "--stdin"]
//! ```
//!
//! Every section is optional. Without a config file the defaults apply.

pub mod section;
pub mod types;
mod util;

pub use section::{BuildConfig, ResolveSection, TemplateConfig};
pub use types::{ConfigDiagnostic, ConfigDiagnostics, ConfigError, FieldPath};
pub use util::find_config_file;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::log;

/// File name looked up when no `--config` is given.
pub const CONFIG_FILE: &str = "sandpit.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SandpitConfig {
    /// File this config was read from, if any.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    pub build: BuildConfig,
    pub resolve: ResolveSection,
    pub template: TemplateConfig,
}

impl SandpitConfig {
    /// Load the configuration for a project rooted at `root`.
    ///
    /// An explicit path must exist. Otherwise `sandpit.toml` is searched
    /// upward from `root`, and defaults are used when none is found.
    pub fn load(explicit: Option<&Path>, root: &Path) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => find_config_file(root, Path::new(CONFIG_FILE)),
        };
        let Some(path) = path else {
            crate::debug!("config"; "no {} found, using defaults", CONFIG_FILE);
            return Ok(Self::default());
        };
        let mut config = Self::from_path(&path)?;
        config.config_path = Some(path);
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)?;
        if !ignored.is_empty() {
            Self::print_unknown_fields_warning(&ignored, path);
        }
        crate::debug!("config"; "loaded {}", path.display());
        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>), ConfigError> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    fn print_unknown_fields_warning(fields: &[String], path: &Path) {
        let display_path = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_else(|| path.to_string_lossy());
        log!("warning"; "unknown fields in {} are ignored:", display_path);
        for field in fields {
            eprintln!("- {field}");
        }
    }

    /// Validate every section, reporting all problems at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut diag = ConfigDiagnostics::new();

        self.build.validate(&mut diag);
        self.resolve.validate(&mut diag);
        self.template.validate(&mut diag);

        diag.print_warnings();
        diag.into_result().map_err(ConfigError::Diagnostics)
    }

    /// Output directory, relative paths taken from `root`.
    pub fn out_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.build.out_dir)
    }
}

// ============================================================================
// Test Helpers (available to all modules via `use crate::config::test_*`)
// ============================================================================

/// Parse `content`, panicking on unknown fields to catch typos in tests.
#[cfg(test)]
pub fn test_parse_config(content: &str) -> SandpitConfig {
    let (parsed, ignored) = SandpitConfig::parse_with_ignored(content).unwrap();
    assert!(
        ignored.is_empty(),
        "test config has unknown fields: {:?}",
        ignored
    );
    parsed
}
