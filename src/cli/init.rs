//! `sandpit init`: write the starter project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};

use sandpit::config::{CONFIG_FILE, SandpitConfig};
use sandpit::log;
use sandpit::preset;
use sandpit::project::ProjectDir;

/// Initialization mode determines validation rules.
#[derive(Debug, Clone, Copy)]
pub enum InitMode {
    /// `sandpit init` - current directory, must be empty
    CurrentDir,
    /// `sandpit init <dir>` - new directory, must not exist
    NewDir,
}

pub fn validate_target(root: &Path, mode: InitMode) -> Result<()> {
    match mode {
        InitMode::CurrentDir => {
            if !is_empty(root)? {
                bail!(
                    "Current directory is not empty.\n\
                     Use `sandpit init <dir>` to create a new project directory."
                );
            }
        }
        InitMode::NewDir => {
            if root.exists() {
                bail!(
                    "Directory '{}' already exists.\n\
                     Choose a different name or remove the existing directory.",
                    root.display()
                );
            }
        }
    }
    Ok(())
}

/// Check if directory is empty or doesn't exist.
fn is_empty(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(true);
    }
    let is_empty = fs::read_dir(path)
        .with_context(|| format!("Failed to read directory '{}'", path.display()))?
        .next()
        .is_none();
    Ok(is_empty)
}

/// Default `sandpit.toml` contents.
pub fn config_template() -> Result<String> {
    toml::to_string_pretty(&SandpitConfig::default()).context("Failed to render config")
}

/// Create the starter project in `root`.
pub fn new_project(root: &Path, mode: InitMode) -> Result<()> {
    validate_target(root, mode)?;

    fs::create_dir_all(root)
        .with_context(|| format!("Failed to create directory '{}'", root.display()))?;

    let files = preset::project()?;
    ProjectDir::new(root).write(&files)?;

    let config = root.join(CONFIG_FILE);
    fs::write(&config, config_template()?)
        .with_context(|| format!("Failed to write '{}'", config.display()))?;

    log!("init"; "Project initialized in {}", root.display());
    log!("init"; "run `sandpit watch` and open {}", Path::new("dist").join("index.html").display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_dir_current_mode() {
        let temp = TempDir::new().unwrap();
        assert!(validate_target(temp.path(), InitMode::CurrentDir).is_ok());
    }

    #[test]
    fn test_non_empty_dir_current_mode() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("index.js"), "").unwrap();
        assert!(validate_target(temp.path(), InitMode::CurrentDir).is_err());
    }

    #[test]
    fn test_existing_dir_new_mode() {
        let temp = TempDir::new().unwrap();
        assert!(validate_target(temp.path(), InitMode::NewDir).is_err());
    }

    #[test]
    fn test_new_project_writes_preset_and_config() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("pen");
        new_project(&root, InitMode::NewDir).unwrap();

        for (name, content) in preset::files() {
            assert_eq!(fs::read_to_string(root.join(name)).unwrap(), content);
        }
        let config = fs::read_to_string(root.join(CONFIG_FILE)).unwrap();
        let parsed = SandpitConfig::from_str(&config).unwrap();
        assert_eq!(parsed.build.out_dir, SandpitConfig::default().build.out_dir);
    }

    #[test]
    fn test_config_template_has_sections() {
        let template = config_template().unwrap();
        assert!(template.contains("[build]"));
        assert!(template.contains("[resolve]"));
        assert!(template.contains("[template]"));
    }
}
