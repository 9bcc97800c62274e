//! Configuration utility functions.

use std::path::{Path, PathBuf};

/// Find `config_name` in `start` or the nearest ancestor that has it.
///
/// ```text
/// /home/user/pen/src/      ← start
/// /home/user/pen/sandpit.toml  ← found
/// ```
pub fn find_config_file(start: &Path, config_name: &Path) -> Option<PathBuf> {
    if config_name.is_absolute() {
        return config_name.exists().then(|| config_name.to_path_buf());
    }

    let start = if start.is_absolute() {
        start.to_path_buf()
    } else {
        std::env::current_dir().ok()?.join(start)
    };

    start
        .ancestors()
        .map(|dir| dir.join(config_name))
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_find_in_start_dir() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("sandpit.toml"), "").unwrap();
        assert_eq!(
            find_config_file(dir.path(), Path::new("sandpit.toml")),
            Some(dir.path().join("sandpit.toml"))
        );
    }

    #[test]
    fn test_nearest_ancestor_wins() {
        let dir = TempDir::new().unwrap();
        let inner = dir.path().join("a");
        std::fs::create_dir_all(inner.join("b")).unwrap();
        std::fs::write(dir.path().join("sandpit.toml"), "").unwrap();
        std::fs::write(inner.join("sandpit.toml"), "").unwrap();
        assert_eq!(
            find_config_file(&inner.join("b"), Path::new("sandpit.toml")),
            Some(inner.join("sandpit.toml"))
        );
    }

    #[test]
    fn test_absolute_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        assert_eq!(find_config_file(dir.path(), &path), None);
        std::fs::write(&path, "").unwrap();
        assert_eq!(find_config_file(Path::new("."), &path), Some(path));
    }
}
