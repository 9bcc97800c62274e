//! Projects on disk: a directory whose files mirror a [`FileSet`].
//!
//! File names are paths relative to the project root, joined with `/`.
//! Dotfiles, editor backups and configured output directories are never
//! part of the project.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

use crate::config::CONFIG_FILE;
use crate::vfs::{FileError, FileSet, ProjectError, VirtualFile};

#[derive(Debug, Error)]
pub enum ProjectIoError {
    #[error("cannot access `{}`", .0.display())]
    Io(PathBuf, #[source] io::Error),

    #[error("invalid project snapshot")]
    Snapshot(#[from] ProjectError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error("`{}` is outside the project", .0.display())]
    Outside(PathBuf),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ProjectIoError + '_ {
    move |e| ProjectIoError::Io(path.to_path_buf(), e)
}

/// Editor swap files, backups and dotfiles.
pub fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

/// What a single path change did to the mirrored set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncChange {
    Added(String),
    Edited(String),
    Removed(Vec<String>),
    Renamed { from: String, to: String },
    Unchanged,
}

/// A project directory and the paths inside it that are not project files.
#[derive(Debug, Clone)]
pub struct ProjectDir {
    root: PathBuf,
    skip: Vec<PathBuf>,
}

impl ProjectDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let skip = vec![root.join(CONFIG_FILE)];
        Self { root, skip }
    }

    /// Exclude `path` (typically the output directory) and everything below it.
    pub fn skip(mut self, path: impl Into<PathBuf>) -> Self {
        self.skip.push(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Project file name for `path`, or `None` if it is not a project file.
    pub fn file_name(&self, path: &Path) -> Option<String> {
        if self.skip.iter().any(|skip| path.starts_with(skip)) {
            return None;
        }
        let relative = path.strip_prefix(&self.root).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            let Component::Normal(part) = component else {
                return None;
            };
            if is_temp_file(Path::new(part)) {
                return None;
            }
            parts.push(part.to_str()?);
        }
        (!parts.is_empty()).then(|| parts.join("/"))
    }

    /// Disk path of the project file `name`.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, ProjectIoError> {
        let relative = Path::new(name);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(ProjectIoError::Outside(relative.to_path_buf()));
        }
        Ok(self.root.join(relative))
    }

    /// Read every project file, sorted by name.
    pub fn read(&self) -> Result<FileSet, ProjectIoError> {
        let mut found = Vec::new();
        self.collect(&self.root, &mut found)?;
        found.sort();

        let files = FileSet::new();
        for (name, path) in found {
            let Some(content) = read_text(&path)? else {
                continue;
            };
            files.add(VirtualFile::new(name, content)?);
        }
        crate::debug!("project"; "read {} files from {}", files.len(), self.root.display());
        Ok(files)
    }

    fn collect(&self, dir: &Path, found: &mut Vec<(String, PathBuf)>) -> Result<(), ProjectIoError> {
        for entry in fs::read_dir(dir).map_err(io_error(dir))? {
            let path = entry.map_err(io_error(dir))?.path();
            let Some(name) = self.file_name(&path) else {
                continue;
            };
            if path.is_dir() {
                self.collect(&path, found)?;
            } else if path.is_file() {
                found.push((name, path));
            }
        }
        Ok(())
    }

    /// Write every member of `files` below the root. Returns the count.
    pub fn write(&self, files: &FileSet) -> Result<usize, ProjectIoError> {
        let members = files.all();
        for file in &members {
            let path = self.path_of(&file.name())?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(io_error(parent))?;
            }
            fs::write(&path, file.content()).map_err(io_error(&path))?;
        }
        Ok(members.len())
    }

    /// Bring `files` in line with what is on disk at `path`.
    ///
    /// A missing path removes (and disposes) the matching file, or every
    /// file below it when it was a directory.
    pub fn sync(&self, files: &FileSet, path: &Path) -> Result<SyncChange, ProjectIoError> {
        let Some(name) = self.file_name(path) else {
            return Ok(SyncChange::Unchanged);
        };

        if path.is_dir() {
            return Ok(SyncChange::Unchanged);
        }

        if !path.exists() {
            let prefix = format!("{name}/");
            let removed: Vec<_> = files
                .all()
                .into_iter()
                .filter(|f| {
                    let n = f.name();
                    n == name || n.starts_with(&prefix)
                })
                .collect();
            if removed.is_empty() {
                return Ok(SyncChange::Unchanged);
            }
            let names = removed.iter().map(VirtualFile::name).collect();
            for file in &removed {
                files.remove(file, true);
            }
            return Ok(SyncChange::Removed(names));
        }

        let Some(content) = read_text(path)? else {
            return Ok(SyncChange::Unchanged);
        };
        match files.find_by_name(&name) {
            Some(file) if file.content() == content => Ok(SyncChange::Unchanged),
            Some(file) => {
                file.set_content(content)?;
                Ok(SyncChange::Edited(name))
            }
            None => {
                files.add(VirtualFile::new(name.clone(), content)?);
                Ok(SyncChange::Added(name))
            }
        }
    }

    /// Follow a rename on disk, keeping the file's identity when both
    /// sides are project files. Otherwise the old path is removed and the
    /// new one (a file or a whole directory) is read.
    pub fn rename(
        &self,
        files: &FileSet,
        from: &Path,
        to: &Path,
    ) -> Result<Vec<SyncChange>, ProjectIoError> {
        if let (Some(old), Some(new)) = (self.file_name(from), self.file_name(to))
            && to.is_file()
            && files.find_by_name(&new).is_none()
            && let Some(file) = files.find_by_name(&old)
        {
            file.set_name(new.clone())?;
            if let Some(content) = read_text(to)?
                && content != file.content()
            {
                file.set_content(content)?;
            }
            return Ok(vec![SyncChange::Renamed { from: old, to: new }]);
        }

        let mut changes = vec![self.sync(files, from)?];
        changes.extend(self.sync_tree(files, to)?);
        changes.retain(|c| *c != SyncChange::Unchanged);
        Ok(changes)
    }

    /// [`sync`](Self::sync) `path`, or every file below it when it is a
    /// directory. Unchanged files are left out.
    pub fn sync_tree(&self, files: &FileSet, path: &Path) -> Result<Vec<SyncChange>, ProjectIoError> {
        let mut changes = Vec::new();
        if path.is_dir() {
            if self.file_name(path).is_none() && path != self.root {
                return Ok(changes);
            }
            let mut found = Vec::new();
            self.collect(path, &mut found)?;
            found.sort();
            for (_, file) in found {
                changes.push(self.sync(files, &file)?);
            }
        } else {
            changes.push(self.sync(files, path)?);
        }
        changes.retain(|c| *c != SyncChange::Unchanged);
        Ok(changes)
    }
}

/// File contents, or `None` for files that are not UTF-8 text.
fn read_text(path: &Path) -> Result<Option<String>, ProjectIoError> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => {
            crate::log!("project"; "skipping non-text file {}", path.display());
            Ok(None)
        }
        // Deleted between listing and reading.
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ProjectIoError::Io(path.to_path_buf(), e)),
    }
}

/// Load a project from a directory or a `.json` snapshot.
pub fn load(path: &Path) -> Result<FileSet, ProjectIoError> {
    if path.is_dir() {
        return ProjectDir::new(path).read();
    }
    let json = fs::read_to_string(path).map_err(io_error(path))?;
    Ok(FileSet::from_json(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, name: &str, content: &str) {
        let path = root.join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(files: &FileSet) -> Vec<String> {
        files.all().iter().map(VirtualFile::name).collect()
    }

    #[test]
    fn test_is_temp_file() {
        assert!(is_temp_file(Path::new("main.js~")));
        assert!(is_temp_file(Path::new(".main.js.swp")));
        assert!(is_temp_file(Path::new("notes.bak")));
        assert!(is_temp_file(Path::new(".git")));
        assert!(!is_temp_file(Path::new("main.ix")));
    }

    #[test]
    fn test_read_skips_ignored_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "index.js", "import 'lib/util.js';");
        write(root, "lib/util.js", "export const x = 1;");
        write(root, "dist/bundle.js", "built");
        write(root, ".git/HEAD", "ref");
        write(root, "index.js~", "backup");
        write(root, CONFIG_FILE, "");

        let files = ProjectDir::new(root).skip(root.join("dist")).read().unwrap();
        assert_eq!(names(&files), ["index.js", "lib/util.js"]);
        assert_eq!(
            files.find_by_name("lib/util.js").unwrap().content(),
            "export const x = 1;"
        );
    }

    #[test]
    fn test_read_skips_binary_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("logo.png"), [0xff, 0xfe, 0x00, 0x81]).unwrap();
        write(dir.path(), "index.js", "");
        let files = ProjectDir::new(dir.path()).read().unwrap();
        assert_eq!(names(&files), ["index.js"]);
    }

    #[test]
    fn test_write_creates_directories() {
        let dir = TempDir::new().unwrap();
        let files = FileSet::new();
        files.add(VirtualFile::new("a/b/c.js", "x").unwrap());
        files.add(VirtualFile::new("index.js", "y").unwrap());

        let count = ProjectDir::new(dir.path()).write(&files).unwrap();
        assert_eq!(count, 2);
        assert_eq!(fs::read_to_string(dir.path().join("a/b/c.js")).unwrap(), "x");
    }

    #[test]
    fn test_write_rejects_escaping_names() {
        let dir = TempDir::new().unwrap();
        let files = FileSet::new();
        files.add(VirtualFile::new("../evil.js", "x").unwrap());
        let result = ProjectDir::new(dir.path().join("p")).write(&files);
        assert!(matches!(result, Err(ProjectIoError::Outside(_))));
    }

    #[test]
    fn test_sync_add_edit_remove() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let project = ProjectDir::new(root);
        let files = FileSet::new();
        let path = root.join("main.ix");

        fs::write(&path, "<p>1</p>").unwrap();
        assert_eq!(
            project.sync(&files, &path).unwrap(),
            SyncChange::Added("main.ix".into())
        );
        assert_eq!(project.sync(&files, &path).unwrap(), SyncChange::Unchanged);

        fs::write(&path, "<p>2</p>").unwrap();
        assert_eq!(
            project.sync(&files, &path).unwrap(),
            SyncChange::Edited("main.ix".into())
        );
        assert_eq!(files.find_by_name("main.ix").unwrap().content(), "<p>2</p>");

        let file = files.find_by_name("main.ix").unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(
            project.sync(&files, &path).unwrap(),
            SyncChange::Removed(vec!["main.ix".into()])
        );
        assert!(files.is_empty());
        assert!(file.is_disposed());
    }

    #[test]
    fn test_rename_keeps_identity() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "main.js", "let a;");
        let project = ProjectDir::new(root);
        let files = project.read().unwrap();
        let file = files.find_by_name("main.js").unwrap();

        fs::rename(root.join("main.js"), root.join("main.ts")).unwrap();
        let change = project
            .rename(&files, &root.join("main.js"), &root.join("main.ts"))
            .unwrap();
        assert_eq!(
            change,
            [SyncChange::Renamed {
                from: "main.js".into(),
                to: "main.ts".into()
            }]
        );
        assert_eq!(file.name(), "main.ts");
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_rename_into_ignored_path_removes() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "main.js", "");
        let project = ProjectDir::new(root);
        let files = project.read().unwrap();

        fs::rename(root.join("main.js"), root.join("main.js~")).unwrap();
        let change = project
            .rename(&files, &root.join("main.js"), &root.join("main.js~"))
            .unwrap();
        assert_eq!(change, [SyncChange::Removed(vec!["main.js".into()])]);
        assert!(files.is_empty());
    }

    #[test]
    fn test_rename_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "lib/a.js", "a");
        let project = ProjectDir::new(root);
        let files = project.read().unwrap();

        fs::rename(root.join("lib"), root.join("src")).unwrap();
        let change = project
            .rename(&files, &root.join("lib"), &root.join("src"))
            .unwrap();
        assert_eq!(
            change,
            [
                SyncChange::Removed(vec!["lib/a.js".into()]),
                SyncChange::Added("src/a.js".into())
            ]
        );
        assert_eq!(files.find_by_name("src/a.js").unwrap().content(), "a");
    }

    #[test]
    fn test_sync_removed_directory() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        write(root, "lib/a.js", "");
        write(root, "lib/b.js", "");
        write(root, "library.js", "");
        let project = ProjectDir::new(root);
        let files = project.read().unwrap();

        fs::remove_dir_all(root.join("lib")).unwrap();
        let change = project.sync(&files, &root.join("lib")).unwrap();
        assert_eq!(
            change,
            SyncChange::Removed(vec!["lib/a.js".into(), "lib/b.js".into()])
        );
        assert_eq!(names(&files), ["library.js"]);
    }

    #[test]
    fn test_sync_ignores_skipped_paths() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let project = ProjectDir::new(root).skip(root.join("dist"));
        write(root, "dist/index.html", "");
        write(root, ".index.js.swp", "");
        let files = FileSet::new();
        assert_eq!(
            project.sync(&files, &root.join("dist/index.html")).unwrap(),
            SyncChange::Unchanged
        );
        assert_eq!(
            project.sync(&files, &root.join(".index.js.swp")).unwrap(),
            SyncChange::Unchanged
        );
        assert!(files.is_empty());
    }

    #[test]
    fn test_load_snapshot_or_directory() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "p/index.js", "1");
        let snapshot = dir.path().join("p.json");
        fs::write(&snapshot, load(&dir.path().join("p")).unwrap().to_json().unwrap()).unwrap();

        let files = load(&snapshot).unwrap();
        assert_eq!(names(&files), ["index.js"]);
        assert_eq!(files.find_by_name("index.js").unwrap().content(), "1");
    }
}
