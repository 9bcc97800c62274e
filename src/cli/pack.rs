//! `sandpit pack` / `sandpit unpack`: move projects between directories
//! and JSON snapshots.

use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use sandpit::log;
use sandpit::project::ProjectDir;
use sandpit::vfs::FileSet;

/// Snapshot `dir`, skipping `out_dir`. Writes to stdout when `output` is `None`.
pub fn pack(dir: &Path, out_dir: &Path, output: Option<&Path>) -> Result<()> {
    let files = ProjectDir::new(dir)
        .skip(out_dir)
        .read()
        .with_context(|| format!("failed to read project `{}`", dir.display()))?;
    let json = files.to_json()?;

    match output {
        Some(path) => {
            fs::write(path, &json)
                .with_context(|| format!("failed to write `{}`", path.display()))?;
            log!("pack"; "{} files -> {}", files.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}")?;
        }
    }
    Ok(())
}

/// Write every file of the snapshot at `file` below `dir`.
pub fn unpack(file: &Path, dir: &Path) -> Result<()> {
    let json =
        fs::read_to_string(file).with_context(|| format!("failed to read `{}`", file.display()))?;
    let files = FileSet::from_json(&json)
        .with_context(|| format!("`{}` is not a project snapshot", file.display()))?;
    let count = ProjectDir::new(dir).write(&files)?;
    log!("unpack"; "{} files -> {}", count, dir.display());
    Ok(())
}
