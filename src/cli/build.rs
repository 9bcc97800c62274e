//! `sandpit build`: bundle a project once and write the result.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};

use sandpit::build::{BuildResult, Builder};
use sandpit::config::SandpitConfig;
use sandpit::log;
use sandpit::project::{self, ProjectDir};
use sandpit::reload::{MISSING_ENTRY_MESSAGE, find_entry, render_document};

pub const BUNDLE_FILE: &str = "bundle.js";
pub const INDEX_FILE: &str = "index.html";

/// Directory a project's relative paths are taken from: the directory
/// itself, or the folder holding a snapshot file.
pub fn project_root(project: &Path) -> PathBuf {
    if project.is_dir() {
        project.to_path_buf()
    } else {
        project
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// The builder described by `config`.
pub fn builder(config: &SandpitConfig, color: bool) -> Result<Arc<Builder>> {
    let builder = Builder::with_defaults(config.template.compiler(), config.resolve.resolve_config())?
        .color(color);
    Ok(Arc::new(builder))
}

/// Build `project` once. Returns `false` when the build reported errors.
pub async fn run(
    config: &SandpitConfig,
    project: &Path,
    output: Option<&Path>,
    color: bool,
) -> Result<bool> {
    let root = project_root(project);
    let out_dir = output.map_or_else(|| config.out_dir(&root), Path::to_path_buf);

    let files = if project.is_dir() {
        ProjectDir::new(project).skip(&out_dir).read()
    } else {
        project::load(project)
    }
    .with_context(|| format!("failed to load project `{}`", project.display()))?;

    let Some(entry) = find_entry(&files, &config.build.scheduler_config()) else {
        bail!("{}", MISSING_ENTRY_MESSAGE);
    };

    let result = builder(config, color)?.build(&entry, &files).await?;
    for message in result.errors.iter().chain(&result.warnings) {
        eprint!("{message}");
    }
    if !result.errors.is_empty() {
        log!("error"; "build failed with {} error(s)", result.errors.len());
        return Ok(false);
    }

    write_output(&out_dir, &result)?;
    log!("build"; "Build finished in {}ms! Wrote {}", result.elapsed_ms(), out_dir.display());
    Ok(true)
}

/// Write the bundle and a page that loads it.
pub fn write_output(out_dir: &Path, result: &BuildResult) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create `{}`", out_dir.display()))?;

    let bundle = out_dir.join(BUNDLE_FILE);
    fs::write(&bundle, &result.bundle)
        .with_context(|| format!("failed to write `{}`", bundle.display()))?;

    let index = out_dir.join(INDEX_FILE);
    let head = format!("<script defer type=\"module\" src=\"./{BUNDLE_FILE}\"></script>");
    fs::write(&index, render_document(&head, ""))
        .with_context(|| format!("failed to write `{}`", index.display()))?;
    Ok(())
}
