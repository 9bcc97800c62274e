//! `sandpit watch`: mirror a project directory into a file set and rebuild
//! on every change.
//!
//! ```text
//! notify → sync thread → tokio channel → ProjectDir::sync → FileSet
//!                                                            ↓ events
//!                                 RebuildScheduler (debounce, build, show)
//! ```

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecursiveMode, Watcher};

use sandpit::config::SandpitConfig;
use sandpit::project::{ProjectDir, ProjectIoError, SyncChange};
use sandpit::reload::{FilePreview, RebuildScheduler, TerminalConsole};
use sandpit::vfs::FileSet;
use sandpit::{debug, log};

use super::build::{INDEX_FILE, builder};

pub async fn run(config: &SandpitConfig, dir: &Path, color: bool) -> Result<()> {
    let root = dir
        .canonicalize()
        .with_context(|| format!("cannot watch `{}`", dir.display()))?;
    let out_dir = config.out_dir(&root);
    let project = ProjectDir::new(&root).skip(&out_dir);

    // Watch before reading so nothing changed in between is lost.
    let (notify_tx, notify_rx) = std::sync::mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = notify_tx.send(res);
    })?;
    watcher.watch(&root, RecursiveMode::Recursive)?;

    let files = project
        .read()
        .with_context(|| format!("failed to read project `{}`", root.display()))?;

    let preview_path = out_dir.join(INDEX_FILE);
    let scheduler = RebuildScheduler::spawn(
        files.clone(),
        builder(config, color)?,
        Arc::new(TerminalConsole),
        Arc::new(FilePreview::new(&preview_path)),
        config.build.scheduler_config(),
    );
    log!("watch"; "{} files in {}", files.len(), root.display());
    log!("watch"; "preview: {}", preview_path.display());

    let (event_tx, mut event_rx) = tokio::sync::mpsc::channel::<Event>(64);
    std::thread::spawn(move || {
        while let Ok(result) = notify_rx.recv() {
            match result {
                Ok(event) => {
                    if event_tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Err(e) => log!("watch"; "notify error: {}", e),
            }
        }
    });

    let (stop_tx, mut stop_rx) = tokio::sync::mpsc::unbounded_channel();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .context("failed to set Ctrl+C handler")?;

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => break,
            Some(event) = event_rx.recv() => apply_event(&project, &files, &event),
            else => break,
        }
    }

    scheduler.shutdown();
    drop(watcher);
    files.dispose();
    log!("watch"; "stopped");
    Ok(())
}

/// Mirror one file system event into `files`.
pub fn apply_event(project: &ProjectDir, files: &FileSet, event: &Event) {
    if let EventKind::Access(_) = event.kind {
        return;
    }
    if let (EventKind::Modify(ModifyKind::Name(RenameMode::Both)), [from, to]) =
        (&event.kind, event.paths.as_slice())
    {
        report(project.rename(files, from, to));
        return;
    }
    for path in &event.paths {
        report(project.sync_tree(files, path));
    }
}

fn report(result: Result<Vec<SyncChange>, ProjectIoError>) {
    match result {
        Ok(changes) => changes.iter().for_each(log_change),
        Err(e) => log!("watch"; "{:#}", anyhow::Error::from(e)),
    }
}

fn log_change(change: &SyncChange) {
    match change {
        SyncChange::Added(name) => debug!("watch"; "added {}", name),
        SyncChange::Edited(name) => debug!("watch"; "edited {}", name),
        SyncChange::Removed(names) => debug!("watch"; "removed {}", names.join(", ")),
        SyncChange::Renamed { from, to } => debug!("watch"; "renamed {} -> {}", from, to),
        SyncChange::Unchanged => {}
    }
}
