//! Debounced rebuild loop.
//!
//! ```text
//! FileSet add/remove/edit ──► signal ──► Debouncer ──► attempt #n (spawned)
//!                                                       ├── no entry → instructions
//!                                                       ├── Builder::build
//!                                                       └── show result (unless stale) + BuildFinished
//! ```
//!
//! Store handlers only post a signal, so mutations never wait on a build.
//! Attempts are numbered; an attempt that finishes after a newer one has
//! already been shown is not displayed, but still reports `BuildFinished`.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::debouncer::{DEBOUNCE_MS, Debouncer};
use super::surface::{Console, Preview, bundle_document, message_document};
use crate::build::{BuildResult, Builder};
use crate::event::{EventChannel, Subscription};
use crate::vfs::FileSet;

pub const DEFAULT_ENTRY_PATTERN: &str = r"^index\.[tj]s$";

pub const MISSING_ENTRY_MESSAGE: &str =
    "Could not find index file. Create a file named \"index.js\" or \"index.ts\".";

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub entry: Regex,
    pub debounce: Duration,
    /// Consider hidden files when looking for the entry.
    pub include_hidden_entries: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            entry: Regex::new(DEFAULT_ENTRY_PATTERN).expect("valid default entry pattern"),
            debounce: Duration::from_millis(DEBOUNCE_MS),
            include_hidden_entries: false,
        }
    }
}

/// First file (in insertion order) whose name matches the entry pattern.
pub fn find_entry(files: &FileSet, config: &SchedulerConfig) -> Option<String> {
    files
        .find(|f| (config.include_hidden_entries || !f.hidden()) && config.entry.is_match(&f.name()))
        .map(|f| f.name())
}

#[derive(Debug, Clone)]
pub enum BuildOutcome {
    Built(Arc<BuildResult>),
    /// The build could not run at all (e.g. tool initialization failed).
    Failed(String),
    MissingEntry,
}

#[derive(Debug, Clone)]
pub struct BuildFinished {
    pub generation: u64,
    pub outcome: BuildOutcome,
}

enum Signal {
    Changed,
    RebuildNow,
}

/// Shared by all attempts: rendering and completion reporting.
struct Display {
    console: Arc<dyn Console>,
    preview: Arc<dyn Preview>,
    /// Highest generation shown so far. Held while rendering.
    shown: Mutex<u64>,
    finished: EventChannel<BuildFinished>,
}

impl Display {
    fn finish(&self, generation: u64, outcome: BuildOutcome) {
        {
            let mut shown = self.shown.lock();
            if *shown > generation {
                crate::debug!("watch"; "dropping stale build #{}", generation);
            } else {
                *shown = generation;
                self.render(&outcome);
            }
        }
        self.finished.emit(&BuildFinished { generation, outcome });
    }

    fn render(&self, outcome: &BuildOutcome) {
        self.console.clear();
        match outcome {
            BuildOutcome::MissingEntry => {
                self.console.writeln(MISSING_ENTRY_MESSAGE);
                self.preview.show(&message_document(MISSING_ENTRY_MESSAGE));
            }
            BuildOutcome::Failed(error) => {
                self.console.writeln(error);
                self.preview.show(&message_document(error));
            }
            BuildOutcome::Built(result) => {
                if result.is_clean() {
                    self.console
                        .writeln(&format!("Build finished in {}ms!", result.elapsed_ms()));
                }
                for message in result.errors.iter().chain(&result.warnings) {
                    self.console.write(message);
                }
                if result.errors.is_empty() {
                    self.preview.show(&bundle_document(&result.bundle));
                } else {
                    self.preview.show(&message_document(&result.errors.concat()));
                }
            }
        }
    }
}

/// Rebuilds a project a fixed delay after each burst of mutations.
pub struct RebuildScheduler {
    signals: mpsc::UnboundedSender<Signal>,
    display: Arc<Display>,
    subscription: Subscription,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RebuildScheduler {
    /// Start watching `files` and run one initial build.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(
        files: FileSet,
        builder: Arc<Builder>,
        console: Arc<dyn Console>,
        preview: Arc<dyn Preview>,
        config: SchedulerConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();

        let changed = |tx: &mpsc::UnboundedSender<Signal>| {
            let tx = tx.clone();
            move || {
                let _ = tx.send(Signal::Changed);
            }
        };
        let on_added = changed(&tx);
        let on_removed = changed(&tx);
        let on_edited = changed(&tx);
        let subscription = Subscription::all(vec![
            files.on_file_added(move |_| on_added()),
            files.on_file_removed(move |_, _| on_removed()),
            files.on_file_edited(move |_, _| on_edited()),
        ]);

        let display = Arc::new(Display {
            console,
            preview,
            shown: Mutex::new(0),
            finished: EventChannel::new(),
        });

        let task = tokio::spawn(run(rx, files, builder, Arc::clone(&display), config));

        Self {
            signals: tx,
            display,
            subscription,
            task: Mutex::new(Some(task)),
        }
    }

    /// Observe every completed attempt, displayed or not.
    pub fn on_build_finished<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&BuildFinished) + Send + Sync + 'static,
    {
        self.display.finished.on(listener)
    }

    /// Start an attempt now, dropping any pending debounced one.
    pub fn rebuild_now(&self) {
        let _ = self.signals.send(Signal::RebuildNow);
    }

    /// Stop reacting to the store and stop the loop. In-flight attempts
    /// still finish.
    pub fn shutdown(&self) {
        self.subscription.revoke();
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

impl Drop for RebuildScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run(
    mut signals: mpsc::UnboundedReceiver<Signal>,
    files: FileSet,
    builder: Arc<Builder>,
    display: Arc<Display>,
    config: SchedulerConfig,
) {
    let mut debouncer = Debouncer::new(config.debounce);
    let mut generation = 0u64;

    let launch = |generation: &mut u64| {
        *generation += 1;
        let entry = find_entry(&files, &config);
        tokio::spawn(attempt(
            *generation,
            entry,
            files.clone(),
            Arc::clone(&builder),
            Arc::clone(&display),
        ));
    };

    launch(&mut generation);

    loop {
        tokio::select! {
            biased;
            signal = signals.recv() => match signal {
                Some(Signal::Changed) => debouncer.touch(Instant::now()),
                Some(Signal::RebuildNow) => {
                    debouncer.cancel();
                    launch(&mut generation);
                }
                None => break,
            },
            _ = tokio::time::sleep(debouncer.sleep_duration(Instant::now())), if debouncer.is_pending() => {
                if debouncer.take_if_ready(Instant::now()) {
                    launch(&mut generation);
                }
            }
        }
    }
}

async fn attempt(
    generation: u64,
    entry: Option<String>,
    files: FileSet,
    builder: Arc<Builder>,
    display: Arc<Display>,
) {
    let outcome = match entry {
        None => BuildOutcome::MissingEntry,
        Some(entry) => {
            crate::debug!("watch"; "build #{} of {}", generation, entry);
            match builder.build(&entry, &files).await {
                Ok(result) => BuildOutcome::Built(Arc::new(result)),
                Err(e) => BuildOutcome::Failed(e.to_string()),
            }
        }
    };
    display.finish(generation, outcome);
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::reload::surface::{MemoryConsole, MemoryPreview};
    use crate::testing::{builder, project};
    use crate::vfs::VirtualFile;

    struct Harness {
        scheduler: RebuildScheduler,
        console: Arc<MemoryConsole>,
        preview: Arc<MemoryPreview>,
        builds: Arc<AtomicUsize>,
        outcomes: Arc<Mutex<Vec<BuildFinished>>>,
    }

    impl Harness {
        fn start(files: &FileSet, config: SchedulerConfig) -> Self {
            let console = Arc::new(MemoryConsole::new());
            let preview = Arc::new(MemoryPreview::new());
            let scheduler = RebuildScheduler::spawn(
                files.clone(),
                Arc::new(builder()),
                console.clone(),
                preview.clone(),
                config,
            );

            let builds = Arc::new(AtomicUsize::new(0));
            let outcomes = Arc::new(Mutex::new(Vec::new()));
            let (count, log) = (Arc::clone(&builds), Arc::clone(&outcomes));
            scheduler.on_build_finished(move |event| {
                count.fetch_add(1, Ordering::SeqCst);
                log.lock().push(event.clone());
            });

            Self {
                scheduler,
                console,
                preview,
                builds,
                outcomes,
            }
        }

        fn builds(&self) -> usize {
            self.builds.load(Ordering::SeqCst)
        }

        fn last_outcome(&self) -> BuildOutcome {
            self.outcomes.lock().last().unwrap().outcome.clone()
        }
    }

    /// Let spawned attempts run to completion without moving the clock.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn sleep_ms(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn test_find_entry() {
        let config = SchedulerConfig::default();
        let files = project(&[("main.js", ""), ("index.ts", ""), ("index.js", "")]);
        assert_eq!(find_entry(&files, &config).as_deref(), Some("index.ts"));

        let files = project(&[("index.jsx", ""), ("src/index.js", "")]);
        assert_eq!(find_entry(&files, &config), None);
    }

    #[test]
    fn test_find_entry_skips_hidden_unless_configured() {
        let files = FileSet::with_files([VirtualFile::new("index.js", "").unwrap().with_hidden(true)]);
        assert_eq!(find_entry(&files, &SchedulerConfig::default()), None);

        let config = SchedulerConfig {
            include_hidden_entries: true,
            ..SchedulerConfig::default()
        };
        assert_eq!(find_entry(&files, &config).as_deref(), Some("index.js"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_build_renders_bundle() {
        let files = project(&[("index.js", "console.log(1+1)")]);
        let harness = Harness::start(&files, SchedulerConfig::default());
        settle().await;

        assert_eq!(harness.builds(), 1);
        assert!(harness.console.contents().starts_with("Build finished in "));
        assert!(harness.console.contents().ends_with("ms!\n"));
        let document = harness.preview.last().unwrap();
        assert!(document.starts_with("<!DOCTYPE html>"));
        assert!(document.contains("<script defer type=\"module\">"));
        assert!(document.contains("console.log(1+1)"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_edits_rebuilds_once_after_quiet_period() {
        let files = project(&[("index.js", "console.log(0)")]);
        let harness = Harness::start(&files, SchedulerConfig::default());
        settle().await;
        assert_eq!(harness.builds(), 1);

        let index = files.find_by_name("index.js").unwrap();
        index.set_content("console.log(1)").unwrap();
        sleep_ms(5).await;
        index.set_content("console.log(2)").unwrap();
        sleep_ms(5).await;
        index.set_content("console.log(3)").unwrap();

        sleep_ms(299).await;
        settle().await;
        assert_eq!(harness.builds(), 1);

        sleep_ms(2).await;
        settle().await;
        assert_eq!(harness.builds(), 2);
        assert!(harness.preview.last().unwrap().contains("console.log(3)"));

        sleep_ms(1000).await;
        assert_eq!(harness.builds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_and_remove_trigger_rebuilds() {
        let files = project(&[("index.js", "")]);
        let harness = Harness::start(&files, SchedulerConfig::default());
        settle().await;

        let extra = VirtualFile::new("extra.js", "").unwrap();
        files.add(extra.clone());
        sleep_ms(400).await;
        settle().await;
        assert_eq!(harness.builds(), 2);

        files.remove(&extra, true);
        sleep_ms(400).await;
        settle().await;
        assert_eq!(harness.builds(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_entry_shows_instructions() {
        let files = project(&[("main.js", "")]);
        let harness = Harness::start(&files, SchedulerConfig::default());
        settle().await;

        assert!(matches!(harness.last_outcome(), BuildOutcome::MissingEntry));
        assert_eq!(harness.console.contents(), format!("{MISSING_ENTRY_MESSAGE}\n"));
        assert!(harness.preview.last().unwrap().contains(
            "<pre>Could not find index file. Create a file named &quot;index.js&quot; or &quot;index.ts&quot;.</pre>"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_diagnostics_go_to_console_and_preview() {
        let files = project(&[("index.js", "import 'missing.js';")]);
        let harness = Harness::start(&files, SchedulerConfig::default());
        settle().await;

        match harness.last_outcome() {
            BuildOutcome::Built(result) => assert_eq!(result.errors.len(), 1),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(harness.console.contents().contains("Could not resolve \"missing.js\""));
        assert!(!harness.console.contents().contains("Build finished"));
        let document = harness.preview.last().unwrap();
        assert!(document.contains("<pre>"));
        assert!(document.contains("Could not resolve &quot;missing.js&quot;"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rebuild_now_skips_the_wait() {
        let files = project(&[("index.js", "")]);
        let harness = Harness::start(&files, SchedulerConfig::default());
        settle().await;

        files.all()[0].set_content("console.log(1)").unwrap();
        harness.scheduler.rebuild_now();
        settle().await;
        assert_eq!(harness.builds(), 2);

        // The pending debounced attempt was dropped.
        sleep_ms(1000).await;
        assert_eq!(harness.builds(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_rebuilds() {
        let files = project(&[("index.js", "")]);
        let harness = Harness::start(&files, SchedulerConfig::default());
        settle().await;

        harness.scheduler.shutdown();
        files.all()[0].set_content("x").unwrap();
        files.add(VirtualFile::new("b.js", "").unwrap());
        sleep_ms(1000).await;

        assert_eq!(harness.builds(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_debounce_window() {
        let files = project(&[("index.js", "")]);
        let config = SchedulerConfig {
            debounce: Duration::from_millis(50),
            ..SchedulerConfig::default()
        };
        let harness = Harness::start(&files, config);
        settle().await;

        files.all()[0].set_content("x").unwrap();
        sleep_ms(51).await;
        settle().await;
        assert_eq!(harness.builds(), 2);
    }

    #[test]
    fn test_stale_result_is_not_displayed() {
        let console = Arc::new(MemoryConsole::new());
        let preview = Arc::new(MemoryPreview::new());
        let display = Display {
            console: console.clone(),
            preview: preview.clone(),
            shown: Mutex::new(0),
            finished: EventChannel::new(),
        };
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        display.finished.on(move |e: &BuildFinished| sink.lock().push(e.generation));

        display.finish(2, BuildOutcome::Failed("newer".into()));
        display.finish(1, BuildOutcome::Failed("older".into()));

        assert_eq!(preview.count(), 1);
        assert_eq!(console.contents(), "newer\n");
        assert_eq!(*seen.lock(), vec![2, 1]);
    }
}
