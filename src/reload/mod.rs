//! Live rebuilds: debounce store mutations, build, show the result.

pub mod debouncer;
pub mod scheduler;
pub mod surface;

pub use debouncer::{DEBOUNCE_MS, Debouncer};
pub use scheduler::{
    BuildFinished, BuildOutcome, DEFAULT_ENTRY_PATTERN, MISSING_ENTRY_MESSAGE, RebuildScheduler,
    SchedulerConfig, find_entry,
};
pub use surface::{
    Console, FilePreview, MemoryConsole, MemoryPreview, Preview, TerminalConsole, bundle_document,
    message_document, render_document,
};
