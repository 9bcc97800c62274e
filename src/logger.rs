//! Logging utilities with colored output and a watch-mode status block.
//!
//! This module provides:
//! - `log!` macro for formatted terminal output with colored prefixes
//! - `debug!` macro, printed only with `--verbose`
//! - `WatchStatus` for the rebuild output shown in watch mode
//!
//! # Example
//!
//! ```ignore
//! log!("build"; "wrote {} bytes", len);
//! debug!("resolve"; "{} -> {}", specifier, path);
//! ```

use crossterm::{
    cursor, execute,
    terminal::{Clear, ClearType},
};
use owo_colors::OwoColorize;
use parking_lot::Mutex;
use std::{
    io::{Write, stdout},
    sync::LazyLock,
    sync::atomic::{AtomicBool, Ordering},
};

/// Global verbose flag (set by --verbose CLI argument)
static VERBOSE: AtomicBool = AtomicBool::new(false);

/// Set verbose mode globally
pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

/// Check if verbose mode is enabled
pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

// ============================================================================
// Log Macro
// ============================================================================

/// Log a message with a colored module prefix
///
/// # Usage
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Log a debug message (only shown when --verbose is enabled)
///
/// # Usage
/// ```ignore
/// debug!("module"; "debug info: {}", value);
/// ```
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Log a message with a colored module prefix
pub fn log(module: &str, message: &str) {
    let module_lower = module.to_ascii_lowercase();
    let prefix = colorize_prefix(module, &module_lower);

    let mut stdout = stdout().lock();
    execute!(stdout, Clear(ClearType::UntilNewLine)).ok();
    writeln!(stdout, "{prefix} {message}").ok();
    stdout.flush().ok();
}

/// Apply color to a module prefix based on module type
#[inline]
fn colorize_prefix(module: &str, module_lower: &str) -> String {
    let prefix = format!("[{module}]");
    match module_lower {
        "watch" => prefix.bright_green().bold().to_string(),
        "build" | "bundle" => prefix.bright_blue().bold().to_string(),
        "error" => prefix.bright_red().bold().to_string(),
        _ => prefix.bright_yellow().bold().to_string(),
    }
}

// ============================================================================
// Watch Status (overwritable output block)
// ============================================================================

/// Number of terminal rows `text` advances the cursor by.
fn rows(text: &str) -> usize {
    text.matches('\n').count()
}

/// Overwritable status block for watch mode
///
/// Everything printed through a `WatchStatus` is erased by the next
/// [`clear`](Self::clear), so each rebuild replaces the previous one's
/// output instead of scrolling.
///
/// # Example
///
/// ```ignore
/// let mut status = WatchStatus::new();
/// status.append("Build finished in 12ms!\n");
/// status.clear();
/// ```
pub struct WatchStatus {
    /// Rows of previous output to clear
    last_lines: usize,
}

/// Global watch status behind the terminal console.
static WATCH_STATUS: LazyLock<Mutex<WatchStatus>> =
    LazyLock::new(|| Mutex::new(WatchStatus::new()));

impl WatchStatus {
    pub const fn new() -> Self {
        Self { last_lines: 0 }
    }

    /// Print raw text as part of the current block.
    pub fn append(&mut self, text: &str) {
        let mut stdout = stdout().lock();
        write!(stdout, "{text}").ok();
        stdout.flush().ok();
        self.last_lines += rows(text);
    }

    /// Erase the block.
    pub fn clear(&mut self) {
        let mut stdout = stdout().lock();
        if self.last_lines > 0 {
            #[allow(clippy::cast_possible_truncation)]
            let lines = self.last_lines.min(u16::MAX as usize) as u16;
            execute!(stdout, cursor::MoveUp(lines)).ok();
        }
        execute!(
            stdout,
            cursor::MoveToColumn(0),
            Clear(ClearType::FromCursorDown)
        )
        .ok();
        stdout.flush().ok();
        self.last_lines = 0;
    }
}

impl Default for WatchStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Global watch status: raw text
pub fn status_append(text: &str) {
    WATCH_STATUS.lock().append(text);
}

/// Global watch status: erase
pub fn status_clear() {
    WATCH_STATUS.lock().clear();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_status_new() {
        let status = WatchStatus::new();
        assert_eq!(status.last_lines, 0);
    }

    #[test]
    fn test_rows() {
        assert_eq!(rows("Build finished in 3ms!"), 0);
        assert_eq!(rows("Build finished in 3ms!\n"), 1);
        assert_eq!(rows("✘ [ERROR] x\n\n    a.js:1:1:\n"), 3);
    }

    #[test]
    fn test_append_counts_rows() {
        let mut status = WatchStatus::new();
        status.append("one\ntwo\n");
        status.append("three");
        assert_eq!(status.last_lines, 2);
        status.clear();
        assert_eq!(status.last_lines, 0);
    }

    #[test]
    fn test_colorize_prefix_keeps_module_name() {
        assert!(colorize_prefix("watch", "watch").contains("[watch]"));
        assert!(colorize_prefix("Resolve", "resolve").contains("[Resolve]"));
    }
}
