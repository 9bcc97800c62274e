//! Where build results are shown: a console for text and a preview for the
//! rendered document.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use parking_lot::Mutex;
use regex::Regex;

/// Text output attached to the preview.
pub trait Console: Send + Sync {
    fn write(&self, data: &str);

    fn writeln(&self, data: &str) {
        self.write(data);
        self.write("\n");
    }

    fn clear(&self);
}

/// Isolated surface that runs a generated document.
pub trait Preview: Send + Sync {
    fn show(&self, document: &str);
}

// =============================================================================
// Documents
// =============================================================================

/// Minimal HTML document around `head` and `body` fragments.
pub fn render_document(head: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"UTF-8\" />{head}</head><body>{body}</body></html>"
    )
}

/// Document that runs `bundle` as a module script.
pub fn bundle_document(bundle: &str) -> String {
    render_document(&format!("<script defer type=\"module\">{bundle}</script>"), "")
}

/// Document showing `text` verbatim, e.g. diagnostics.
pub fn message_document(text: &str) -> String {
    render_document("", &format!("<pre>{}</pre>", escape_html(&strip_ansi(text))))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

/// Remove ANSI SGR color sequences.
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    static ANSI: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ANSI pattern"));
    ANSI.replace_all(text, "")
}

// =============================================================================
// Terminal
// =============================================================================

/// Console on the process's terminal; `clear` erases what it printed last.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConsole;

impl Console for TerminalConsole {
    fn write(&self, data: &str) {
        crate::logger::status_append(data);
    }

    fn clear(&self) {
        crate::logger::status_clear();
    }
}

/// Preview that writes each document to a file.
#[derive(Debug, Clone)]
pub struct FilePreview {
    path: PathBuf,
}

impl FilePreview {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Preview for FilePreview {
    fn show(&self, document: &str) {
        if let Some(parent) = self.path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            crate::log!("preview"; "cannot create {}: {}", parent.display(), e);
            return;
        }
        if let Err(e) = std::fs::write(&self.path, document) {
            crate::log!("preview"; "cannot write {}: {}", self.path.display(), e);
        }
    }
}

// =============================================================================
// In-memory
// =============================================================================

/// Console that records its output.
#[derive(Debug, Default)]
pub struct MemoryConsole {
    buffer: Mutex<String>,
    clears: Mutex<usize>,
}

impl MemoryConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Text written since the last clear.
    pub fn contents(&self) -> String {
        self.buffer.lock().clone()
    }

    pub fn clear_count(&self) -> usize {
        *self.clears.lock()
    }
}

impl Console for MemoryConsole {
    fn write(&self, data: &str) {
        self.buffer.lock().push_str(data);
    }

    fn clear(&self) {
        self.buffer.lock().clear();
        *self.clears.lock() += 1;
    }
}

/// Preview that keeps every document it was shown.
#[derive(Debug, Default)]
pub struct MemoryPreview {
    documents: Mutex<Vec<String>>,
}

impl MemoryPreview {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<String> {
        self.documents.lock().last().cloned()
    }

    pub fn count(&self) -> usize {
        self.documents.lock().len()
    }
}

impl Preview for MemoryPreview {
    fn show(&self, document: &str) {
        self.documents.lock().push(document.to_string());
    }
}
