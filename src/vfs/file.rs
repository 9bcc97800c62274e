//! One in-memory project file.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{EventChannel, Subscription};

/// Extension of template-language source files.
pub const TEMPLATE_EXTENSION: &str = ".ix";

static NEXT_FILE_ID: AtomicU64 = AtomicU64::new(1);

// =============================================================================
// Language
// =============================================================================

/// Editor/loader language of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Javascript,
    Typescript,
    Html,
    Css,
}

impl Language {
    /// Map a file extension (with leading dot) to a language.
    pub fn from_extension(ext: Option<&str>) -> Option<Self> {
        match ext? {
            ".js" => Some(Self::Javascript),
            ".ts" => Some(Self::Typescript),
            TEMPLATE_EXTENSION => Some(Self::Html),
            ".css" => Some(Self::Css),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Html => "html",
            Self::Css => "css",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trailing `.ext` of a file name, if the last segment has one.
///
/// `"a/b.js"` → `Some(".js")`, `"Makefile"` → `None`, `"dir.d/file"` → `None`.
pub fn extension(name: &str) -> Option<&str> {
    let dot = name.rfind('.')?;
    let ext = &name[dot..];
    if ext.contains(&['/', '\\'][..]) {
        return None;
    }
    Some(ext)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FileError {
    #[error("file `{0}` has been disposed")]
    Disposed(String),

    #[error("file name must not be empty")]
    EmptyName,
}

// =============================================================================
// VirtualFile
// =============================================================================

/// Opaque identity of a [`VirtualFile`]; never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u64);

impl FileId {
    fn next() -> Self {
        Self(NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct FileState {
    name: String,
    content: String,
    /// Explicit override; the effective language is derived on every read.
    language: Option<Language>,
    hidden: bool,
}

impl FileState {
    fn effective_language(&self) -> Option<Language> {
        self.language
            .or_else(|| Language::from_extension(extension(&self.name)))
    }
}

struct FileInner {
    id: FileId,
    state: RwLock<FileState>,
    disposed: AtomicBool,
    on_rename: EventChannel<String>,
    on_language_change: EventChannel<Option<Language>>,
    on_edit: EventChannel<String>,
    on_visibility_change: EventChannel<bool>,
}

/// Shared handle to one mutable project file.
///
/// Cloning is cheap and yields the same entity; equality and hashing use the
/// entity's [`FileId`], never its name.
#[derive(Clone)]
pub struct VirtualFile {
    inner: Arc<FileInner>,
}

impl VirtualFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Result<Self, FileError> {
        let name = name.into();
        if name.is_empty() {
            return Err(FileError::EmptyName);
        }

        Ok(Self {
            inner: Arc::new(FileInner {
                id: FileId::next(),
                state: RwLock::new(FileState {
                    name,
                    content: content.into(),
                    language: None,
                    hidden: false,
                }),
                disposed: AtomicBool::new(false),
                on_rename: EventChannel::new(),
                on_language_change: EventChannel::new(),
                on_edit: EventChannel::new(),
                on_visibility_change: EventChannel::new(),
            }),
        })
    }

    /// Set the explicit language before the file is shared (no event).
    pub fn with_language(self, language: Option<Language>) -> Self {
        self.inner.state.write().language = language;
        self
    }

    /// Set the hidden flag before the file is shared (no event).
    pub fn with_hidden(self, hidden: bool) -> Self {
        self.inner.state.write().hidden = hidden;
        self
    }

    pub fn id(&self) -> FileId {
        self.inner.id
    }

    pub fn name(&self) -> String {
        self.inner.state.read().name.clone()
    }

    /// Compare the name without cloning it.
    pub fn has_name(&self, name: &str) -> bool {
        self.inner.state.read().name == name
    }

    pub fn content(&self) -> String {
        self.inner.state.read().content.clone()
    }

    pub fn hidden(&self) -> bool {
        self.inner.state.read().hidden
    }

    /// Effective language: the explicit override, else the extension mapping.
    pub fn language(&self) -> Option<Language> {
        self.inner.state.read().effective_language()
    }

    /// The explicit override only.
    pub fn explicit_language(&self) -> Option<Language> {
        self.inner.state.read().language
    }

    pub fn extension(&self) -> Option<String> {
        extension(&self.inner.state.read().name).map(str::to_owned)
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Rename; emits rename, then language-change if the effective language moved.
    pub fn set_name(&self, name: impl Into<String>) -> Result<(), FileError> {
        self.ensure_live()?;
        let name = name.into();
        if name.is_empty() {
            return Err(FileError::EmptyName);
        }

        let (before, after) = {
            let mut state = self.inner.state.write();
            let before = state.effective_language();
            state.name = name.clone();
            (before, state.effective_language())
        };

        self.inner.on_rename.emit(&name);
        if before != after {
            self.inner.on_language_change.emit(&after);
        }
        Ok(())
    }

    pub fn set_content(&self, content: impl Into<String>) -> Result<(), FileError> {
        self.ensure_live()?;
        let content = content.into();
        self.inner.state.write().content = content.clone();
        self.inner.on_edit.emit(&content);
        Ok(())
    }

    /// Set or clear the explicit language; emits the new effective language.
    pub fn set_language(&self, language: Option<Language>) -> Result<(), FileError> {
        self.ensure_live()?;
        let effective = {
            let mut state = self.inner.state.write();
            state.language = language;
            state.effective_language()
        };
        self.inner.on_language_change.emit(&effective);
        Ok(())
    }

    pub fn set_hidden(&self, hidden: bool) -> Result<(), FileError> {
        self.ensure_live()?;
        self.inner.state.write().hidden = hidden;
        self.inner.on_visibility_change.emit(&hidden);
        Ok(())
    }

    pub fn on_renamed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.on_rename.on(move |name: &String| listener(name.as_str()))
    }

    pub fn on_language_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Option<Language>) + Send + Sync + 'static,
    {
        self.inner
            .on_language_change
            .on(move |language: &Option<Language>| listener(*language))
    }

    pub fn on_edited<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.inner.on_edit.on(move |content: &String| listener(content.as_str()))
    }

    pub fn on_visibility_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner
            .on_visibility_change
            .on(move |hidden: &bool| listener(*hidden))
    }

    /// Release every listener registration. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.on_rename.teardown();
        self.inner.on_language_change.teardown();
        self.inner.on_edit.teardown();
        self.inner.on_visibility_change.teardown();
    }

    fn ensure_live(&self) -> Result<(), FileError> {
        if self.is_disposed() {
            return Err(FileError::Disposed(self.name()));
        }
        Ok(())
    }
}

impl PartialEq for VirtualFile {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for VirtualFile {}

impl Hash for VirtualFile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for VirtualFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("VirtualFile")
            .field("id", &self.inner.id)
            .field("name", &state.name)
            .field("language", &state.effective_language())
            .field("hidden", &state.hidden)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
