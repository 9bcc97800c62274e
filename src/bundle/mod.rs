//! Bundler interface and the built-in module-graph engine.
//!
//! The build pipeline talks to a [`Bundler`] and hands it a [`ModuleHost`]
//! that answers two questions for every import:
//!
//! ```text
//! resolve(specifier, importer) ──► Resolved { path, namespace } | unresolved
//! load(Resolved)               ──► Loaded { contents, loader } | Message
//! ```
//!
//! Per-module problems travel as [`Message`] diagnostics inside
//! [`BundleOutput`]; only failures that prevent bundling altogether are a
//! [`BundleError`].

pub mod format;
pub mod graph;
pub mod scan;

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

pub use format::format_messages;
pub use graph::GraphBundler;

// =============================================================================
// Module host
// =============================================================================

/// Where a resolved module lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// A file of the in-memory project, addressed by exact name.
    Project,
    /// An absolute `http(s)` URL.
    Remote,
}

impl Namespace {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Remote => "remote",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One import to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveArgs {
    /// The specifier as written in the source.
    pub path: String,
    /// Path of the importing module; empty for entry points.
    pub importer: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resolved {
    pub path: String,
    pub namespace: Namespace,
}

impl fmt::Display for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.path)
    }
}

/// How loaded contents are turned into a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Loader {
    Js,
    Ts,
    Css,
    Text,
    Json,
    /// Inferred from the module path's extension.
    Default,
}

impl Loader {
    /// Loader for a path extension such as `.js`; `None` when nothing fits.
    pub fn for_extension(ext: &str) -> Option<Self> {
        match ext {
            ".js" | ".mjs" | ".cjs" | ".jsx" => Some(Self::Js),
            ".ts" | ".mts" | ".cts" | ".tsx" => Some(Self::Ts),
            ".css" => Some(Self::Css),
            ".json" => Some(Self::Json),
            ".txt" | ".html" | ".htm" | ".svg" | ".md" => Some(Self::Text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub contents: String,
    pub loader: Loader,
}

/// Resolve/load hooks a bundler calls while walking the module graph.
#[async_trait]
pub trait ModuleHost: Send + Sync {
    /// `None` leaves the import unresolved; the bundler reports it.
    async fn resolve(&self, args: &ResolveArgs) -> Option<Resolved>;

    async fn load(&self, module: &Resolved) -> Result<Loaded, Message>;
}

// =============================================================================
// Diagnostics
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Error,
    Warning,
}

/// Source position of a diagnostic. `line` is 1-based, `column` 0-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub length: usize,
    pub line_text: String,
}

/// A structured bundler diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub text: String,
    pub plugin_name: Option<String>,
    pub location: Option<Location>,
    /// Extra payload from a plugin, e.g. a compiler's error object.
    pub detail: Option<serde_json::Value>,
}

impl Message {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            plugin_name: None,
            location: None,
            detail: None,
        }
    }

    pub fn with_plugin(mut self, name: impl Into<String>) -> Self {
        self.plugin_name = Some(name.into());
        self
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

// =============================================================================
// Bundler
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Diagnostics are only returned, never printed.
    #[default]
    Silent,
    /// Diagnostics are also logged as they are found.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BundleOptions {
    pub entry_points: Vec<String>,
    pub log_level: LogLevel,
}

impl BundleOptions {
    pub fn entry(entry: impl Into<String>) -> Self {
        Self {
            entry_points: vec![entry.into()],
            log_level: LogLevel::Silent,
        }
    }
}

/// Result of one bundling pass. `text` is empty whenever `errors` is not.
#[derive(Debug, Clone, Default)]
pub struct BundleOutput {
    pub text: String,
    pub errors: Vec<Message>,
    pub warnings: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BundleError {
    #[error("no entry point given")]
    NoEntryPoint,

    #[error("only one entry point is supported, got {0}")]
    TooManyEntryPoints(usize),

    #[error("bundler is not initialized")]
    NotInitialized,

    #[error("bundler failed: {0}")]
    Engine(String),
}

#[async_trait]
pub trait Bundler: Send + Sync {
    /// Prepare the engine. Called once before the first `bundle`.
    async fn initialize(&self) -> Result<(), BundleError>;

    async fn bundle(
        &self,
        options: &BundleOptions,
        host: &dyn ModuleHost,
    ) -> Result<BundleOutput, BundleError>;

    /// Render diagnostics as human-readable text, one string per message.
    fn format_messages(&self, messages: &[Message], kind: MessageKind, color: bool) -> Vec<String> {
        format_messages(messages, kind, color)
    }
}
