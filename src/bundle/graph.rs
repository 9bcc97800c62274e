//! Built-in bundler: walks the module graph and emits one IIFE.
//!
//! ```text
//! entry ─► resolve ─► load ─► loader ─► scan imports ─► resolve each ─► …
//!                                   └─► rewrite into `function (__exports) { … }`
//! ```
//!
//! Modules get registry ids in discovery order (the entry is `0`). The emitted
//! bundle is
//!
//! ```text
//! (() => {
//!   <runtime: __require / __import / __export / __reexport>
//!   var __modules = [ function (__exports) { … }, … ];
//!   __require(0);
//! })();
//! ```
//!
//! `__require` caches a module's exports object before running its body, so
//! import cycles terminate and see the getters registered so far.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use super::scan::{self, ImportRecord};
use super::{
    BundleError, BundleOptions, BundleOutput, Bundler, Loader, Location, LogLevel, Message,
    ModuleHost, ResolveArgs, Resolved,
};
use crate::vfs::file::extension;

const RUNTIME: &str = r#"  var __cache = {};
  function __require(id) {
    var cached = __cache[id];
    if (cached) return cached;
    var exports = __cache[id] = {};
    __modules[id](exports);
    return exports;
  }
  function __import(id) {
    return Promise.resolve().then(function () { return __require(id); });
  }
  function __export(target, getters) {
    for (var name in getters)
      Object.defineProperty(target, name, { get: getters[name], enumerable: true, configurable: true });
  }
  function __reexport(target, source) {
    Object.keys(source).forEach(function (name) {
      if (name === "default" || Object.prototype.hasOwnProperty.call(target, name)) return;
      Object.defineProperty(target, name, { get: function () { return source[name]; }, enumerable: true, configurable: true });
    });
  }
"#;

/// ES module bundler over oxc-parsed modules.
#[derive(Debug, Default)]
pub struct GraphBundler {
    initialized: AtomicBool,
}

impl GraphBundler {
    pub fn new() -> Self {
        Self::default()
    }
}

struct Module {
    resolved: Resolved,
    body: Option<String>,
}

/// Per-build state.
#[derive(Default)]
struct Graph {
    modules: Vec<Module>,
    index: FxHashMap<Resolved, usize>,
    queue: VecDeque<usize>,
    errors: Vec<Message>,
    warnings: Vec<Message>,
}

impl Graph {
    /// Registry id for `resolved`, queueing it for loading when new.
    fn intern(&mut self, resolved: Resolved) -> usize {
        if let Some(&id) = self.index.get(&resolved) {
            return id;
        }
        let id = self.modules.len();
        self.index.insert(resolved.clone(), id);
        self.modules.push(Module { resolved, body: None });
        self.queue.push_back(id);
        id
    }

    fn render(&self) -> String {
        let mut out = String::from("(() => {\n");
        out.push_str(RUNTIME);
        out.push_str("  var __modules = [\n");
        for module in &self.modules {
            out.push_str(&format!("    // {}\n    function (__exports) {{\n", module.resolved));
            out.push_str(module.body.as_deref().unwrap_or_default());
            out.push_str("\n    },\n");
        }
        out.push_str("  ];\n  __require(0);\n})();\n");
        out
    }
}

fn unresolved(specifier: &str) -> Message {
    Message::new(format!("Could not resolve \"{specifier}\""))
}

fn import_location(importer: &str, record: &ImportRecord) -> Location {
    // Point at the quoted specifier.
    Location {
        file: importer.to_string(),
        line: record.line,
        column: record.column.saturating_sub(1),
        length: record.specifier.chars().count() + 2,
        line_text: record.line_text.clone(),
    }
}

/// Loader for `Loader::Default`, from the path's extension.
fn infer_loader(path: &str) -> Result<Loader, Message> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    match extension(path) {
        Some(ext) => Loader::for_extension(ext)
            .ok_or_else(|| Message::new(format!("No loader is configured for \"{ext}\" files: {path}"))),
        None => Err(Message::new(format!("Do not know how to load path: {path}"))),
    }
}

fn string_literal(contents: &str) -> Result<String, Message> {
    serde_json::to_string(contents).map_err(|e| Message::new(format!("Could not encode contents: {e}")))
}

impl GraphBundler {
    async fn build_module(
        &self,
        graph: &mut Graph,
        id: usize,
        host: &dyn ModuleHost,
    ) -> Result<String, Message> {
        let resolved = graph.modules[id].resolved.clone();
        let loaded = host.load(&resolved).await?;
        let loader = match loaded.loader {
            Loader::Default => infer_loader(&resolved.path)?,
            loader => loader,
        };

        match loader {
            Loader::Js | Loader::Ts | Loader::Default => {
                let syntax = scan::scan(&resolved.path, &loaded.contents, loader)?;
                let mut ids = Vec::with_capacity(syntax.imports.len());
                for record in &syntax.imports {
                    let args = ResolveArgs {
                        path: record.specifier.clone(),
                        importer: resolved.path.clone(),
                    };
                    match host.resolve(&args).await {
                        Some(target) => ids.push(Some(graph.intern(target))),
                        None => {
                            graph.errors.push(
                                unresolved(&record.specifier)
                                    .with_location(import_location(&resolved.path, record)),
                            );
                            ids.push(None);
                        }
                    }
                }
                Ok(scan::rewrite(&syntax, &ids))
            }
            Loader::Css => {
                if loaded.contents.contains("@import") {
                    graph.warnings.push(Message::new(format!(
                        "@import rules in \"{}\" are not bundled",
                        resolved.path
                    )));
                }
                Ok(format!(
                    "var __style = document.createElement(\"style\");\n__style.textContent = {};\ndocument.head.appendChild(__style);",
                    string_literal(&loaded.contents)?
                ))
            }
            Loader::Text => Ok(format!(
                "__exports.default = {};",
                string_literal(&loaded.contents)?
            )),
            Loader::Json => {
                let value: serde_json::Value = serde_json::from_str(&loaded.contents).map_err(|e| {
                    Message::new(format!("Malformed JSON in \"{}\": {e}", resolved.path))
                })?;
                Ok(format!("__exports.default = {value};"))
            }
        }
    }
}

#[async_trait]
impl Bundler for GraphBundler {
    async fn initialize(&self) -> Result<(), BundleError> {
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    async fn bundle(
        &self,
        options: &BundleOptions,
        host: &dyn ModuleHost,
    ) -> Result<BundleOutput, BundleError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(BundleError::NotInitialized);
        }
        let entry = match options.entry_points.as_slice() {
            [] => return Err(BundleError::NoEntryPoint),
            [entry] => entry,
            many => return Err(BundleError::TooManyEntryPoints(many.len())),
        };

        let mut graph = Graph::default();
        let args = ResolveArgs {
            path: entry.clone(),
            importer: String::new(),
        };
        match host.resolve(&args).await {
            Some(resolved) => {
                graph.intern(resolved);
            }
            None => graph.errors.push(unresolved(entry)),
        }

        while let Some(id) = graph.queue.pop_front() {
            match self.build_module(&mut graph, id, host).await {
                Ok(body) => graph.modules[id].body = Some(body),
                Err(message) => graph.errors.push(message),
            }
        }

        if options.log_level == LogLevel::Info {
            for message in &graph.errors {
                crate::log!("bundle"; "error: {}", message.text);
            }
            for message in &graph.warnings {
                crate::log!("bundle"; "warning: {}", message.text);
            }
        }
        crate::debug!("bundle"; "{} module(s), {} error(s)", graph.modules.len(), graph.errors.len());

        let text = if graph.errors.is_empty() {
            graph.render()
        } else {
            String::new()
        };
        Ok(BundleOutput {
            text,
            errors: graph.errors,
            warnings: graph.warnings,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
