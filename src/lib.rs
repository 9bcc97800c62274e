//! Sandpit - an in-browser style playground for `ix` component projects.
//!
//! A project is a set of named in-memory files. Edits to the set trigger a
//! debounced rebuild that bundles the entry file together with its project,
//! template and CDN imports, and shows either the bundle or its diagnostics.
//!
//! | Module    | Purpose                                              |
//! |-----------|------------------------------------------------------|
//! | `event`   | Synchronous event channels and subscriptions          |
//! | `vfs`     | Virtual files, the file set, active file, snapshots   |
//! | `bundle`  | Bundler contract and the built-in module-graph bundler |
//! | `resolve` | Import resolution, template compiling, CDN fetching   |
//! | `build`   | One-shot builds with formatted diagnostics            |
//! | `reload`  | Debounced rebuilds and result display                  |
//! | `project` | Projects stored as directories                        |
//! | `preset`  | Starter project                                       |
//! | `config`  | `sandpit.toml`                                        |
//! | `logger`  | Colored terminal logging                              |

pub mod build;
pub mod bundle;
pub mod config;
pub mod event;
pub mod logger;
pub mod preset;
pub mod project;
pub mod reload;
pub mod resolve;
pub mod vfs;

#[cfg(test)]
mod testing;
