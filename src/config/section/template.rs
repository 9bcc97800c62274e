//! `[template]` section configuration.
//!
//! `.ix` templates are compiled by an external program that reads the
//! template on stdin and writes a JavaScript module to stdout.
//!
//! # Example
//!
//! ```toml
//! [template]
//! command = ["ixc", "--stdin"]
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::resolve::{CommandCompiler, TemplateCompiler};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateConfig {
    /// Program and arguments; empty means templates cannot be compiled.
    pub command: Vec<String>,
}

impl TemplateConfig {
    pub const COMMAND: FieldPath = FieldPath::new("template.command");

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        let Some(program) = self.command.first() else {
            return;
        };
        if program.trim().is_empty() {
            diag.error(Self::COMMAND, "program name must not be empty");
        } else if which::which(program).is_err() {
            diag.error_with_hint(
                Self::COMMAND,
                format!("`{program}` not found"),
                format!("install the compiler or update {}", Self::COMMAND),
            );
        }
    }

    /// The configured compiler, if any.
    pub fn compiler(&self) -> Option<Arc<dyn TemplateCompiler>> {
        CommandCompiler::from_slice(&self.command)
            .map(|compiler| Arc::new(compiler) as Arc<dyn TemplateCompiler>)
    }
}
