//! Template-language compiler adapters.
//!
//! A [`TemplateCompiler`] turns one `.ix` source into JavaScript. The shipped
//! [`CommandCompiler`] pipes the source through an external executable:
//!
//! ```text
//! stdin  ◄── template source
//! stdout ──► JavaScript            (exit status 0)
//! stderr ──► {"kind","message","detail"} JSON, or plain text  (non-zero)
//! ```

use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateErrorKind {
    Parse,
    Compile,
}

/// Structured compiler failure, forwarded into the bundle diagnostics.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct TemplateError {
    pub kind: TemplateErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl TemplateError {
    pub fn compile(message: impl Into<String>) -> Self {
        Self {
            kind: TemplateErrorKind::Compile,
            message: message.into(),
            detail: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompilerSetupError {
    #[error("template compiler `{0}` not found in PATH")]
    NotFound(String),
}

#[async_trait]
pub trait TemplateCompiler: Send + Sync {
    /// Prepare the compiler. Called once before the first `compile`.
    async fn initialize(&self) -> Result<(), CompilerSetupError>;

    async fn compile(&self, source: &str) -> Result<String, TemplateError>;
}

// =============================================================================
// MissingCompiler
// =============================================================================

/// Stand-in when no compiler is configured; every template fails to compile.
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingCompiler;

#[async_trait]
impl TemplateCompiler for MissingCompiler {
    async fn initialize(&self) -> Result<(), CompilerSetupError> {
        Ok(())
    }

    async fn compile(&self, _source: &str) -> Result<String, TemplateError> {
        Err(TemplateError::compile(
            "no template compiler configured (set `[template] command` in sandpit.toml)",
        ))
    }
}

// =============================================================================
// CommandCompiler
// =============================================================================

/// Compiler backed by an external executable.
#[derive(Debug, Clone)]
pub struct CommandCompiler {
    program: String,
    args: Vec<String>,
}

impl CommandCompiler {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// From a command array such as `["ixc", "--stdin"]`; `None` when empty.
    pub fn from_slice<S: AsRef<str>>(command: &[S]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.as_ref().to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
        })
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

/// Interpret a failed run's stderr.
fn parse_failure(stderr: &str, status: std::process::ExitStatus) -> TemplateError {
    let stderr = stderr.trim();
    if let Ok(error) = serde_json::from_str::<TemplateError>(stderr) {
        return error;
    }
    if stderr.is_empty() {
        TemplateError::compile(format!("template compiler exited with {status}"))
    } else {
        TemplateError::compile(stderr)
    }
}

#[async_trait]
impl TemplateCompiler for CommandCompiler {
    async fn initialize(&self) -> Result<(), CompilerSetupError> {
        which::which(&self.program)
            .map(|path| crate::debug!("template"; "using {}", path.display()))
            .map_err(|_| CompilerSetupError::NotFound(self.program.clone()))
    }

    async fn compile(&self, source: &str) -> Result<String, TemplateError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TemplateError::compile(format!("failed to run `{}`: {e}", self.program)))?;

        // Feed stdin concurrently so a chatty compiler cannot block on a full pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let source = source.to_owned();
            tokio::spawn(async move {
                let _ = stdin.write_all(source.as_bytes()).await;
            })
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| TemplateError::compile(format!("failed to run `{}`: {e}", self.program)))?;
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            Err(parse_failure(&String::from_utf8_lossy(&output.stderr), output.status))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[test]
    fn test_from_slice() {
        let compiler = CommandCompiler::from_slice(&["ixc", "--stdin"]).unwrap();
        assert_eq!(compiler.program(), "ixc");
        assert_eq!(compiler.args, vec!["--stdin"]);
        assert!(CommandCompiler::from_slice::<&str>(&[]).is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_failure_json() {
        let stderr = r#"{"kind":"parse","message":"Unexpected '<'","detail":{"line":2}}"#;
        let error = parse_failure(stderr, exit_status(1));
        assert_eq!(error.kind, TemplateErrorKind::Parse);
        assert_eq!(error.message, "Unexpected '<'");
        assert_eq!(error.detail, Some(serde_json::json!({ "line": 2 })));
    }

    #[cfg(unix)]
    #[test]
    fn test_parse_failure_plain() {
        let error = parse_failure("  boom\n", exit_status(1));
        assert_eq!(error, TemplateError::compile("boom"));

        let error = parse_failure("", exit_status(3));
        assert!(error.message.starts_with("template compiler exited with"));
    }

    #[tokio::test]
    async fn test_missing_compiler() {
        let compiler = MissingCompiler;
        compiler.initialize().await.unwrap();
        let err = compiler.compile("<p/>").await.unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Compile);
    }

    #[tokio::test]
    async fn test_initialize_unknown_program() {
        let compiler = CommandCompiler::new("sandpit-no-such-compiler-xyz");
        assert_eq!(
            compiler.initialize().await.unwrap_err(),
            CompilerSetupError::NotFound("sandpit-no-such-compiler-xyz".into())
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compile_through_cat() {
        // `cat` echoes the source, standing in for a compiler.
        let compiler = CommandCompiler::new("cat");
        compiler.initialize().await.unwrap();
        assert_eq!(compiler.compile("export default 1;").await.unwrap(), "export default 1;");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_compile_failure_from_stderr() {
        let compiler = CommandCompiler::new("sh")
            .arg("-c")
            .arg(r#"cat >/dev/null; echo '{"kind":"parse","message":"bad tag"}' >&2; exit 1"#);
        let err = compiler.compile("<p").await.unwrap_err();
        assert_eq!(err.kind, TemplateErrorKind::Parse);
        assert_eq!(err.message, "bad tag");
    }
}
