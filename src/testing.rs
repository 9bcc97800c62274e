//! Offline stand-ins for the build pipeline's external tools.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::build::Builder;
use crate::bundle::GraphBundler;
use crate::resolve::{
    CompilerSetupError, FetchError, Fetched, ModuleFetcher, ResolveConfig, TemplateCompiler,
    TemplateError, TemplateErrorKind,
};
use crate::vfs::{FileSet, VirtualFile};

/// Accepts templates that start with `<` and end with `>`, emitting a module
/// that exports the markup; rejects anything else.
#[derive(Default)]
pub struct FakeCompiler {
    pub initialized: AtomicUsize,
    /// Number of leading `initialize` calls that fail.
    pub failures: AtomicUsize,
}

#[async_trait]
impl TemplateCompiler for FakeCompiler {
    async fn initialize(&self) -> Result<(), CompilerSetupError> {
        self.initialized.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(CompilerSetupError::NotFound("fake".into()));
        }
        Ok(())
    }

    async fn compile(&self, source: &str) -> Result<String, TemplateError> {
        let trimmed = source.trim();
        if trimmed.starts_with('<') && trimmed.ends_with('>') {
            let markup = serde_json::to_string(trimmed).unwrap();
            Ok(format!("export default {markup};"))
        } else {
            Err(TemplateError {
                kind: TemplateErrorKind::Parse,
                message: "Expected closing `>`".into(),
                detail: None,
            })
        }
    }
}

/// Fetcher for tests that never go online.
#[derive(Default)]
pub struct OfflineFetcher;

#[async_trait]
impl ModuleFetcher for OfflineFetcher {
    async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
        Err(FetchError::Transport {
            url: url.to_string(),
            message: "offline".into(),
        })
    }
}

pub fn builder_with(compiler: Arc<FakeCompiler>) -> Builder {
    Builder::new(
        Arc::new(GraphBundler::new()),
        compiler,
        Arc::new(OfflineFetcher),
        ResolveConfig::default(),
    )
}

pub fn builder() -> Builder {
    builder_with(Arc::new(FakeCompiler::default()))
}

pub fn project(files: &[(&str, &str)]) -> FileSet {
    FileSet::with_files(
        files
            .iter()
            .map(|(name, content)| VirtualFile::new(*name, *content).unwrap()),
    )
}
