//! Build orchestration: one entry file in, one bundle (or diagnostics) out.
//!
//! ```text
//! Builder::build(entry, files)
//!     ├── initialize bundler + template compiler (once, shared)
//!     ├── bundle via ProjectHost   (timed)
//!     └── format diagnostics       → BuildResult
//! ```
//!
//! Every build starts from scratch; nothing is cached between builds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::sync::OnceCell;

use crate::bundle::{BundleError, BundleOptions, Bundler, GraphBundler, MessageKind};
use crate::resolve::{
    HttpFetcher, MissingCompiler, ModuleFetcher, ProjectHost, ResolveConfig, TemplateCompiler,
};
use crate::vfs::FileSet;

#[derive(Debug, Error)]
pub enum BuildError {
    #[error("failed to initialize build tools: {0}")]
    Init(String),

    #[error(transparent)]
    Bundle(#[from] BundleError),
}

/// Outcome of one successful bundler run. Diagnostics are already formatted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// Empty whenever `errors` is non-empty.
    pub bundle: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl BuildResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed.as_millis()
    }
}

/// Builds bundles for a project. Tools are initialized on first use.
pub struct Builder {
    bundler: Arc<dyn Bundler>,
    compiler: Arc<dyn TemplateCompiler>,
    fetcher: Arc<dyn ModuleFetcher>,
    resolve: Arc<ResolveConfig>,
    color: bool,
    init: OnceCell<()>,
}

impl Builder {
    pub fn new(
        bundler: Arc<dyn Bundler>,
        compiler: Arc<dyn TemplateCompiler>,
        fetcher: Arc<dyn ModuleFetcher>,
        resolve: ResolveConfig,
    ) -> Self {
        Self {
            bundler,
            compiler,
            fetcher,
            resolve: Arc::new(resolve),
            color: false,
            init: OnceCell::new(),
        }
    }

    /// Built-in bundler, HTTP fetching and the given (or no) template compiler.
    pub fn with_defaults(
        compiler: Option<Arc<dyn TemplateCompiler>>,
        resolve: ResolveConfig,
    ) -> Result<Self, BuildError> {
        let fetcher = HttpFetcher::new().map_err(|e| BuildError::Init(e.to_string()))?;
        let compiler = compiler.unwrap_or_else(|| Arc::new(MissingCompiler));
        Ok(Self::new(
            Arc::new(GraphBundler::new()),
            compiler,
            Arc::new(fetcher),
            resolve,
        ))
    }

    /// ANSI colors in formatted diagnostics.
    pub fn color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Initialize both tools. Concurrent callers share one attempt; a failed
    /// attempt is retried by the next caller.
    pub async fn initialize(&self) -> Result<(), BuildError> {
        self.init
            .get_or_try_init(|| async {
                let bundler = async {
                    self.bundler
                        .initialize()
                        .await
                        .map_err(|e| BuildError::Init(e.to_string()))
                };
                let compiler = async {
                    self.compiler
                        .initialize()
                        .await
                        .map_err(|e| BuildError::Init(e.to_string()))
                };
                tokio::try_join!(bundler, compiler)?;
                crate::debug!("build"; "tools initialized");
                Ok::<(), BuildError>(())
            })
            .await?;
        Ok(())
    }

    /// Bundle `entry` against the current contents of `files`.
    pub async fn build(&self, entry: &str, files: &FileSet) -> Result<BuildResult, BuildError> {
        self.initialize().await?;

        let host = ProjectHost::new(
            files.clone(),
            Arc::clone(&self.compiler),
            Arc::clone(&self.fetcher),
            Arc::clone(&self.resolve),
        );

        let start = Instant::now();
        let output = self
            .bundler
            .bundle(&BundleOptions::entry(entry), &host)
            .await?;
        let elapsed = start.elapsed();

        let errors = self
            .bundler
            .format_messages(&output.errors, MessageKind::Error, self.color);
        let warnings = self
            .bundler
            .format_messages(&output.warnings, MessageKind::Warning, self.color);

        crate::debug!(
            "build";
            "{} in {:?}: {} error(s), {} warning(s)",
            entry, elapsed, errors.len(), warnings.len()
        );

        Ok(BuildResult {
            bundle: output.text,
            errors,
            warnings,
            elapsed,
        })
    }
}
