//! Module resolution over the in-memory project.
//!
//! Three namespaces are multiplexed into one resolver:
//!
//! | Import                                  | Resolves to                          |
//! |-----------------------------------------|--------------------------------------|
//! | anything imported *from* a remote module | URL joined against the CDN origin    |
//! | a reserved runtime specifier            | URL joined against the CDN origin    |
//! | an absolute `http(s)` URL               | that URL                             |
//! | anything else                           | the project file with that exact name |
//!
//! Project files ending in the template extension are compiled to JavaScript
//! on load; failures surface as diagnostics tagged with [`PLUGIN_NAME`].

pub mod fetch;
pub mod template;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

pub use fetch::{FetchError, Fetched, HttpFetcher, ModuleFetcher};
pub use template::{
    CommandCompiler, CompilerSetupError, MissingCompiler, TemplateCompiler, TemplateError,
    TemplateErrorKind,
};

use crate::bundle::{Loaded, Loader, Message, ModuleHost, Namespace, ResolveArgs, Resolved};
use crate::vfs::{FileSet, Language, TEMPLATE_EXTENSION};

/// Plugin name attached to diagnostics raised while loading modules.
pub const PLUGIN_NAME: &str = "ix";

pub const DEFAULT_CDN_ORIGIN: &str = "https://cdn.skypack.dev";
pub const DEFAULT_INTERNAL: &str = "@ix/internal";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveConfig {
    pub cdn_origin: Url,
    /// Specifiers always served from the CDN.
    pub internal: Vec<String>,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            cdn_origin: Url::parse(DEFAULT_CDN_ORIGIN).expect("default CDN origin is a valid URL"),
            internal: vec![DEFAULT_INTERNAL.to_string()],
        }
    }
}

fn is_remote(path: &str) -> bool {
    path.starts_with("http://") || path.starts_with("https://")
}

/// Loader for a project file's effective language.
pub fn loader_for_language(language: Option<Language>) -> Loader {
    match language {
        Some(Language::Javascript) => Loader::Js,
        Some(Language::Typescript) => Loader::Ts,
        Some(Language::Html) => Loader::Text,
        Some(Language::Css) => Loader::Css,
        None => Loader::Default,
    }
}

/// Loader for a response `Content-Type` header.
pub fn loader_for_content_type(content_type: Option<&str>) -> Loader {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(str::trim);
    match mime {
        Some("application/javascript") => Loader::Js,
        _ => Loader::Default,
    }
}

/// [`ModuleHost`] over a [`FileSet`].
#[derive(Clone)]
pub struct ProjectHost {
    files: FileSet,
    compiler: Arc<dyn TemplateCompiler>,
    fetcher: Arc<dyn ModuleFetcher>,
    config: Arc<ResolveConfig>,
}

impl ProjectHost {
    pub fn new(
        files: FileSet,
        compiler: Arc<dyn TemplateCompiler>,
        fetcher: Arc<dyn ModuleFetcher>,
        config: Arc<ResolveConfig>,
    ) -> Self {
        Self {
            files,
            compiler,
            fetcher,
            config,
        }
    }

    /// Synchronous part of resolution; exposed for callers without a runtime.
    pub fn resolve_path(&self, args: &ResolveArgs) -> Option<Resolved> {
        if is_remote(&args.importer) || self.config.internal.iter().any(|s| *s == args.path) {
            let url = self.config.cdn_origin.join(&args.path).ok()?;
            return Some(Resolved {
                path: url.to_string(),
                namespace: Namespace::Remote,
            });
        }

        if is_remote(&args.path) {
            return Some(Resolved {
                path: args.path.clone(),
                namespace: Namespace::Remote,
            });
        }

        self.files.find_by_name(&args.path).map(|file| Resolved {
            path: file.name(),
            namespace: Namespace::Project,
        })
    }

    async fn load_project(&self, name: &str) -> Result<Loaded, Message> {
        let file = self.files.find_by_name(name).ok_or_else(|| {
            Message::new(format!("Could not load \"{name}\": no such file in the project"))
                .with_plugin(PLUGIN_NAME)
        })?;

        if file.extension().as_deref() != Some(TEMPLATE_EXTENSION) {
            return Ok(Loaded {
                contents: file.content(),
                loader: loader_for_language(file.language()),
            });
        }

        match self.compiler.compile(&file.content()).await {
            Ok(js) => Ok(Loaded {
                contents: js,
                loader: Loader::Js,
            }),
            Err(error) => {
                crate::debug!("resolve"; "template {} failed: {}", name, error.message);
                let detail = serde_json::to_value(&error).unwrap_or(serde_json::Value::Null);
                Err(Message::new(error.message)
                    .with_plugin(PLUGIN_NAME)
                    .with_detail(detail))
            }
        }
    }

    async fn load_remote(&self, url: &str) -> Result<Loaded, Message> {
        let fetched = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| Message::new(e.to_string()).with_plugin(PLUGIN_NAME))?;
        Ok(Loaded {
            loader: loader_for_content_type(fetched.content_type.as_deref()),
            contents: fetched.contents,
        })
    }
}

#[async_trait]
impl ModuleHost for ProjectHost {
    async fn resolve(&self, args: &ResolveArgs) -> Option<Resolved> {
        let resolved = self.resolve_path(args);
        crate::debug!("resolve"; "{:?} from {:?} -> {:?}", args.path, args.importer, resolved);
        resolved
    }

    async fn load(&self, module: &Resolved) -> Result<Loaded, Message> {
        match module.namespace {
            Namespace::Project => self.load_project(&module.path).await,
            Namespace::Remote => self.load_remote(&module.path).await,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::VirtualFile;
    use parking_lot::Mutex;

    /// Serves canned responses and records requested URLs.
    #[derive(Default)]
    struct FakeFetcher {
        requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ModuleFetcher for FakeFetcher {
        async fn fetch(&self, url: &str) -> Result<Fetched, FetchError> {
            self.requests.lock().push(url.to_string());
            if url.contains("404") {
                return Err(FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                });
            }
            Ok(Fetched {
                contents: "export default 1;".into(),
                content_type: Some("application/javascript; charset=utf-8".into()),
            })
        }
    }

    /// Compiles `<ok>` to a module and rejects everything else.
    struct FakeCompiler;

    #[async_trait]
    impl TemplateCompiler for FakeCompiler {
        async fn initialize(&self) -> Result<(), CompilerSetupError> {
            Ok(())
        }

        async fn compile(&self, source: &str) -> Result<String, TemplateError> {
            if source == "<ok>" {
                Ok("export default 'ok';".into())
            } else {
                Err(TemplateError {
                    kind: TemplateErrorKind::Parse,
                    message: "Unclosed tag".into(),
                    detail: Some(serde_json::json!({ "offset": 1 })),
                })
            }
        }
    }

    fn host(files: &[(&str, &str)]) -> (ProjectHost, Arc<FakeFetcher>) {
        let set = FileSet::with_files(files.iter().map(|(n, c)| VirtualFile::new(*n, *c).unwrap()));
        let fetcher = Arc::new(FakeFetcher::default());
        let host = ProjectHost::new(
            set,
            Arc::new(FakeCompiler),
            fetcher.clone(),
            Arc::new(ResolveConfig::default()),
        );
        (host, fetcher)
    }

    fn args(path: &str, importer: &str) -> ResolveArgs {
        ResolveArgs {
            path: path.into(),
            importer: importer.into(),
        }
    }

    #[test]
    fn test_resolution_rules() {
        let (host, _) = host(&[("main.ix", ""), ("index.js", "")]);

        let project = host.resolve_path(&args("main.ix", "index.js")).unwrap();
        assert_eq!(project.namespace, Namespace::Project);

        let url = host
            .resolve_path(&args("https://esm.sh/x", "index.js"))
            .unwrap();
        assert_eq!((url.path.as_str(), url.namespace), ("https://esm.sh/x", Namespace::Remote));

        let internal = host.resolve_path(&args("@ix/internal", "main.ix")).unwrap();
        assert_eq!(internal.path, "https://cdn.skypack.dev/@ix/internal");

        let nested = host
            .resolve_path(&args("/-/lib@1.0/dist.js", "https://cdn.skypack.dev/lib"))
            .unwrap();
        assert_eq!(nested.path, "https://cdn.skypack.dev/-/lib@1.0/dist.js");

        // A project name imported from a remote module still goes to the CDN.
        let shadowed = host
            .resolve_path(&args("index.js", "https://cdn.skypack.dev/lib"))
            .unwrap();
        assert_eq!(shadowed.namespace, Namespace::Remote);

        assert!(host.resolve_path(&args("missing.js", "index.js")).is_none());
    }

    #[test]
    fn test_loader_mapping() {
        assert_eq!(loader_for_language(Some(Language::Html)), Loader::Text);
        assert_eq!(loader_for_language(None), Loader::Default);
        assert_eq!(loader_for_content_type(Some("application/javascript")), Loader::Js);
        assert_eq!(loader_for_content_type(Some("text/plain")), Loader::Default);
        assert_eq!(loader_for_content_type(None), Loader::Default);
    }

    #[tokio::test]
    async fn test_load_project_file_uses_language() {
        let (host, _) = host(&[("style.css", "p{}")]);
        let resolved = host.resolve(&args("style.css", "")).await.unwrap();
        let loaded = host.load(&resolved).await.unwrap();
        assert_eq!(loaded.loader, Loader::Css);
        assert_eq!(loaded.contents, "p{}");
    }

    #[tokio::test]
    async fn test_load_template() {
        let (host, _) = host(&[("good.ix", "<ok>"), ("bad.ix", "<p")]);

        let good = host.load(&host.resolve_path(&args("good.ix", "")).unwrap()).await.unwrap();
        assert_eq!(good.loader, Loader::Js);
        assert_eq!(good.contents, "export default 'ok';");

        let bad = host
            .load(&host.resolve_path(&args("bad.ix", "")).unwrap())
            .await
            .unwrap_err();
        assert_eq!(bad.plugin_name.as_deref(), Some(PLUGIN_NAME));
        assert_eq!(bad.text, "Unclosed tag");
        assert_eq!(bad.detail.unwrap()["detail"]["offset"], 1);
    }

    #[tokio::test]
    async fn test_load_removed_file() {
        let (host, _) = host(&[("a.js", "")]);
        let resolved = host.resolve_path(&args("a.js", "")).unwrap();
        let file = host.files.find_by_name("a.js").unwrap();
        host.files.remove(&file, true);

        let err = host.load(&resolved).await.unwrap_err();
        assert!(err.text.contains("no such file"));
    }

    #[tokio::test]
    async fn test_load_remote() {
        let (host, fetcher) = host(&[]);
        let ok = host
            .load(&Resolved {
                path: "https://cdn.skypack.dev/lib".into(),
                namespace: Namespace::Remote,
            })
            .await
            .unwrap();
        assert_eq!(ok.loader, Loader::Js);

        let err = host
            .load(&Resolved {
                path: "https://cdn.skypack.dev/404".into(),
                namespace: Namespace::Remote,
            })
            .await
            .unwrap_err();
        assert!(err.text.contains("404"));
        assert_eq!(fetcher.requests.lock().len(), 2);
    }
}
