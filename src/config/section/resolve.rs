//! `[resolve]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [resolve]
//! cdn_origin = "https://cdn.skypack.dev"  # Where bare imports are fetched
//! internal = ["@ix/internal"]              # Specifiers always fetched
//! ```

use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ConfigDiagnostics, FieldPath};
use crate::resolve::{DEFAULT_CDN_ORIGIN, DEFAULT_INTERNAL, ResolveConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveSection {
    pub cdn_origin: String,

    /// Runtime specifiers resolved against the CDN even when a project
    /// file has the same name.
    pub internal: Vec<String>,
}

impl Default for ResolveSection {
    fn default() -> Self {
        Self {
            cdn_origin: DEFAULT_CDN_ORIGIN.to_string(),
            internal: vec![DEFAULT_INTERNAL.to_string()],
        }
    }
}

impl ResolveSection {
    pub const CDN_ORIGIN: FieldPath = FieldPath::new("resolve.cdn_origin");
    pub const INTERNAL: FieldPath = FieldPath::new("resolve.internal");

    fn parse_origin(&self) -> Option<Url> {
        Url::parse(&self.cdn_origin)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"))
    }

    pub fn validate(&self, diag: &mut ConfigDiagnostics) {
        match Url::parse(&self.cdn_origin) {
            Err(e) => diag.error_with_hint(
                Self::CDN_ORIGIN,
                format!("`{}` is not a URL: {e}", self.cdn_origin),
                format!("e.g. \"{DEFAULT_CDN_ORIGIN}\""),
            ),
            Ok(url) if !matches!(url.scheme(), "http" | "https") => diag.error(
                Self::CDN_ORIGIN,
                format!("unsupported scheme `{}`, expected http or https", url.scheme()),
            ),
            Ok(_) => {}
        }
        if self.internal.iter().any(|s| s.trim().is_empty()) {
            diag.error(Self::INTERNAL, "entries must not be empty");
        }
    }

    /// Resolver settings. An unusable origin falls back to the default;
    /// [`validate`](Self::validate) reports it.
    pub fn resolve_config(&self) -> ResolveConfig {
        let defaults = ResolveConfig::default();
        ResolveConfig {
            cdn_origin: self.parse_origin().unwrap_or(defaults.cdn_origin),
            internal: self.internal.clone(),
        }
    }
}
