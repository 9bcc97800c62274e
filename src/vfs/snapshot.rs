//! Versioned JSON form of a project.
//!
//! ```json
//! { "version": 0, "files": [ { "version": 0, "name": "index.js", "content": "" } ] }
//! ```
//!
//! `language` carries only the explicit override and `hidden` is written only
//! when set, so the effective language round-trips exactly.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::file::{FileError, Language, VirtualFile};
use super::store::FileSet;

/// The only schema version this crate reads or writes.
pub const FORMAT_VERSION: u32 = 0;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("unsupported project version {0:?} (expected {FORMAT_VERSION})")]
    UnsupportedVersion(Option<u32>),

    #[error("file `{name}` has unsupported version {version:?} (expected {FORMAT_VERSION})")]
    UnsupportedFileVersion { name: String, version: Option<u32> },

    #[error("invalid project json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    File(#[from] FileError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSnapshot {
    /// Kept optional on read so a missing field is reported, not defaulted.
    pub version: Option<u32>,
    #[serde(default)]
    pub files: Vec<FileSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub version: Option<u32>,
    pub name: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub hidden: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FileSnapshot {
    pub fn of(file: &VirtualFile) -> Self {
        Self {
            version: Some(FORMAT_VERSION),
            name: file.name(),
            content: file.content(),
            language: file.explicit_language(),
            hidden: file.hidden(),
        }
    }

    fn into_file(self) -> Result<VirtualFile, ProjectError> {
        if self.version != Some(FORMAT_VERSION) {
            return Err(ProjectError::UnsupportedFileVersion {
                name: self.name,
                version: self.version,
            });
        }
        Ok(VirtualFile::new(self.name, self.content)?
            .with_language(self.language)
            .with_hidden(self.hidden))
    }
}

impl ProjectSnapshot {
    /// Check versions and build the files, without touching any store.
    pub fn into_files(self) -> Result<Vec<VirtualFile>, ProjectError> {
        if self.version != Some(FORMAT_VERSION) {
            return Err(ProjectError::UnsupportedVersion(self.version));
        }
        self.files.into_iter().map(FileSnapshot::into_file).collect()
    }
}

impl FileSet {
    pub fn to_snapshot(&self) -> ProjectSnapshot {
        ProjectSnapshot {
            version: Some(FORMAT_VERSION),
            files: self.all().iter().map(FileSnapshot::of).collect(),
        }
    }

    /// Build a fresh store. Nothing is created if any entry is rejected.
    pub fn from_snapshot(snapshot: ProjectSnapshot) -> Result<Self, ProjectError> {
        Ok(Self::with_files(snapshot.into_files()?))
    }

    pub fn to_json(&self) -> Result<String, ProjectError> {
        Ok(serde_json::to_string_pretty(&self.to_snapshot())?)
    }

    pub fn from_json(json: &str) -> Result<Self, ProjectError> {
        Self::from_snapshot(serde_json::from_str(json)?)
    }
}

// =============================================================================
// Tests
// =============================================================================
