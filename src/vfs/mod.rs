//! In-memory project model.
//!
//! - [`file`]: one mutable, observable project file
//! - [`store`]: the set of files and its aggregated event streams
//! - [`manager`]: the active-file cursor
//! - [`snapshot`]: the versioned JSON form

pub mod file;
pub mod manager;
pub mod snapshot;
pub mod store;

pub use file::{FileError, FileId, Language, TEMPLATE_EXTENSION, VirtualFile};
pub use manager::{FileManager, ModelError};
pub use snapshot::{FORMAT_VERSION, FileSnapshot, ProjectError, ProjectSnapshot};
pub use store::{FileRemoved, FileSet};
