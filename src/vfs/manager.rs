//! Active-file cursor on top of a [`FileSet`].

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use super::file::{FileError, VirtualFile};
use super::store::FileSet;
use crate::event::{EventChannel, Subscription};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("`{0}` is not a member of this project")]
    NotAMember(String),

    #[error(transparent)]
    File(#[from] FileError),
}

struct ActiveState {
    active: RwLock<Option<VirtualFile>>,
    on_changed: EventChannel<Option<VirtualFile>>,
}

impl ActiveState {
    fn replace(&self, file: Option<VirtualFile>) {
        *self.active.write() = file.clone();
        self.on_changed.emit(&file);
    }
}

/// A [`FileSet`] plus the editor's "currently selected file".
///
/// Removing the active file from the store clears the cursor and emits an
/// active-changed notification with `None`.
#[derive(Clone)]
pub struct FileManager {
    files: FileSet,
    state: Arc<ActiveState>,
    removal: Arc<Subscription>,
}

impl FileManager {
    pub fn new(files: FileSet) -> Self {
        let state = Arc::new(ActiveState {
            active: RwLock::new(None),
            on_changed: EventChannel::new(),
        });

        let weak = Arc::downgrade(&state);
        let removal = files.on_file_removed(move |file, _| {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let is_active = state.active.read().as_ref() == Some(file);
            if is_active {
                state.replace(None);
            }
        });

        Self {
            files,
            state,
            removal: Arc::new(removal),
        }
    }

    pub fn files(&self) -> &FileSet {
        &self.files
    }

    pub fn active(&self) -> Option<VirtualFile> {
        self.state.active.read().clone()
    }

    /// Move the cursor; `file` must be a member (or `None`).
    pub fn set_active(&self, file: Option<VirtualFile>) -> Result<(), ModelError> {
        if let Some(file) = &file
            && !self.files.contains(file)
        {
            return Err(ModelError::NotAMember(file.name()));
        }
        self.state.replace(file);
        Ok(())
    }

    /// Select the first member named `name`.
    pub fn activate_by_name(&self, name: &str) -> Result<VirtualFile, ModelError> {
        let file = self
            .files
            .find_by_name(name)
            .ok_or_else(|| ModelError::NotAMember(name.to_string()))?;
        self.state.replace(Some(file.clone()));
        Ok(file)
    }

    pub fn on_active_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(Option<&VirtualFile>) + Send + Sync + 'static,
    {
        self.state
            .on_changed
            .on(move |file: &Option<VirtualFile>| listener(file.as_ref()))
    }

    /// Dispose the store and release the cursor.
    pub fn dispose(&self) {
        self.removal.revoke();
        self.state.on_changed.teardown();
        *self.state.active.write() = None;
        self.files.dispose();
    }
}

impl Deref for FileManager {
    type Target = FileSet;

    fn deref(&self) -> &FileSet {
        &self.files
    }
}

// =============================================================================
// Tests
// =============================================================================
