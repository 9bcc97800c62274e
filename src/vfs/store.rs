//! The unordered collection owning every project file.
//!
//! Besides direct `added`/`removed` streams, the store offers *aggregated*
//! per-file streams (`on_file_edited`, `on_file_renamed`, ...). An aggregate
//! subscription spans every current and future member:
//!
//! ```text
//! on_each_file(cb)
//!   ├── hook "added"   → links[file.id] = cb(file)
//!   ├── hook "removed" → links.remove(file.id).revoke()
//!   └── for current members: links[file.id] = cb(file)
//!
//! revoke() → unhook added/removed, revoke every link, clear the registry
//! ```
//!
//! Iteration order is insertion order, which makes `find` deterministic.

use std::sync::{Arc, Weak};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;

use super::file::{FileId, Language, VirtualFile};
use crate::event::{EventChannel, Subscription};

/// Payload of the store-level "removed" event.
#[derive(Debug, Clone)]
pub struct FileRemoved {
    pub file: VirtualFile,
    /// Whether the store disposed the entity as part of the removal.
    pub disposed: bool,
}

struct FileSetInner {
    files: RwLock<Vec<VirtualFile>>,
    on_added: EventChannel<VirtualFile>,
    on_removed: EventChannel<FileRemoved>,
    disposed: AtomicBool,
}

/// Shared handle to a set of [`VirtualFile`]s.
#[derive(Clone)]
pub struct FileSet {
    inner: Arc<FileSetInner>,
}

impl FileSet {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(FileSetInner {
                files: RwLock::new(Vec::new()),
                on_added: EventChannel::new(),
                on_removed: EventChannel::new(),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Build a store from initial members (no listeners exist yet).
    pub fn with_files(files: impl IntoIterator<Item = VirtualFile>) -> Self {
        let set = Self::new();
        set.add_all(files);
        set
    }

    // -------------------------------------------------------------------------
    // Membership
    // -------------------------------------------------------------------------

    /// Insert `file` unless it is already a member; emits "added" on insert.
    ///
    /// A disposed store accepts nothing.
    pub fn add(&self, file: VirtualFile) -> bool {
        if self.is_disposed() {
            return false;
        }
        {
            let mut files = self.inner.files.write();
            if files.contains(&file) {
                return false;
            }
            files.push(file.clone());
        }
        self.inner.on_added.emit(&file);
        true
    }

    /// Insert each file in order, one "added" event per inserted file.
    pub fn add_all(&self, files: impl IntoIterator<Item = VirtualFile>) {
        for file in files {
            self.add(file);
        }
    }

    /// Remove a member, optionally disposing it, then emit "removed".
    ///
    /// Non-members are ignored and emit nothing.
    pub fn remove(&self, file: &VirtualFile, dispose: bool) -> bool {
        {
            let mut files = self.inner.files.write();
            let Some(pos) = files.iter().position(|f| f == file) else {
                return false;
            };
            files.remove(pos);
        }

        if dispose {
            file.dispose();
        }

        self.inner.on_removed.emit(&FileRemoved {
            file: file.clone(),
            disposed: dispose,
        });
        true
    }

    /// First member (in insertion order) matching `predicate`.
    pub fn find<P>(&self, mut predicate: P) -> Option<VirtualFile>
    where
        P: FnMut(&VirtualFile) -> bool,
    {
        self.inner.files.read().iter().find(|f| predicate(f)).cloned()
    }

    pub fn find_by_name(&self, name: &str) -> Option<VirtualFile> {
        self.find(|f| f.has_name(name))
    }

    /// Snapshot of the current membership.
    pub fn all(&self) -> Vec<VirtualFile> {
        self.inner.files.read().clone()
    }

    /// Members shown in user-facing file lists.
    pub fn visible(&self) -> Vec<VirtualFile> {
        self.inner
            .files
            .read()
            .iter()
            .filter(|f| !f.hidden())
            .cloned()
            .collect()
    }

    pub fn contains(&self, file: &VirtualFile) -> bool {
        self.inner.files.read().contains(file)
    }

    pub fn len(&self) -> usize {
        self.inner.files.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::Acquire)
    }

    /// Returns true if both handles refer to the same store.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    // -------------------------------------------------------------------------
    // Direct streams
    // -------------------------------------------------------------------------

    pub fn on_file_added<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&VirtualFile) + Send + Sync + 'static,
    {
        self.inner.on_added.on(listener)
    }

    pub fn on_file_removed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&VirtualFile, bool) + Send + Sync + 'static,
    {
        self.inner
            .on_removed
            .on(move |event: &FileRemoved| listener(&event.file, event.disposed))
    }

    // -------------------------------------------------------------------------
    // Aggregated streams
    // -------------------------------------------------------------------------

    /// Keep one link per member alive for as long as the result is not revoked.
    pub fn on_each_file<C>(&self, link: C) -> Subscription
    where
        C: Fn(&VirtualFile) -> Subscription + Send + Sync + 'static,
    {
        let link = Arc::new(link);
        let registry = Arc::new(Mutex::new(LinkRegistry::default()));

        let added = {
            let link = Arc::clone(&link);
            let registry = Arc::clone(&registry);
            let members = Arc::downgrade(&self.inner);
            self.on_file_added(move |file| {
                LinkRegistry::attach(&registry, &members, file, link.as_ref());
            })
        };

        let removed = {
            let registry = Arc::clone(&registry);
            self.on_file_removed(move |file, _| {
                let detached = registry.lock().links.remove(&file.id());
                if let Some(subscription) = detached {
                    subscription.revoke();
                }
            })
        };

        let members = Arc::downgrade(&self.inner);
        for file in self.all() {
            LinkRegistry::attach(&registry, &members, &file, link.as_ref());
        }

        Subscription::new(move || {
            added.revoke();
            removed.revoke();
            let links = {
                let mut registry = registry.lock();
                registry.revoked = true;
                std::mem::take(&mut registry.links)
            };
            for subscription in links.into_values() {
                subscription.revoke();
            }
        })
    }

    pub fn on_file_edited<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&VirtualFile, &str) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        self.on_each_file(move |file| {
            let listener = Arc::clone(&listener);
            let target = file.clone();
            file.on_edited(move |content| listener(&target, content))
        })
    }

    pub fn on_file_renamed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&VirtualFile, &str) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        self.on_each_file(move |file| {
            let listener = Arc::clone(&listener);
            let target = file.clone();
            file.on_renamed(move |name| listener(&target, name))
        })
    }

    pub fn on_file_language_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&VirtualFile, Option<Language>) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        self.on_each_file(move |file| {
            let listener = Arc::clone(&listener);
            let target = file.clone();
            file.on_language_changed(move |language| listener(&target, language))
        })
    }

    pub fn on_file_visibility_changed<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&VirtualFile, bool) + Send + Sync + 'static,
    {
        let listener = Arc::new(listener);
        self.on_each_file(move |file| {
            let listener = Arc::clone(&listener);
            let target = file.clone();
            file.on_visibility_changed(move |hidden| listener(&target, hidden))
        })
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Dispose every member, clear membership, tear down the store streams.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let files = std::mem::take(&mut *self.inner.files.write());
        for file in &files {
            file.dispose();
        }
        self.inner.on_added.teardown();
        self.inner.on_removed.teardown();
    }
}

impl Default for FileSet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FileSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileSet")
            .field("files", &*self.inner.files.read())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Per-aggregate registry of forwarding links, keyed by file identity.
#[derive(Default)]
struct LinkRegistry {
    links: FxHashMap<FileId, Subscription>,
    revoked: bool,
}

impl LinkRegistry {
    /// Create a link for `file` unless one exists, the aggregate is revoked,
    /// or `file` has left the store.
    ///
    /// A handler running before this one may remove the file during its own
    /// "added" emit, so membership is checked again under the registry lock
    /// once the link exists. A removal after that check finds the link in
    /// the registry and revokes it. The link is created outside the lock; a
    /// link that loses the race is revoked immediately.
    fn attach<C>(
        registry: &Mutex<Self>,
        members: &Weak<FileSetInner>,
        file: &VirtualFile,
        link: &C,
    ) where
        C: Fn(&VirtualFile) -> Subscription + ?Sized,
    {
        {
            let registry = registry.lock();
            if registry.revoked
                || registry.links.contains_key(&file.id())
                || !is_member(members, file)
            {
                return;
            }
        }

        let subscription = link(file);

        let mut guard = registry.lock();
        if guard.revoked || guard.links.contains_key(&file.id()) || !is_member(members, file) {
            drop(guard);
            subscription.revoke();
            return;
        }
        guard.links.insert(file.id(), subscription);
    }
}

fn is_member(members: &Weak<FileSetInner>, file: &VirtualFile) -> bool {
    members
        .upgrade()
        .is_some_and(|inner| inner.files.read().contains(file))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashSet;
    use std::sync::atomic::AtomicUsize;

    fn file(name: &str) -> VirtualFile {
        VirtualFile::new(name, "").unwrap()
    }

    fn names(set: &FileSet) -> Vec<String> {
        set.all().iter().map(VirtualFile::name).collect()
    }

    #[test]
    fn test_add_remove_replay_matches_set_semantics() {
        let pool: Vec<_> = (0..6).map(|i| file(&format!("f{i}.js"))).collect();
        let set = FileSet::new();
        let mut model: FxHashSet<FileId> = FxHashSet::default();

        // Deterministic pseudo-random op sequence.
        let mut seed: u64 = 0x2545_F491_4F6C_DD1D;
        for _ in 0..200 {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            let f = &pool[(seed % pool.len() as u64) as usize];
            if seed & 0x100 == 0 {
                set.add(f.clone());
                model.insert(f.id());
            } else {
                set.remove(f, false);
                model.remove(&f.id());
            }
        }

        let actual: FxHashSet<FileId> = set.all().iter().map(VirtualFile::id).collect();
        assert_eq!(actual, model);
        assert_eq!(set.len(), model.len());
    }

    #[test]
    fn test_add_is_idempotent_and_emits_once() {
        let set = FileSet::new();
        let added = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&added);
        set.on_file_added(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let a = file("a.js");
        assert!(set.add(a.clone()));
        assert!(!set.add(a.clone()));

        assert_eq!(added.load(Ordering::SeqCst), 1);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_add_all_emits_in_call_order() {
        let set = FileSet::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&order);
        set.on_file_added(move |f| sink.lock().push(f.name()));

        set.add_all([file("b.js"), file("a.js"), file("c.js")]);

        assert_eq!(*order.lock(), vec!["b.js", "a.js", "c.js"]);
        assert_eq!(names(&set), vec!["b.js", "a.js", "c.js"]);
    }

    #[test]
    fn test_remove_non_member_emits_nothing() {
        let set = FileSet::new();
        let removed = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&removed);
        set.on_file_removed(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!set.remove(&file("ghost.js"), true));
        assert_eq!(removed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_remove_with_dispose() {
        let set = FileSet::new();
        let a = file("a.js");
        set.add(a.clone());

        let flags = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&flags);
        set.on_file_removed(move |f, disposed| sink.lock().push((f.is_disposed(), disposed)));

        assert!(set.remove(&a, true));
        assert_eq!(*flags.lock(), vec![(true, true)]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_find_uses_insertion_order() {
        let set = FileSet::with_files([file("index.ts"), file("index.js")]);
        let found = set.find(|f| f.name().starts_with("index")).unwrap();
        assert_eq!(found.name(), "index.ts");
        assert!(set.find_by_name("missing.js").is_none());
    }

    #[test]
    fn test_visible_skips_hidden() {
        let set = FileSet::with_files([file("a.js"), file("b.js").with_hidden(true)]);
        let visible: Vec<_> = set.visible().iter().map(VirtualFile::name).collect();
        assert_eq!(visible, vec!["a.js"]);
        assert!(set.find_by_name("b.js").is_some());
    }

    #[test]
    fn test_aggregate_edit_covers_files_added_later() {
        let set = FileSet::new();
        let edits = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&edits);
        let sub = set.on_file_edited(move |f, content| {
            sink.lock().push(format!("{}={}", f.name(), content));
        });

        let a = file("a.js");
        let b = file("b.js");
        set.add_all([a.clone(), b.clone()]);
        a.set_content("1").unwrap();
        b.set_content("2").unwrap();

        assert_eq!(*edits.lock(), vec!["a.js=1", "b.js=2"]);

        sub.revoke();
        a.set_content("3").unwrap();
        let c = file("c.js");
        set.add(c.clone());
        c.set_content("4").unwrap();

        assert_eq!(edits.lock().len(), 2);
    }

    #[test]
    fn test_aggregate_covers_existing_members() {
        let a = file("a.js");
        let set = FileSet::with_files([a.clone()]);
        let renames = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&renames);
        set.on_file_renamed(move |f, name| sink.lock().push((f.id(), name.to_string())));

        a.set_name("b.js").unwrap();
        assert_eq!(*renames.lock(), vec![(a.id(), "b.js".to_string())]);
    }

    #[test]
    fn test_aggregate_drops_removed_members() {
        let a = file("a.js");
        let set = FileSet::with_files([a.clone()]);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        set.on_file_edited(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Removed without dispose: the entity is still live, but the store
        // must stop forwarding its events.
        set.remove(&a, false);
        a.set_content("x").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Re-adding restores forwarding exactly once.
        set.add(a.clone());
        a.set_content("y").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_aggregate_skips_file_removed_during_add() {
        let set = FileSet::new();
        let handle = set.clone();
        set.on_file_added(move |f| {
            handle.remove(f, false);
        });

        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        set.on_file_edited(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let a = file("a.js");
        set.add(a.clone());
        assert!(!set.contains(&a));

        a.set_content("x").unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_aggregate_language_change() {
        let a = file("a.js");
        let set = FileSet::with_files([a.clone()]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set.on_file_language_changed(move |_, language| sink.lock().push(language));

        a.set_name("a.ts").unwrap();
        a.set_name("b.ts").unwrap();

        assert_eq!(*seen.lock(), vec![Some(Language::Typescript)]);
    }

    #[test]
    fn test_aggregate_visibility_change() {
        let a = file("a.js");
        let set = FileSet::with_files([a.clone()]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        set.on_file_visibility_changed(move |_, hidden| sink.lock().push(hidden));

        a.set_hidden(true).unwrap();
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[test]
    fn test_dispose_disposes_members() {
        let a = file("a.js");
        let set = FileSet::with_files([a.clone()]);
        let added = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&added);
        set.on_file_added(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        set.dispose();

        assert!(a.is_disposed());
        assert!(set.is_empty());
        assert!(!set.add(file("b.js")));
        assert_eq!(added.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_dispose_from_inside_handler() {
        let set = FileSet::new();
        let handle = set.clone();
        set.on_file_added(move |_| handle.dispose());

        let a = file("a.js");
        set.add(a.clone());

        assert!(set.is_disposed());
        assert!(a.is_disposed());
    }
}
