//! Local entity storage.
//!
//! A store keeps two layers: the committed entities that independent readers
//! see through [`RecordStore::snapshot`], and a pending change set that only
//! the writer sees. [`RecordStore::commit`] moves the pending changes into the
//! committed layer in one step. A failed commit leaves them pending for retry.

use crate::{error::Result, Error, Identifier, LocalEntity, StoreSnapshot};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Storage for the local copy of a synced collection.
///
/// `get` and `all_ids` return the writer's view (committed state overlaid
/// with pending changes). `snapshot` returns the reader's view.
pub trait RecordStore: Send + Sync {
    /// Look up an entity by identifier.
    fn get(&self, id: &Identifier) -> Option<LocalEntity>;

    /// Stage an insert or replacement.
    fn upsert(&self, entity: LocalEntity);

    /// Stage a deletion. Deleting an unknown identifier is a no-op.
    fn delete(&self, id: &Identifier);

    /// Identifiers currently present in the writer's view.
    fn all_ids(&self) -> BTreeSet<Identifier>;

    /// Publish all pending changes. Returns how many were published.
    fn commit(&self) -> Result<usize>;

    /// Number of staged changes not yet committed.
    fn pending_count(&self) -> usize;

    fn has_pending(&self) -> bool {
        self.pending_count() > 0
    }

    /// Committed entities, ordered by identifier.
    fn snapshot(&self) -> Vec<LocalEntity>;

    /// Guard that admits at most one sync pass at a time for this store.
    fn sync_lock(&self) -> &SyncLock;
}

/// Single-writer flag for a store target.
#[derive(Debug, Default)]
pub struct SyncLock {
    held: AtomicBool,
}

impl SyncLock {
    pub fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Take the lock, or `None` if a pass already holds it.
    pub fn try_acquire(&self) -> Option<SyncLease<'_>> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SyncLease { lock: self })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Proof of holding a [`SyncLock`]. Releases it on drop.
#[derive(Debug)]
pub struct SyncLease<'a> {
    lock: &'a SyncLock,
}

impl Drop for SyncLease<'_> {
    fn drop(&mut self) {
        self.lock.held.store(false, Ordering::Release);
    }
}

/// A staged mutation.
#[derive(Debug, Clone, PartialEq)]
enum Change {
    Upsert(LocalEntity),
    Delete,
}

fn overlay(
    mut base: BTreeMap<Identifier, LocalEntity>,
    pending: &BTreeMap<Identifier, Change>,
) -> BTreeMap<Identifier, LocalEntity> {
    for (id, change) in pending {
        match change {
            Change::Upsert(entity) => {
                base.insert(id.clone(), entity.clone());
            }
            Change::Delete => {
                base.remove(id);
            }
        }
    }
    base
}

/// In-memory store. Changes survive only as long as the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    committed: RwLock<BTreeMap<Identifier, LocalEntity>>,
    pending: Mutex<BTreeMap<Identifier, Change>>,
    lock: SyncLock,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose committed layer already holds `entities`.
    pub fn with_entities(entities: impl IntoIterator<Item = LocalEntity>) -> Self {
        let committed = entities
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect();
        Self {
            committed: RwLock::new(committed),
            ..Self::default()
        }
    }

    /// Number of committed entities.
    pub fn len(&self) -> usize {
        self.committed.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.committed.read().is_empty()
    }

    /// Committed entity by identifier, ignoring pending changes.
    pub fn get_committed(&self, id: &Identifier) -> Option<LocalEntity> {
        self.committed.read().get(id).cloned()
    }

    /// The committed layer as it would look after the pending changes.
    fn staged(&self) -> BTreeMap<Identifier, LocalEntity> {
        let committed = self.committed.read().clone();
        overlay(committed, &self.pending.lock())
    }

    /// Commit after `persist` accepts the staged state. If `persist` fails,
    /// nothing is published and pending changes are kept.
    fn commit_with<F>(&self, persist: F) -> Result<usize>
    where
        F: FnOnce(&BTreeMap<Identifier, LocalEntity>) -> Result<()>,
    {
        // Holding the pending lock keeps the writer's view stable while the
        // staged state is persisted and swapped in.
        let mut pending = self.pending.lock();
        if pending.is_empty() {
            return Ok(0);
        }

        let committed = self.committed.read().clone();
        let next = overlay(committed, &pending);

        persist(&next)?;

        let count = pending.len();
        *self.committed.write() = next;
        pending.clear();
        Ok(count)
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, id: &Identifier) -> Option<LocalEntity> {
        match self.pending.lock().get(id) {
            Some(Change::Upsert(entity)) => return Some(entity.clone()),
            Some(Change::Delete) => return None,
            None => {}
        }
        self.committed.read().get(id).cloned()
    }

    fn upsert(&self, entity: LocalEntity) {
        self.pending
            .lock()
            .insert(entity.id.clone(), Change::Upsert(entity));
    }

    fn delete(&self, id: &Identifier) {
        let mut pending = self.pending.lock();
        if self.committed.read().contains_key(id) {
            pending.insert(id.clone(), Change::Delete);
        } else {
            // Never committed, so dropping the staged insert is enough
            pending.remove(id);
        }
    }

    fn all_ids(&self) -> BTreeSet<Identifier> {
        self.staged().into_keys().collect()
    }

    fn commit(&self) -> Result<usize> {
        self.commit_with(|_| Ok(()))
    }

    fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    fn snapshot(&self) -> Vec<LocalEntity> {
        self.committed.read().values().cloned().collect()
    }

    fn sync_lock(&self) -> &SyncLock {
        &self.lock
    }
}

/// A store persisted as a JSON [`StoreSnapshot`] file.
///
/// Every commit rewrites the file through a temporary sibling and a rename.
/// The in-memory committed layer only changes once the file is in place.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entity_name: String,
    inner: MemoryStore,
}

impl FileStore {
    /// Open the store at `path`, loading it if the file exists.
    pub fn open(path: impl Into<PathBuf>, entity_name: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let entity_name = entity_name.into();

        let inner = match fs::read_to_string(&path) {
            Ok(json) => {
                let snapshot = StoreSnapshot::from_json(&json)?;
                if snapshot.entity_name != entity_name {
                    return Err(Error::InvalidSnapshot(format!(
                        "snapshot holds '{}', expected '{}'",
                        snapshot.entity_name, entity_name
                    )));
                }
                MemoryStore::with_entities(snapshot.into_entities()?.into_values())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to read {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        tracing::debug!(path = %path.display(), entities = inner.len(), "opened file store");

        Ok(Self {
            path,
            entity_name,
            inner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    fn write_snapshot(&self, entities: &BTreeMap<Identifier, LocalEntity>) -> Result<()> {
        let json = StoreSnapshot::from_entities(&self.entity_name, entities).to_json_pretty()?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json)
            .and_then(|_| fs::rename(&tmp, &self.path))
            .map_err(|e| Error::Storage(format!("failed to write {}: {}", self.path.display(), e)))
    }
}

impl RecordStore for FileStore {
    fn get(&self, id: &Identifier) -> Option<LocalEntity> {
        self.inner.get(id)
    }

    fn upsert(&self, entity: LocalEntity) {
        self.inner.upsert(entity)
    }

    fn delete(&self, id: &Identifier) {
        self.inner.delete(id)
    }

    fn all_ids(&self) -> BTreeSet<Identifier> {
        self.inner.all_ids()
    }

    fn commit(&self) -> Result<usize> {
        self.inner.commit_with(|next| self.write_snapshot(next))
    }

    fn pending_count(&self) -> usize {
        self.inner.pending_count()
    }

    fn snapshot(&self) -> Vec<LocalEntity> {
        self.inner.snapshot()
    }

    fn sync_lock(&self) -> &SyncLock {
        self.inner.sync_lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Value;

    fn ids(store: &impl RecordStore) -> Vec<Identifier> {
        store.all_ids().into_iter().collect()
    }

    #[test]
    fn pending_changes_are_invisible_to_readers() {
        let store = MemoryStore::new();
        store.upsert(LocalEntity::new(1).with("body", "a"));

        assert!(store.get(&1.into()).is_some());
        assert_eq!(ids(&store), vec![Identifier::Int(1)]);
        assert!(store.snapshot().is_empty());
        assert_eq!(store.pending_count(), 1);

        assert_eq!(store.commit().unwrap(), 1);
        assert_eq!(store.snapshot().len(), 1);
        assert!(!store.has_pending());
    }

    #[test]
    fn empty_commit_is_a_noop() {
        let store = MemoryStore::new();
        assert_eq!(store.commit().unwrap(), 0);
    }

    #[test]
    fn delete_committed_entity() {
        let store = MemoryStore::with_entities(vec![LocalEntity::new(1), LocalEntity::new(2)]);
        store.delete(&1.into());

        assert!(store.get(&1.into()).is_none());
        assert_eq!(ids(&store), vec![Identifier::Int(2)]);
        assert_eq!(store.snapshot().len(), 2);

        store.commit().unwrap();
        assert_eq!(store.snapshot(), vec![LocalEntity::new(2)]);
    }

    #[test]
    fn delete_uncommitted_insert_drops_it() {
        let store = MemoryStore::new();
        store.upsert(LocalEntity::new(5));
        store.delete(&5.into());
        assert_eq!(store.pending_count(), 0);
        assert!(store.get(&5.into()).is_none());
    }

    #[test]
    fn later_upsert_overwrites_pending() {
        let store = MemoryStore::new();
        store.upsert(LocalEntity::new(1).with("body", "first"));
        store.upsert(LocalEntity::new(1).with("body", "second"));
        assert_eq!(store.pending_count(), 1);
        store.commit().unwrap();
        assert_eq!(
            store.get_committed(&1.into()).unwrap().get("body"),
            Some(&Value::from("second"))
        );
    }

    #[test]
    fn sync_lock_is_exclusive() {
        let lock = SyncLock::new();
        let lease = lock.try_acquire().expect("free lock");
        assert!(lock.is_held());
        assert!(lock.try_acquire().is_none());
        drop(lease);
        assert!(!lock.is_held());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn file_store_persists_commits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let store = FileStore::open(&path, "Note").unwrap();
        store.upsert(LocalEntity::new(1).with("body", "hello"));
        store.commit().unwrap();

        let reopened = FileStore::open(&path, "Note").unwrap();
        assert_eq!(
            reopened.snapshot(),
            vec![LocalEntity::new(1).with("body", "hello")]
        );
    }

    #[test]
    fn file_store_keeps_pending_when_write_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("notes.json");

        let store = FileStore::open(&path, "Note").unwrap();
        store.upsert(LocalEntity::new(1));

        let err = store.commit().unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(store.pending_count(), 1);
        assert!(store.snapshot().is_empty());

        // Retry once the directory exists
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        assert_eq!(store.commit().unwrap(), 1);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[test]
    fn file_store_rejects_other_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");

        let store = FileStore::open(&path, "Note").unwrap();
        store.upsert(LocalEntity::new(1));
        store.commit().unwrap();

        let err = FileStore::open(&path, "Person").unwrap_err();
        assert!(matches!(err, Error::InvalidSnapshot(_)));
    }
}
