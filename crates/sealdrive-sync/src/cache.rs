//! Local metadata cache: one [`FileRecord`] per remote object.
//!
//! [`JsonMetadataCache`] keeps every record in memory and, when backed by a
//! file, writes through on each mutation (temp file + rename, so a crash
//! never leaves a half-written cache). Deletes are soft: the record keeps its
//! row with `deleted_at` set and disappears from every lookup. Tombstones are
//! never purged.
//!
//! Several processes may share one cache file. Every access takes an advisory
//! lock on `<name>.lock` next to it (shared for reads, exclusive for writes)
//! and reloads the file first, so a write never discards rows another process
//! added in the meantime.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use sealdrive_core::types::unix_now;
use sealdrive_core::{FileId, FileRecord, NewFileRecord, OwnerId, SealError, SealResult};

/// Storage for cached file records.
///
/// Methods take `&self`; implementations synchronize internally so one cache
/// can serve concurrent callers.
pub trait MetadataCache: Send + Sync {
    /// Insert a new record and assign it an ID.
    fn create(&self, new: NewFileRecord) -> SealResult<FileRecord>;

    /// Live record by ID (tombstoned records are `None`).
    fn get(&self, id: FileId) -> SealResult<Option<FileRecord>>;

    /// Live record for `(owner, remote_path)`.
    fn find_by_path(&self, owner: OwnerId, remote_path: &str) -> SealResult<Option<FileRecord>>;

    /// Overwrite the mutable fields of an existing record and stamp `updated_at`.
    ///
    /// `id`, `owner` and `created_at` are kept from the stored row.
    fn update(&self, record: &FileRecord) -> SealResult<FileRecord>;

    /// Soft-delete the record.
    fn delete(&self, id: FileId) -> SealResult<()>;

    /// All live records of `owner`, ordered by ID.
    fn list_by_owner(&self, owner: OwnerId) -> SealResult<Vec<FileRecord>>;
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    next_id: u64,
    records: BTreeMap<u64, FileRecord>,
}

/// JSON-file [`MetadataCache`], or purely in-memory when opened without a path.
pub struct JsonMetadataCache {
    path: Option<PathBuf>,
    inner: Mutex<CacheFile>,
}

impl JsonMetadataCache {
    /// Load or create a cache at `path`. A missing file starts empty.
    pub fn open(path: &Path) -> SealResult<Self> {
        let cache = Self {
            path: Some(path.to_path_buf()),
            inner: Mutex::new(CacheFile {
                next_id: 1,
                ..Default::default()
            }),
        };
        let (state, _lock) = cache.acquire(false)?;
        tracing::debug!(path = %path.display(), records = state.records.len(), "opened metadata cache");
        drop(state);
        Ok(cache)
    }

    /// A cache that never touches disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Mutex::new(CacheFile {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Number of rows, tombstones included.
    pub fn len(&self) -> SealResult<usize> {
        let (state, _lock) = self.acquire(false)?;
        Ok(state.records.len())
    }

    pub fn is_empty(&self) -> SealResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Lock the in-memory state and, for a file-backed cache, the lock file,
    /// then reload the file so the state reflects every committed write.
    ///
    /// Readers skip the file lock while no cache file exists yet.
    fn acquire(&self, exclusive: bool) -> SealResult<(MutexGuard<'_, CacheFile>, Option<File>)> {
        let mut state = self
            .inner
            .lock()
            .map_err(|_| SealError::Cache("metadata cache lock poisoned".into()))?;

        let Some(path) = &self.path else {
            return Ok((state, None));
        };
        if !exclusive && !path.exists() {
            return Ok((state, None));
        }

        let lock = Self::lock_file(path, exclusive)?;
        if path.exists() {
            *state = Self::read(path)?;
        }
        Ok((state, Some(lock)))
    }

    /// Open `<name>.lock` beside the cache and take an advisory lock on it.
    /// The lock is released when the returned file is dropped.
    fn lock_file(path: &Path, exclusive: bool) -> SealResult<File> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SealError::Cache(format!("creating cache dir {}: {e}", parent.display()))
            })?;
        }

        let lock_path = path.with_extension("lock");
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| {
                SealError::Cache(format!("opening cache lock {}: {e}", lock_path.display()))
            })?;

        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|e| {
            SealError::Cache(format!("locking metadata cache {}: {e}", lock_path.display()))
        })?;
        Ok(file)
    }

    fn read(path: &Path) -> SealResult<CacheFile> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            SealError::Cache(format!("parsing metadata cache {}: {e}", path.display()))
        })
    }

    /// Write the whole cache atomically (write temp, then rename).
    ///
    /// Callers hold the exclusive file lock, so the temp path is not contended.
    fn persist(&self, state: &CacheFile) -> SealResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json = serde_json::to_string_pretty(state)
            .map_err(|e| SealError::Cache(format!("serializing metadata cache: {e}")))?;

        let tmp_path = path.with_extension("tmp");
        std::fs::write(&tmp_path, json).map_err(|e| {
            SealError::Cache(format!("writing cache temp {}: {e}", tmp_path.display()))
        })?;
        std::fs::rename(&tmp_path, path).map_err(|e| {
            SealError::Cache(format!("renaming metadata cache {}: {e}", path.display()))
        })?;
        Ok(())
    }

    fn live(state: &CacheFile, id: FileId) -> Option<&FileRecord> {
        state.records.get(&id.0).filter(|r| !r.is_deleted())
    }
}

impl MetadataCache for JsonMetadataCache {
    fn create(&self, new: NewFileRecord) -> SealResult<FileRecord> {
        let (mut state, _lock) = self.acquire(true)?;
        let id = FileId(state.next_id);
        let record = FileRecord::from_new(id, new, unix_now());

        state.next_id += 1;
        state.records.insert(id.0, record.clone());
        if let Err(e) = self.persist(&state) {
            state.records.remove(&id.0);
            state.next_id -= 1;
            return Err(e);
        }
        Ok(record)
    }

    fn get(&self, id: FileId) -> SealResult<Option<FileRecord>> {
        let (state, _lock) = self.acquire(false)?;
        Ok(Self::live(&state, id).cloned())
    }

    fn find_by_path(&self, owner: OwnerId, remote_path: &str) -> SealResult<Option<FileRecord>> {
        let (state, _lock) = self.acquire(false)?;
        Ok(state
            .records
            .values()
            .find(|r| !r.is_deleted() && r.owner == owner && r.remote_path == remote_path)
            .cloned())
    }

    fn update(&self, record: &FileRecord) -> SealResult<FileRecord> {
        let (mut state, _lock) = self.acquire(true)?;
        let Some(existing) = Self::live(&state, record.id) else {
            return Err(SealError::NotFound(format!("file {}", record.id)));
        };

        let updated = FileRecord {
            id: existing.id,
            owner: existing.owner,
            created_at: existing.created_at,
            updated_at: unix_now(),
            deleted_at: None,
            ..record.clone()
        };

        let previous = state.records.insert(updated.id.0, updated.clone());
        if let Err(e) = self.persist(&state) {
            if let Some(prev) = previous {
                state.records.insert(prev.id.0, prev);
            }
            return Err(e);
        }
        Ok(updated)
    }

    fn delete(&self, id: FileId) -> SealResult<()> {
        let (mut state, _lock) = self.acquire(true)?;
        let Some(record) = state.records.get_mut(&id.0).filter(|r| !r.is_deleted()) else {
            return Err(SealError::NotFound(format!("file {id}")));
        };
        record.deleted_at = Some(unix_now());

        if let Err(e) = self.persist(&state) {
            if let Some(record) = state.records.get_mut(&id.0) {
                record.deleted_at = None;
            }
            return Err(e);
        }
        Ok(())
    }

    fn list_by_owner(&self, owner: OwnerId) -> SealResult<Vec<FileRecord>> {
        let (state, _lock) = self.acquire(false)?;
        Ok(state
            .records
            .values()
            .filter(|r| !r.is_deleted() && r.owner == owner)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealdrive_core::EntryKind;

    fn draft(owner: u64, path: &str) -> NewFileRecord {
        NewFileRecord {
            owner: OwnerId(owner),
            display_name: "report.pdf".into(),
            stored_name: path.rsplit('/').next().unwrap_or(path).into(),
            remote_path: path.into(),
            size: 10,
            content_kind: "application/pdf".into(),
            encrypted: false,
            entry_kind: EntryKind::File,
        }
    }

    #[test]
    fn test_create_assigns_increasing_ids() {
        let cache = JsonMetadataCache::in_memory();
        let a = cache.create(draft(1, "disk:/a")).unwrap();
        let b = cache.create(draft(1, "disk:/b")).unwrap();

        assert_eq!(a.id, FileId(1));
        assert_eq!(b.id, FileId(2));
        assert_eq!(cache.get(a.id).unwrap(), Some(a));
    }

    #[test]
    fn test_find_by_path_is_scoped_to_owner() {
        let cache = JsonMetadataCache::in_memory();
        cache.create(draft(1, "disk:/shared.txt")).unwrap();

        assert!(cache.find_by_path(OwnerId(1), "disk:/shared.txt").unwrap().is_some());
        assert!(cache.find_by_path(OwnerId(2), "disk:/shared.txt").unwrap().is_none());
    }

    #[test]
    fn test_update_keeps_identity_fields() {
        let cache = JsonMetadataCache::in_memory();
        let rec = cache.create(draft(1, "disk:/a")).unwrap();

        let mut changed = rec.clone();
        changed.size = 99;
        changed.owner = OwnerId(7);
        changed.created_at = 0;
        let updated = cache.update(&changed).unwrap();

        assert_eq!(updated.size, 99);
        assert_eq!(updated.owner, OwnerId(1), "owner is immutable");
        assert_eq!(updated.created_at, rec.created_at);
        assert!(updated.updated_at >= rec.updated_at);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let cache = JsonMetadataCache::in_memory();
        let ghost = FileRecord::from_new(FileId(42), draft(1, "disk:/x"), 0);
        assert!(matches!(cache.update(&ghost), Err(SealError::NotFound(_))));
    }

    #[test]
    fn test_soft_delete_hides_record() {
        let cache = JsonMetadataCache::in_memory();
        let rec = cache.create(draft(1, "disk:/a")).unwrap();

        cache.delete(rec.id).unwrap();

        assert_eq!(cache.get(rec.id).unwrap(), None);
        assert!(cache.find_by_path(OwnerId(1), "disk:/a").unwrap().is_none());
        assert!(cache.list_by_owner(OwnerId(1)).unwrap().is_empty());
        assert_eq!(cache.len().unwrap(), 1, "tombstone keeps its row");
        assert!(matches!(cache.delete(rec.id), Err(SealError::NotFound(_))));
    }

    #[test]
    fn test_persist_and_reload() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested/meta.json");

        let id = {
            let cache = JsonMetadataCache::open(&path).unwrap();
            let rec = cache.create(draft(3, "disk:/kept")).unwrap();
            let gone = cache.create(draft(3, "disk:/gone")).unwrap();
            cache.delete(gone.id).unwrap();
            rec.id
        };

        assert!(path.exists());
        assert!(!path.with_extension("tmp").exists());

        let cache = JsonMetadataCache::open(&path).unwrap();
        assert_eq!(cache.get(id).unwrap().unwrap().remote_path, "disk:/kept");
        assert_eq!(cache.list_by_owner(OwnerId(3)).unwrap().len(), 1);

        // IDs continue after reload
        let next = cache.create(draft(3, "disk:/new")).unwrap();
        assert_eq!(next.id, FileId(3));
    }

    #[test]
    fn test_two_handles_on_one_file_keep_each_others_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("meta.json");

        // Two CLI processes sharing the cache file
        let first = JsonMetadataCache::open(&path).unwrap();
        let second = JsonMetadataCache::open(&path).unwrap();

        let a = first.create(draft(1, "disk:/1/a")).unwrap();
        let b = second.create(draft(1, "disk:/1/b")).unwrap();
        assert_ne!(a.id, b.id, "second handle saw the first write");

        // Each handle sees the other's rows
        assert_eq!(second.get(a.id).unwrap().unwrap().remote_path, "disk:/1/a");
        first.delete(b.id).unwrap();
        assert!(second.get(b.id).unwrap().is_none());

        let reopened = JsonMetadataCache::open(&path).unwrap();
        assert_eq!(reopened.len().unwrap(), 2);
        assert_eq!(reopened.list_by_owner(OwnerId(1)).unwrap(), vec![a]);
        assert!(path.with_extension("lock").exists());
    }

    #[test]
    fn test_corrupt_file_is_cache_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("meta.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonMetadataCache::open(&path),
            Err(SealError::Cache(_))
        ));
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let tmp = tempfile::TempDir::new().unwrap();
        // Parent "directory" is a regular file, so every persist fails
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let cache = JsonMetadataCache::open(&blocker.join("meta.json")).unwrap();

        assert!(matches!(
            cache.create(draft(1, "disk:/a")),
            Err(SealError::Cache(_))
        ));
        assert!(cache.is_empty().unwrap());
    }
}
