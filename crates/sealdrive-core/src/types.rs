use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier of a cached file record, assigned by the metadata cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub u64);

/// Identifier of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub u64);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for FileId {
    fn from(v: u64) -> Self {
        FileId(v)
    }
}

impl From<u64> for OwnerId {
    fn from(v: u64) -> Self {
        OwnerId(v)
    }
}

/// Whether a remote entry is a regular object or a directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn is_dir(self) -> bool {
        self == EntryKind::Directory
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::File => f.pad("file"),
            EntryKind::Directory => f.pad("dir"),
        }
    }
}

/// One item of a remote directory listing, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Last path component exactly as stored remotely
    pub name: String,
    /// Canonical remote path (root prefix included, e.g. `disk:/photos/a.jpg`)
    pub path: String,
    pub kind: EntryKind,
    /// Stored size in bytes (0 for directories)
    pub size: u64,
    /// MIME type reported by the remote, if any
    pub mime_hint: Option<String>,
}

/// Cached metadata for one remote object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    pub owner: OwnerId,
    /// Plaintext name known to the owner. Presentational only.
    pub display_name: String,
    /// Name used for every remote transport operation
    pub stored_name: String,
    /// Canonical remote path: directory + `stored_name`
    pub remote_path: String,
    /// Size as stored remotely (ciphertext size when encrypted)
    pub size: u64,
    /// Best-effort MIME classification
    pub content_kind: String,
    pub encrypted: bool,
    pub entry_kind: EntryKind,
    /// Unix timestamp (seconds) of creation
    pub created_at: u64,
    /// Unix timestamp (seconds) of the last update
    pub updated_at: u64,
    /// Soft-delete marker; tombstoned records are invisible to lookups
    #[serde(default)]
    pub deleted_at: Option<u64>,
}

impl FileRecord {
    /// Build a record from a draft once the cache has assigned an ID.
    pub fn from_new(id: FileId, new: NewFileRecord, now: u64) -> Self {
        FileRecord {
            id,
            owner: new.owner,
            display_name: new.display_name,
            stored_name: new.stored_name,
            remote_path: new.remote_path,
            size: new.size,
            content_kind: new.content_kind,
            encrypted: new.encrypted,
            entry_kind: new.entry_kind,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// A record that has not been assigned an ID yet.
///
/// Also used for transient listing entries (directories, or files whose cache
/// write failed) that never made it into the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFileRecord {
    pub owner: OwnerId,
    pub display_name: String,
    pub stored_name: String,
    pub remote_path: String,
    pub size: u64,
    pub content_kind: String,
    pub encrypted: bool,
    pub entry_kind: EntryKind,
}

/// Current Unix time in seconds.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
