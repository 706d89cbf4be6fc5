//! Merging a remote listing with the metadata cache
//!
//! The remote has no notion of encrypted names, so every entry is classified
//! from its stored name alone. Cached display names always win over what a
//! listing can infer.

use sealdrive_core::{EntryKind, FileId, FileRecord, NewFileRecord, OwnerId, RemoteEntry};

use crate::cache::MetadataCache;
use crate::classify::{content_kind, display_name, is_encrypted};
use crate::observer::{ReconcileOutcome, SyncEvent, SyncObserver};

/// One row of a reconciled listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListedEntry {
    /// Backed by a cache row
    Cached(FileRecord),
    /// Built from the listing only: a directory, or a file whose cache write failed
    Transient(NewFileRecord),
}

impl ListedEntry {
    pub fn id(&self) -> Option<FileId> {
        match self {
            ListedEntry::Cached(r) => Some(r.id),
            ListedEntry::Transient(_) => None,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            ListedEntry::Cached(r) => &r.display_name,
            ListedEntry::Transient(r) => &r.display_name,
        }
    }

    pub fn stored_name(&self) -> &str {
        match self {
            ListedEntry::Cached(r) => &r.stored_name,
            ListedEntry::Transient(r) => &r.stored_name,
        }
    }

    pub fn remote_path(&self) -> &str {
        match self {
            ListedEntry::Cached(r) => &r.remote_path,
            ListedEntry::Transient(r) => &r.remote_path,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            ListedEntry::Cached(r) => r.size,
            ListedEntry::Transient(r) => r.size,
        }
    }

    pub fn content_kind(&self) -> &str {
        match self {
            ListedEntry::Cached(r) => &r.content_kind,
            ListedEntry::Transient(r) => &r.content_kind,
        }
    }

    pub fn encrypted(&self) -> bool {
        match self {
            ListedEntry::Cached(r) => r.encrypted,
            ListedEntry::Transient(r) => r.encrypted,
        }
    }

    pub fn entry_kind(&self) -> EntryKind {
        match self {
            ListedEntry::Cached(r) => r.entry_kind,
            ListedEntry::Transient(r) => r.entry_kind,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, ListedEntry::Cached(_))
    }
}

/// A cache write that failed while the listing itself succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistenceWarning {
    pub remote_path: String,
    pub reason: String,
}

/// Listing result: every remote entry, in remote order, plus any cache failures.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub entries: Vec<ListedEntry>,
    pub warnings: Vec<PersistenceWarning>,
}

impl Reconciliation {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// What the listing alone says about `entry`.
fn draft_for(owner: OwnerId, entry: &RemoteEntry) -> NewFileRecord {
    NewFileRecord {
        owner,
        display_name: display_name(entry),
        stored_name: entry.name.clone(),
        remote_path: entry.path.clone(),
        size: entry.size,
        content_kind: content_kind(entry),
        encrypted: is_encrypted(entry),
        entry_kind: entry.kind,
    }
}

/// Reconcile `listing` for `owner` against `cache`.
///
/// Never fails: a cache error for one entry becomes a [`PersistenceWarning`]
/// and that entry is still returned.
pub fn reconcile<C, O>(
    cache: &C,
    owner: OwnerId,
    listing: Vec<RemoteEntry>,
    observer: &O,
) -> Reconciliation
where
    C: MetadataCache + ?Sized,
    O: SyncObserver + ?Sized,
{
    let mut out = Reconciliation {
        entries: Vec::with_capacity(listing.len()),
        warnings: Vec::new(),
    };

    for entry in listing {
        let draft = draft_for(owner, &entry);

        let (listed, outcome) = if entry.kind.is_dir() {
            (ListedEntry::Transient(draft), ReconcileOutcome::Transient)
        } else {
            match reconcile_file(cache, owner, draft) {
                Ok((record, outcome)) => (ListedEntry::Cached(record), outcome),
                Err((listed, reason)) => {
                    observer.on_event(&SyncEvent::PersistenceFailed {
                        remote_path: &entry.path,
                        reason: &reason,
                    });
                    out.warnings.push(PersistenceWarning {
                        remote_path: entry.path.clone(),
                        reason,
                    });
                    let outcome = if listed.is_persisted() {
                        ReconcileOutcome::Updated
                    } else {
                        ReconcileOutcome::Transient
                    };
                    (listed, outcome)
                }
            }
        };

        observer.on_event(&SyncEvent::Reconciled {
            remote_path: &entry.path,
            outcome,
        });
        out.entries.push(listed);
    }

    out
}

/// Refresh or create the cache row for one file.
///
/// On failure, returns the best entry available without the cache plus the reason.
fn reconcile_file<C>(
    cache: &C,
    owner: OwnerId,
    draft: NewFileRecord,
) -> Result<(FileRecord, ReconcileOutcome), (ListedEntry, String)>
where
    C: MetadataCache + ?Sized,
{
    let existing = match cache.find_by_path(owner, &draft.remote_path) {
        Ok(existing) => existing,
        Err(e) => return Err((ListedEntry::Transient(draft), e.to_string())),
    };

    match existing {
        Some(mut record) => {
            record.size = draft.size;
            record.content_kind = draft.content_kind;
            record.encrypted = draft.encrypted;
            record.entry_kind = draft.entry_kind;
            record.stored_name = draft.stored_name;
            match cache.update(&record) {
                Ok(updated) => Ok((updated, ReconcileOutcome::Updated)),
                Err(e) => Err((ListedEntry::Cached(record), e.to_string())),
            }
        }
        None => match cache.create(draft.clone()) {
            Ok(created) => Ok((created, ReconcileOutcome::Created)),
            Err(e) => Err((ListedEntry::Transient(draft), e.to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::JsonMetadataCache;
    use crate::classify::PLACEHOLDER_NAME;
    use crate::observer::NoopObserver;

    fn file(name: &str, size: u64) -> RemoteEntry {
        RemoteEntry {
            name: name.into(),
            path: format!("disk:/{name}"),
            kind: EntryKind::File,
            size,
            mime_hint: None,
        }
    }

    fn dir(name: &str) -> RemoteEntry {
        RemoteEntry {
            name: name.into(),
            path: format!("disk:/{name}"),
            kind: EntryKind::Directory,
            size: 0,
            mime_hint: None,
        }
    }

    #[test]
    fn test_creates_rows_for_new_files_only() {
        let cache = JsonMetadataCache::in_memory();
        let out = reconcile(
            &cache,
            OwnerId(1),
            vec![dir("photos"), file("a.txt", 3)],
            &NoopObserver,
        );

        assert!(out.is_clean());
        assert_eq!(out.entries.len(), 2);
        assert!(!out.entries[0].is_persisted());
        assert_eq!(out.entries[0].content_kind(), "directory");
        assert!(out.entries[1].is_persisted());
        assert_eq!(out.entries[1].content_kind(), "text/plain");
        assert_eq!(cache.list_by_owner(OwnerId(1)).unwrap().len(), 1);
    }

    #[test]
    fn test_existing_row_keeps_id_and_display_name() {
        let cache = JsonMetadataCache::in_memory();
        let stored = format!("{}.encrypted", "Q".repeat(60));
        let uploaded = cache
            .create(NewFileRecord {
                owner: OwnerId(1),
                display_name: "tax-return.pdf".into(),
                stored_name: stored.clone(),
                remote_path: format!("disk:/{stored}"),
                size: 10,
                content_kind: "application/pdf".into(),
                encrypted: true,
                entry_kind: EntryKind::File,
            })
            .unwrap();

        let out = reconcile(&cache, OwnerId(1), vec![file(&stored, 77)], &NoopObserver);

        let ListedEntry::Cached(rec) = &out.entries[0] else {
            panic!("expected cached entry");
        };
        assert_eq!(rec.id, uploaded.id);
        assert_eq!(rec.display_name, "tax-return.pdf");
        assert_eq!(rec.size, 77);
        assert_eq!(rec.content_kind, "application/octet-stream");
    }

    #[test]
    fn test_unknown_encrypted_file_gets_placeholder() {
        let cache = JsonMetadataCache::in_memory();
        let stored = format!("{}.encrypted", "Q".repeat(60));

        let out = reconcile(&cache, OwnerId(1), vec![file(&stored, 5)], &NoopObserver);

        assert_eq!(out.entries[0].display_name(), PLACEHOLDER_NAME);
        assert!(out.entries[0].encrypted());
        assert_eq!(out.entries[0].stored_name(), stored);
    }

    #[test]
    fn test_rows_are_per_owner() {
        let cache = JsonMetadataCache::in_memory();
        reconcile(&cache, OwnerId(1), vec![file("a.txt", 1)], &NoopObserver);
        reconcile(&cache, OwnerId(2), vec![file("a.txt", 1)], &NoopObserver);

        assert_eq!(cache.list_by_owner(OwnerId(1)).unwrap().len(), 1);
        assert_eq!(cache.list_by_owner(OwnerId(2)).unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_listing_is_stable() {
        let cache = JsonMetadataCache::in_memory();
        let listing = vec![file("a.txt", 1), file("b.png", 2)];

        let first = reconcile(&cache, OwnerId(1), listing.clone(), &NoopObserver);
        let second = reconcile(&cache, OwnerId(1), listing, &NoopObserver);

        let ids = |r: &Reconciliation| r.entries.iter().map(|e| e.id()).collect::<Vec<_>>();
        assert_eq!(ids(&first), ids(&second));
        assert_eq!(cache.len().unwrap(), 2);
    }
}
