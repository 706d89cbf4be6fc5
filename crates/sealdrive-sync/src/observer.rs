//! Hook for watching what the engine does, without threading a logger through it

use sealdrive_core::FileId;
use tracing::{debug, info, warn};

/// How reconciliation treated one listing entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// An existing cache row was refreshed
    Updated,
    /// A new cache row was created
    Created,
    /// Returned without a cache row (directory, or the cache write failed)
    Transient,
}

/// Things worth knowing about while a request runs.
///
/// Paths are remote (stored) paths; plaintext names and secrets never appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent<'a> {
    Uploaded {
        id: FileId,
        remote_path: &'a str,
        bytes: u64,
    },
    /// The object was stored but its cache row could not be written.
    OrphanedUpload {
        remote_path: &'a str,
        reason: &'a str,
    },
    Downloaded {
        id: FileId,
        bytes: u64,
    },
    Deleted {
        id: FileId,
        remote_path: &'a str,
    },
    Reconciled {
        remote_path: &'a str,
        outcome: ReconcileOutcome,
    },
    PersistenceFailed {
        remote_path: &'a str,
        reason: &'a str,
    },
    Listed {
        dir: &'a str,
        entries: usize,
        warnings: usize,
    },
    /// The stored name could not be decrypted; the cached display name was used.
    NameFallback {
        id: FileId,
    },
}

pub trait SyncObserver: Send + Sync {
    fn on_event(&self, event: &SyncEvent<'_>);
}

/// Forwards every event to `tracing`. The default observer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl SyncObserver for TracingObserver {
    fn on_event(&self, event: &SyncEvent<'_>) {
        match *event {
            SyncEvent::Uploaded {
                id,
                remote_path,
                bytes,
            } => info!(%id, remote_path, bytes, "uploaded"),
            SyncEvent::OrphanedUpload {
                remote_path,
                reason,
            } => warn!(
                remote_path,
                reason, "remote object stored but metadata write failed; object is orphaned"
            ),
            SyncEvent::Downloaded { id, bytes } => info!(%id, bytes, "downloaded"),
            SyncEvent::Deleted { id, remote_path } => info!(%id, remote_path, "deleted"),
            SyncEvent::Reconciled {
                remote_path,
                outcome,
            } => debug!(remote_path, ?outcome, "reconciled"),
            SyncEvent::PersistenceFailed {
                remote_path,
                reason,
            } => warn!(remote_path, reason, "metadata write failed during listing"),
            SyncEvent::Listed {
                dir,
                entries,
                warnings,
            } => debug!(dir, entries, warnings, "listed"),
            SyncEvent::NameFallback { id } => {
                debug!(%id, "stored name did not decrypt; using cached display name")
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl SyncObserver for NoopObserver {
    fn on_event(&self, _event: &SyncEvent<'_>) {}
}
