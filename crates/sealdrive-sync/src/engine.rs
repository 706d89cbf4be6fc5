//! Transfer engine: upload, download, naming, deletion and listing
//!
//! Each operation derives the key once from the caller's secret, uses it for
//! both ciphers, and drops it (zeroized) before returning. Nothing here
//! retries; the first failure ends the operation.
//!
//! Lifecycle of a remote object:
//! ```text
//! absent ──upload──▶ present ──delete──▶ absent
//! ```
//! `uploading` and `deleting` exist only for the duration of a call.
//!
//! Every owner works inside a private remote root, `disk:/<owner>`. Directory
//! arguments are relative to that root, and listing entries or records that
//! point outside it are never served.

use secrecy::SecretString;
use tracing::{debug, warn};

use sealdrive_core::{EntryKind, FileId, FileRecord, NewFileRecord, OwnerId, SealError, SealResult};
use sealdrive_crypto::{
    decrypt_name_with_key, decrypt_with_key, derive_key_with, encrypt_name_with_key,
    encrypt_with_key, is_encrypted_name, DerivedKey, KdfParams,
};
use sealdrive_storage::RemoteTransport;

use crate::cache::MetadataCache;
use crate::classify::mime_from_name;
use crate::observer::{SyncEvent, SyncObserver, TracingObserver};
use crate::reconcile::{reconcile, Reconciliation};

/// Plaintext and name returned by [`TransferEngine::download`].
#[derive(Clone, PartialEq, Eq)]
pub struct DownloadedFile {
    pub data: Vec<u8>,
    pub display_name: String,
}

impl std::fmt::Debug for DownloadedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadedFile")
            .field("bytes", &self.data.len())
            .field("display_name", &self.display_name)
            .finish()
    }
}

/// Orchestrates the ciphers, the remote transport and the metadata cache.
pub struct TransferEngine<T, C, O = TracingObserver> {
    transport: T,
    cache: C,
    observer: O,
    kdf: KdfParams,
}

impl<T, C> TransferEngine<T, C, TracingObserver>
where
    T: RemoteTransport,
    C: MetadataCache,
{
    pub fn new(transport: T, cache: C) -> Self {
        Self {
            transport,
            cache,
            observer: TracingObserver,
            kdf: KdfParams::default(),
        }
    }
}

impl<T, C, O> TransferEngine<T, C, O>
where
    T: RemoteTransport,
    C: MetadataCache,
    O: SyncObserver,
{
    /// Replace the event observer.
    pub fn with_observer<O2: SyncObserver>(self, observer: O2) -> TransferEngine<T, C, O2> {
        TransferEngine {
            transport: self.transport,
            cache: self.cache,
            observer,
            kdf: self.kdf,
        }
    }

    /// Override the key-derivation parameters.
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    fn derive(&self, secret: &SecretString) -> DerivedKey {
        derive_key_with(secret, &self.kdf)
    }

    /// Canonical remote root of `owner`.
    pub fn owner_root(&self, owner: OwnerId) -> SealResult<String> {
        self.owner_dir(owner, "")
    }

    /// `dir` resolved inside the remote root of `owner`.
    fn owner_dir(&self, owner: OwnerId, dir: &str) -> SealResult<String> {
        self.transport.scheme().scoped_dir(&owner.to_string(), dir)
    }

    /// Live record `id`, provided `owner` owns it and it lies in their root.
    fn owned_record(&self, owner: OwnerId, id: FileId) -> SealResult<FileRecord> {
        let record = self
            .cache
            .get(id)?
            .ok_or_else(|| SealError::NotFound(format!("file {id}")))?;
        if record.owner != owner {
            return Err(SealError::AccessDenied { file: id, owner });
        }
        let root = self.owner_root(owner)?;
        if !self.transport.scheme().is_within(&root, &record.remote_path) {
            warn!(id = %id, remote_path = %record.remote_path, "record points outside its owner's root");
            return Err(SealError::AccessDenied { file: id, owner });
        }
        Ok(record)
    }

    /// Encrypt `data` and `name`, store the object under `target_dir`, record it.
    ///
    /// If the cache write fails after the object was stored, the object stays
    /// on the remote without a record and the cache error is returned.
    pub async fn upload(
        &self,
        owner: OwnerId,
        data: &[u8],
        secret: &SecretString,
        target_dir: &str,
        name: &str,
    ) -> SealResult<FileRecord> {
        if name.is_empty() || name.contains('/') {
            return Err(SealError::InvalidName(format!(
                "{name:?} is not a single path component"
            )));
        }
        let dir = self.owner_dir(owner, target_dir)?;

        let (sealed, stored_name) = {
            let key = self.derive(secret);
            let sealed = encrypt_with_key(&key, data)?;
            let stored_name = encrypt_name_with_key(&key.name_key(), name)?;
            (sealed, stored_name)
        };
        let remote_path = self.transport.scheme().join(&dir, &stored_name)?;
        let size = sealed.len() as u64;

        debug!(remote_path = %remote_path, bytes = size, "uploading sealed object");
        self.transport.put(&remote_path, sealed).await?;

        let record = self
            .cache
            .create(NewFileRecord {
                owner,
                display_name: name.to_string(),
                stored_name,
                remote_path: remote_path.clone(),
                size,
                content_kind: mime_from_name(name).to_string(),
                encrypted: true,
                entry_kind: EntryKind::File,
            })
            .inspect_err(|e| {
                let reason = e.to_string();
                self.observer.on_event(&SyncEvent::OrphanedUpload {
                    remote_path: &remote_path,
                    reason: &reason,
                });
            })?;

        self.observer.on_event(&SyncEvent::Uploaded {
            id: record.id,
            remote_path: &record.remote_path,
            bytes: size,
        });
        Ok(record)
    }

    /// Fetch and decrypt file `id`.
    pub async fn download(
        &self,
        owner: OwnerId,
        id: FileId,
        secret: &SecretString,
    ) -> SealResult<DownloadedFile> {
        let record = self.owned_record(owner, id)?;
        let sealed = self.transport.get(&record.remote_path).await?;

        let data = if record.encrypted {
            let key = self.derive(secret);
            decrypt_with_key(&key, &sealed)?
        } else {
            sealed
        };

        self.observer.on_event(&SyncEvent::Downloaded {
            id,
            bytes: data.len() as u64,
        });
        Ok(DownloadedFile {
            data,
            display_name: record.display_name,
        })
    }

    /// Recover the plaintext name of file `id` from its stored name.
    ///
    /// A stored name that will not decrypt falls back to the cached display
    /// name instead of failing.
    pub fn decrypt_display_name(
        &self,
        owner: OwnerId,
        id: FileId,
        secret: &SecretString,
    ) -> SealResult<String> {
        let record = self.owned_record(owner, id)?;
        if !is_encrypted_name(&record.stored_name) {
            return Ok(record.stored_name);
        }

        let key = self.derive(secret).name_key();
        match decrypt_name_with_key(&key, &record.stored_name) {
            Ok(name) => Ok(name),
            Err(_) => {
                self.observer.on_event(&SyncEvent::NameFallback { id });
                Ok(record.display_name)
            }
        }
    }

    /// Delete file `id`: the remote object first, then the record.
    ///
    /// A remote failure leaves the record in place. An object already missing
    /// remotely counts as deleted.
    pub async fn delete(&self, owner: OwnerId, id: FileId) -> SealResult<()> {
        let record = self.owned_record(owner, id)?;

        match self.transport.delete(&record.remote_path).await {
            Ok(()) => {}
            Err(SealError::NotFound(_)) => {
                warn!(remote_path = %record.remote_path, "remote object already gone; dropping record");
            }
            Err(e) => return Err(e),
        }

        self.cache.delete(id)?;
        self.observer.on_event(&SyncEvent::Deleted {
            id,
            remote_path: &record.remote_path,
        });
        Ok(())
    }

    /// List `dir` remotely and reconcile it with the cache.
    pub async fn list(&self, owner: OwnerId, dir: &str) -> SealResult<Reconciliation> {
        let dir = self.owner_dir(owner, dir)?;
        let scheme = self.transport.scheme();
        let mut listing = self.transport.list(&dir).await?;
        listing.retain(|entry| {
            let inside = scheme.is_within(&dir, &entry.path);
            if !inside {
                debug!(dir = %dir, path = %entry.path, "dropping listing entry outside the listed directory");
            }
            inside
        });
        let result = reconcile(&self.cache, owner, listing, &self.observer);

        self.observer.on_event(&SyncEvent::Listed {
            dir: &dir,
            entries: result.entries.len(),
            warnings: result.warnings.len(),
        });
        Ok(result)
    }

    /// Cached record of file `id`.
    pub fn file_info(&self, owner: OwnerId, id: FileId) -> SealResult<FileRecord> {
        self.owned_record(owner, id)
    }

    /// Every live record `owner` has in the cache, without touching the remote.
    pub fn cached_files(&self, owner: OwnerId) -> SealResult<Vec<FileRecord>> {
        self.cache.list_by_owner(owner)
    }
}

