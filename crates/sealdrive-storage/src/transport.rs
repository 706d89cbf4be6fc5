//! Remote object transport

use std::future::Future;

use opendal::{EntryMode, ErrorKind, Metadata, Operator};
use sealdrive_core::{EntryKind, RemoteEntry, SealError, SealResult};
use tracing::{debug, warn};

use crate::path::RemotePathScheme;

/// Byte-level access to the remote drive, addressed by canonical paths.
///
/// Implementations must not retry; failures surface to the caller as
/// [`SealError::Transport`] (or [`SealError::NotFound`] for a missing object).
pub trait RemoteTransport: Send + Sync {
    /// Immediate children of `dir`, in the order the remote reports them.
    fn list(&self, dir: &str) -> impl Future<Output = SealResult<Vec<RemoteEntry>>> + Send;

    /// Create or overwrite the object at `path`.
    fn put(&self, path: &str, data: Vec<u8>) -> impl Future<Output = SealResult<()>> + Send;

    fn get(&self, path: &str) -> impl Future<Output = SealResult<Vec<u8>>> + Send;

    fn delete(&self, path: &str) -> impl Future<Output = SealResult<()>> + Send;

    /// The path convention this transport applies.
    fn scheme(&self) -> &RemotePathScheme;
}

/// [`RemoteTransport`] over an OpenDAL [`Operator`] (memory, fs or s3).
#[derive(Debug, Clone)]
pub struct OpendalTransport {
    op: Operator,
    scheme: RemotePathScheme,
}

impl OpendalTransport {
    pub fn new(op: Operator, scheme: RemotePathScheme) -> Self {
        Self { op, scheme }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }
}

fn transport_err(op: &'static str, path: &str, e: opendal::Error) -> SealError {
    if e.kind() == ErrorKind::NotFound {
        SealError::NotFound(path.to_string())
    } else {
        SealError::transport(op, path, e)
    }
}

/// Fill in size and MIME type of a listed file from a follow-up stat.
///
/// A failed stat keeps the listed values.
fn apply_stat(
    path: &str,
    size: u64,
    mime_hint: Option<String>,
    stat: opendal::Result<Metadata>,
) -> (u64, Option<String>) {
    match stat {
        Ok(stat) => {
            let hint = mime_hint.or_else(|| stat.content_type().map(str::to_string));
            (stat.content_length(), hint)
        }
        Err(e) => {
            warn!(path, error = %e, "stat failed; keeping listed size {size}");
            (size, mime_hint)
        }
    }
}

impl RemoteTransport for OpendalTransport {
    async fn list(&self, dir: &str) -> SealResult<Vec<RemoteEntry>> {
        let key = self.scheme.dir_key(dir)?;
        let entries = self.op.list(&key).await.map_err(|e| transport_err("list", dir, e))?;

        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            let entry_path = entry.path();
            // Some services include the listed directory itself
            if entry_path.trim_start_matches('/') == key.trim_start_matches('/') {
                continue;
            }

            let meta = entry.metadata();
            let kind = if meta.mode() == EntryMode::DIR || entry_path.ends_with('/') {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            let mut size = if kind.is_dir() { 0 } else { meta.content_length() };
            let mut mime_hint = meta.content_type().map(str::to_string);

            // kv-style services list names only; fetch the rest on demand
            if kind == EntryKind::File && size == 0 {
                let stat = self.op.stat(entry_path).await;
                (size, mime_hint) = apply_stat(entry_path, size, mime_hint, stat);
            }

            out.push(RemoteEntry {
                name: entry.name().trim_end_matches('/').to_string(),
                path: self.scheme.from_key(entry_path),
                kind,
                size,
                mime_hint,
            });
        }

        debug!(dir, count = out.len(), "listed remote directory");
        Ok(out)
    }

    async fn put(&self, path: &str, data: Vec<u8>) -> SealResult<()> {
        let key = self.scheme.file_key(path)?;
        let len = data.len();
        self.op
            .write(&key, data)
            .await
            .map_err(|e| transport_err("put", path, e))?;
        debug!(path, bytes = len, "stored remote object");
        Ok(())
    }

    async fn get(&self, path: &str) -> SealResult<Vec<u8>> {
        let key = self.scheme.file_key(path)?;
        let buf = self
            .op
            .read(&key)
            .await
            .map_err(|e| transport_err("get", path, e))?;
        Ok(buf.to_vec())
    }

    async fn delete(&self, path: &str) -> SealResult<()> {
        let key = self.scheme.file_key(path)?;
        self.op
            .delete(&key)
            .await
            .map_err(|e| transport_err("delete", path, e))?;
        debug!(path, "deleted remote object");
        Ok(())
    }

    fn scheme(&self) -> &RemotePathScheme {
        &self.scheme
    }
}
