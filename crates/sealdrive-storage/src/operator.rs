//! OpenDAL Operator factory for sealdrive storage backends

use anyhow::Context;
use opendal::Operator;
use sealdrive_core::config::{StorageBackend, StorageConfig};
use sealdrive_core::{SealError, SealResult};

/// S3 access credentials, loaded separately from the config file.
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl S3Credentials {
    /// Read `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`.
    pub fn from_env() -> SealResult<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| SealError::Config("AWS_ACCESS_KEY_ID is not set".into()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .map_err(|_| SealError::Config("AWS_SECRET_ACCESS_KEY is not set".into()))?;
        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

/// In-process operator, used by tests and `backend = "memory"`.
pub fn build_memory_operator() -> SealResult<Operator> {
    let op = Operator::new(opendal::services::Memory::default())
        .context("creating OpenDAL memory operator")?
        .finish();
    Ok(op)
}

fn build_fs_operator(storage: &StorageConfig) -> SealResult<Operator> {
    let root = storage.root.to_string_lossy();
    let op = Operator::new(opendal::services::Fs::default().root(&root))
        .with_context(|| format!("creating OpenDAL fs operator at {root}"))?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

/// S3 (or any S3-compatible endpoint) with path-style addressing.
fn build_s3_operator(storage: &StorageConfig, creds: &S3Credentials) -> SealResult<Operator> {
    if storage.endpoint.starts_with("http://") {
        if storage.enforce_tls {
            return Err(SealError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                storage.endpoint
            )));
        }
        tracing::warn!(
            endpoint = %storage.endpoint,
            "S3 endpoint uses plaintext HTTP: credentials and sealed objects travel unencrypted. \
             Set storage.enforce_tls = true and use HTTPS in production."
        );
    }

    // opendal 0.55: S3 builder uses consuming pattern (methods take `self`, return `Self`)
    let builder = opendal::services::S3::default()
        .endpoint(&storage.endpoint)
        .region(&storage.region)
        .bucket(&storage.bucket)
        .root(&storage.root.to_string_lossy())
        .access_key_id(&creds.access_key_id)
        .secret_access_key(&creds.secret_access_key);

    let op = Operator::new(builder)
        .context("creating OpenDAL S3 operator")?
        .layer(opendal::layers::LoggingLayer::default())
        .finish();
    Ok(op)
}

/// Build the operator selected by `[storage] backend`.
///
/// `creds` is only consulted for the s3 backend. No retry layer is installed:
/// transport failures reach the caller on the first attempt.
pub fn build_from_config(
    storage: &StorageConfig,
    creds: Option<&S3Credentials>,
) -> SealResult<Operator> {
    match storage.backend {
        StorageBackend::Memory => build_memory_operator(),
        StorageBackend::Fs => build_fs_operator(storage),
        StorageBackend::S3 => {
            let creds = creds.ok_or_else(|| {
                SealError::Config("s3 backend selected but no credentials were provided".into())
            })?;
            build_s3_operator(storage, creds)
        }
    }
}
