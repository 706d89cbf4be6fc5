use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{SealError, SealResult};
use crate::types::OwnerId;

/// Lowest PBKDF2 iteration count accepted from configuration.
pub const MIN_PBKDF2_ITERATIONS: u32 = 100_000;

/// Top-level configuration (loaded from sealdrive.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    pub log: LogConfig,
    pub storage: StorageConfig,
    pub crypto: CryptoConfig,
    pub cache: CacheConfig,
    pub limits: LimitsConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter, used when neither --log nor RUST_LOG is set (default: info)
    pub level: String,
}

/// Which OpenDAL service backs the remote drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process-local, for tests and dry runs
    Memory,
    /// A local directory standing in for the cloud drive
    Fs,
    /// Any S3-compatible endpoint
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the `fs` backend, or key prefix for `s3`
    pub root: PathBuf,
    /// S3 endpoint
    pub endpoint: String,
    /// S3 region (default: us-east-1)
    pub region: String,
    /// S3 bucket name
    pub bucket: String,
    /// Refuse plaintext HTTP endpoints
    pub enforce_tls: bool,
    /// Scheme prefixed to every remote path (default: "disk:")
    pub remote_prefix: String,
}

/// E2E encryption configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// PBKDF2-HMAC-SHA256 iteration count (default: 100000)
    pub pbkdf2_iterations: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// JSON metadata cache path
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest file accepted for upload; content is buffered fully in memory
    pub max_upload_bytes: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub tokens: Vec<TokenEntry>,
}

/// A bearer token and the owner it authenticates as
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub owner: OwnerId,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: PathBuf::from("~/.local/share/sealdrive/remote"),
            endpoint: "http://localhost:8333".into(),
            region: "us-east-1".into(),
            bucket: "sealdrive".into(),
            enforce_tls: false,
            remote_prefix: "disk:".into(),
        }
    }
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            pbkdf2_iterations: MIN_PBKDF2_ITERATIONS,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("~/.local/share/sealdrive/metadata.json"),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 100 * 1024 * 1024,
        }
    }
}

impl SealConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml(content: &str) -> SealResult<Self> {
        let config: SealConfig =
            toml::from_str(content).map_err(|e| SealError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> SealResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {} (using defaults)", path.display());
            return Ok(SealConfig::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
            .map_err(|e| SealError::Config(format!("{}: {e}", path.display())))
    }

    pub fn validate(&self) -> SealResult<()> {
        if self.crypto.pbkdf2_iterations < MIN_PBKDF2_ITERATIONS {
            return Err(SealError::Config(format!(
                "crypto.pbkdf2_iterations = {} is below the minimum of {}",
                self.crypto.pbkdf2_iterations, MIN_PBKDF2_ITERATIONS
            )));
        }
        if self.storage.remote_prefix.trim().is_empty() || self.storage.remote_prefix.contains('/')
        {
            return Err(SealError::Config(format!(
                "storage.remote_prefix must be a non-empty scheme without '/': {:?}",
                self.storage.remote_prefix
            )));
        }
        if self.storage.backend == StorageBackend::S3
            && self.storage.enforce_tls
            && self.storage.endpoint.starts_with("http://")
        {
            return Err(SealError::Config(format!(
                "S3 endpoint uses plaintext HTTP ({}), but storage.enforce_tls is enabled",
                self.storage.endpoint
            )));
        }
        if self.limits.max_upload_bytes == 0 {
            return Err(SealError::Config(
                "limits.max_upload_bytes must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
[log]
level = "debug"

[storage]
backend = "s3"
endpoint = "https://s3.example.com:8333"
region = "us-west-2"
bucket = "my-bucket"
enforce_tls = true
remote_prefix = "drive:"

[crypto]
pbkdf2_iterations = 250000

[cache]
path = "/var/lib/sealdrive/meta.json"

[limits]
max_upload_bytes = 1048576

[[auth.tokens]]
token = "alice-token"
owner = 1

[[auth.tokens]]
token = "bob-token"
owner = 2
"#;
        let config = SealConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.log.level, "debug");
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.storage.endpoint, "https://s3.example.com:8333");
        assert!(config.storage.enforce_tls);
        assert_eq!(config.storage.remote_prefix, "drive:");
        assert_eq!(config.crypto.pbkdf2_iterations, 250_000);
        assert_eq!(config.cache.path, PathBuf::from("/var/lib/sealdrive/meta.json"));
        assert_eq!(config.limits.max_upload_bytes, 1_048_576);
        assert_eq!(config.auth.tokens.len(), 2);
        assert_eq!(config.auth.tokens[1].owner, OwnerId(2));
    }

    #[test]
    fn test_parse_defaults() {
        let config = SealConfig::from_toml("").unwrap();

        assert_eq!(config.log.level, "info");
        assert_eq!(config.storage.backend, StorageBackend::Fs);
        assert_eq!(config.storage.remote_prefix, "disk:");
        assert_eq!(config.crypto.pbkdf2_iterations, MIN_PBKDF2_ITERATIONS);
        assert!(config.auth.tokens.is_empty());
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"
[storage]
backend = "memory"
"#;
        let config = SealConfig::from_toml(toml_str).unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Memory);
        // Defaults
        assert_eq!(config.storage.region, "us-east-1");
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn test_reject_weak_iterations() {
        let err = SealConfig::from_toml("[crypto]\npbkdf2_iterations = 1000\n").unwrap_err();
        assert!(err.to_string().contains("pbkdf2_iterations"));
    }

    #[test]
    fn test_reject_http_with_enforce_tls() {
        let toml_str = r#"
[storage]
backend = "s3"
endpoint = "http://insecure:8333"
enforce_tls = true
"#;
        let err = SealConfig::from_toml(toml_str).unwrap_err();
        assert!(err.to_string().contains("enforce_tls"));
    }

    #[test]
    fn test_reject_prefix_with_slash() {
        let err = SealConfig::from_toml("[storage]\nremote_prefix = \"disk:/\"\n").unwrap_err();
        assert!(err.to_string().contains("remote_prefix"));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SealConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.bucket, "sealdrive");
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = SealConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed = SealConfig::from_toml(&toml_str).unwrap();

        assert_eq!(config.storage.endpoint, parsed.storage.endpoint);
        assert_eq!(config.cache.path, parsed.cache.path);
        assert_eq!(config.crypto.pbkdf2_iterations, parsed.crypto.pbkdf2_iterations);
    }
}
