use thiserror::Error;

use crate::types::{FileId, OwnerId};

pub type SealResult<T> = Result<T, SealError>;

/// Message shown for every content or name decryption failure.
///
/// Kept identical for truncated input and tag mismatch so callers cannot tell
/// the two apart.
pub const DECRYPTION_FAILED: &str = "wrong password or corrupted data";

#[derive(Debug, Error)]
pub enum SealError {
    #[error("missing or invalid credential")]
    Unauthenticated,

    #[error("access denied: file {file} is not owned by {owner}")]
    AccessDenied { file: FileId, owner: OwnerId },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("decryption failed: {}", DECRYPTION_FAILED)]
    Decryption,

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("transport error during {op} {path}: {reason}")]
    Transport {
        op: &'static str,
        path: String,
        reason: String,
    },

    #[error("metadata cache error: {0}")]
    Cache(String),

    #[error("invalid remote path: {0}")]
    InvalidPath(String),

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SealError {
    pub fn transport(op: &'static str, path: impl Into<String>, reason: impl ToString) -> Self {
        SealError::Transport {
            op,
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Whether the caller should re-prompt for the secret rather than report a fault.
    pub fn is_wrong_secret(&self) -> bool {
        matches!(self, SealError::Decryption)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decryption_message_is_generic() {
        let msg = SealError::Decryption.to_string();
        assert!(msg.contains(DECRYPTION_FAILED));
        assert!(!msg.contains("tag"));
        assert!(!msg.contains("short"));
    }

    #[test]
    fn transport_error_mentions_op_and_path() {
        let err = SealError::transport("put", "disk:/a.txt", "timed out");
        let msg = err.to_string();
        assert!(msg.contains("put"));
        assert!(msg.contains("disk:/a.txt"));
        assert!(msg.contains("timed out"));
    }

    #[test]
    fn access_denied_names_file_and_owner() {
        let err = SealError::AccessDenied {
            file: FileId(7),
            owner: OwnerId(2),
        };
        assert_eq!(err.to_string(), "access denied: file 7 is not owned by 2");
        assert!(!err.is_wrong_secret());
        assert!(SealError::Decryption.is_wrong_secret());
    }
}
