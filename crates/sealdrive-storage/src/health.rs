//! Storage health check

use opendal::Operator;
use sealdrive_core::{SealError, SealResult};

/// Verify the storage endpoint is reachable by listing the root
pub async fn check_health(op: &Operator) -> SealResult<()> {
    op.list("/")
        .await
        .map(|_| ())
        .map_err(|e| SealError::transport("health", "/", e))
}

/// Returns true if storage is reachable, false otherwise (non-panicking)
pub async fn is_healthy(op: &Operator) -> bool {
    check_health(op).await.is_ok()
}
