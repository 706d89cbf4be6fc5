//! sealdrive-sync: transfer engine with metadata cache and listing reconciliation

pub mod auth;
pub mod cache;
pub mod classify;
pub mod engine;
pub mod observer;
pub mod reconcile;

pub use auth::{SessionValidator, StaticTokenValidator};
pub use cache::{JsonMetadataCache, MetadataCache};
pub use classify::{classify, Classification, EncryptedDisplay};
pub use engine::{DownloadedFile, TransferEngine};
pub use observer::{NoopObserver, ReconcileOutcome, SyncEvent, SyncObserver, TracingObserver};
pub use reconcile::{reconcile, ListedEntry, PersistenceWarning, Reconciliation};
