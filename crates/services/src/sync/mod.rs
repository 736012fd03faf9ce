//! Explicit, user-triggered synchronization with a remote attempt store.

pub mod reconciler;
pub mod remote;

pub use reconciler::{SyncReconciler, SyncResult, SyncStats};
pub use remote::{HttpRemoteStore, RemoteAttempt, RemoteAttemptStore, RemoteStoreConfig, UserScope};
