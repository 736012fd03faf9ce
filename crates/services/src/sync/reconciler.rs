use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use drill_core::Clock;
use drill_core::model::{Attempt, AttemptId};

use super::remote::{RemoteAttempt, RemoteAttemptStore, UserScope};
use crate::error::SyncError;
use crate::ledger::AttemptLedger;

/// Outcome of an explicit sync request, suitable for showing to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub success: bool,
    pub synced_count: usize,
    pub message: String,
}

impl SyncResult {
    fn succeeded(synced_count: usize, message: impl Into<String>) -> Self {
        Self {
            success: true,
            synced_count,
            message: message.into(),
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            synced_count: 0,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub total: usize,
    pub synced: usize,
    pub unsynced: usize,
    pub last_sync_time: Option<DateTime<Utc>>,
}

/// Moves attempts between the local ledger and a remote store.
///
/// Nothing here runs on its own: every network round trip is the result of
/// a caller invoking [`upload`](Self::upload) or [`download`](Self::download).
pub struct SyncReconciler {
    ledger: Arc<AttemptLedger>,
    remote: Arc<dyn RemoteAttemptStore>,
    clock: Clock,
    user_scope: Option<UserScope>,
}

impl SyncReconciler {
    #[must_use]
    pub fn new(
        ledger: Arc<AttemptLedger>,
        remote: Arc<dyn RemoteAttemptStore>,
        clock: Clock,
    ) -> Self {
        Self {
            ledger,
            remote,
            clock,
            user_scope: None,
        }
    }

    /// Tag uploaded attempts with `scope`.
    #[must_use]
    pub fn with_user_scope(mut self, scope: UserScope) -> Self {
        self.user_scope = Some(scope);
        self
    }

    #[must_use]
    pub fn user_scope(&self) -> Option<&UserScope> {
        self.user_scope.as_ref()
    }

    /// Push every unsynced attempt and mark them synced on success.
    ///
    /// A failure leaves the ledger exactly as it was.
    #[tracing::instrument(skip(self))]
    pub async fn upload(&self) -> SyncResult {
        match self.try_upload().await {
            Ok(0) => SyncResult::succeeded(0, "nothing to upload"),
            Ok(count) => SyncResult::succeeded(count, format!("uploaded {count} attempts")),
            Err(err) => {
                tracing::error!(error = %err, "upload failed");
                SyncResult::failed(format!("upload failed: {err}"))
            }
        }
    }

    /// [`upload`](Self::upload) with the error kept typed.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the remote write fails or the ledger cannot be
    /// updated afterwards.
    pub async fn try_upload(&self) -> Result<usize, SyncError> {
        let pending = self.ledger.unsynced().await;
        if pending.is_empty() {
            return Ok(0);
        }

        let ids: Vec<AttemptId> = pending.iter().map(Attempt::id).collect();
        let rows: Vec<RemoteAttempt> = pending
            .into_iter()
            .map(|attempt| RemoteAttempt::new(attempt, self.user_scope.as_ref()))
            .collect();
        self.remote.upsert_attempts(&rows).await?;

        let now = self.clock.now();
        let marked = match self.ledger.mark_synced_many(&ids, now).await {
            Ok(marked) => marked,
            Err(err) if err.is_quota_exceeded() => {
                tracing::error!(
                    uploaded = ids.len(),
                    error = %err,
                    "remote accepted attempts but the ledger is full; they stay unsynced \
                     and will be re-sent on the next upload"
                );
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };
        self.ledger.set_last_sync_time(now).await?;
        tracing::info!(marked, "upload complete");
        Ok(marked)
    }

    /// Pull remote attempts, add unknown ones locally as synced, and return the
    /// merged local set. On failure the local set is returned unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn download(&self, scope: Option<&UserScope>) -> Vec<Attempt> {
        if let Err(err) = self.try_download(scope).await {
            tracing::warn!(error = %err, "download failed, keeping local attempts");
        }
        self.ledger.all().await
    }

    /// Returns how many remote attempts were new locally.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the remote read fails or the ledger cannot be written.
    pub async fn try_download(&self, scope: Option<&UserScope>) -> Result<usize, SyncError> {
        let rows = self.remote.fetch_attempts(scope).await?;
        let now = self.clock.now();
        let incoming: Vec<Attempt> = rows
            .into_iter()
            .map(|row| {
                let mut attempt = row.payload;
                if attempt.idempotency_key() != row.idempotency_key {
                    tracing::warn!(
                        id = %attempt.id(),
                        "remote row key differs from payload key; payload key wins"
                    );
                }
                if !attempt.is_synced() {
                    attempt.mark_synced(now);
                }
                attempt
            })
            .collect();

        let added = self.ledger.merge_remote(incoming).await?;
        self.ledger.set_last_sync_time(now).await?;
        tracing::info!(added, "download complete");
        Ok(added)
    }

    pub async fn stats(&self) -> SyncStats {
        let all = self.ledger.all().await;
        let synced = all.iter().filter(|a| a.is_synced()).count();
        SyncStats {
            total: all.len(),
            synced,
            unsynced: all.len() - synced,
            last_sync_time: self.ledger.last_sync_time().await,
        }
    }
}
