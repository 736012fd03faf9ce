//! Durable local store of completed attempts.
//!
//! The whole ledger lives in one JSON array under a single key of a
//! [`KeyedStore`]. Reads are forgiving (a missing or corrupt blob reads as
//! empty, corrupt records are skipped) so a damaged store never blocks the
//! app. Writes carry undecodable records through untouched and only refuse
//! to run when the blob is not a JSON array at all.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use drill_core::model::{Attempt, AttemptId, IdempotencyKey, SyncState};
use storage::repository::{InMemoryStore, KeyedStore, StorageError};

use crate::error::LedgerError;
use crate::statistics::{self, Statistics, StatisticsFilter};

const ATTEMPTS_KEY: &str = "attempts";
const LAST_SYNC_KEY: &str = "last_sync";

// Bytes reserved per unsynced attempt on append, so filling in `synced_at`
// after a successful upload still fits under the ledger quota.
const SYNC_MARK_HEADROOM: u64 = 64;

pub const DEFAULT_NAMESPACE: &str = "verb_drill";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOptions {
    pub namespace: String,
    /// Upper bound on the encoded ledger size in bytes.
    pub quota_bytes: Option<u64>,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_owned(),
            quota_bytes: None,
        }
    }
}

impl LedgerOptions {
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    #[must_use]
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }
}

pub struct AttemptLedger {
    store: Arc<dyn KeyedStore>,
    options: LedgerOptions,
    // Serializes read-modify-write cycles so concurrent writers never
    // interleave and readers only ever see a complete blob.
    write_lock: Mutex<()>,
}

impl AttemptLedger {
    #[must_use]
    pub fn new(store: Arc<dyn KeyedStore>, options: LedgerOptions) -> Self {
        Self {
            store,
            options,
            write_lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()), LedgerOptions::default())
    }

    #[must_use]
    pub fn options(&self) -> &LedgerOptions {
        &self.options
    }

    //
    // ─── READS ─────────────────────────────────────────────────────────────────
    //

    /// All attempts, most recently started first.
    pub async fn all(&self) -> Vec<Attempt> {
        let mut attempts = self.read_lenient().await;
        sort_newest_first(&mut attempts);
        attempts
    }

    pub async fn get(&self, id: AttemptId) -> Option<Attempt> {
        self.read_lenient().await.into_iter().find(|a| a.id() == id)
    }

    pub async fn get_by_key(&self, key: IdempotencyKey) -> Option<Attempt> {
        self.read_lenient()
            .await
            .into_iter()
            .find(|a| a.idempotency_key() == key)
    }

    pub async fn unsynced(&self) -> Vec<Attempt> {
        let mut attempts = self.all().await;
        attempts.retain(|a| !a.is_synced());
        attempts
    }

    pub async fn synced(&self) -> Vec<Attempt> {
        let mut attempts = self.all().await;
        attempts.retain(Attempt::is_synced);
        attempts
    }

    pub async fn statistics(&self, filter: &StatisticsFilter) -> Statistics {
        statistics::compute(&self.read_lenient().await, filter)
    }

    pub async fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        let raw = match self.store.get(&self.options.namespace, LAST_SYNC_KEY).await {
            Ok(raw) => raw?,
            Err(err) => {
                tracing::warn!(error = %err, "failed to read last sync time");
                return None;
            }
        };
        match DateTime::parse_from_rfc3339(raw.trim()) {
            Ok(at) => Some(at.with_timezone(&Utc)),
            Err(err) => {
                tracing::warn!(error = %err, raw = %raw, "ignoring unparsable last sync time");
                None
            }
        }
    }

    //
    // ─── WRITES ────────────────────────────────────────────────────────────────
    //

    /// Persist a new attempt.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::DuplicateId` / `DuplicateKey` if an attempt with
    /// the same id or idempotency key exists, `LedgerError::Storage` with
    /// `QuotaExceeded` when the store is full, or other storage errors.
    pub async fn append(&self, attempt: Attempt) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_strict().await?;
        ensure_unique(&stored.attempts, &attempt)?;
        let id = attempt.id();
        stored.attempts.push(attempt);
        let pending = stored.attempts.iter().filter(|a| !a.is_synced()).count();
        let headroom =
            SYNC_MARK_HEADROOM.saturating_mul(u64::try_from(pending).unwrap_or(u64::MAX));
        self.write_with_headroom(&stored, headroom).await?;
        tracing::debug!(%id, total = stored.attempts.len(), "appended attempt");
        Ok(())
    }

    /// Append every remote attempt whose idempotency key is not already
    /// present. Local records are never overwritten. Returns how many were added.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the ledger cannot be read or written.
    pub async fn merge_remote(&self, incoming: Vec<Attempt>) -> Result<usize, LedgerError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_strict().await?;
        let before = stored.attempts.len();
        for attempt in incoming {
            if ensure_unique(&stored.attempts, &attempt).is_ok() {
                stored.attempts.push(attempt);
            } else {
                tracing::debug!(key = %attempt.idempotency_key(), "skipping known remote attempt");
            }
        }
        let added = stored.attempts.len() - before;
        if added > 0 {
            self.write(&stored).await?;
        }
        Ok(added)
    }

    /// Replace the sync state of one attempt. Other fields are immutable.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` (after logging) if `id` is unknown; the
    /// ledger is left unchanged. Storage failures propagate.
    pub async fn update(&self, id: AttemptId, state: SyncState) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_strict().await?;
        let Some(attempt) = stored.attempts.iter_mut().find(|a| a.id() == id) else {
            tracing::warn!(%id, "update of unknown attempt ignored");
            return Err(LedgerError::NotFound(id));
        };
        attempt.set_sync_state(state);
        self.write(&stored).await
    }

    /// Mark several attempts synced in a single write. Unknown ids are
    /// skipped. Returns how many records changed.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError` if the ledger cannot be read or written; in that
    /// case no record is marked.
    pub async fn mark_synced_many(
        &self,
        ids: &[AttemptId],
        at: DateTime<Utc>,
    ) -> Result<usize, LedgerError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_strict().await?;
        let mut changed = 0;
        for attempt in stored
            .attempts
            .iter_mut()
            .filter(|a| ids.contains(&a.id()))
        {
            attempt.mark_synced(at);
            changed += 1;
        }
        if changed < ids.len() {
            tracing::warn!(
                requested = ids.len(),
                changed,
                "some attempts vanished before they could be marked synced"
            );
        }
        if changed > 0 {
            self.write(&stored).await?;
        }
        Ok(changed)
    }

    /// # Errors
    ///
    /// Returns `LedgerError::NotFound` (after logging) if `id` is unknown, or
    /// storage errors.
    pub async fn delete(&self, id: AttemptId) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        let mut stored = self.read_strict().await?;
        let before = stored.attempts.len();
        stored.attempts.retain(|a| a.id() != id);
        if stored.attempts.len() == before {
            tracing::warn!(%id, "delete of unknown attempt ignored");
            return Err(LedgerError::NotFound(id));
        }
        self.write(&stored).await
    }

    /// Drop every attempt and the last-sync marker. Also the way out of a
    /// blob that is not a JSON array.
    ///
    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the store cannot be written.
    pub async fn clear(&self) -> Result<(), LedgerError> {
        let _guard = self.write_lock.lock().await;
        self.store
            .remove(&self.options.namespace, ATTEMPTS_KEY)
            .await?;
        self.store
            .remove(&self.options.namespace, LAST_SYNC_KEY)
            .await?;
        tracing::info!(namespace = %self.options.namespace, "cleared attempt ledger");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `LedgerError::Storage` if the store cannot be written.
    pub async fn set_last_sync_time(&self, at: DateTime<Utc>) -> Result<(), LedgerError> {
        self.store
            .set(&self.options.namespace, LAST_SYNC_KEY, &at.to_rfc3339())
            .await?;
        Ok(())
    }

    //
    // ─── INTERNALS ─────────────────────────────────────────────────────────────
    //

    async fn read_lenient(&self) -> Vec<Attempt> {
        let raw = match self.store.get(&self.options.namespace, ATTEMPTS_KEY).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                tracing::warn!(error = %err, "attempt ledger unreadable, treating as empty");
                return Vec::new();
            }
        };
        let values: Vec<serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(values) => values,
            Err(err) => {
                tracing::warn!(error = %err, "attempt ledger is corrupt, treating as empty");
                return Vec::new();
            }
        };
        values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value::<Attempt>(value) {
                Ok(attempt) => Some(attempt),
                Err(err) => {
                    tracing::warn!(index, error = %err, "skipping corrupt attempt record");
                    None
                }
            })
            .collect()
    }

    async fn read_strict(&self) -> Result<StoredLedger, LedgerError> {
        let Some(raw) = self
            .store
            .get(&self.options.namespace, ATTEMPTS_KEY)
            .await?
        else {
            return Ok(StoredLedger::default());
        };
        let values: Vec<serde_json::Value> =
            serde_json::from_str(&raw).map_err(|err| LedgerError::Corrupt(err.to_string()))?;

        let mut stored = StoredLedger::default();
        for value in values {
            match Attempt::deserialize(&value) {
                Ok(attempt) => stored.attempts.push(attempt),
                Err(err) => {
                    tracing::warn!(error = %err, "keeping undecodable attempt record as is");
                    stored.unreadable.push(value);
                }
            }
        }
        Ok(stored)
    }

    async fn write(&self, stored: &StoredLedger) -> Result<(), LedgerError> {
        self.write_with_headroom(stored, 0).await
    }

    async fn write_with_headroom(
        &self,
        stored: &StoredLedger,
        headroom: u64,
    ) -> Result<(), LedgerError> {
        let encoded = stored.encode()?;
        if let Some(limit) = self.options.quota_bytes {
            let size = u64::try_from(encoded.len()).unwrap_or(u64::MAX);
            let requested = size.saturating_add(headroom);
            if requested > limit {
                tracing::warn!(limit, requested, "attempt ledger quota exceeded");
                return Err(StorageError::QuotaExceeded { limit, requested }.into());
            }
        }
        self.store
            .set(&self.options.namespace, ATTEMPTS_KEY, &encoded)
            .await?;
        Ok(())
    }
}

/// Decoded view of the blob used by writers. Records that no longer decode
/// are written back verbatim so a single bad entry never costs the others.
#[derive(Default)]
struct StoredLedger {
    attempts: Vec<Attempt>,
    unreadable: Vec<serde_json::Value>,
}

impl StoredLedger {
    fn encode(&self) -> Result<String, LedgerError> {
        let mut values = Vec::with_capacity(self.attempts.len() + self.unreadable.len());
        for attempt in &self.attempts {
            values.push(
                serde_json::to_value(attempt)
                    .map_err(|err| LedgerError::Serialization(err.to_string()))?,
            );
        }
        values.extend(self.unreadable.iter().cloned());
        serde_json::to_string(&values).map_err(|err| LedgerError::Serialization(err.to_string()))
    }
}

fn ensure_unique(existing: &[Attempt], candidate: &Attempt) -> Result<(), LedgerError> {
    for attempt in existing {
        if attempt.id() == candidate.id() {
            return Err(LedgerError::DuplicateId(candidate.id()));
        }
        if attempt.idempotency_key() == candidate.idempotency_key() {
            return Err(LedgerError::DuplicateKey(candidate.idempotency_key()));
        }
    }
    Ok(())
}

fn sort_newest_first(attempts: &mut [Attempt]) {
    attempts.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
