//! Shared error types for the services crate.

use thiserror::Error;

use drill_core::CatalogError;
use drill_core::model::{AttemptId, ConfigError, IdempotencyKey, QuestionId};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `AttemptLedger` write paths.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    #[error("attempt {0} not found")]
    NotFound(AttemptId),

    #[error("attempt {0} already exists")]
    DuplicateId(AttemptId),

    #[error("an attempt with idempotency key {0} already exists")]
    DuplicateKey(IdempotencyKey),

    #[error("stored ledger is unreadable: {0}")]
    Corrupt(String),

    #[error("failed to encode ledger: {0}")]
    Serialization(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl LedgerError {
    /// True when the backing store ran out of space.
    #[must_use]
    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, Self::Storage(StorageError::QuotaExceeded { .. }))
    }
}

/// Errors emitted while talking to the remote attempt store.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SyncError {
    #[error("remote request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("remote store error: {0}")]
    Remote(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Errors emitted while fetching and loading the verb catalog.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogLoadError {
    #[error("catalog request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors emitted by `PracticeService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PracticeError {
    #[error("verb catalog is not loaded yet")]
    CatalogNotReady,

    #[error("invalid test configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ConfigError>),

    #[error("no questions could be generated for this configuration")]
    NoQuestions,

    #[error("question {0} is not part of this run")]
    UnknownQuestion(QuestionId),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors emitted while bootstrapping quiz services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}
