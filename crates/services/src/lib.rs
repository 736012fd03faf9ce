#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog_loader;
pub mod error;
pub mod ledger;
pub mod practice_service;
pub mod statistics;
pub mod sync;

#[cfg(test)]
mod test_support;

pub use drill_core::Clock;

pub use app_services::QuizServices;
pub use catalog_loader::{
    CatalogSource, CatalogSourceConfig, HttpCatalogSource, StaticCatalogSource, load_catalog,
    reload_catalog,
};
pub use error::{CatalogLoadError, LedgerError, PracticeError, ServicesError, SyncError};
pub use ledger::{AttemptLedger, LedgerOptions};
pub use practice_service::{PracticeRun, PracticeService};
pub use statistics::{Breakdown, Statistics, StatisticsFilter, Trend, TrendDirection};
pub use sync::{
    HttpRemoteStore, RemoteAttempt, RemoteAttemptStore, RemoteStoreConfig, SyncReconciler,
    SyncResult, SyncStats, UserScope,
};
