use std::env;
use std::sync::Arc;

use drill_core::{Clock, VerbCatalog};
use storage::repository::Storage;

use crate::catalog_loader::{self, CatalogSource};
use crate::error::{CatalogLoadError, ServicesError};
use crate::ledger::{AttemptLedger, LedgerOptions};
use crate::practice_service::PracticeService;
use crate::sync::{HttpRemoteStore, RemoteAttemptStore, RemoteStoreConfig, SyncReconciler};

const DEFAULT_DB_URL: &str = "sqlite:drill.sqlite3?mode=rwc";

/// Assembles the quiz services around one catalog and one ledger.
#[derive(Clone)]
pub struct QuizServices {
    catalog: Arc<VerbCatalog>,
    ledger: Arc<AttemptLedger>,
    practice: Arc<PracticeService>,
    sync: Option<Arc<SyncReconciler>>,
}

impl QuizServices {
    /// Services backed by an in-memory store, without remote sync.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::assemble(&Storage::in_memory(), LedgerOptions::default(), clock, None)
    }

    /// Build services backed by `SQLite` storage, syncing to `remote` when given.
    ///
    /// # Errors
    ///
    /// Returns `ServicesError` if storage initialization fails.
    pub async fn new_sqlite(
        db_url: &str,
        clock: Clock,
        remote: Option<RemoteStoreConfig>,
    ) -> Result<Self, ServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        let remote = remote.map(|config| {
            let store: Arc<dyn RemoteAttemptStore> = Arc::new(HttpRemoteStore::new(config));
            store
        });
        Ok(Self::assemble(
            &storage,
            LedgerOptions::default(),
            clock,
            remote,
        ))
    }

    /// [`new_sqlite`](Self::new_sqlite) configured from `DRILL_DB_URL` and the
    /// `DRILL_REMOTE_*` variables.
    ///
    /// # Errors
    ///
    /// Returns `ServicesError` if storage initialization fails.
    pub async fn from_env(clock: Clock) -> Result<Self, ServicesError> {
        let db_url = env::var("DRILL_DB_URL").unwrap_or_else(|_| DEFAULT_DB_URL.to_owned());
        Self::new_sqlite(&db_url, clock, RemoteStoreConfig::from_env()).await
    }

    /// Wire the services over an existing storage handle.
    #[must_use]
    pub fn assemble(
        storage: &Storage,
        options: LedgerOptions,
        clock: Clock,
        remote: Option<Arc<dyn RemoteAttemptStore>>,
    ) -> Self {
        let catalog = Arc::new(VerbCatalog::new());
        let ledger = Arc::new(AttemptLedger::new(Arc::clone(&storage.store), options));
        let practice = Arc::new(PracticeService::new(
            Arc::clone(&catalog),
            Arc::clone(&ledger),
            clock,
        ));
        let sync = remote.map(|remote| {
            Arc::new(SyncReconciler::new(Arc::clone(&ledger), remote, clock))
        });
        if sync.is_none() {
            tracing::debug!("remote sync disabled");
        }

        Self {
            catalog,
            ledger,
            practice,
            sync,
        }
    }

    /// Initial catalog load. Practice runs fail with `CatalogNotReady` until
    /// this succeeds.
    ///
    /// # Errors
    ///
    /// Returns `CatalogLoadError` if the source fails or any record is invalid.
    pub async fn load_catalog(
        &self,
        source: &dyn CatalogSource,
    ) -> Result<usize, CatalogLoadError> {
        catalog_loader::load_catalog(source, &self.catalog).await
    }

    /// Refetch the catalog. Practice runs fail with `CatalogNotReady` while
    /// the reload is in flight and after a failed one.
    ///
    /// # Errors
    ///
    /// Returns `CatalogLoadError` if the source fails or any record is invalid.
    pub async fn reload_catalog(
        &self,
        source: &dyn CatalogSource,
    ) -> Result<usize, CatalogLoadError> {
        catalog_loader::reload_catalog(source, &self.catalog).await
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<VerbCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn ledger(&self) -> Arc<AttemptLedger> {
        Arc::clone(&self.ledger)
    }

    #[must_use]
    pub fn practice(&self) -> Arc<PracticeService> {
        Arc::clone(&self.practice)
    }

    /// `None` when no remote store is configured.
    #[must_use]
    pub fn sync(&self) -> Option<Arc<SyncReconciler>> {
        self.sync.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drill_core::time::fixed_clock;

    #[tokio::test]
    async fn in_memory_services_share_catalog_and_ledger() {
        let services = QuizServices::in_memory(fixed_clock());
        assert!(services.sync().is_none());
        assert!(!services.catalog().is_ready());
        assert!(services.ledger().all().await.is_empty());
        assert!(Arc::ptr_eq(&services.catalog(), &services.clone().catalog()));
    }

    #[tokio::test]
    async fn sqlite_services_enable_sync_when_configured() {
        let services = QuizServices::new_sqlite(
            "sqlite:file:memdb_services?mode=memory&cache=shared",
            fixed_clock(),
            Some(RemoteStoreConfig::new("http://127.0.0.1:9")),
        )
        .await
        .unwrap();
        assert!(services.sync().is_some());
    }
}
