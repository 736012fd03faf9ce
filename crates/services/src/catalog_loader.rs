//! Fetching catalog uploads and loading them into a [`VerbCatalog`].

use std::env;

use async_trait::async_trait;
use reqwest::Client;

use drill_core::catalog::parse_catalog_json;
use drill_core::model::VerbDraft;
use drill_core::{CatalogError, VerbCatalog};

use crate::error::CatalogLoadError;

/// Where raw catalog records come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch unvalidated verb records.
    ///
    /// # Errors
    ///
    /// Returns `CatalogLoadError` if the source is unreachable or its payload
    /// is not a JSON array of verb records.
    async fn fetch_verbs(&self) -> Result<Vec<VerbDraft>, CatalogLoadError>;
}

/// Records held in memory, e.g. bundled with the app or built in tests.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalogSource {
    drafts: Vec<VerbDraft>,
}

impl StaticCatalogSource {
    #[must_use]
    pub fn new(drafts: Vec<VerbDraft>) -> Self {
        Self { drafts }
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Malformed` if `json` is not an array of records.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(Self::new(parse_catalog_json(json)?))
    }
}

#[async_trait]
impl CatalogSource for StaticCatalogSource {
    async fn fetch_verbs(&self) -> Result<Vec<VerbDraft>, CatalogLoadError> {
        Ok(self.drafts.clone())
    }
}

#[derive(Clone, Debug)]
pub struct CatalogSourceConfig {
    pub url: String,
    pub api_key: Option<String>,
}

impl CatalogSourceConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: None,
        }
    }

    /// Reads `DRILL_CATALOG_URL` and `DRILL_REMOTE_API_KEY`.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let url = env::var("DRILL_CATALOG_URL").ok()?;
        if url.trim().is_empty() {
            return None;
        }
        let api_key = env::var("DRILL_REMOTE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());
        Some(Self { url, api_key })
    }
}

/// Downloads the catalog as a JSON array over HTTP.
#[derive(Clone)]
pub struct HttpCatalogSource {
    client: Client,
    config: CatalogSourceConfig,
}

impl HttpCatalogSource {
    #[must_use]
    pub fn new(config: CatalogSourceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_verbs(&self) -> Result<Vec<VerbDraft>, CatalogLoadError> {
        let mut request = self.client.get(&self.config.url);
        if let Some(key) = &self.config.api_key {
            request = request.header("apikey", key).bearer_auth(key);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(CatalogLoadError::HttpStatus(response.status()));
        }
        let body = response.text().await?;
        Ok(parse_catalog_json(&body)?)
    }
}

/// Fetch, validate and load a whole catalog. Returns the number of verbs loaded.
///
/// A batch with any invalid record is rejected as a whole and the catalog
/// keeps its previous contents. Loading over a ready catalog swaps the list
/// without a not-ready window; use [`reload_catalog`] to gate readers.
///
/// # Errors
///
/// Returns `CatalogLoadError` if fetching fails or any record is invalid.
#[tracing::instrument(skip_all)]
pub async fn load_catalog(
    source: &dyn CatalogSource,
    catalog: &VerbCatalog,
) -> Result<usize, CatalogLoadError> {
    let drafts = source.fetch_verbs().await?;
    let fetched = drafts.len();
    if let Err(err) = catalog.load_drafts(drafts) {
        tracing::error!(error = %err, fetched, "rejected catalog batch");
        return Err(err.into());
    }
    tracing::info!(verbs = catalog.len(), "verb catalog loaded");
    Ok(catalog.len())
}

/// Replace a loaded catalog with a fresh fetch.
///
/// Readiness is reset before fetching, so `wait_ready` callers and practice
/// runs block until the new list is in. If the fetch or validation fails the
/// catalog stays empty and not ready.
///
/// # Errors
///
/// Returns `CatalogLoadError` if fetching fails or any record is invalid.
pub async fn reload_catalog(
    source: &dyn CatalogSource,
    catalog: &VerbCatalog,
) -> Result<usize, CatalogLoadError> {
    tracing::debug!(previous = catalog.len(), "reloading verb catalog");
    catalog.begin_reload();
    load_catalog(source, catalog).await
}
