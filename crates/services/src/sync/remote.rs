use std::env;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use drill_core::model::{Attempt, IdempotencyKey};

use crate::error::SyncError;

const DEFAULT_ATTEMPTS_PATH: &str = "/attempts";

/// Identifies whose attempts a remote read or write concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserScope(String);

impl UserScope {
    #[must_use]
    pub fn new(user_id: impl Into<String>) -> Self {
        Self(user_id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Wire shape of one attempt in the remote store. The idempotency key is the
/// remote uniqueness constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteAttempt {
    pub idempotency_key: IdempotencyKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub payload: Attempt,
}

impl RemoteAttempt {
    #[must_use]
    pub fn new(attempt: Attempt, scope: Option<&UserScope>) -> Self {
        Self {
            idempotency_key: attempt.idempotency_key(),
            user_id: scope.map(|s| s.as_str().to_owned()),
            payload: attempt,
        }
    }
}

/// Remote persistence for attempts.
#[async_trait]
pub trait RemoteAttemptStore: Send + Sync {
    /// Insert or update every attempt by idempotency key. All-or-nothing from
    /// the caller's point of view.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the remote store is unreachable or rejects the batch.
    async fn upsert_attempts(&self, attempts: &[RemoteAttempt]) -> Result<(), SyncError>;

    /// Fetch attempts, optionally restricted to one user.
    ///
    /// # Errors
    ///
    /// Returns `SyncError` if the remote store is unreachable or errors.
    async fn fetch_attempts(
        &self,
        scope: Option<&UserScope>,
    ) -> Result<Vec<RemoteAttempt>, SyncError>;
}

#[derive(Clone, Debug)]
pub struct RemoteStoreConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub attempts_path: String,
}

impl RemoteStoreConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            attempts_path: DEFAULT_ATTEMPTS_PATH.to_owned(),
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Reads `DRILL_REMOTE_URL`, `DRILL_REMOTE_API_KEY` and
    /// `DRILL_REMOTE_ATTEMPTS_PATH`. `None` when no URL is configured.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let base_url = lookup("DRILL_REMOTE_URL")?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_key = lookup("DRILL_REMOTE_API_KEY").filter(|key| !key.trim().is_empty());
        let attempts_path = lookup("DRILL_REMOTE_ATTEMPTS_PATH")
            .unwrap_or_else(|| DEFAULT_ATTEMPTS_PATH.to_owned());
        Some(Self {
            base_url,
            api_key,
            attempts_path,
        })
    }

    fn attempts_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.attempts_path.trim_start_matches('/')
        )
    }
}

/// REST remote store speaking a PostgREST-style dialect.
#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    config: RemoteStoreConfig,
}

impl HttpRemoteStore {
    #[must_use]
    pub fn new(config: RemoteStoreConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        RemoteStoreConfig::from_env().map(Self::new)
    }

    #[must_use]
    pub fn config(&self) -> &RemoteStoreConfig {
        &self.config
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }
}

#[async_trait]
impl RemoteAttemptStore for HttpRemoteStore {
    async fn upsert_attempts(&self, attempts: &[RemoteAttempt]) -> Result<(), SyncError> {
        let request = self
            .client
            .post(self.config.attempts_url())
            .query(&[("on_conflict", "idempotency_key")])
            .header("Prefer", "resolution=merge-duplicates")
            .json(attempts);

        let response = self.authorize(request).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::HttpStatus(response.status()));
        }
        tracing::debug!(count = attempts.len(), "upserted attempts remotely");
        Ok(())
    }

    async fn fetch_attempts(
        &self,
        scope: Option<&UserScope>,
    ) -> Result<Vec<RemoteAttempt>, SyncError> {
        let mut request = self.client.get(self.config.attempts_url());
        if let Some(scope) = scope {
            request = request.query(&[("user_id", format!("eq.{}", scope.as_str()))]);
        }

        let response = self.authorize(request).send().await?;
        if !response.status().is_success() {
            return Err(SyncError::HttpStatus(response.status()));
        }

        // Records are decoded one by one so a single bad row does not hide the rest.
        let rows: Vec<serde_json::Value> = response.json().await?;
        let total = rows.len();
        let attempts: Vec<RemoteAttempt> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(attempt) => Some(attempt),
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed remote attempt");
                    None
                }
            })
            .collect();
        tracing::debug!(total, decoded = attempts.len(), "fetched remote attempts");
        Ok(attempts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::conjugation_attempt;
    use std::collections::HashMap;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> HttpRemoteStore {
        HttpRemoteStore::new(RemoteStoreConfig::new(server.uri()).with_api_key("secret"))
    }

    #[test]
    fn config_requires_a_url() {
        let empty: HashMap<&str, &str> = HashMap::new();
        assert!(RemoteStoreConfig::from_lookup(|k| empty.get(k).map(ToString::to_string)).is_none());

        let vars = HashMap::from([
            ("DRILL_REMOTE_URL", "https://example.test/rest/v1/"),
            ("DRILL_REMOTE_API_KEY", " "),
        ]);
        let config =
            RemoteStoreConfig::from_lookup(|k| vars.get(k).map(ToString::to_string)).unwrap();
        assert_eq!(config.api_key, None);
        assert_eq!(config.attempts_path, "/attempts");
        assert_eq!(
            config.attempts_url(),
            "https://example.test/rest/v1/attempts"
        );
    }

    #[tokio::test]
    async fn upsert_posts_with_conflict_resolution() {
        let server = MockServer::start().await;
        let attempt = conjugation_attempt(0, &[true, false]);
        let rows = vec![RemoteAttempt::new(attempt, Some(&UserScope::new("u1")))];

        Mock::given(method("POST"))
            .and(path("/attempts"))
            .and(query_param("on_conflict", "idempotency_key"))
            .and(header("Prefer", "resolution=merge-duplicates"))
            .and(header("apikey", "secret"))
            .and(header("authorization", "Bearer secret"))
            .and(body_json(serde_json::to_value(&rows).unwrap()))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server).upsert_attempts(&rows).await.unwrap();
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let rows = vec![RemoteAttempt::new(conjugation_attempt(0, &[true]), None)];
        let err = store_for(&server).upsert_attempts(&rows).await.unwrap_err();
        assert!(matches!(err, SyncError::HttpStatus(status) if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn fetch_filters_by_scope_and_skips_bad_rows() {
        let server = MockServer::start().await;
        let good = RemoteAttempt::new(conjugation_attempt(0, &[true]), Some(&UserScope::new("u1")));
        let body = serde_json::json!([
            serde_json::to_value(&good).unwrap(),
            { "idempotency_key": "not-a-uuid", "payload": {} }
        ]);

        Mock::given(method("GET"))
            .and(path("/attempts"))
            .and(query_param("user_id", "eq.u1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(&server)
            .await;

        let fetched = store_for(&server)
            .fetch_attempts(Some(&UserScope::new("u1")))
            .await
            .unwrap();
        assert_eq!(fetched, vec![good]);
    }
}
