use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use super::SqliteStore;
use crate::repository::{KeyedStore, StorageError};

fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl KeyedStore for SqliteStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT value
            FROM kv_store
            WHERE namespace = ?1 AND key = ?2
            ",
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.map(|row| row.try_get::<String, _>("value").map_err(ser))
            .transpose()
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(conn)?;

        if let Some(limit) = self.quota_bytes {
            let others: i64 = sqlx::query(
                r"
                SELECT COALESCE(SUM(LENGTH(CAST(value AS BLOB))), 0) AS used
                FROM kv_store
                WHERE NOT (namespace = ?1 AND key = ?2)
                ",
            )
            .bind(namespace)
            .bind(key)
            .fetch_one(&mut *tx)
            .await
            .map_err(conn)?
            .try_get("used")
            .map_err(ser)?;

            let others = u64::try_from(others).unwrap_or(0);
            let incoming = u64::try_from(value.len()).unwrap_or(u64::MAX);
            let requested = others.saturating_add(incoming);
            if requested > limit {
                tracing::warn!(namespace, key, limit, requested, "sqlite quota exceeded");
                return Err(StorageError::QuotaExceeded { limit, requested });
            }
        }

        sqlx::query(
            r"
            INSERT INTO kv_store (namespace, key, value, updated_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(namespace, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            ",
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .map_err(conn)?;

        tx.commit().await.map_err(conn)?;
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM kv_store WHERE namespace = ?1 AND key = ?2")
            .bind(namespace)
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
