//! `SQLite` credential store.
//!
//! Uses `r2d2` connection pooling with the `r2d2_sqlite` backend. Every query
//! runs on the blocking thread pool so a slow disk never stalls the async
//! runtime.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use tracing::info;
use vox_core::GroupName;

use crate::errors::{AuthError, Result};
use crate::keys::hash_key;
use crate::store::{CredentialRecord, CredentialStore};

/// Alias for the connection pool type.
pub type ConnectionPool = Pool<SqliteConnectionManager>;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS api_keys (
    key_hash     TEXT PRIMARY KEY NOT NULL,
    worker_group TEXT NOT NULL,
    is_active    INTEGER NOT NULL DEFAULT 1,
    created_at   TEXT NOT NULL
);
";

/// Pragmas applied to each pooled connection.
#[derive(Debug)]
struct PragmaCustomizer;

impl r2d2::CustomizeConnection<Connection, rusqlite::Error> for PragmaCustomizer {
    fn on_acquire(&self, conn: &mut Connection) -> std::result::Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;\
             PRAGMA busy_timeout = 5000;\
             PRAGMA synchronous = NORMAL;",
        )
    }
}

/// Credential store backed by a `SQLite` file.
#[derive(Clone)]
pub struct SqliteCredentialStore {
    pool: ConnectionPool,
}

impl SqliteCredentialStore {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open(path: &Path) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(8)
            .connection_timeout(Duration::from_secs(5))
            .connection_customizer(Box::new(PragmaCustomizer))
            .build(manager)?;
        let store = Self { pool };
        store.migrate()?;
        info!(path = %path.display(), "credential store opened");
        Ok(store)
    }

    /// Open an in-memory database (single connection, for tests).
    pub fn open_in_memory() -> Result<Self> {
        let pool = Pool::builder()
            .max_size(1)
            .build(SqliteConnectionManager::memory())?;
        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            f(&conn)
        })
        .await
        .map_err(|e| AuthError::Unavailable(e.to_string()))?
    }
}

fn lookup_row(conn: &Connection, key_hash: &str) -> Result<Option<CredentialRecord>> {
    let row: Option<(String, bool, String)> = conn
        .query_row(
            "SELECT worker_group, is_active, created_at FROM api_keys WHERE key_hash = ?1",
            params![key_hash],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((group, is_active, created_at)) = row else {
        return Ok(None);
    };
    let group: GroupName = group.parse()?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(|e| AuthError::Corrupt(e.to_string()))?
        .with_timezone(&Utc);
    Ok(Some(CredentialRecord {
        group,
        is_active,
        created_at,
    }))
}

#[async_trait]
impl CredentialStore for SqliteCredentialStore {
    async fn lookup(&self, key: &str) -> Result<Option<CredentialRecord>> {
        let key_hash = hash_key(key);
        self.with_conn(move |conn| lookup_row(conn, &key_hash)).await
    }

    async fn issue(&self, key: &str, group: GroupName) -> Result<()> {
        let key_hash = hash_key(key);
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT INTO api_keys (key_hash, worker_group, is_active, created_at)
                 VALUES (?1, ?2, 1, ?3)",
                params![key_hash, group.as_str(), Utc::now().to_rfc3339()],
            );
            match inserted {
                Ok(_) => Ok(()),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == ErrorCode::ConstraintViolation =>
                {
                    Err(AuthError::DuplicateKey)
                }
                Err(e) => Err(e.into()),
            }
        })
        .await?;
        info!(%group, "issued worker credential");
        Ok(())
    }

    async fn revoke(&self, key: &str) -> Result<bool> {
        let key_hash = hash_key(key);
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE api_keys SET is_active = 0 WHERE key_hash = ?1",
                params![key_hash],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn issue_lookup_roundtrip() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.issue("vk_one", GroupName::Wave2vec).await.unwrap();

        let record = store.lookup("vk_one").await.unwrap().unwrap();
        assert_eq!(record.group, GroupName::Wave2vec);
        assert!(record.is_active);
        assert!(store.lookup("vk_two").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_issue_rejected() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.issue("vk_one", GroupName::Whisper).await.unwrap();
        let err = store.issue("vk_one", GroupName::Store).await.unwrap_err();
        assert_matches!(err, AuthError::DuplicateKey);
    }

    #[tokio::test]
    async fn revoke_then_validate_fails() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        store.issue("vk_one", GroupName::Whisper).await.unwrap();
        assert!(store.validate("vk_one", GroupName::Whisper).await);
        assert!(store.revoke("vk_one").await.unwrap());
        assert!(!store.validate("vk_one", GroupName::Whisper).await);
        assert!(!store.revoke("vk_none").await.unwrap());
    }

    #[tokio::test]
    async fn unknown_group_in_row_fails_closed() {
        let store = SqliteCredentialStore::open_in_memory().unwrap();
        {
            let conn = store.pool.get().unwrap();
            let _ = conn
                .execute(
                    "INSERT INTO api_keys VALUES (?1, 'gpt', 1, ?2)",
                    params![hash_key("vk_bad"), Utc::now().to_rfc3339()],
                )
                .unwrap();
        }
        assert_matches!(store.lookup("vk_bad").await, Err(AuthError::InvalidGroup(_)));
        assert!(!store.validate("vk_bad", GroupName::Whisper).await);
    }

    #[tokio::test]
    async fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.db");
        {
            let store = SqliteCredentialStore::open(&path).unwrap();
            store.issue("vk_keep", GroupName::Store).await.unwrap();
        }
        let reopened = SqliteCredentialStore::open(&path).unwrap();
        assert!(reopened.validate("vk_keep", GroupName::Store).await);
    }
}
