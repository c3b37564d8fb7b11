//! SQLite state store.
//!
//! One table, `conversation_states`, with a `UNIQUE(subject_id, scope)`
//! constraint. Find-or-create is an `INSERT .. ON CONFLICT DO NOTHING`
//! followed by a read, so concurrent resolves (from any number of processes
//! sharing the file) converge on a single record.

use async_trait::async_trait;
use chrono::Utc;
use gencache_core::conversation::{ConversationState, StateStore};
use gencache_core::error::StoreError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// A durable SQLite conversation state store.
pub struct SqliteStateStore {
    pool: SqlitePool,
}

impl SqliteStateStore {
    /// Open (or create) a store at `path`.
    ///
    /// Pass `"sqlite::memory:"` for an in-process ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Unavailable(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite state store initialized at {path}");
        Ok(store)
    }

    /// Create from an existing pool.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS conversation_states (
                id          TEXT PRIMARY KEY NOT NULL,
                subject_id  TEXT NOT NULL,
                scope       TEXT NOT NULL,
                last_token  TEXT,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL,
                UNIQUE (subject_id, scope)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("conversation_states table: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_state(row: &sqlx::sqlite::SqliteRow) -> Result<ConversationState, StoreError> {
        let column = |name: &str, e: sqlx::Error| StoreError::QueryFailed(format!("{name} column: {e}"));

        let id: String = row.try_get("id").map_err(|e| column("id", e))?;
        let subject_id: String = row.try_get("subject_id").map_err(|e| column("subject_id", e))?;
        let scope: String = row.try_get("scope").map_err(|e| column("scope", e))?;
        let last_token: Option<String> =
            row.try_get("last_token").map_err(|e| column("last_token", e))?;
        let created_at: String = row.try_get("created_at").map_err(|e| column("created_at", e))?;
        let updated_at: String = row.try_get("updated_at").map_err(|e| column("updated_at", e))?;

        Ok(ConversationState {
            id,
            subject_id,
            scope,
            last_continuation_token: last_token,
            created_at: parse_timestamp("created_at", &created_at)?,
            updated_at: parse_timestamp("updated_at", &updated_at)?,
        })
    }
}

fn parse_timestamp(column: &str, s: &str) -> Result<chrono::DateTime<Utc>, StoreError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::QueryFailed(format!("{column} column: '{s}': {e}")))
}

#[async_trait]
impl StateStore for SqliteStateStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn find_or_create(
        &self,
        subject_id: &str,
        scope: &str,
    ) -> Result<ConversationState, StoreError> {
        let now = Utc::now().to_rfc3339();
        let inserted = sqlx::query(
            r#"
            INSERT INTO conversation_states (id, subject_id, scope, last_token, created_at, updated_at)
            VALUES (?1, ?2, ?3, NULL, ?4, ?4)
            ON CONFLICT(subject_id, scope) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(subject_id)
        .bind(scope)
        .bind(&now)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("INSERT failed: {e}")))?
        .rows_affected();

        if inserted > 0 {
            debug!(subject_id, scope, "Created conversation state");
        }

        let row = sqlx::query("SELECT * FROM conversation_states WHERE subject_id = ?1 AND scope = ?2")
            .bind(subject_id)
            .bind(scope)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Resolve lookup: {e}")))?;

        Self::row_to_state(&row)
    }

    async fn get(&self, id: &str) -> Result<Option<ConversationState>, StoreError> {
        let row = sqlx::query("SELECT * FROM conversation_states WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("Get by id: {e}")))?;

        row.as_ref().map(Self::row_to_state).transpose()
    }

    async fn update_token(&self, id: &str, token: Option<&str>) -> Result<bool, StoreError> {
        let updated = sqlx::query(
            "UPDATE conversation_states SET last_token = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(token)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Storage(format!("UPDATE failed: {e}")))?
        .rows_affected();

        Ok(updated > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    async fn test_store() -> SqliteStateStore {
        SqliteStateStore::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn find_or_create_is_idempotent() {
        let store = test_store().await;
        let first = store.find_or_create("u1", "challenge").await.unwrap();
        let second = store.find_or_create("u1", "challenge").await.unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.last_continuation_token.is_none());
    }

    #[tokio::test]
    async fn different_scopes_get_different_records() {
        let store = test_store().await;
        let a = store.find_or_create("u1", "challenge").await.unwrap();
        let b = store.find_or_create("u1", "personality").await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(b.scope, "personality");
    }

    #[tokio::test]
    async fn token_update_is_visible_on_resolve() {
        let store = test_store().await;
        let state = store.find_or_create("u1", "challenge").await.unwrap();
        assert!(store.update_token(&state.id, Some("resp_abc")).await.unwrap());

        let resolved = store.find_or_create("u1", "challenge").await.unwrap();
        assert_eq!(resolved.last_continuation_token.as_deref(), Some("resp_abc"));

        let fetched = store.get(&state.id).await.unwrap().unwrap();
        assert_eq!(fetched.last_continuation_token.as_deref(), Some("resp_abc"));
    }

    #[tokio::test]
    async fn cleared_token_reads_back_as_none() {
        let store = test_store().await;
        let state = store.find_or_create("u1", "challenge").await.unwrap();
        store.update_token(&state.id, Some("resp_abc")).await.unwrap();
        assert!(store.update_token(&state.id, None).await.unwrap());

        let fetched = store.get(&state.id).await.unwrap().unwrap();
        assert!(fetched.last_continuation_token.is_none());
    }

    #[tokio::test]
    async fn corrupt_timestamp_is_a_query_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("state.db").display());
        let store = SqliteStateStore::new(&path).await.unwrap();
        let state = store.find_or_create("u1", "challenge").await.unwrap();
        sqlx::query("UPDATE conversation_states SET updated_at = 'yesterday' WHERE id = ?1")
            .bind(&state.id)
            .execute(&store.pool)
            .await
            .unwrap();

        let err = store.get(&state.id).await.unwrap_err();
        assert!(matches!(&err, StoreError::QueryFailed(msg) if msg.contains("updated_at")));
    }

    #[tokio::test]
    async fn update_unknown_id_returns_false() {
        let store = test_store().await;
        assert!(!store.update_token("nope", Some("resp")).await.unwrap());
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("state.db").display());

        let id = {
            let store = SqliteStateStore::new(&path).await.unwrap();
            let state = store.find_or_create("u1", "challenge").await.unwrap();
            store.update_token(&state.id, Some("resp_1")).await.unwrap();
            state.id
        };

        let store = SqliteStateStore::new(&path).await.unwrap();
        let state = store.find_or_create("u1", "challenge").await.unwrap();
        assert_eq!(state.id, id);
        assert_eq!(state.last_continuation_token.as_deref(), Some("resp_1"));
    }

    #[tokio::test]
    async fn concurrent_creates_share_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = format!("sqlite://{}", dir.path().join("state.db").display());
        let store = Arc::new(SqliteStateStore::new(&path).await.unwrap());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.find_or_create("u9", "focus_area").await.unwrap().id
            }));
        }
        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);
    }

    #[tokio::test]
    async fn backend_name() {
        let store = test_store().await;
        assert_eq!(store.name(), "sqlite");
    }
}
