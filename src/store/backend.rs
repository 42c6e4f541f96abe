//! Persistent collection backends. `PgBackend` is the primary store;
//! `MemoryBackend` backs tests and local development without PostgreSQL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::RwLock;

use super::{ContentKey, Message, NewMessage};
use crate::error::StoreError;

#[async_trait]
pub trait Backend: Send + Sync {
    async fn fetch_document(&self, key: ContentKey) -> Result<Option<Value>, StoreError>;

    /// Write the value only when no record exists yet. This is the
    /// migration primitive: concurrent first-reads may both call it and the
    /// loser's write is silently dropped.
    async fn init_document(&self, key: ContentKey, value: &Value) -> Result<(), StoreError>;

    /// Full atomic overwrite (upsert).
    async fn replace_document(&self, key: ContentKey, value: &Value) -> Result<(), StoreError>;

    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError>;

    /// Messages ordered newest-first.
    async fn list_messages(&self, limit: i64, offset: i64) -> Result<Vec<Message>, StoreError>;

    async fn count_messages(&self) -> Result<i64, StoreError>;

    /// Returns false when no record with that id exists.
    async fn mark_read(&self, id: i64) -> Result<bool, StoreError>;

    async fn delete_message(&self, id: i64) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<Duration, StoreError>;
}

// ============================================================================
// PostgreSQL backend
// ============================================================================

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        tracing::info!("initializing database connection pool");

        let pool = PgPoolOptions::new()
            .max_connections(10)
            .min_connections(2)
            .acquire_timeout(Duration::from_secs(3))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(1800))
            .test_before_acquire(true)
            .connect(url)
            .await?;

        sqlx::query("SELECT 1").fetch_one(&pool).await?;

        let backend = Self { pool };
        backend.run_migrations().await?;
        tracing::info!("database connection pool initialized");
        Ok(backend)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        tracing::info!("running database migrations");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS content_documents (
                key TEXT PRIMARY KEY,
                content JSONB NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                message TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                read BOOLEAN NOT NULL DEFAULT false
            )
        "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_messages_created_at
                ON messages(created_at DESC)
        "#,
        )
        .execute(&self.pool)
        .await?;

        tracing::info!("database migrations completed");
        Ok(())
    }
}

#[async_trait]
impl Backend for PgBackend {
    async fn fetch_document(&self, key: ContentKey) -> Result<Option<Value>, StoreError> {
        let content = sqlx::query_scalar::<_, Value>(
            "SELECT content FROM content_documents WHERE key = $1",
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(content)
    }

    async fn init_document(&self, key: ContentKey, value: &Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO content_documents (key, content, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_document(&self, key: ContentKey, value: &Value) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO content_documents (key, content, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET
                content = EXCLUDED.content,
                updated_at = now()
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (name, email, message, created_at, read)
            VALUES ($1, $2, $3, COALESCE($4, now()), $5)
            RETURNING id, name, email, message, created_at, read
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.message)
        .bind(new.created_at)
        .bind(new.read)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    async fn list_messages(&self, limit: i64, offset: i64) -> Result<Vec<Message>, StoreError> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, name, email, message, created_at, read
            FROM messages
            ORDER BY created_at DESC, id DESC
            LIMIT $1 OFFSET $2
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(messages)
    }

    async fn count_messages(&self) -> Result<i64, StoreError> {
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(total)
    }

    async fn mark_read(&self, id: i64) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE messages SET read = true WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_message(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        let start = Instant::now();
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(start.elapsed())
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

pub struct MemoryBackend {
    documents: RwLock<HashMap<ContentKey, Value>>,
    messages: RwLock<Vec<Message>>,
    next_id: AtomicI64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            messages: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_document(&self, key: ContentKey) -> Result<Option<Value>, StoreError> {
        Ok(self.documents.read().await.get(&key).cloned())
    }

    async fn init_document(&self, key: ContentKey, value: &Value) -> Result<(), StoreError> {
        self.documents
            .write()
            .await
            .entry(key)
            .or_insert_with(|| value.clone());
        Ok(())
    }

    async fn replace_document(&self, key: ContentKey, value: &Value) -> Result<(), StoreError> {
        self.documents.write().await.insert(key, value.clone());
        Ok(())
    }

    async fn insert_message(&self, new: NewMessage) -> Result<Message, StoreError> {
        let message = Message {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            name: new.name,
            email: new.email,
            message: new.message,
            created_at: new.created_at.unwrap_or_else(Utc::now),
            read: new.read,
        };
        self.messages.write().await.push(message.clone());
        Ok(message)
    }

    async fn list_messages(&self, limit: i64, offset: i64) -> Result<Vec<Message>, StoreError> {
        let mut messages = self.messages.read().await.clone();
        messages.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(messages
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .collect())
    }

    async fn count_messages(&self) -> Result<i64, StoreError> {
        Ok(self.messages.read().await.len() as i64)
    }

    async fn mark_read(&self, id: i64) -> Result<bool, StoreError> {
        let mut messages = self.messages.write().await;
        match messages.iter_mut().find(|m| m.id == id) {
            Some(message) => {
                message.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_message(&self, id: i64) -> Result<(), StoreError> {
        self.messages.write().await.retain(|m| m.id != id);
        Ok(())
    }

    async fn ping(&self) -> Result<Duration, StoreError> {
        Ok(Duration::ZERO)
    }
}
