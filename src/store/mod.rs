//! Content store: named singleton documents plus the visitor-message inbox,
//! with migrate-on-first-read from the legacy flat-file layout into the
//! primary backend.

pub mod backend;
pub mod legacy;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

use crate::config::AppConfig;
use crate::error::StoreError;
use backend::{Backend, MemoryBackend, PgBackend};

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Whether a content key holds a single object or a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Object,
    List,
}

/// The closed set of content areas. Unrecognized keys never reach the store;
/// the route layer rejects them at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKey {
    Home,
    Projects,
    Blogs,
    Profile,
    About,
    Contact,
    NotFoundPage,
    Socials,
}

impl ContentKey {
    pub const ALL: [ContentKey; 8] = [
        ContentKey::Home,
        ContentKey::Projects,
        ContentKey::Blogs,
        ContentKey::Profile,
        ContentKey::About,
        ContentKey::Contact,
        ContentKey::NotFoundPage,
        ContentKey::Socials,
    ];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "home" => Some(ContentKey::Home),
            "projects" => Some(ContentKey::Projects),
            "blogs" => Some(ContentKey::Blogs),
            "profile" => Some(ContentKey::Profile),
            "about" => Some(ContentKey::About),
            "contact" => Some(ContentKey::Contact),
            "404" => Some(ContentKey::NotFoundPage),
            "socials" => Some(ContentKey::Socials),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKey::Home => "home",
            ContentKey::Projects => "projects",
            ContentKey::Blogs => "blogs",
            ContentKey::Profile => "profile",
            ContentKey::About => "about",
            ContentKey::Contact => "contact",
            ContentKey::NotFoundPage => "404",
            ContentKey::Socials => "socials",
        }
    }

    pub fn shape(&self) -> Shape {
        match self {
            ContentKey::Projects | ContentKey::Blogs | ContentKey::Socials => Shape::List,
            _ => Shape::Object,
        }
    }

    /// Value a key resolves to when neither the backend nor the legacy file
    /// has anything for it.
    pub fn default_value(&self) -> Value {
        match self.shape() {
            Shape::Object => Value::Object(serde_json::Map::new()),
            Shape::List => Value::Array(Vec::new()),
        }
    }
}

impl std::fmt::Display for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A visitor contact submission.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Insertion payload. `created_at` and `read` are only overridden when
/// seeding from the legacy inbox; normal appends get now() and unread.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: Option<DateTime<Utc>>,
    pub read: bool,
}

/// One page of the inbox, newest-first, with normalized paging values.
#[derive(Debug)]
pub struct MessagePage {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub items: Vec<Message>,
}

#[derive(Clone)]
pub struct Store {
    backend: Arc<dyn Backend>,
    data_dir: PathBuf,
}

impl Store {
    pub fn new(backend: Arc<dyn Backend>, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: backend.into(),
            data_dir: data_dir.into(),
        }
    }

    /// Connect the primary backend. With a `DATABASE_URL` this is PostgreSQL
    /// (migrations run here; failure is fatal to startup). Without one the
    /// server runs on the in-memory backend, which still honors the legacy
    /// flat-file fallback.
    pub async fn connect(config: &AppConfig) -> Result<Self, StoreError> {
        let backend: Arc<dyn Backend> = match &config.database_url {
            Some(url) => Arc::new(PgBackend::connect(url).await?),
            None => {
                tracing::info!("DATABASE_URL not set, using in-memory backend");
                Arc::new(MemoryBackend::new())
            }
        };
        Ok(Self::new(backend, config.data_dir.clone()))
    }

    /// Resolve a document: primary backend, then the legacy flat file, then
    /// the key's default shape. Any fallback result is migrated into the
    /// backend with an insert-if-absent, so two racing first-reads cannot
    /// clobber each other - the stored value wins and is what gets returned.
    pub async fn get_document(&self, key: ContentKey) -> Result<Value, StoreError> {
        if let Some(value) = self.backend.fetch_document(key).await? {
            return Ok(value);
        }

        let resolved = match legacy::read_document(&self.data_dir, key) {
            Some(value) => {
                tracing::info!(key = %key, "migrating document from legacy file");
                value
            }
            None => key.default_value(),
        };

        self.backend.init_document(key, &resolved).await?;
        match self.backend.fetch_document(key).await? {
            Some(stored) => Ok(stored),
            None => Ok(resolved),
        }
    }

    /// Replace the whole value for a key. No merge, no shape validation -
    /// the admin client is trusted.
    pub async fn put_document(&self, key: ContentKey, value: Value) -> Result<(), StoreError> {
        self.backend.replace_document(key, &value).await
    }

    pub async fn append_message(
        &self,
        name: &str,
        email: &str,
        body: &str,
    ) -> Result<Message, StoreError> {
        self.backend
            .insert_message(NewMessage {
                name: name.to_string(),
                email: email.to_string(),
                message: body.to_string(),
                created_at: None,
                read: false,
            })
            .await
    }

    /// Newest-first page of the inbox. `page < 1` normalizes to 1,
    /// `page_size <= 0` to the default, and the size is capped.
    pub async fn list_messages(&self, page: i64, page_size: i64) -> Result<MessagePage, StoreError> {
        let page = page.max(1);
        let page_size = if page_size <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            page_size.min(MAX_PAGE_SIZE)
        };
        let offset = (page - 1).saturating_mul(page_size);

        let items = self.backend.list_messages(page_size, offset).await?;
        let total = self.backend.count_messages().await?;
        Ok(MessagePage {
            page,
            page_size,
            total,
            items,
        })
    }

    pub async fn all_messages(&self) -> Result<Vec<Message>, StoreError> {
        self.backend.list_messages(i64::MAX, 0).await
    }

    /// Flip `read` to true. Idempotent for existing messages; `NotFound`
    /// when the id does not exist.
    pub async fn mark_read(&self, id: i64) -> Result<(), StoreError> {
        if self.backend.mark_read(id).await? {
            Ok(())
        } else {
            Err(StoreError::NotFound)
        }
    }

    /// Idempotent delete - removing an unknown id is not an error.
    pub async fn delete_message(&self, id: i64) -> Result<(), StoreError> {
        self.backend.delete_message(id).await
    }

    /// One-time startup seeding of the inbox from the legacy `messages.json`
    /// list. Skipped entirely once the backend holds any messages.
    pub async fn seed_legacy_messages(&self) -> Result<usize, StoreError> {
        if self.backend.count_messages().await? > 0 {
            return Ok(0);
        }
        let Some(entries) = legacy::read_messages(&self.data_dir) else {
            return Ok(0);
        };

        let count = entries.len();
        for entry in entries {
            self.backend
                .insert_message(NewMessage {
                    name: entry.name,
                    email: entry.email,
                    message: entry.message,
                    created_at: entry.date,
                    read: entry.read,
                })
                .await?;
        }
        Ok(count)
    }

    /// Round-trip latency of a trivial backend query, for readiness checks.
    pub async fn ping(&self) -> Result<Duration, StoreError> {
        self.backend.ping().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn memory_store(data_dir: &std::path::Path) -> Store {
        Store::new(Arc::new(MemoryBackend::new()), data_dir)
    }

    fn empty_store() -> Store {
        // Points at a directory that does not exist, so only defaults apply.
        Store::new(Arc::new(MemoryBackend::new()), "no-such-dir")
    }

    #[test]
    fn test_content_key_parse_round_trips() {
        for key in ContentKey::ALL {
            assert_eq!(ContentKey::parse(key.as_str()), Some(key));
        }
        assert_eq!(ContentKey::parse("blog"), None);
        assert_eq!(ContentKey::parse(""), None);
        assert_eq!(ContentKey::parse("HOME"), None);
    }

    #[test]
    fn test_content_key_shapes() {
        assert_eq!(ContentKey::Home.shape(), Shape::Object);
        assert_eq!(ContentKey::NotFoundPage.shape(), Shape::Object);
        assert_eq!(ContentKey::Projects.shape(), Shape::List);
        assert_eq!(ContentKey::Socials.shape(), Shape::List);
        assert_eq!(ContentKey::Projects.default_value(), json!([]));
        assert_eq!(ContentKey::About.default_value(), json!({}));
    }

    #[tokio::test]
    async fn test_get_document_returns_default_shape_and_is_idempotent() {
        let store = empty_store();
        for key in ContentKey::ALL {
            let first = store.get_document(key).await.unwrap();
            assert_eq!(first, key.default_value(), "default for {key}");
            let second = store.get_document(key).await.unwrap();
            assert_eq!(second, first, "migration changed observed value for {key}");
        }
    }

    #[tokio::test]
    async fn test_get_document_migrates_from_legacy_file_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("home.json"), r#"{"title":"legacy home"}"#).unwrap();

        let store = memory_store(dir.path());
        let value = store.get_document(ContentKey::Home).await.unwrap();
        assert_eq!(value, json!({"title": "legacy home"}));

        // After migration the file no longer matters.
        std::fs::remove_file(dir.path().join("home.json")).unwrap();
        let again = store.get_document(ContentKey::Home).await.unwrap();
        assert_eq!(again, value);
    }

    #[tokio::test]
    async fn test_put_then_get_returns_exact_value() {
        let store = empty_store();
        let value = json!({"title": "hi", "sections": [1, 2, 3]});
        store
            .put_document(ContentKey::Home, value.clone())
            .await
            .unwrap();
        assert_eq!(store.get_document(ContentKey::Home).await.unwrap(), value);

        // Full overwrite, not a merge.
        let replacement = json!({"other": true});
        store
            .put_document(ContentKey::Home, replacement.clone())
            .await
            .unwrap();
        assert_eq!(
            store.get_document(ContentKey::Home).await.unwrap(),
            replacement
        );
    }

    #[tokio::test]
    async fn test_append_message_assigns_unique_ids_and_unread() {
        let store = empty_store();
        let mut seen = std::collections::HashSet::new();
        for i in 0..5 {
            let msg = store
                .append_message(&format!("v{i}"), "v@example.com", "hello")
                .await
                .unwrap();
            assert!(!msg.read);
            assert!(seen.insert(msg.id), "duplicate id {}", msg.id);
        }
    }

    #[tokio::test]
    async fn test_list_messages_pages_newest_first() {
        let store = empty_store();
        for i in 1..=25 {
            store
                .append_message(&format!("visitor {i}"), "v@example.com", "hi")
                .await
                .unwrap();
        }

        let page = store.list_messages(2, 10).await.unwrap();
        assert_eq!(page.total, 25);
        assert_eq!(page.items.len(), 10);
        // Newest-first: page 2 of 10 holds the 11th..20th most recent,
        // i.e. visitors 15 down to 6.
        assert_eq!(page.items.first().unwrap().name, "visitor 15");
        assert_eq!(page.items.last().unwrap().name, "visitor 6");

        let last = store.list_messages(3, 10).await.unwrap();
        assert_eq!(last.items.len(), 5);
        assert_eq!(last.total, 25);
    }

    #[tokio::test]
    async fn test_list_messages_normalizes_page_and_size() {
        let store = empty_store();
        for _ in 0..3 {
            store.append_message("a", "a@x.com", "hi").await.unwrap();
        }

        let page = store.list_messages(0, 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.items.len(), 3);

        let capped = store.list_messages(1, 10_000).await.unwrap();
        assert_eq!(capped.page_size, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_mark_read_is_idempotent_and_reports_not_found() {
        let store = empty_store();
        let msg = store.append_message("a", "a@x.com", "hi").await.unwrap();

        store.mark_read(msg.id).await.unwrap();
        let listed = store.all_messages().await.unwrap();
        assert!(listed.iter().find(|m| m.id == msg.id).unwrap().read);

        // Marking again still succeeds and the flag never reverts.
        store.mark_read(msg.id).await.unwrap();
        assert!(store.all_messages().await.unwrap()[0].read);

        let err = store.mark_read(999_999).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_message_is_idempotent() {
        let store = empty_store();
        let msg = store.append_message("a", "a@x.com", "hi").await.unwrap();

        store.delete_message(msg.id).await.unwrap();
        assert!(store.all_messages().await.unwrap().is_empty());

        // Deleting again (or a never-existing id) is still Ok.
        store.delete_message(msg.id).await.unwrap();
        store.delete_message(424_242).await.unwrap();
    }

    #[tokio::test]
    async fn test_seed_legacy_messages_runs_once() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("messages.json"),
            r#"[
                {"id": 1700000000000, "name": "Ada", "email": "ada@x.com",
                 "message": "hello", "date": "2023-11-14T22:13:20Z", "read": true},
                {"name": "Grace", "email": "grace@x.com", "message": "hi"}
            ]"#,
        )
        .unwrap();

        let store = memory_store(dir.path());
        assert_eq!(store.seed_legacy_messages().await.unwrap(), 2);

        let all = store.all_messages().await.unwrap();
        assert_eq!(all.len(), 2);
        let ada = all.iter().find(|m| m.name == "Ada").unwrap();
        assert!(ada.read);
        assert_eq!(ada.created_at.timestamp(), 1_700_000_000);

        // Second run is a no-op because the inbox is no longer empty.
        assert_eq!(store.seed_legacy_messages().await.unwrap(), 0);
        assert_eq!(store.all_messages().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_seed_legacy_messages_without_file_is_noop() {
        let store = empty_store();
        assert_eq!(store.seed_legacy_messages().await.unwrap(), 0);
    }
}
