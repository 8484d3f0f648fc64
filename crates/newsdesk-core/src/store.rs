// Saved-article storage: the LocalStore seam and its SQLite implementation
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use newsdesk_store::ArticleDb;
use tracing::debug;

use crate::{
    models::{Article, SavedArticle},
    observable::{Publisher, Subscription},
    Error, Result,
};

/// Persisted favorites, keyed by article url.
///
/// Write failures go back to whoever asked for the write.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Insert, or replace the stored copy with the same url
    async fn upsert(&self, article: &Article) -> Result<()>;

    /// Live view: the current list right away, then a fresh list after
    /// every change
    fn list_all(&self) -> Subscription<Vec<SavedArticle>>;

    /// Remove by url. Deleting something that isn't there is fine.
    async fn delete(&self, article: &Article) -> Result<()>;

    async fn get(&self, url: &str) -> Result<Option<SavedArticle>>;

    async fn snapshot(&self) -> Result<Vec<SavedArticle>>;
}

/// LocalStore on top of a SQLite file. Queries run on the blocking pool.
pub struct SqliteLocalStore {
    db: Arc<Mutex<ArticleDb>>,
    saved: Publisher<Vec<SavedArticle>>,
}

impl SqliteLocalStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_db(ArticleDb::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_db(ArticleDb::in_memory()?)
    }

    fn from_db(db: ArticleDb) -> Result<Self> {
        let saved = Publisher::new();
        saved.publish(load_all(&db)?);

        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            saved,
        })
    }

    /// Run `op` against the database off the async threads
    async fn with_db<R, F>(&self, op: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&ArticleDb) -> Result<R> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().unwrap_or_else(PoisonError::into_inner);
            op(&guard)
        })
        .await
        .map_err(|e| Error::TaskError(e.to_string()))?
    }

    /// Like `with_db`, then republish the full list while still holding
    /// the lock so listeners see changes in write order
    async fn write_and_publish<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&ArticleDb) -> Result<()> + Send + 'static,
    {
        let saved = self.saved.clone();
        self.with_db(move |db| {
            op(db)?;
            saved.publish(load_all(db)?);
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn upsert(&self, article: &Article) -> Result<()> {
        let article = article.clone();
        self.write_and_publish(move |db| Ok(db.upsert(&article.url, &article)?))
            .await
    }

    fn list_all(&self) -> Subscription<Vec<SavedArticle>> {
        self.saved.subscribe()
    }

    async fn delete(&self, article: &Article) -> Result<()> {
        let url = article.url.clone();
        self.write_and_publish(move |db| {
            if !db.delete(&url)? {
                debug!("Nothing saved under {}", url);
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, url: &str) -> Result<Option<SavedArticle>> {
        let url = url.to_string();
        self.with_db(move |db| {
            Ok(db.get::<Article>(&url)?.map(|record| SavedArticle {
                article: record.value,
                saved_at: record.saved_at,
            }))
        })
        .await
    }

    async fn snapshot(&self) -> Result<Vec<SavedArticle>> {
        self.with_db(load_all).await
    }
}

fn load_all(db: &ArticleDb) -> Result<Vec<SavedArticle>> {
    Ok(db
        .list_all::<Article>()?
        .into_iter()
        .map(|record| SavedArticle {
            article: record.value,
            saved_at: record.saved_at,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[SavedArticle]) -> Vec<&str> {
        list.iter().map(|s| s.article.url.as_str()).collect()
    }

    #[tokio::test]
    async fn test_upsert_replaces_without_duplicating() {
        let store = SqliteLocalStore::in_memory().unwrap();
        let original = Article::new("https://news.test/1", "First");
        let mut edited = original.clone();
        edited.title = "First (updated)".to_string();

        store.upsert(&original).await.unwrap();
        store.upsert(&Article::new("https://news.test/2", "Second")).await.unwrap();
        store.upsert(&edited).await.unwrap();

        let all = store.snapshot().await.unwrap();
        assert_eq!(urls(&all), vec!["https://news.test/1", "https://news.test/2"]);
        assert_eq!(all[0].article.title, "First (updated)");
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_an_error() {
        let store = SqliteLocalStore::in_memory().unwrap();
        store
            .delete(&Article::new("https://news.test/none", "gone"))
            .await
            .unwrap();
        assert!(store.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_all_is_live() {
        let store = SqliteLocalStore::in_memory().unwrap();
        let mut saved = store.list_all();

        // Current contents come first, even when empty
        assert_eq!(saved.next().await.unwrap().len(), 0);

        let article = Article::new("https://news.test/1", "One");
        store.upsert(&article).await.unwrap();
        assert_eq!(urls(&saved.next().await.unwrap()), vec!["https://news.test/1"]);

        store.delete(&article).await.unwrap();
        assert!(saved.next().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_by_url() {
        let store = SqliteLocalStore::in_memory().unwrap();
        store.upsert(&Article::new("https://news.test/1", "One")).await.unwrap();

        let found = store.get("https://news.test/1").await.unwrap().unwrap();
        assert_eq!(found.article.title, "One");
        assert!(store.get("https://news.test/2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reopen_keeps_saved_articles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("saved.db");

        {
            let store = SqliteLocalStore::open(&path).unwrap();
            store.upsert(&Article::new("https://news.test/1", "One")).await.unwrap();
        }

        let store = SqliteLocalStore::open(&path).unwrap();
        let mut saved = store.list_all();
        assert_eq!(urls(&saved.next().await.unwrap()), vec!["https://news.test/1"]);
    }
}
