// The presentation-facing news feed: breaking news, search and favorites
use std::sync::Arc;
use std::time::Duration;

use newsdesk_api::{ClientSettings, NewsApiClient};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    accumulator::{AccumulatedResult, NewsOutcome, PaginationAccumulator, QueryContext},
    config::Config,
    connectivity::{Connectivity, ConnectivityFlag, TcpProbe},
    models::{Article, SavedArticle},
    observable::{Publisher, Subscription},
    providers::NewsApiSource,
    repository::SyncRepository,
    store::SqliteLocalStore,
    Error, Result,
};

/// Owns one accumulator for breaking news and one for the current search
/// term, and publishes their outcomes on two separate streams.
pub struct NewsFeed {
    repo: Arc<SyncRepository>,
    breaking: Mutex<PaginationAccumulator>,
    search: Mutex<Option<PaginationAccumulator>>,
    breaking_updates: Publisher<NewsOutcome>,
    search_updates: Publisher<NewsOutcome>,
}

impl NewsFeed {
    pub fn new(repo: Arc<SyncRepository>, country: impl Into<String>) -> Self {
        let breaking_updates = Publisher::new();
        let breaking = PaginationAccumulator::new(
            QueryContext::breaking_news(country),
            breaking_updates.clone(),
        );

        Self {
            repo,
            breaking: Mutex::new(breaking),
            search: Mutex::new(None),
            breaking_updates,
            search_updates: Publisher::new(),
        }
    }

    /// Wire up the real API client, SQLite store and connectivity probe
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = NewsApiClient::with_settings(ClientSettings {
            base_url: config.api.base_url.clone(),
            api_key: Some(config.api.key.clone()).filter(|k| !k.is_empty()),
            page_size: config.api.page_size,
            timeout: Duration::from_secs(config.api.timeout_secs),
        })
        .map_err(|e| Error::ApiError(e.to_string()))?;

        let store = SqliteLocalStore::open(config.store_path()?)?;

        let connectivity: Arc<dyn Connectivity> = if config.connectivity.enabled {
            Arc::new(TcpProbe::new(
                config.connectivity.probe_addr.clone(),
                Duration::from_millis(config.connectivity.probe_timeout_ms),
            ))
        } else {
            Arc::new(ConnectivityFlag::new(true))
        };

        let repo = SyncRepository::new(
            Arc::new(NewsApiSource::new(client)),
            Arc::new(store),
            connectivity,
        );

        Ok(Self::new(Arc::new(repo), config.api.country.clone()))
    }

    pub fn subscribe_breaking_news(&self) -> Subscription<NewsOutcome> {
        self.breaking_updates.subscribe()
    }

    pub fn subscribe_search_news(&self) -> Subscription<NewsOutcome> {
        self.search_updates.subscribe()
    }

    /// Load the next page of breaking news (the first one on first call)
    pub async fn next_breaking_page(&self) -> NewsOutcome {
        let mut breaking = self.breaking.lock().await;
        breaking.fetch_next(&self.repo).await
    }

    /// Load the next page for `query`. A different query than last time
    /// starts over at page 1.
    pub async fn search_news(&self, query: &str) -> NewsOutcome {
        self.run_search(query, false).await
    }

    /// Always start `query` over at page 1, even if it is the current term
    pub async fn new_search(&self, query: &str) -> NewsOutcome {
        self.run_search(query, true).await
    }

    async fn run_search(&self, query: &str, restart: bool) -> NewsOutcome {
        let context = QueryContext::search(query);
        let mut current = self.search.lock().await;

        let stale = current
            .as_ref()
            .map_or(true, |acc| restart || acc.context() != &context);
        if stale {
            debug!("Starting fresh {}", context);
            *current = None;
        }

        let acc = current.get_or_insert_with(|| {
            PaginationAccumulator::new(context, self.search_updates.clone())
        });
        acc.fetch_next(&self.repo).await
    }

    pub async fn breaking_snapshot(&self) -> Arc<AccumulatedResult> {
        self.breaking.lock().await.result()
    }

    pub async fn search_snapshot(&self) -> Option<Arc<AccumulatedResult>> {
        self.search.lock().await.as_ref().map(|acc| acc.result())
    }

    pub async fn save_article(&self, article: &Article) -> Result<()> {
        self.repo.upsert(article).await?;
        info!("Saved {}", article.url);
        Ok(())
    }

    pub async fn delete_article(&self, article: &Article) -> Result<()> {
        self.repo.delete_article(article).await?;
        info!("Removed {}", article.url);
        Ok(())
    }

    pub fn saved_news(&self) -> Subscription<Vec<SavedArticle>> {
        self.repo.saved_news()
    }

    pub async fn saved_snapshot(&self) -> Result<Vec<SavedArticle>> {
        self.repo.saved_snapshot().await
    }

    pub async fn saved_article(&self, url: &str) -> Result<Option<SavedArticle>> {
        self.repo.saved_article(url).await
    }
}
