// One front door for remote pages and saved articles
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::{
    accumulator::QueryContext,
    connectivity::Connectivity,
    error::FailureKind,
    models::{Article, Page, SavedArticle},
    observable::Subscription,
    outcome::NO_CONNECTION,
    remote::{RemoteError, RemoteSource},
    store::LocalStore,
    Result,
};

/// Why a page fetch produced no page
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("no network connection")]
    Offline,

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Offline => FailureKind::Connectivity,
            FetchError::Remote(err) => err.kind(),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            FetchError::Offline => NO_CONNECTION.to_string(),
            FetchError::Remote(err) => err.user_message(),
        }
    }
}

/// Composes the remote source, the saved-article store and the
/// connectivity check. Holds no state of its own.
pub struct SyncRepository {
    remote: Arc<dyn RemoteSource>,
    store: Arc<dyn LocalStore>,
    connectivity: Arc<dyn Connectivity>,
}

impl SyncRepository {
    pub fn new(
        remote: Arc<dyn RemoteSource>,
        store: Arc<dyn LocalStore>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            remote,
            store,
            connectivity,
        }
    }

    pub async fn is_online(&self) -> bool {
        self.connectivity.is_online().await
    }

    /// Fetch one page for a query context. The remote source is never
    /// called while offline.
    pub async fn fetch_page(
        &self,
        context: &QueryContext,
        page: u32,
    ) -> std::result::Result<Page, FetchError> {
        if !self.is_online().await {
            debug!("Offline, skipping fetch of {} page {}", context, page);
            return Err(FetchError::Offline);
        }

        let fetched = match context {
            QueryContext::BreakingNews { country } => {
                self.remote.fetch_breaking_news(country, page).await?
            }
            QueryContext::Search { query } => self.remote.search(query, page).await?,
        };
        Ok(fetched)
    }

    pub async fn upsert(&self, article: &Article) -> Result<()> {
        self.store.upsert(article).await
    }

    pub fn saved_news(&self) -> Subscription<Vec<SavedArticle>> {
        self.store.list_all()
    }

    pub async fn saved_article(&self, url: &str) -> Result<Option<SavedArticle>> {
        self.store.get(url).await
    }

    pub async fn saved_snapshot(&self) -> Result<Vec<SavedArticle>> {
        self.store.snapshot().await
    }

    pub async fn delete_article(&self, article: &Article) -> Result<()> {
        self.store.delete(article).await
    }
}
