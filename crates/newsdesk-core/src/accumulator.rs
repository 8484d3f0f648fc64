// Page-by-page accumulation for one query context
use std::fmt;
use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    models::{Article, Page},
    observable::Publisher,
    outcome::Outcome,
    repository::SyncRepository,
};

/// A fetch session with its own page counter and results
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryContext {
    BreakingNews { country: String },
    Search { query: String },
}

impl QueryContext {
    pub fn breaking_news(country: impl Into<String>) -> Self {
        QueryContext::BreakingNews {
            country: country.into(),
        }
    }

    pub fn search(query: impl Into<String>) -> Self {
        QueryContext::Search {
            query: query.into(),
        }
    }
}

impl fmt::Display for QueryContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryContext::BreakingNews { country } => write!(f, "breaking news ({})", country),
            QueryContext::Search { query } => write!(f, "search \"{}\"", query),
        }
    }
}

/// Everything fetched so far for one context.
///
/// Never mutated once published: a successful merge builds a new value
/// with `version` bumped.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedResult {
    pub context: QueryContext,
    pub articles: Vec<Article>,
    /// As reported by the most recent page
    pub total_results: u32,
    pub next_page: u32,
    pub version: u64,
}

impl AccumulatedResult {
    pub fn empty(context: QueryContext) -> Self {
        Self {
            context,
            articles: Vec::new(),
            total_results: 0,
            next_page: 1,
            version: 0,
        }
    }

    /// Append a page. Articles already held keep their positions and
    /// duplicates are not filtered.
    fn merged(&self, page: Page) -> Self {
        let mut articles = Vec::with_capacity(self.articles.len() + page.articles.len());
        articles.extend_from_slice(&self.articles);
        articles.extend(page.articles);

        Self {
            context: self.context.clone(),
            articles,
            total_results: page.total_results,
            next_page: self.next_page + 1,
            version: self.version + 1,
        }
    }

    pub fn pages_loaded(&self) -> u32 {
        self.next_page - 1
    }

    /// True once the pages loaded so far cover `total_results`.
    ///
    /// Counted in pages, not articles: the server may return short pages
    /// or repeat an article, so the article count can drift either way.
    pub fn is_last_page(&self, page_size: u32) -> bool {
        let covered = u64::from(self.pages_loaded()) * u64::from(page_size.max(1));
        self.version > 0 && covered >= u64::from(self.total_results)
    }
}

pub type NewsOutcome = Outcome<Arc<AccumulatedResult>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading,
    Success,
    Error,
}

/// State machine for one query context: Idle -> Loading -> Success | Error,
/// and back to Loading on the next fetch.
///
/// Takes `&mut self` to fetch, so one accumulator can only have one fetch
/// in flight.
pub struct PaginationAccumulator {
    result: Arc<AccumulatedResult>,
    phase: Phase,
    updates: Publisher<NewsOutcome>,
}

impl PaginationAccumulator {
    pub fn new(context: QueryContext, updates: Publisher<NewsOutcome>) -> Self {
        Self {
            result: Arc::new(AccumulatedResult::empty(context)),
            phase: Phase::Idle,
            updates,
        }
    }

    pub fn context(&self) -> &QueryContext {
        &self.result.context
    }

    pub fn next_page(&self) -> u32 {
        self.result.next_page
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn result(&self) -> Arc<AccumulatedResult> {
        Arc::clone(&self.result)
    }

    /// Fetch the next page and publish Loading followed by the result.
    ///
    /// Only a successful fetch moves the page counter, so calling this
    /// again after an error retries the same page.
    pub async fn fetch_next(&mut self, repo: &SyncRepository) -> NewsOutcome {
        self.phase = Phase::Loading;
        self.updates.publish(Outcome::Loading);

        let page_no = self.result.next_page;
        let outcome = match repo.fetch_page(&self.result.context, page_no).await {
            Ok(page) => {
                let fetched = page.articles.len();
                let merged = Arc::new(self.result.merged(page));
                info!(
                    "{}: page {} brought {} articles ({} total)",
                    merged.context,
                    page_no,
                    fetched,
                    merged.articles.len()
                );

                self.result = Arc::clone(&merged);
                self.phase = Phase::Success;
                Outcome::Success(merged)
            }
            Err(err) => {
                warn!(
                    kind = %err.kind(),
                    page = page_no,
                    "{}: fetch failed: {}",
                    self.result.context,
                    err
                );
                self.phase = Phase::Error;
                Outcome::Error(err.user_message())
            }
        };

        self.updates.publish(outcome.clone());
        outcome
    }
}
