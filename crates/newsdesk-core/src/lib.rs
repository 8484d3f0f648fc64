// Core sync logic: paginated fetching, saved articles, debounced search
pub mod accumulator;
pub mod config;
pub mod connectivity;
pub mod debounce;
pub mod diff;
pub mod error;
pub mod feed;
pub mod models;
pub mod observable;
pub mod outcome;
pub mod providers;
pub mod remote;
pub mod repository;
pub mod store;

pub use accumulator::{AccumulatedResult, NewsOutcome, PaginationAccumulator, Phase, QueryContext};
pub use config::Config;
pub use connectivity::{Connectivity, ConnectivityFlag, TcpProbe};
pub use debounce::{CancellableTimer, SearchDebouncer, DEFAULT_SEARCH_DELAY};
pub use diff::{DiffOp, ListDiffPresenter, ListUpdate};
pub use error::{Error, FailureKind};
pub use feed::NewsFeed;
pub use models::{Article, Page, SavedArticle, Source};
pub use observable::{Publisher, Subscription};
pub use outcome::Outcome;
pub use remote::{RemoteError, RemoteSource};
pub use repository::{FetchError, SyncRepository};
pub use store::{LocalStore, SqliteLocalStore};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
