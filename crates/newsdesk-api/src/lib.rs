// HTTP client for the news API
pub mod models;
pub mod news;

// Re-export common types
pub use models::{ApiArticle, ApiErrorBody, ApiSource, NewsResponse};
pub use news::{ClientSettings, NewsApiClient, NewsApiError};
