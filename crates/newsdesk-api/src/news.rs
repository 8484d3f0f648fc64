use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use crate::models::{ApiErrorBody, NewsResponse};

const NEWS_API_BASE: &str = "https://newsapi.org";
const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Error, Debug)]
pub enum NewsApiError {
    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Server responded with {code}: {message}")]
    Status { code: u16, message: String },

    #[error("Empty response body ({message})")]
    EmptyBody { message: String },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for NewsApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NewsApiError::Timeout
        } else if err.is_decode() {
            NewsApiError::Malformed(err.to_string())
        } else {
            NewsApiError::Network(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, NewsApiError>;

/// Knobs for the HTTP client
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub page_size: u32,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: NEWS_API_BASE.to_string(),
            api_key: None,
            page_size: 20,
            timeout: Duration::from_secs(30),
        }
    }
}

/// Client for a NewsAPI-compatible service.
///
/// Does no retrying of its own: a failed call is reported once and the
/// caller decides whether to ask again.
pub struct NewsApiClient {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    page_size: u32,
}

impl NewsApiClient {
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_settings(ClientSettings {
            api_key,
            ..ClientSettings::default()
        })
    }

    pub fn with_settings(settings: ClientSettings) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("Newsdesk/0.1.0"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| NewsApiError::Client(e.to_string()))?;

        Ok(Self {
            client,
            api_key: settings.api_key,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            page_size: settings.page_size,
        })
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Breaking news for a country, one page at a time (pages start at 1)
    pub async fn top_headlines(&self, country: &str, page: u32) -> Result<NewsResponse> {
        let url = format!("{}/v2/top-headlines", self.base_url);
        self.get_page(&url, &[("country", country)], page).await
    }

    /// Free-text search across all articles
    pub async fn everything(&self, query: &str, page: u32) -> Result<NewsResponse> {
        let url = format!("{}/v2/everything", self.base_url);
        self.get_page(&url, &[("q", query)], page).await
    }

    async fn get_page(&self, url: &str, params: &[(&str, &str)], page: u32) -> Result<NewsResponse> {
        let page = page.to_string();
        let page_size = self.page_size.to_string();

        let mut request = self
            .client
            .get(url)
            .query(params)
            .query(&[("page", page.as_str()), ("pageSize", page_size.as_str())]);

        if let Some(ref key) = self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        debug!("GET {} page={}", url, page);
        let response = request.send().await?;

        let status = response.status();
        let reason = status.canonical_reason().unwrap_or_default().to_string();
        let body = response.bytes().await?;

        if !status.is_success() {
            // Prefer the API's own message over the bare reason phrase
            let message = serde_json::from_slice::<ApiErrorBody>(&body)
                .ok()
                .and_then(|b| b.message)
                .unwrap_or(reason);

            return Err(NewsApiError::Status {
                code: status.as_u16(),
                message,
            });
        }

        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(NewsApiError::EmptyBody { message: reason });
        }

        let parsed: NewsResponse =
            serde_json::from_slice(&body).map_err(|e| NewsApiError::Malformed(e.to_string()))?;

        debug!(
            "Received {} articles (total {})",
            parsed.articles.len(),
            parsed.total_results
        );
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = NewsApiClient::new(None).unwrap();
        assert!(client.api_key.is_none());
        assert_eq!(client.base_url, NEWS_API_BASE);
        assert_eq!(client.page_size(), 20);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let client = NewsApiClient::with_settings(ClientSettings {
            base_url: "http://localhost:8080/".to_string(),
            api_key: Some("secret".to_string()),
            ..ClientSettings::default()
        })
        .unwrap();
        assert_eq!(client.base_url, "http://localhost:8080");
        assert_eq!(client.api_key.as_deref(), Some("secret"));
    }
}
