// NewsAPI provider - bridges the HTTP client with the RemoteSource trait
use async_trait::async_trait;
use newsdesk_api::{ApiArticle, NewsApiClient, NewsApiError, NewsResponse};

use crate::{
    models::{Article, Page, Source},
    remote::{RemoteError, RemoteSource},
};

/// Wrapper around NewsApiClient that implements RemoteSource
pub struct NewsApiSource {
    client: NewsApiClient,
}

impl NewsApiSource {
    pub fn new(client: NewsApiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RemoteSource for NewsApiSource {
    async fn fetch_breaking_news(&self, country: &str, page: u32) -> Result<Page, RemoteError> {
        let response = self.client.top_headlines(country, page).await?;
        Ok(response_to_page(response))
    }

    async fn search(&self, query: &str, page: u32) -> Result<Page, RemoteError> {
        let response = self.client.everything(query, page).await?;
        Ok(response_to_page(response))
    }
}

impl From<NewsApiError> for RemoteError {
    fn from(err: NewsApiError) -> Self {
        match err {
            NewsApiError::Timeout => RemoteError::Timeout,
            NewsApiError::Network(msg) | NewsApiError::Client(msg) => RemoteError::Transport(msg),
            NewsApiError::Status { code, message } => RemoteError::Status { code, message },
            NewsApiError::EmptyBody { message } => RemoteError::EmptyBody { message },
            NewsApiError::Malformed(msg) => RemoteError::Malformed(msg),
        }
    }
}

fn response_to_page(response: NewsResponse) -> Page {
    Page {
        articles: response.articles.into_iter().map(api_to_article).collect(),
        total_results: response.total_results,
    }
}

/// Convert a wire article to our model. Null text fields become empty
/// strings so equality stays simple.
fn api_to_article(api: ApiArticle) -> Article {
    Article {
        url: api.url,
        title: api.title.unwrap_or_default(),
        description: api.description.unwrap_or_default(),
        published_at: api.published_at.unwrap_or_default(),
        url_to_image: api.url_to_image,
        source: Source {
            id: api.source.id,
            name: api.source.name.unwrap_or_default(),
        },
        author: api.author,
        content: api.content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use newsdesk_api::ApiSource;

    #[test]
    fn test_api_to_article_fills_nulls() {
        let api = ApiArticle {
            source: ApiSource {
                id: Some("bbc".into()),
                name: None,
            },
            author: None,
            title: None,
            description: Some("desc".into()),
            url: "https://news.test/x".into(),
            url_to_image: Some("https://img.test/x.png".into()),
            published_at: None,
            content: None,
        };

        let article = api_to_article(api);
        assert_eq!(article.url, "https://news.test/x");
        assert_eq!(article.title, "");
        assert_eq!(article.description, "desc");
        assert_eq!(article.source.id.as_deref(), Some("bbc"));
        assert_eq!(article.source.name, "");
        assert_eq!(article.url_to_image.as_deref(), Some("https://img.test/x.png"));
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(RemoteError::from(NewsApiError::Timeout), RemoteError::Timeout);
        assert_eq!(
            RemoteError::from(NewsApiError::Status {
                code: 401,
                message: "bad key".into()
            }),
            RemoteError::Status {
                code: 401,
                message: "bad key".into()
            }
        );
        assert!(matches!(
            RemoteError::from(NewsApiError::Malformed("x".into())),
            RemoteError::Malformed(_)
        ));
    }
}
