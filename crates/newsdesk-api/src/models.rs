use serde::{Deserialize, Serialize};

/// Paginated response returned by both the headlines and search endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    #[serde(default)]
    pub status: String,
    pub total_results: u32,
    pub articles: Vec<ApiArticle>,
}

/// Article record as the API sends it - most fields are nullable upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiArticle {
    pub source: ApiSource,
    pub author: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub url: String,
    pub url_to_image: Option<String>,
    pub published_at: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSource {
    pub id: Option<String>,
    pub name: Option<String>,
}

/// Error payload sent alongside non-2xx responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub status: String,
    pub code: Option<String>,
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_response_with_nulls() {
        let json = r#"{
            "status": "ok",
            "totalResults": 2,
            "articles": [
                {
                    "source": {"id": null, "name": "Example"},
                    "author": null,
                    "title": "Headline",
                    "description": null,
                    "url": "https://example.com/a",
                    "urlToImage": null,
                    "publishedAt": "2024-01-01T00:00:00Z",
                    "content": null
                }
            ]
        }"#;

        let response: NewsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.total_results, 2);
        assert_eq!(response.articles.len(), 1);

        let article = &response.articles[0];
        assert_eq!(article.url, "https://example.com/a");
        assert_eq!(article.title.as_deref(), Some("Headline"));
        assert!(article.description.is_none());
        assert_eq!(article.source.name.as_deref(), Some("Example"));
    }

    #[test]
    fn test_missing_url_is_rejected() {
        let json = r#"{"totalResults": 1, "articles": [{"source": {"id": null, "name": "x"}}]}"#;
        assert!(serde_json::from_str::<NewsResponse>(json).is_err());
    }
}
