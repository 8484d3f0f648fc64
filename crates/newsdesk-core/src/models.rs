use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A news article.
///
/// Two articles are the same *item* when their urls match
/// (`is_same_item`); they have the same *content* only when every field
/// matches (`==`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub url: String,
    pub title: String,
    pub description: String,
    pub published_at: String,
    pub url_to_image: Option<String>,
    pub source: Source,
    pub author: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub id: Option<String>,
    pub name: String,
}

impl Article {
    /// Bare article with just an identity and a title
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: String::new(),
            published_at: String::new(),
            url_to_image: None,
            source: Source {
                id: None,
                name: String::new(),
            },
            author: None,
            content: None,
        }
    }

    pub fn is_same_item(&self, other: &Article) -> bool {
        self.url == other.url
    }
}

/// One page of results as returned by a RemoteSource
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub articles: Vec<Article>,
    pub total_results: u32,
}

impl Page {
    pub fn new(articles: Vec<Article>, total_results: u32) -> Self {
        Self {
            articles,
            total_results,
        }
    }
}

/// An article the user chose to keep
#[derive(Debug, Clone, PartialEq)]
pub struct SavedArticle {
    pub article: Article,
    pub saved_at: DateTime<Utc>,
}
