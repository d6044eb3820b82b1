use chrono::{DateTime, Utc};
use reqwest::blocking::Client;
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

use crate::models::Headline;

pub const DEFAULT_ENDPOINT: &str = "https://newsapi.org/v2/top-headlines";
const DEFAULT_SOURCE_NAME: &str = "NewsAPI";
const UNTITLED: &str = "Untitled";

/// Every way a headline fetch can fail. All of them end in the fallback.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response status {0}")]
    BadStatus(StatusCode),
    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("no articles in response")]
    NoArticles,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ArticleSource {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Article {
    pub title: Option<String>,
    pub source: Option<ArticleSource>,
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TopHeadlinesResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

/// Anything that can produce the current top headline for a credential.
pub trait HeadlineSource: Send + Sync {
    fn fetch_top_headline(&self, credential: &str) -> Result<Article, FetchError>;
}

pub struct NewsApiClient {
    client: Client,
    endpoint: String,
}

impl NewsApiClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("one_headline/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl HeadlineSource for NewsApiClient {
    fn fetch_top_headline(&self, credential: &str) -> Result<Article, FetchError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("language", "en"), ("pageSize", "1"), ("apiKey", credential)])
            .header(CACHE_CONTROL, "no-cache, no-store")
            .header(PRAGMA, "no-cache")
            .send()?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::BadStatus(status));
        }

        let body = response.text()?;
        let parsed: TopHeadlinesResponse = serde_json::from_str(&body)?;
        parsed.articles.into_iter().next().ok_or(FetchError::NoArticles)
    }
}

/// Ask `source` for one headline and shape it for display.
pub fn fetch_headline(
    source: &dyn HeadlineSource,
    credential: &str,
    now: DateTime<Utc>,
) -> Result<Headline, FetchError> {
    match source.fetch_top_headline(credential) {
        Ok(article) => {
            let headline = normalize(article, now);
            info!("Fetched headline from {}", headline.source);
            Ok(headline)
        }
        Err(e) => {
            debug!("Headline fetch failed: {}", e);
            Err(e)
        }
    }
}

pub fn normalize(article: Article, now: DateTime<Utc>) -> Headline {
    let text = article
        .title
        .map(|t| html_escape::decode_html_entities(t.trim()).to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let source = article
        .source
        .and_then(|s| s.name)
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE_NAME.to_string());

    let url = article
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    Headline {
        text,
        source,
        url,
        fetched_at: now,
    }
}
