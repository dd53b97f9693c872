//! NewsAPI `everything` search, newest first.

use std::time::Duration;

use pipeline::{CallError, Trend};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::http::{check_status, client, transport_error};

const SERVICE: &str = "newsapi";
const DEFAULT_BASE_URL: &str = "https://newsapi.org";

/// Articles kept from one response.
pub const MAX_ARTICLES: usize = 20;

/// NewsAPI client. Without an API key every fetch fails with
/// [`CallError::NotConfigured`].
#[derive(Debug)]
pub struct NewsApiSource {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct EverythingResponse {
    #[serde(default)]
    articles: Vec<NewsArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewsArticle {
    title: Option<String>,
    source: Option<NewsSource>,
    url: Option<String>,
    published_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NewsSource {
    name: Option<String>,
}

impl NewsApiSource {
    pub fn new(api_key: Option<SecretString>, timeout: Duration) -> Result<Self, CallError> {
        Ok(Self {
            client: client(SERVICE, timeout)?,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Searches for `query` and returns up to [`MAX_ARTICLES`] trends.
    pub async fn fetch(&self, query: &str) -> Result<Vec<Trend>, CallError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(CallError::NotConfigured { service: SERVICE })?;

        let response = self
            .client
            .get(format!("{}/v2/everything", self.base_url))
            .query(&[("q", query), ("sortBy", "publishedAt")])
            .header("X-Api-Key", api_key.expose_secret())
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        let body = check_status(SERVICE, response)
            .await?
            .text()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let trends = parse_everything(&body)?;
        debug!(query, trends = trends.len(), "newsapi fetch complete");
        Ok(trends)
    }
}

fn parse_everything(body: &str) -> Result<Vec<Trend>, CallError> {
    let response: EverythingResponse =
        serde_json::from_str(body).map_err(|e| CallError::decode(SERVICE, e))?;
    Ok(response
        .articles
        .into_iter()
        .take(MAX_ARTICLES)
        .filter_map(|article| {
            let title = article.title.filter(|t| !t.trim().is_empty())?;
            let source = article
                .source
                .and_then(|s| s.name)
                .unwrap_or_else(|| "NewsAPI".to_string());
            let mut trend = Trend::new(title, source);
            trend.url = article.url;
            trend.timestamp = article.published_at;
            Some(trend)
        })
        .collect())
}
