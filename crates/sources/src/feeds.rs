use async_trait::async_trait;
use pipeline::{CallError, FeedQuery, Trend, TrendSource};
use tracing::{info, warn};

use crate::newsapi::NewsApiSource;
use crate::rss::RssSource;

/// NewsAPI search results followed by RSS feed items.
///
/// The two sources are fetched concurrently and each degrades to an empty list
/// on its own, so one outage never hides the other's trends.
#[derive(Debug)]
pub struct FeedIngestion {
    newsapi: NewsApiSource,
    rss: RssSource,
}

impl FeedIngestion {
    pub fn new(newsapi: NewsApiSource, rss: RssSource) -> Self {
        Self { newsapi, rss }
    }
}

fn or_empty(origin: &str, result: Result<Vec<Trend>, CallError>) -> Vec<Trend> {
    result.unwrap_or_else(|error| {
        match error {
            CallError::NotConfigured { .. } => info!(origin, "source not configured, skipping"),
            error => warn!(origin, error = %error, "source unavailable, continuing without it"),
        }
        Vec::new()
    })
}

#[async_trait]
impl TrendSource for FeedIngestion {
    async fn fetch_trends(&self, query: &FeedQuery) -> Result<Vec<Trend>, CallError> {
        let (search, feed) = tokio::join!(
            self.newsapi.fetch(&query.query),
            self.rss.fetch(&query.feed_url)
        );
        let mut trends = or_empty("newsapi", search);
        trends.extend(or_empty("rss", feed));
        info!(query = query.query.as_str(), trends = trends.len(), "ingestion complete");
        Ok(trends)
    }
}
