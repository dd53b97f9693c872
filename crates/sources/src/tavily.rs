//! Tavily web search in advanced depth.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CallError, SearchHit, SearchProvider};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::{check_status, client, transport_error};

const SERVICE: &str = "tavily";
const DEFAULT_BASE_URL: &str = "https://api.tavily.com";

/// [`SearchProvider`] over the Tavily API. Without an API key every search
/// fails with [`CallError::NotConfigured`].
#[derive(Debug)]
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: Option<SecretString>,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_depth: &'static str,
    max_results: usize,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

impl TavilySearch {
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
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>, CallError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or(CallError::NotConfigured { service: SERVICE })?;

        let request = SearchRequest {
            query,
            search_depth: "advanced",
            max_results,
            include_raw_content: true,
        };
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .bearer_auth(api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        let body = check_status(SERVICE, response)
            .await?
            .text()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let parsed: SearchResponse =
            serde_json::from_str(&body).map_err(|e| CallError::decode(SERVICE, e))?;
        let hits: Vec<SearchHit> = parsed
            .results
            .into_iter()
            .take(max_results)
            .map(|r| SearchHit {
                url: r.url,
                content: r.content,
            })
            .collect();
        debug!(query, hits = hits.len(), "tavily search complete");
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use pipeline::Retryability;

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        format!("http://{addr}")
    }

    fn search(base: &str) -> TavilySearch {
        TavilySearch::new(
            Some(SecretString::from("tvly-test".to_string())),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(base)
    }

    #[tokio::test]
    async fn sends_an_advanced_query_and_maps_results() {
        let router = Router::new().route(
            "/search",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                let authorised = headers
                    .get("authorization")
                    .is_some_and(|v| v == "Bearer tvly-test");
                let well_formed = body["search_depth"] == "advanced"
                    && body["include_raw_content"] == true
                    && body["max_results"] == 2;
                if !(authorised && well_formed) {
                    return (StatusCode::BAD_REQUEST, String::new());
                }
                let reply = serde_json::json!({
                    "query": body["query"],
                    "results": [
                        {"url": "https://a.example", "content": "first", "score": 0.9},
                        {"url": "https://b.example", "content": "second", "score": 0.8},
                        {"url": "https://c.example", "content": "third", "score": 0.7}
                    ]
                });
                (StatusCode::OK, reply.to_string())
            }),
        );
        let base = serve(router).await;

        let hits = search(&base).search("rates decision", 2).await.unwrap();
        assert_eq!(
            hits,
            vec![
                SearchHit {
                    url: "https://a.example".into(),
                    content: "first".into()
                },
                SearchHit {
                    url: "https://b.example".into(),
                    content: "second".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn server_errors_are_retryable() {
        let router = Router::new().route(
            "/search",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let base = serve(router).await;

        let err = search(&base).search("anything", 5).await.unwrap_err();
        assert_eq!(err.retryability(), Retryability::Retryable { after: None });
    }

    #[tokio::test]
    async fn missing_key_is_not_configured() {
        let search = TavilySearch::new(None, Duration::from_secs(1)).unwrap();
        let err = search.search("anything", 5).await.unwrap_err();
        assert!(!err.retryability().is_retryable());
    }
}
