use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    LlmProvider, PageFetcher, ResearchResult, Researcher, RetryPolicy, RunContext, SearchHit,
    SearchProvider, Trend,
};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ask, truncate_chars};
use crate::retry::call_with_retry;

/// Characters of fetched page text kept as a snippet.
const PAGE_TEXT_LIMIT: usize = 2_000;
/// Characters of gathered context shown to the gap detector.
const GAP_CONTEXT_LIMIT: usize = 4_000;
/// Follow-up queries run per trend.
const MAX_FOLLOW_UPS: usize = 2;

/// Gathers context for a trend from web search, the trend's own page, and
/// model-proposed follow-up searches.
pub struct LlmResearcher {
    search: Arc<dyn SearchProvider>,
    pages: Arc<dyn PageFetcher>,
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    max_results: usize,
    follow_up_results: usize,
}

impl LlmResearcher {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        pages: Arc<dyn PageFetcher>,
        llm: Arc<dyn LlmProvider>,
        retry: RetryPolicy,
        max_results: usize,
        follow_up_results: usize,
    ) -> Self {
        Self {
            search,
            pages,
            llm,
            retry,
            max_results,
            follow_up_results,
        }
    }

    async fn search(&self, query: &str, max_results: usize, ctx: &RunContext) -> Vec<SearchHit> {
        let result = call_with_retry(&self.retry, "search", &ctx.cancel, || {
            self.search.search(query, max_results)
        })
        .await;
        result.unwrap_or_else(|error| {
            warn!(query, error = %error, "search failed, continuing without its hits");
            Vec::new()
        })
    }

    async fn page_text(&self, url: &str) -> Option<String> {
        match self.pages.fetch_text(url).await {
            Ok(text) if !text.trim().is_empty() => {
                Some(truncate_chars(&text, PAGE_TEXT_LIMIT).to_string())
            }
            Ok(_) => None,
            Err(error) => {
                debug!(url, error = %error, "page fallback failed");
                None
            }
        }
    }

    async fn gap_queries(&self, trend: &Trend, snippets: &[String], ctx: &RunContext) -> Vec<String> {
        let context = snippets.join("\n");
        let prompt = format!(
            r#"Analyze the following research context about "{title}":
---
{context}
---
Identify any missing critical information (specific dates, names of key figures, exact statistics, or conflicting reports).

Return a JSON list of 1-2 specific search queries to fill these gaps.
If no gaps are found, return an empty list []."#,
            title = trend.title,
            context = truncate_chars(&context, GAP_CONTEXT_LIMIT),
        );

        match ask::<Vec<Value>>(&self.llm, &self.retry, "gap_detection", &prompt, ctx).await {
            Ok(items) => items
                .iter()
                .filter_map(query_from_item)
                .take(MAX_FOLLOW_UPS)
                .collect(),
            Err(error) => {
                warn!(error = %error, "gap detection failed");
                Vec::new()
            }
        }
    }
}

/// Accepts `"query"` strings and `{"search_query": ...}` / `{"query": ...}` objects.
fn query_from_item(item: &Value) -> Option<String> {
    let text = match item {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map
            .get("search_query")
            .or_else(|| map.get("query"))
            .and_then(Value::as_str)?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

#[async_trait]
impl Researcher for LlmResearcher {
    async fn research(&self, trend: &Trend, ctx: &RunContext) -> ResearchResult {
        let mut snippets = Vec::new();
        let mut urls = Vec::new();

        let query = format!("{} detailed latest news", trend.title);
        let hits = self.search(&query, self.max_results, ctx).await;
        if hits.is_empty() {
            if let Some(url) = &trend.url {
                if let Some(text) = self.page_text(url).await {
                    snippets.push(text);
                    urls.push(url.clone());
                }
            }
        }
        collect_hits(hits, &mut snippets, &mut urls);

        for follow_up in self.gap_queries(trend, &snippets, ctx).await {
            debug!(query = follow_up.as_str(), "filling research gap");
            let hits = self.search(&follow_up, self.follow_up_results, ctx).await;
            collect_hits(hits, &mut snippets, &mut urls);
        }

        let result = ResearchResult::for_trend(trend, snippets, urls);
        info!(
            trend = trend.title.as_str(),
            snippets = result.content_snippets.len(),
            sources = result.source_urls.len(),
            "researched trend"
        );
        result
    }
}

fn collect_hits(hits: Vec<SearchHit>, snippets: &mut Vec<String>, urls: &mut Vec<String>) {
    for hit in hits {
        if !hit.content.trim().is_empty() {
            snippets.push(hit.content);
        }
        urls.push(hit.url);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::ScriptedLlm;
    use pipeline::CallError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSearch {
        queries: Mutex<Vec<(String, usize)>>,
        empty: bool,
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        async fn search(&self, query: &str, max: usize) -> Result<Vec<SearchHit>, CallError> {
            self.queries.lock().unwrap().push((query.to_string(), max));
            if self.empty {
                return Ok(Vec::new());
            }
            Ok(vec![
                SearchHit {
                    url: "https://a".into(),
                    content: format!("about {query}"),
                },
                SearchHit {
                    url: "https://b".into(),
                    content: String::new(),
                },
            ])
        }
    }

    struct FakePage(Result<String, CallError>);

    #[async_trait]
    impl PageFetcher for FakePage {
        async fn fetch_text(&self, _url: &str) -> Result<String, CallError> {
            self.0.clone()
        }
    }

    fn researcher(search: Arc<FakeSearch>, page: FakePage, llm: ScriptedLlm) -> LlmResearcher {
        LlmResearcher::new(search, Arc::new(page), Arc::new(llm), RetryPolicy::none(), 5, 2)
    }

    #[tokio::test]
    async fn search_hits_and_follow_ups_are_combined() {
        let search = Arc::new(FakeSearch::default());
        let llm = ScriptedLlm::ok(&[r#"["exact vote count", {"search_query": "who resigned"}, "third"]"#]);
        let trend = Trend::new("Election", "RSS Feed").with_score(4.0);

        let result = researcher(search.clone(), FakePage(Ok(String::new())), llm)
            .research(&trend, &RunContext::detached())
            .await;

        let queries = search.queries.lock().unwrap().clone();
        assert_eq!(
            queries,
            vec![
                ("Election detailed latest news".to_string(), 5),
                ("exact vote count".to_string(), 2),
                ("who resigned".to_string(), 2),
            ]
        );
        assert_eq!(result.content_snippets.len(), 3);
        assert_eq!(result.source_urls, vec!["https://a", "https://b"]);
        assert_eq!(result.trend_score, 4.0);
    }

    #[tokio::test]
    async fn page_text_is_used_when_search_finds_nothing() {
        let search = Arc::new(FakeSearch {
            empty: true,
            ..FakeSearch::default()
        });
        let long = "x".repeat(5_000);
        let trend = Trend::new("Quake", "RSS Feed").with_url("https://quake");

        let result = researcher(search, FakePage(Ok(long)), ScriptedLlm::ok(&["[]"]))
            .research(&trend, &RunContext::detached())
            .await;

        assert_eq!(result.content_snippets.len(), 1);
        assert_eq!(result.content_snippets[0].len(), PAGE_TEXT_LIMIT);
        assert_eq!(result.source_urls, vec!["https://quake"]);
    }

    #[tokio::test]
    async fn total_failure_yields_an_empty_result() {
        let search = Arc::new(FakeSearch {
            empty: true,
            ..FakeSearch::default()
        });
        let trend = Trend::new("Quiet day", "RSS Feed").with_url("https://quiet");
        let page = FakePage(Err(CallError::Timeout { service: "page" }));

        let result = researcher(search, page, ScriptedLlm::default())
            .research(&trend, &RunContext::detached())
            .await;

        assert!(result.is_empty());
        assert!(result.source_urls.is_empty());
        assert_eq!(result.trend_title, "Quiet day");
    }

    #[test]
    fn gap_items_accept_strings_and_objects() {
        use serde_json::json;
        assert_eq!(query_from_item(&json!("a")), Some("a".into()));
        assert_eq!(query_from_item(&json!({"query": "b"})), Some("b".into()));
        assert_eq!(query_from_item(&json!({"other": 1})), None);
        assert_eq!(query_from_item(&json!("  ")), None);
    }
}
