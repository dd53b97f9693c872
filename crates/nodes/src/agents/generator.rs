use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    Article, ArticleGenerator, Category, HallucinationCheck, LlmProvider, ResearchResult,
    RetryPolicy, RunContext,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::{ask, truncate_chars};

/// Characters of research context included in the prompt.
const CONTEXT_LIMIT: usize = 8_000;
/// Research URLs substituted when the model's sources cannot be trusted.
const FALLBACK_SOURCES: usize = 3;

#[derive(Debug, Deserialize)]
struct Draft {
    title: String,
    #[serde(default = "other_category")]
    category: Category,
    #[serde(default)]
    summary: String,
    article_body: String,
    #[serde(default)]
    sources: Vec<String>,
}

fn other_category() -> Category {
    Category::Other
}

/// Writes articles strictly from gathered research.
pub struct LlmArticleGenerator {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
    word_count: String,
}

impl LlmArticleGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy, word_count: impl Into<String>) -> Self {
        Self {
            llm,
            retry,
            word_count: word_count.into(),
        }
    }

    fn prompt(&self, research: &ResearchResult, critique: Option<&str>) -> String {
        let snippets = research.content_snippets.join("\n---\n");
        let sources = research.source_urls.join("\n");
        let feedback = critique
            .map(|c| format!("REVISION FEEDBACK (fix these issues): {c}\n"))
            .unwrap_or_default();
        let words = &self.word_count;

        format!(
            r#"You are an elite investigative journalist. Write a {words} word news article about "{title}".

RESEARCH CONTEXT:
{context}

AVAILABLE SOURCE URLS (only use these):
{sources}

{feedback}
STRUCTURE:
1. Catchy headline
2. Immediate context (the "why now")
3. Detailed key developments, grounded in the research
4. Broader implications (geopolitical, economic, social)

REQUIREMENTS:
- Use Markdown for structure.
- Do not include any information that is not present in the research context.
- Word count: about {words} words.
- The "sources" field may only contain URLs from the list above.

Respond with a JSON object:
{{"title": "Final headline", "category": "Technology" | "Finance" | "Politics" | "Other", "summary": "Two sentence summary", "article_body": "Full Markdown article", "sources": ["URL from the list"]}}"#,
            title = research.trend_title,
            context = truncate_chars(&snippets, CONTEXT_LIMIT),
        )
    }
}

/// Keeps only sources that came from research. Falls back to the first
/// research URLs when nothing survives or any source looks invented.
fn vet_sources(proposed: &[String], research: &ResearchResult) -> Vec<String> {
    let fabricated = proposed
        .iter()
        .any(|url| url.contains("example.com") || url.contains("URL"));
    let vetted: Vec<String> = proposed
        .iter()
        .filter(|url| research.source_urls.contains(url))
        .cloned()
        .collect();

    if fabricated || vetted.is_empty() {
        research
            .source_urls
            .iter()
            .take(FALLBACK_SOURCES)
            .cloned()
            .collect()
    } else {
        vetted
    }
}

#[async_trait]
impl ArticleGenerator for LlmArticleGenerator {
    async fn generate(
        &self,
        research: &ResearchResult,
        critique: Option<&str>,
        ctx: &RunContext,
    ) -> Option<Article> {
        let mode = if critique.is_some() { "refine" } else { "generate" };
        let prompt = self.prompt(research, critique);

        let draft = match ask::<Draft>(&self.llm, &self.retry, "generate", &prompt, ctx).await {
            Ok(draft) if !draft.article_body.trim().is_empty() => draft,
            Ok(_) => {
                warn!(trend = research.trend_title.as_str(), mode, "model returned an empty article");
                return None;
            }
            Err(error) => {
                warn!(trend = research.trend_title.as_str(), mode, error = %error, "article generation failed");
                return None;
            }
        };

        info!(trend = research.trend_title.as_str(), mode, "article written");
        Some(Article {
            sources: vet_sources(&draft.sources, research),
            title: draft.title,
            category: draft.category,
            trend_score: research.trend_score,
            summary: draft.summary,
            article_body: draft.article_body,
            hallucination_check: HallucinationCheck::Unsure,
            claims: None,
            critique: None,
        })
    }
}
