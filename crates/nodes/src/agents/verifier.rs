use std::sync::Arc;

use async_trait::async_trait;
use pipeline::{
    Article, ArticleVerifier, ClaimVerification, HallucinationCheck, LlmProvider, ResearchResult,
    RetryPolicy, RunContext,
};
use serde::Deserialize;
use tracing::{info, warn};

use super::ask;

#[derive(Debug, Deserialize)]
struct Verdict {
    hallucination_check: HallucinationCheck,
    #[serde(default)]
    claims: Vec<ClaimVerification>,
    #[serde(default)]
    critique: Option<String>,
}

/// Fact-checks an article claim by claim against its research snippets.
pub struct LlmArticleVerifier {
    llm: Arc<dyn LlmProvider>,
    retry: RetryPolicy,
}

impl LlmArticleVerifier {
    pub fn new(llm: Arc<dyn LlmProvider>, retry: RetryPolicy) -> Self {
        Self { llm, retry }
    }

    fn prompt(article: &Article, research: &ResearchResult) -> String {
        format!(
            r#"You are a fact-checking editor. Verify the following article against the provided source snippets.

ARTICLE:
{body}

SOURCE SNIPPETS:
{snippets}

TASKS:
1. Break the article down into its core factual claims.
2. For each claim, check whether the source snippets support it.
3. Identify any hallucinations, exaggerations, or missing context.
4. Return "Pass" only if all major claims are verified. Otherwise return "Fail".

Respond with a JSON object:
{{"hallucination_check": "Pass" | "Fail", "claims": [{{"claim": "Claim text", "is_verified": true, "source_url": "URL if found", "reasoning": "Brief explanation"}}], "critique": "Actionable feedback for the writer"}}"#,
            body = article.article_body,
            snippets = research.content_snippets.join("\n---\n"),
        )
    }
}

#[async_trait]
impl ArticleVerifier for LlmArticleVerifier {
    async fn verify(
        &self,
        mut article: Article,
        research: &ResearchResult,
        ctx: &RunContext,
    ) -> Article {
        let prompt = Self::prompt(&article, research);
        match ask::<Verdict>(&self.llm, &self.retry, "verify", &prompt, ctx).await {
            Ok(verdict) => {
                let unverified = verdict.claims.iter().filter(|c| !c.is_verified).count();
                info!(
                    title = article.title.as_str(),
                    check = %verdict.hallucination_check,
                    claims = verdict.claims.len(),
                    unverified,
                    "article verified"
                );
                article.hallucination_check = verdict.hallucination_check;
                article.claims = Some(verdict.claims);
                article.critique = Some(verdict.critique.unwrap_or_default());
            }
            Err(error) => {
                warn!(title = article.title.as_str(), error = %error, "verification failed");
                article.hallucination_check = HallucinationCheck::Unsure;
                article.critique = Some(format!("Verification system error: {error}"));
            }
        }
        article
    }
}
