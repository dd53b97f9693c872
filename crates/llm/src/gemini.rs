//! Google Gemini `generateContent` client.
//!
//! Every request asks for `application/json` output so replies can be decoded
//! directly by the agents. The API key is held as a [`SecretString`], sent in
//! the `x-goog-api-key` header, and never logged.

use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CallError, LlmProvider, LlmSection};
use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const SERVICE: &str = "gemini";

/// Longest slice of an error body carried into a [`CallError`].
const MAX_ERROR_BODY: usize = 512;

/// [`LlmProvider`] backed by the Gemini REST API.
#[derive(Debug)]
pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

impl GeminiProvider {
    /// Creates a provider for `model` with a per-request `timeout`.
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CallError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CallError::Transport {
                service: SERVICE,
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            api_key,
            model: model.into(),
            base_url: LlmSection::default().base_url,
        })
    }

    /// Creates a provider from the `[llm]` configuration section.
    pub fn from_config(api_key: SecretString, section: &LlmSection) -> Result<Self, CallError> {
        Ok(Self::new(
            api_key,
            section.model.clone(),
            Duration::from_secs(section.timeout_seconds),
        )?
        .with_base_url(section.base_url.clone()))
    }

    /// Points the provider at a different API host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl LlmProvider for GeminiProvider {
    fn name(&self) -> &str {
        SERVICE
    }

    async fn complete_json(&self, prompt: &str) -> Result<String, CallError> {
        let body = GenerateRequest {
            contents: [Content {
                parts: [Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        debug!(model = self.model.as_str(), prompt_chars = prompt.len(), "sending generateContent request");
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "gemini request rejected");
            return Err(status_error(status.as_u16(), retry_after, &text));
        }

        let reply: GenerateResponse =
            serde_json::from_str(&text).map_err(|e| CallError::decode(SERVICE, e))?;
        if let Some(usage) = &reply.usage_metadata {
            debug!(
                prompt_tokens = usage.prompt_token_count,
                reply_tokens = usage.candidates_token_count,
                "gemini usage"
            );
        }
        extract_text(reply)
    }
}

/// Concatenates the text parts of the first candidate.
fn extract_text(reply: GenerateResponse) -> Result<String, CallError> {
    let candidate = reply
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| CallError::decode(SERVICE, "no candidates in response"))?;
    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|part| part.text)
        .collect();
    if text.trim().is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
        return Err(CallError::decode(
            SERVICE,
            format!("candidate has no text (finish reason: {reason})"),
        ));
    }
    Ok(text)
}

fn transport_error(error: reqwest::Error) -> CallError {
    if error.is_timeout() {
        CallError::Timeout { service: SERVICE }
    } else {
        CallError::Transport {
            service: SERVICE,
            message: error.to_string(),
        }
    }
}

fn status_error(status: u16, retry_after: Option<Duration>, body: &str) -> CallError {
    let message: String = body.trim().chars().take(MAX_ERROR_BODY).collect();
    CallError::Status {
        service: SERVICE,
        status,
        message,
        retry_after,
    }
}

/// Parses a delta-seconds `Retry-After` value. HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
