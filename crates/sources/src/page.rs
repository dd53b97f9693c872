//! Paragraph text of a web page, for trends the search service knows nothing about.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use pipeline::{CallError, PageFetcher};
use regex::Regex;
use tracing::debug;

use crate::http::{check_status, client, transport_error};

const SERVICE: &str = "page";

#[derive(Debug)]
pub struct HttpPageFetcher {
    client: reqwest::Client,
}

impl HttpPageFetcher {
    pub fn new(timeout: Duration) -> Result<Self, CallError> {
        Ok(Self {
            client: client(SERVICE, timeout)?,
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_text(&self, url: &str) -> Result<String, CallError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        let html = check_status(SERVICE, response)
            .await?
            .text()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        let text = extract_paragraphs(&html);
        debug!(url, chars = text.len(), "page text extracted");
        Ok(text)
    }
}

fn paragraph_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"(?is)<p(?:\s[^>]*)?>(.*?)</p\s*>") {
        Ok(re) => re,
        Err(e) => unreachable!("paragraph pattern is a valid literal: {e}"),
    })
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| match Regex::new(r"(?s)<[^>]*>") {
        Ok(re) => re,
        Err(e) => unreachable!("tag pattern is a valid literal: {e}"),
    })
}

/// Joins the text of every `<p>` element with single spaces.
///
/// Inner markup is dropped, common entities are decoded, and whitespace is
/// collapsed. Empty paragraphs are skipped.
pub fn extract_paragraphs(html: &str) -> String {
    paragraph_pattern()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1))
        .map(|inner| {
            let text = tag_pattern().replace_all(inner.as_str(), "");
            decode_entities(&text)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paragraph_text_is_joined_without_markup() {
        let html = r#"<html><head><title>Skip me</title></head><body>
            <div class="lead">Not a paragraph</div>
            <p class="intro">Markets <b>rallied</b> on
               Friday.</p>
            <p></p>
            <P>Analysts said &quot;steady&quot; &amp; calm.</P>
            <pre>code</pre>
        </body></html>"#;
        assert_eq!(
            extract_paragraphs(html),
            r#"Markets rallied on Friday. Analysts said "steady" & calm."#
        );
    }

    #[test]
    fn page_without_paragraphs_is_empty() {
        assert_eq!(extract_paragraphs("<div>nothing</div>"), "");
    }
}
