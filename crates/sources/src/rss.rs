//! RSS 2.0 feeds: `<item>` elements become trends.

use std::time::Duration;

use pipeline::{CallError, Trend};
use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::debug;

use crate::http::{check_status, client, transport_error};

const SERVICE: &str = "rss";

/// Source name given to every trend read from a feed.
pub const RSS_SOURCE: &str = "RSS Feed";

/// Items kept from one feed.
pub const MAX_ITEMS: usize = 10;

#[derive(Debug)]
pub struct RssSource {
    client: reqwest::Client,
}

impl RssSource {
    pub fn new(timeout: Duration) -> Result<Self, CallError> {
        Ok(Self {
            client: client(SERVICE, timeout)?,
        })
    }

    pub async fn fetch(&self, feed_url: &str) -> Result<Vec<Trend>, CallError> {
        let response = self
            .client
            .get(feed_url)
            .send()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;
        let body = check_status(SERVICE, response)
            .await?
            .text()
            .await
            .map_err(|e| transport_error(SERVICE, e))?;

        let trends = parse_rss(&body)?;
        debug!(feed_url, trends = trends.len(), "rss fetch complete");
        Ok(trends)
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Field {
    Title,
    Link,
    PubDate,
}

#[derive(Default)]
struct ItemBuilder {
    title: String,
    link: String,
    pub_date: String,
}

impl ItemBuilder {
    fn push(&mut self, field: Field, text: &str) {
        let target = match field {
            Field::Title => &mut self.title,
            Field::Link => &mut self.link,
            Field::PubDate => &mut self.pub_date,
        };
        target.push_str(text);
    }

    fn build(self) -> Option<Trend> {
        let title = self.title.trim();
        if title.is_empty() {
            return None;
        }
        let mut trend = Trend::new(title, RSS_SOURCE);
        trend.url = non_blank(self.link);
        trend.timestamp = non_blank(self.pub_date);
        Some(trend)
    }
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Reads the first [`MAX_ITEMS`] `<item>`s of an RSS document.
///
/// Only `title`, `link`, and `pubDate` are kept; items without a title are skipped.
pub fn parse_rss(xml: &str) -> Result<Vec<Trend>, CallError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut trends = Vec::new();
    let mut item: Option<ItemBuilder> = None;
    let mut field: Option<Field> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| CallError::decode(SERVICE, format!("at byte {}: {e}", reader.buffer_position())))?;
        match event {
            Event::Start(start) => match start.local_name().as_ref() {
                b"item" => item = Some(ItemBuilder::default()),
                b"title" if item.is_some() => field = Some(Field::Title),
                b"link" if item.is_some() => field = Some(Field::Link),
                b"pubDate" if item.is_some() => field = Some(Field::PubDate),
                _ => {}
            },
            Event::Text(text) => {
                if let (Some(builder), Some(f)) = (item.as_mut(), field) {
                    let text = text.unescape().map_err(|e| CallError::decode(SERVICE, e))?;
                    builder.push(f, &text);
                }
            }
            Event::CData(data) => {
                if let (Some(builder), Some(f)) = (item.as_mut(), field) {
                    builder.push(f, &String::from_utf8_lossy(&data.into_inner()));
                }
            }
            Event::End(end) => match end.local_name().as_ref() {
                b"item" => {
                    if let Some(trend) = item.take().and_then(ItemBuilder::build) {
                        trends.push(trend);
                        if trends.len() == MAX_ITEMS {
                            break;
                        }
                    }
                    field = None;
                }
                b"title" | b"link" | b"pubDate" => field = None,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(trends)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel><title>Top stories</title><link>https://news.example</link>{items}</channel></rss>"#
        )
    }

    #[test]
    fn items_become_trends_with_link_and_date() {
        let xml = feed(
            r#"<item><title>Rates held &amp; markets rally</title><link>https://news.example/a</link>
               <pubDate>Fri, 16 Oct 2026 08:00:00 GMT</pubDate><description>ignored</description></item>
               <item><title><![CDATA[Storm <warning> issued]]></title><link>https://news.example/b</link></item>"#,
        );
        let trends = parse_rss(&xml).unwrap();

        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].title, "Rates held & markets rally");
        assert_eq!(trends[0].source, RSS_SOURCE);
        assert_eq!(trends[0].url.as_deref(), Some("https://news.example/a"));
        assert_eq!(
            trends[0].timestamp.as_deref(),
            Some("Fri, 16 Oct 2026 08:00:00 GMT")
        );
        assert_eq!(trends[1].title, "Storm <warning> issued");
        assert_eq!(trends[1].timestamp, None);
    }

    #[test]
    fn channel_title_is_not_an_item() {
        let trends = parse_rss(&feed("")).unwrap();
        assert!(trends.is_empty());
    }

    #[test]
    fn only_the_first_ten_items_are_read() {
        let items: String = (0..15)
            .map(|i| format!("<item><title>Story {i}</title></item>"))
            .collect();
        let trends = parse_rss(&feed(&items)).unwrap();
        assert_eq!(trends.len(), MAX_ITEMS);
        assert_eq!(trends[9].title, "Story 9");
    }

    #[test]
    fn malformed_xml_is_a_decode_error() {
        let err = parse_rss("<rss><channel><item><title>x</item>").unwrap_err();
        assert!(matches!(err, CallError::Decode { .. }));
    }
}
