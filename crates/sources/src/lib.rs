//! Newsdesk ingestion and research infrastructure adapters.
//!
//! Implements [`pipeline::TrendSource`] over NewsAPI and RSS feeds,
//! [`pipeline::SearchProvider`] over Tavily, and [`pipeline::PageFetcher`]
//! over plain HTTP.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Endpoints, authentication, and payload parsing live
//! here. Every failure surfaces as a [`pipeline::CallError`]; whether to retry
//! or degrade is decided by the caller.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`newsapi`] | NewsAPI `everything` search |
//! | [`rss`] | RSS 2.0 feed reader and parser |
//! | [`feeds`] | `FeedIngestion`: both feeds combined, each degrading alone |
//! | [`tavily`] | Tavily web search |
//! | [`page`] | Paragraph text of a web page |

mod http;

pub mod feeds;
pub mod newsapi;
pub mod page;
pub mod rss;
pub mod tavily;

pub use feeds::FeedIngestion;
pub use newsapi::NewsApiSource;
pub use page::{extract_paragraphs, HttpPageFetcher};
pub use rss::{parse_rss, RssSource};
pub use tavily::TavilySearch;
