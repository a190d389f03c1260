//! Calls to the wiki APIs: cross-language links and revision diffs.

pub mod client;
pub mod diff;
pub mod langlinks;

pub use client::{create_http_client, HttpFetcher, JsonFetcher};
pub use diff::{compare_url, extract_diff, fetch_diff, DiffDetails};
pub use langlinks::{fetch_language_links, langlinks_url, parse_langlinks, LanguageLink};
