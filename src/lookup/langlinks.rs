//! Same-subject articles in other language editions.

use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::client::JsonFetcher;
use crate::edit::ArticleKey;
use crate::languages::{api_endpoint, is_knowledge_base, LanguageRegistry};
use crate::TARGET_WEB_REQUEST;

/// Site-link suffix of encyclopedia editions in knowledge-base items.
const WIKI_SITE_SUFFIX: &str = "wiki";

/// Knowledge-base site links ending in `wiki` that are not language editions.
const NON_EDITION_SITES: &[&str] = &[
    "commonswiki",
    "metawiki",
    "specieswiki",
    "mediawikiwiki",
    "wikidatawiki",
    "sourceswiki",
    "outreachwiki",
    "incubatorwiki",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageLink {
    pub language: String,
    pub title: String,
}

impl LanguageLink {
    pub fn new(language: impl Into<String>, title: &str) -> Self {
        let language = language.into();
        let title = ArticleKey::new(language.as_str(), title).title;
        Self { language, title }
    }

    pub fn key(&self) -> ArticleKey {
        ArticleKey::new(self.language.as_str(), &self.title)
    }
}

/// Lookup URL for the article behind `key`: `wbgetentities` for
/// knowledge-base items, `prop=langlinks` for encyclopedia articles.
pub fn langlinks_url(key: &ArticleKey) -> Option<Url> {
    let endpoint = api_endpoint(&key.language);
    let title = key.display_title();
    let result = if is_knowledge_base(&key.language) {
        Url::parse_with_params(
            &endpoint,
            &[
                ("action", "wbgetentities"),
                ("props", "sitelinks"),
                ("format", "json"),
                ("ids", key.title.as_str()),
            ],
        )
    } else {
        Url::parse_with_params(
            &endpoint,
            &[
                ("action", "query"),
                ("prop", "langlinks"),
                ("format", "json"),
                ("lllimit", "500"),
                ("titles", title.as_str()),
            ],
        )
    };
    result.ok()
}

/// Normalises any of the accepted response shapes into a flat link list:
/// a bare `[{lang, title}]` array, `query.pages.*.langlinks`, or
/// `entities.*.sitelinks`.
pub fn parse_langlinks(body: &Value) -> Vec<LanguageLink> {
    if let Some(links) = body.as_array() {
        return links.iter().filter_map(link_from_entry).collect();
    }

    let mut links = Vec::new();
    if let Some(pages) = body.pointer("/query/pages").and_then(Value::as_object) {
        for page in pages.values() {
            if let Some(entries) = page.get("langlinks").and_then(Value::as_array) {
                links.extend(entries.iter().filter_map(link_from_entry));
            }
        }
    }
    if let Some(entities) = body.get("entities").and_then(Value::as_object) {
        for entity in entities.values() {
            if let Some(sitelinks) = entity.get("sitelinks").and_then(Value::as_object) {
                links.extend(sitelinks.iter().filter_map(|(site, link)| {
                    let language = language_from_site(site)?;
                    let title = link.get("title").and_then(Value::as_str)?;
                    Some(LanguageLink::new(language, title))
                }));
            }
        }
    }
    links
}

fn link_from_entry(entry: &Value) -> Option<LanguageLink> {
    let language = entry.get("lang").and_then(Value::as_str)?;
    let title = entry
        .get("*")
        .or_else(|| entry.get("title"))
        .and_then(Value::as_str)?;
    if language.is_empty() || title.trim().is_empty() {
        return None;
    }
    Some(LanguageLink::new(language, title))
}

/// `dewiki` is the German edition; `zh_min_nanwiki` is `zh-min-nan`.
fn language_from_site(site: &str) -> Option<String> {
    if NON_EDITION_SITES.contains(&site) {
        return None;
    }
    let language = site.strip_suffix(WIKI_SITE_SUFFIX)?;
    if language.is_empty() {
        return None;
    }
    Some(language.replace('_', "-"))
}

/// Asks the edition's API which monitored editions cover the same subject.
///
/// Failures are logged and yield no links; the article itself is never
/// returned as its own variant.
pub async fn fetch_language_links(
    fetcher: &dyn JsonFetcher,
    key: &ArticleKey,
    registry: &LanguageRegistry,
) -> Vec<LanguageLink> {
    let url = match langlinks_url(key) {
        Some(url) => url,
        None => {
            warn!(target: TARGET_WEB_REQUEST, "Cannot build language-link lookup for {}", key);
            return Vec::new();
        }
    };

    let body = match fetcher.get_json(url.as_str()).await {
        Ok(body) => body,
        Err(e) => {
            warn!(target: TARGET_WEB_REQUEST, "Language-link lookup for {} failed: {:#}", key, e);
            return Vec::new();
        }
    };

    let links: Vec<LanguageLink> = parse_langlinks(&body)
        .into_iter()
        .filter(|link| registry.is_monitored(&link.language))
        .filter(|link| link.key() != *key)
        .collect();
    debug!(
        target: TARGET_WEB_REQUEST,
        "Found {} monitored language links for {}",
        links.len(),
        key
    );
    links
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::client::fake::FakeFetcher;
    use serde_json::json;

    #[test]
    fn test_langlinks_url_for_article() {
        let url = langlinks_url(&ArticleKey::new("en", "Mount Etna")).unwrap();
        assert_eq!(url.host_str(), Some("en.wikipedia.org"));
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("prop".to_string(), "langlinks".to_string())));
        assert!(pairs.contains(&("titles".to_string(), "Mount Etna".to_string())));
    }

    #[test]
    fn test_langlinks_url_for_knowledge_base() {
        let url = langlinks_url(&ArticleKey::new("wikidata", "Q42")).unwrap();
        assert_eq!(url.host_str(), Some("www.wikidata.org"));
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("action".to_string(), "wbgetentities".to_string())));
        assert!(pairs.contains(&("ids".to_string(), "Q42".to_string())));
    }

    #[test]
    fn test_parse_query_pages() {
        let body = json!({
            "query": {"pages": {"1234": {
                "title": "Mount Etna",
                "langlinks": [
                    {"lang": "de", "*": "Ätna"},
                    {"lang": "fr", "*": "Etna (volcan)"}
                ]
            }}}
        });
        assert_eq!(
            parse_langlinks(&body),
            vec![
                LanguageLink::new("de", "Ätna"),
                LanguageLink::new("fr", "Etna_(volcan)")
            ]
        );
    }

    #[test]
    fn test_parse_flat_list() {
        let body = json!([
            {"lang": "it", "title": "Etna"},
            {"lang": "", "title": "Nowhere"},
            {"lang": "es"}
        ]);
        assert_eq!(parse_langlinks(&body), vec![LanguageLink::new("it", "Etna")]);
    }

    #[test]
    fn test_parse_sitelinks() {
        let body = json!({
            "entities": {"Q42": {"sitelinks": {
                "enwiki": {"site": "enwiki", "title": "Douglas Adams"},
                "enwikiquote": {"site": "enwikiquote", "title": "Douglas Adams"},
                "commonswiki": {"site": "commonswiki", "title": "Category:Douglas Adams"},
                "zh_min_nanwiki": {"site": "zh_min_nanwiki", "title": "Douglas Adams"}
            }}}
        });
        let mut links = parse_langlinks(&body);
        links.sort_by(|a, b| a.language.cmp(&b.language));
        assert_eq!(
            links,
            vec![
                LanguageLink::new("en", "Douglas Adams"),
                LanguageLink::new("zh-min-nan", "Douglas Adams")
            ]
        );
    }

    #[test]
    fn test_unexpected_shape_yields_nothing() {
        assert!(parse_langlinks(&json!({"error": {"code": "badtitle"}})).is_empty());
        assert!(parse_langlinks(&json!("nope")).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_filters_unmonitored_and_self() {
        let fetcher = FakeFetcher::new().respond(
            "en.wikipedia.org",
            json!({"query": {"pages": {"1": {"langlinks": [
                {"lang": "de", "*": "Ätna"},
                {"lang": "xx", "*": "Etna"},
                {"lang": "en", "*": "Mount Etna"}
            ]}}}}),
        );
        let registry = LanguageRegistry::new(&["en".to_string(), "de".to_string()]);
        let links =
            fetch_language_links(&fetcher, &ArticleKey::new("en", "Mount Etna"), &registry).await;
        assert_eq!(links, vec![LanguageLink::new("de", "Ätna")]);
    }

    #[tokio::test]
    async fn test_fetch_failure_yields_nothing() {
        let fetcher = FakeFetcher::new();
        let links = fetch_language_links(
            &fetcher,
            &ArticleKey::new("en", "Mount Etna"),
            &LanguageRegistry::default(),
        )
        .await;
        assert!(links.is_empty());
        assert_eq!(fetcher.requested().len(), 1);
    }
}
