//! Revision diffs: what an edit added, cleaned of markup.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use super::client::JsonFetcher;
use crate::edit::Revisions;
use crate::languages::api_endpoint;
use crate::TARGET_WEB_REQUEST;

lazy_static! {
    static ref ADDED_CELL: Regex =
        Regex::new(r#"(?s)<td[^>]*class="[^"]*diff-addedline[^"]*"[^>]*>(.*?)</td>"#)
            .expect("added line pattern is valid");
    static ref HTML_TAG: Regex = Regex::new(r"(?s)<[^>]*>").expect("tag pattern is valid");
    static ref REFERENCE: Regex =
        Regex::new(r"(?is)<ref[^>]*/>|<ref[^>]*>.*?</ref>").expect("ref pattern is valid");
    static ref TEMPLATE: Regex = Regex::new(r"\{\{[^{}]*\}\}").expect("template pattern is valid");
    static ref MEDIA_LINK: Regex =
        Regex::new(r"(?i)\[\[\s*(?:file|image|category)\s*:[^\]]*\]\]")
            .expect("media link pattern is valid");
    static ref WIKI_LINK: Regex =
        Regex::new(r"\[\[([^\[\]|]+)(?:\|([^\[\]]*))?\]\]").expect("link pattern is valid");
    static ref EXTERNAL_LINK: Regex =
        Regex::new(r"\[https?://[^\s\]]+\s*([^\]]*)\]").expect("external link pattern is valid");
    static ref EMPHASIS: Regex = Regex::new(r"'{2,}").expect("emphasis pattern is valid");
    static ref WHITESPACE: Regex = Regex::new(r"\s+").expect("whitespace pattern is valid");
}

/// Text an edit added plus the articles it links to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffDetails {
    pub added_lines: Vec<String>,
    /// Link targets in first-seen order, without namespaced pages.
    pub concepts: Vec<String>,
}

/// `action=compare` URL for a pair of revisions of an edition.
pub fn compare_url(language: &str, revisions: Revisions) -> Option<Url> {
    Url::parse_with_params(
        &api_endpoint(language),
        &[
            ("action", "compare".to_string()),
            ("format", "json".to_string()),
            ("fromrev", revisions.previous.to_string()),
            ("torev", revisions.current.to_string()),
        ],
    )
    .ok()
}

/// Pulls the added lines out of a diff table and cleans them.
pub fn extract_diff(html: &str) -> DiffDetails {
    let mut details = DiffDetails::default();

    for cell in ADDED_CELL.captures_iter(html) {
        let wikitext = decode_entities(&HTML_TAG.replace_all(&cell[1], ""));

        for link in WIKI_LINK.captures_iter(&wikitext) {
            let target = link[1].trim();
            if target.is_empty() || target.contains(':') {
                continue;
            }
            let concept = target.replace('_', " ");
            if !details.concepts.contains(&concept) {
                details.concepts.push(concept);
            }
        }

        let line = clean_wikitext(&wikitext);
        if !line.is_empty() {
            details.added_lines.push(line);
        }
    }
    details
}

fn decode_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

fn clean_wikitext(wikitext: &str) -> String {
    let mut text = REFERENCE.replace_all(wikitext, "").into_owned();
    // innermost first, so nested templates go too
    loop {
        let stripped = TEMPLATE.replace_all(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }
    let text = MEDIA_LINK.replace_all(&text, "");
    let text = WIKI_LINK.replace_all(&text, |link: &regex::Captures| {
        link.get(2)
            .map_or_else(|| link[1].to_string(), |label| label.as_str().to_string())
    });
    let text = EXTERNAL_LINK.replace_all(&text, "$1");
    let text = HTML_TAG.replace_all(&text, "");
    let text = EMPHASIS.replace_all(&text, "");
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Fetches and cleans the diff between two revisions. Failures are logged
/// and yield `None`.
pub async fn fetch_diff(
    fetcher: &dyn JsonFetcher,
    language: &str,
    revisions: Revisions,
) -> Option<DiffDetails> {
    let url = compare_url(language, revisions)?;
    let body = match fetcher.get_json(url.as_str()).await {
        Ok(body) => body,
        Err(e) => {
            warn!(target: TARGET_WEB_REQUEST, "Diff lookup {} failed: {:#}", url, e);
            return None;
        }
    };

    let html = body
        .pointer("/compare/*")
        .or_else(|| body.pointer("/compare/body"))
        .and_then(Value::as_str);
    match html {
        Some(html) => {
            let details = extract_diff(html);
            debug!(
                target: TARGET_WEB_REQUEST,
                "Diff {} added {} lines, {} concepts",
                url,
                details.added_lines.len(),
                details.concepts.len()
            );
            Some(details)
        }
        None => {
            warn!(target: TARGET_WEB_REQUEST, "Diff lookup {} returned no comparison", url);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::client::fake::FakeFetcher;
    use serde_json::json;

    const DIFF_TABLE: &str = r#"<tr>
  <td class="diff-marker">+</td>
  <td class="diff-addedline diff-side-added"><div>The '''eruption''' began on 4 May near [[Catania|the city]] and [[Sicily]].&lt;ref&gt;{{cite news|title=Etna}}&lt;/ref&gt;</div></td>
</tr>
<tr>
  <td class="diff-deletedline"><div>Old text about [[Rome]]</div></td>
  <td class="diff-addedline"><div>[[File:Etna.jpg|thumb|Ash]] {{Infobox {{nested}} }}</div></td>
</tr>
<tr>
  <td class="diff-addedline"><div>Flights to [[Sicily]] cancelled, see [https://example.org/news report] &amp; [[Category:Volcanoes]]</div></td>
</tr>"#;

    #[test]
    fn test_extract_added_lines() {
        let details = extract_diff(DIFF_TABLE);
        assert_eq!(
            details.added_lines,
            vec![
                "The eruption began on 4 May near the city and Sicily.",
                "Flights to Sicily cancelled, see report &",
            ]
        );
    }

    #[test]
    fn test_extract_concepts() {
        let details = extract_diff(DIFF_TABLE);
        assert_eq!(details.concepts, vec!["Catania", "Sicily"]);
    }

    #[test]
    fn test_compare_url() {
        let url = compare_url(
            "de",
            Revisions {
                current: 200,
                previous: 100,
            },
        )
        .unwrap();
        assert_eq!(url.host_str(), Some("de.wikipedia.org"));
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("fromrev".to_string(), "100".to_string())));
        assert!(pairs.contains(&("torev".to_string(), "200".to_string())));
    }

    #[tokio::test]
    async fn test_fetch_diff() {
        let fetcher = FakeFetcher::new().respond(
            "action=compare",
            json!({"compare": {"fromrevid": 100, "torevid": 200, "*": DIFF_TABLE}}),
        );
        let revisions = Revisions {
            current: 200,
            previous: 100,
        };
        let details = fetch_diff(&fetcher, "en", revisions).await.unwrap();
        assert_eq!(details.added_lines.len(), 2);

        let empty = FakeFetcher::new().respond("action=compare", json!({"error": {}}));
        assert_eq!(fetch_diff(&empty, "en", revisions).await, None);
        assert_eq!(fetch_diff(&FakeFetcher::new(), "en", revisions).await, None);
    }
}
