//! Known encyclopedia editions and which of them are monitored.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::warn;
use url::Url;

use crate::edit::ArticleKey;

/// The structured-data edition. It shares the relay with the article
/// editions but has its own API host and item-shaped titles (`Q42`).
pub const KNOWLEDGE_BASE: &str = "wikidata";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Tier {
    /// Editions with more than a million articles.
    Major,
    /// Editions with more than a hundred thousand articles.
    Regional,
    KnowledgeBase,
}

const MAJOR: &[&str] = &[
    "ar", "ca", "de", "en", "es", "fa", "fr", "it", "ja", "nl", "pl", "pt", "ru", "sv", "uk", "vi",
    "zh",
];

const REGIONAL: &[&str] = &[
    "az", "be", "bg", "cs", "da", "el", "eo", "et", "eu", "fi", "gl", "he", "hi", "hr", "hu",
    "hy", "id", "ka", "kk", "ko", "la", "lt", "ms", "nn", "no", "ro", "simple", "sk", "sl", "sr",
    "ta", "th", "tr", "ur", "uz", "zh-yue",
];

static KNOWN_LANGUAGES: Lazy<HashMap<&'static str, Tier>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for code in MAJOR {
        map.insert(*code, Tier::Major);
    }
    for code in REGIONAL {
        map.insert(*code, Tier::Regional);
    }
    map.insert(KNOWLEDGE_BASE, Tier::KnowledgeBase);
    map
});

pub fn tier(language: &str) -> Option<Tier> {
    KNOWN_LANGUAGES.get(language).copied()
}

pub fn is_knowledge_base(language: &str) -> bool {
    language == KNOWLEDGE_BASE
}

/// Host serving an edition, e.g. `en.wikipedia.org`.
pub fn host(language: &str) -> String {
    if is_knowledge_base(language) {
        "www.wikidata.org".to_string()
    } else {
        format!("{}.wikipedia.org", language)
    }
}

/// The `api.php` endpoint of an edition.
pub fn api_endpoint(language: &str) -> String {
    format!("https://{}/w/api.php", host(language))
}

/// Canonical public URL of an article or knowledge-base item. Slashes in
/// the title stay literal, as in subpage titles like `AC/DC`.
pub fn article_url(key: &ArticleKey) -> String {
    let base = format!("https://{}/wiki/", host(&key.language));
    match Url::parse(&base) {
        Ok(mut url) => {
            if let Ok(mut segments) = url.path_segments_mut() {
                segments.pop_if_empty().extend(key.title.split('/'));
            }
            url.to_string()
        }
        Err(_) => format!("{}{}", base, key.title),
    }
}

/// The set of editions whose edits are clustered and whose language links
/// are accepted as merge candidates.
#[derive(Debug, Clone)]
pub struct LanguageRegistry {
    monitored: BTreeSet<String>,
}

impl LanguageRegistry {
    /// Monitors the given codes, or every known edition when `codes` is empty.
    /// Unknown codes are dropped with a warning.
    pub fn new(codes: &[String]) -> Self {
        let monitored = if codes.is_empty() {
            KNOWN_LANGUAGES.keys().map(|c| c.to_string()).collect()
        } else {
            codes
                .iter()
                .filter(|code| {
                    let known = tier(code).is_some();
                    if !known {
                        warn!("Ignoring unknown language code {:?}", code);
                    }
                    known
                })
                .cloned()
                .collect()
        };
        Self { monitored }
    }

    pub fn is_monitored(&self, language: &str) -> bool {
        self.monitored.contains(language)
    }

    pub fn monitored(&self) -> impl Iterator<Item = &str> {
        self.monitored.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.monitored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitored.is_empty()
    }
}

impl Default for LanguageRegistry {
    fn default() -> Self {
        Self::new(&[])
    }
}
