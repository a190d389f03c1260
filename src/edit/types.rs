use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A language-qualified article key, rendered as `lang:Title_With_Underscores`.
///
/// Titles are normalised on construction so that keys built from relay lines
/// and keys built from language-link lookups compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArticleKey {
    pub language: String,
    pub title: String,
}

impl ArticleKey {
    pub fn new(language: impl Into<String>, title: &str) -> Self {
        Self {
            language: language.into(),
            title: normalize_title(title),
        }
    }

    /// Human readable title, with underscores turned back into spaces.
    pub fn display_title(&self) -> String {
        self.title.replace('_', " ")
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.language, self.title)
    }
}

impl FromStr for ArticleKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((language, title)) if !language.is_empty() && !title.is_empty() => {
                Ok(ArticleKey::new(language, title))
            }
            _ => Err(anyhow::anyhow!("Not a language-qualified key: {}", s)),
        }
    }
}

impl Serialize for ArticleKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Replaces every run of whitespace with a single underscore, matching the
/// canonical URL form of a title.
pub fn normalize_title(title: &str) -> String {
    title.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Revision identifiers encoded in a diff URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Revisions {
    pub current: u64,
    pub previous: u64,
}

/// One accepted edit, produced by the parser and consumed once by the monitor.
#[derive(Debug, Clone, PartialEq)]
pub struct EditEvent {
    pub article: ArticleKey,
    /// Bare editor name or IP address, without language qualification.
    pub editor: String,
    pub language: String,
    pub delta: i64,
    pub comment: String,
    /// Only present when both revision identifiers could be read from it.
    pub diff_url: Option<String>,
    pub revisions: Option<Revisions>,
    pub flags: String,
    pub is_bot: bool,
}

impl EditEvent {
    /// The `lang:name` identity of the editor.
    pub fn editor_key(&self) -> String {
        format!("{}:{}", self.language, self.editor)
    }
}

/// Why a relay line did not become an [`EditEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// No `[[Title]]` could be found in the line.
    NotRecentChange,
    /// Talk, category, template and other namespace pages.
    Namespace,
    Bot,
    Malformed,
    UnknownLanguage,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotRecentChange => write!(f, "not a recent change"),
            Rejection::Namespace => write!(f, "namespace page"),
            Rejection::Bot => write!(f, "bot edit"),
            Rejection::Malformed => write!(f, "malformed line"),
            Rejection::UnknownLanguage => write!(f, "unknown language"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_normalizes_whitespace() {
        let key = ArticleKey::new("en", "Juniata  River\t(Pennsylvania)");
        assert_eq!(key.to_string(), "en:Juniata_River_(Pennsylvania)");
        assert_eq!(key.display_title(), "Juniata River (Pennsylvania)");
    }

    #[test]
    fn test_key_round_trips_through_string_form() {
        let key: ArticleKey = "de:Star Wars: Episode I".parse().unwrap();
        assert_eq!(key.language, "de");
        assert_eq!(key.title, "Star_Wars:_Episode_I");
        assert!("NoLanguage".parse::<ArticleKey>().is_err());
        assert!(":Title".parse::<ArticleKey>().is_err());
    }

    #[test]
    fn test_key_serializes_as_string() {
        let key = ArticleKey::new("fr", "Paris");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"fr:Paris\"");
    }
}
