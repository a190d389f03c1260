use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// A post normalised across networks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Micropost {
    pub user: String,
    pub micropost: String,
    pub avatar: String,
    /// As reported by the network.
    pub creation_date: String,
    /// Milliseconds since the epoch, when `creation_date` could be read.
    pub timestamp: Option<i64>,
    pub deep_link: String,
    pub profile_link: String,
}

/// Search term to network name to the posts found.
pub type SocialResults = BTreeMap<String, BTreeMap<String, Vec<Micropost>>>;

/// Reads a network timestamp in RFC 3339 or one of the given
/// `strftime` formats.
pub(crate) fn parse_timestamp(value: &str, formats: &[&str]) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc).timestamp_millis());
    }
    formats.iter().find_map(|format| {
        DateTime::parse_from_str(value, format)
            .ok()
            .map(|parsed| parsed.with_timezone(&Utc).timestamp_millis())
    })
}

/// The exact-phrase form every network is queried with.
pub(crate) fn quoted(term: &str) -> String {
    format!("\"{}\"", term)
}
