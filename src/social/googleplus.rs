use anyhow::Result;
use futures::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::types::{parse_timestamp, quoted, Micropost};
use super::SocialNetwork;
use crate::lookup::JsonFetcher;
use crate::TARGET_WEB_REQUEST;

const SEARCH_ENDPOINT: &str = "https://www.googleapis.com/plus/v1/activities";

lazy_static! {
    static ref MARKUP: Regex = Regex::new(r"(?s)<[^>]*>").expect("markup pattern is valid");
}

/// Public activity search, newest first.
pub struct GooglePlus {
    fetcher: Arc<dyn JsonFetcher>,
    key: Option<String>,
    max_results: usize,
}

impl GooglePlus {
    pub fn new(fetcher: Arc<dyn JsonFetcher>, key: Option<String>, max_results: usize) -> Self {
        Self {
            fetcher,
            key,
            max_results,
        }
    }

    async fn run(&self, term: &str) -> Result<Vec<Micropost>> {
        let key = match &self.key {
            Some(key) => key,
            None => {
                debug!(target: TARGET_WEB_REQUEST, "Google+ search skipped, no API key");
                return Ok(Vec::new());
            }
        };
        let url = Url::parse_with_params(
            SEARCH_ENDPOINT,
            &[
                ("query", quoted(term)),
                ("maxResults", self.max_results.to_string()),
                ("orderBy", "recent".to_string()),
                ("key", key.clone()),
            ],
        )?;
        let body = self.fetcher.get_json(url.as_str()).await?;
        Ok(normalize(&body))
    }
}

impl SocialNetwork for GooglePlus {
    fn name(&self) -> &'static str {
        "GooglePlus"
    }

    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<Micropost>>> {
        Box::pin(self.run(term))
    }
}

fn text_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

/// Post text plus the first article, photo or video attachment.
fn activity_text(item: &Value) -> String {
    let mut text = String::new();
    for part in [text_at(item, "/object/content"), text_at(item, "/annotation")]
        .into_iter()
        .flatten()
    {
        text.push(' ');
        text.push_str(part);
    }

    let attachments = item
        .pointer("/object/attachments")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let attachment = attachments.iter().find_map(|attachment| {
        let link = match attachment.get("objectType").and_then(Value::as_str)? {
            "article" => text_at(attachment, "/url"),
            "photo" => text_at(attachment, "/image/url"),
            "video" => text_at(attachment, "/embed/url"),
            _ => return None,
        };
        Some((text_at(attachment, "/displayName"), link))
    });
    if let Some((name, link)) = attachment {
        if let Some(name) = name {
            text.push(' ');
            text.push_str(name);
        }
        if let Some(link) = link {
            if !text.contains(link) {
                text.push(' ');
                text.push_str(link);
            }
        }
    }

    MARKUP.replace_all(text.trim(), "").into_owned()
}

fn normalize(body: &Value) -> Vec<Micropost> {
    let items = match body.get("items").and_then(Value::as_array) {
        Some(items) => items,
        None => return Vec::new(),
    };
    items
        .iter()
        .map(|item| {
            let creation_date = text_at(item, "/published").unwrap_or_default();
            Micropost {
                user: text_at(item, "/actor/displayName")
                    .unwrap_or_default()
                    .to_string(),
                micropost: activity_text(item),
                avatar: text_at(item, "/actor/image/url")
                    .unwrap_or_default()
                    .to_string(),
                creation_date: creation_date.to_string(),
                timestamp: parse_timestamp(creation_date, &[]),
                deep_link: text_at(item, "/url").unwrap_or_default().to_string(),
                profile_link: text_at(item, "/actor/url").unwrap_or_default().to_string(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_activity_with_attachment() {
        let body = json!({"items": [{
            "url": "https://plus.example/post/1",
            "published": "2013-04-15T12:00:00.000Z",
            "actor": {
                "displayName": "Giulia",
                "url": "https://plus.example/giulia",
                "image": {"url": "https://plus.example/giulia.png"}
            },
            "object": {
                "content": "<b>Etna</b> lava flow",
                "attachments": [
                    {"objectType": "photo", "displayName": "Lava", "image": {"url": "https://img.example/lava.jpg"}},
                    {"objectType": "article", "url": "https://news.example/ignored"}
                ]
            }
        }]});
        let posts = normalize(&body);
        assert_eq!(posts.len(), 1);
        assert_eq!(
            posts[0].micropost,
            "Etna lava flow Lava https://img.example/lava.jpg"
        );
        assert_eq!(posts[0].user, "Giulia");
        assert_eq!(posts[0].deep_link, "https://plus.example/post/1");
        assert_eq!(posts[0].timestamp, Some(1_366_027_200_000));
    }

    #[test]
    fn test_attachment_link_already_in_text_is_not_repeated() {
        let item = json!({"object": {
            "content": "Read https://news.example/etna",
            "attachments": [{"objectType": "article", "url": "https://news.example/etna"}]
        }});
        assert_eq!(activity_text(&item), "Read https://news.example/etna");
    }
}
