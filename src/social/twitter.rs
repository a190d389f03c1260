use anyhow::Result;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::types::{parse_timestamp, quoted, Micropost};
use super::SocialNetwork;
use crate::lookup::JsonFetcher;
use crate::TARGET_WEB_REQUEST;

const SEARCH_ENDPOINT: &str = "https://api.twitter.com/1.1/search/tweets.json";
const CREATED_AT_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Recent-tweet search, retweets excluded.
pub struct Twitter {
    fetcher: Arc<dyn JsonFetcher>,
    bearer_token: Option<String>,
    max_results: usize,
}

impl Twitter {
    pub fn new(
        fetcher: Arc<dyn JsonFetcher>,
        bearer_token: Option<String>,
        max_results: usize,
    ) -> Self {
        Self {
            fetcher,
            bearer_token,
            max_results,
        }
    }

    pub fn search_url(&self, term: &str) -> Result<Url> {
        Ok(Url::parse_with_params(
            SEARCH_ENDPOINT,
            &[
                ("q", format!("{} -\"RT \"", quoted(term))),
                ("count", self.max_results.to_string()),
                ("result_type", "recent".to_string()),
                ("include_entities", "true".to_string()),
            ],
        )?)
    }

    async fn run(&self, term: &str) -> Result<Vec<Micropost>> {
        let token = match &self.bearer_token {
            Some(token) => token,
            None => {
                debug!(target: TARGET_WEB_REQUEST, "Twitter search skipped, no bearer token");
                return Ok(Vec::new());
            }
        };
        let url = self.search_url(term)?;
        let body = self.fetcher.get_json_authorized(url.as_str(), token).await?;
        Ok(normalize(&body))
    }
}

impl SocialNetwork for Twitter {
    fn name(&self) -> &'static str {
        "Twitter"
    }

    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<Micropost>>> {
        Box::pin(self.run(term))
    }
}

fn normalize(body: &Value) -> Vec<Micropost> {
    let statuses = match body.get("statuses").and_then(Value::as_array) {
        Some(statuses) => statuses,
        None => return Vec::new(),
    };
    statuses
        .iter()
        .filter_map(|status| {
            let screen_name = status.pointer("/user/screen_name")?.as_str()?;
            let creation_date = status
                .get("created_at")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let id = status.get("id_str").and_then(Value::as_str).unwrap_or_default();
            Some(Micropost {
                user: format!("@{}", screen_name),
                micropost: status
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                avatar: status
                    .pointer("/user/profile_image_url_https")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                creation_date: creation_date.to_string(),
                timestamp: parse_timestamp(creation_date, &[CREATED_AT_FORMAT]),
                deep_link: format!("https://twitter.com/{}/status/{}", screen_name, id),
                profile_link: format!("https://twitter.com/{}", screen_name),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::client::fake::FakeFetcher;
    use serde_json::json;

    fn body() -> Value {
        json!({"statuses": [{
            "id_str": "323",
            "text": "Etna is erupting again",
            "created_at": "Mon Apr 15 12:00:00 +0000 2013",
            "user": {
                "screen_name": "volcanowatch",
                "name": "Volcano Watch",
                "profile_image_url_https": "https://pbs.example/avatar.png"
            }
        }, {"text": "no user"}]})
    }

    #[test]
    fn test_normalize_statuses() {
        let posts = normalize(&body());
        assert_eq!(
            posts,
            vec![Micropost {
                user: "@volcanowatch".to_string(),
                micropost: "Etna is erupting again".to_string(),
                avatar: "https://pbs.example/avatar.png".to_string(),
                creation_date: "Mon Apr 15 12:00:00 +0000 2013".to_string(),
                timestamp: Some(1_366_027_200_000),
                deep_link: "https://twitter.com/volcanowatch/status/323".to_string(),
                profile_link: "https://twitter.com/volcanowatch".to_string(),
            }]
        );
    }

    #[test]
    fn test_search_url_excludes_retweets() {
        let twitter = Twitter::new(Arc::new(FakeFetcher::new()), None, 2);
        let url = twitter.search_url("Mount Etna").unwrap();
        let pairs: Vec<_> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("q".to_string(), "\"Mount Etna\" -\"RT \"".to_string())));
        assert!(pairs.contains(&("count".to_string(), "2".to_string())));
    }

    #[tokio::test]
    async fn test_search_sends_bearer_token() {
        let fetcher = Arc::new(FakeFetcher::new().respond("search/tweets", body()));
        let twitter = Twitter::new(fetcher.clone(), Some("secret".to_string()), 2);
        let posts = twitter.search("Mount Etna").await.unwrap();
        assert_eq!(posts.len(), 1);
        let tokens = fetcher.tokens.lock().unwrap();
        assert_eq!(tokens.values().next().map(String::as_str), Some("secret"));
    }

    #[tokio::test]
    async fn test_search_without_token_issues_no_request() {
        let fetcher = Arc::new(FakeFetcher::new().respond("search/tweets", body()));
        let twitter = Twitter::new(fetcher.clone(), None, 2);
        assert!(twitter.search("Mount Etna").await.unwrap().is_empty());
        assert!(fetcher.requested().is_empty());
    }
}
