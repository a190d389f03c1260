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

const SEARCH_ENDPOINT: &str = "https://graph.facebook.com/search";
const CREATED_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%z";

/// Public post search on the Graph API.
pub struct Facebook {
    fetcher: Arc<dyn JsonFetcher>,
    access_token: Option<String>,
    max_results: usize,
}

impl Facebook {
    pub fn new(
        fetcher: Arc<dyn JsonFetcher>,
        access_token: Option<String>,
        max_results: usize,
    ) -> Self {
        Self {
            fetcher,
            access_token,
            max_results,
        }
    }

    async fn run(&self, term: &str) -> Result<Vec<Micropost>> {
        let token = match &self.access_token {
            Some(token) => token,
            None => {
                debug!(target: TARGET_WEB_REQUEST, "Facebook search skipped, no access token");
                return Ok(Vec::new());
            }
        };
        let url = Url::parse_with_params(
            SEARCH_ENDPOINT,
            &[
                ("q", quoted(term)),
                ("type", "post".to_string()),
                ("limit", self.max_results.to_string()),
                ("access_token", token.clone()),
            ],
        )?;
        let body = self.fetcher.get_json(url.as_str()).await?;
        Ok(normalize(&body))
    }
}

impl SocialNetwork for Facebook {
    fn name(&self) -> &'static str {
        "Facebook"
    }

    fn search<'a>(&'a self, term: &'a str) -> BoxFuture<'a, Result<Vec<Micropost>>> {
        Box::pin(self.run(term))
    }
}

fn normalize(body: &Value) -> Vec<Micropost> {
    let posts = match body.get("data").and_then(Value::as_array) {
        Some(posts) => posts,
        None => return Vec::new(),
    };
    posts
        .iter()
        .filter_map(|post| {
            // posts without an author cannot be linked to
            let from = post.get("from")?;
            let from_id = from.get("id").and_then(Value::as_str)?;
            let text = ["message", "name", "description", "link"]
                .iter()
                .filter_map(|field| post.get(*field).and_then(Value::as_str))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" ");
            let story = post
                .get("id")
                .and_then(Value::as_str)
                .and_then(|id| id.split('_').nth(1))
                .unwrap_or_default();
            let creation_date = post
                .get("created_time")
                .and_then(Value::as_str)
                .unwrap_or_default();
            Some(Micropost {
                user: from
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                micropost: text,
                avatar: format!("https://graph.facebook.com/{}/picture", from_id),
                creation_date: creation_date.to_string(),
                timestamp: parse_timestamp(creation_date, &[CREATED_TIME_FORMAT]),
                deep_link: format!(
                    "https://www.facebook.com/permalink.php?story_fbid={}&id={}",
                    story, from_id
                ),
                profile_link: format!("https://www.facebook.com/profile.php?id={}", from_id),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::client::fake::FakeFetcher;
    use serde_json::json;

    #[test]
    fn test_normalize_posts() {
        let body = json!({"data": [
            {
                "id": "100_200",
                "from": {"id": "100", "name": "Maria Rossi"},
                "message": "Ash over Catania",
                "link": "https://news.example/etna",
                "created_time": "2013-04-15T12:00:00+0000"
            },
            {"id": "5_6", "message": "anonymous"}
        ]});
        let posts = normalize(&body);
        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.user, "Maria Rossi");
        assert_eq!(post.micropost, "Ash over Catania https://news.example/etna");
        assert_eq!(post.avatar, "https://graph.facebook.com/100/picture");
        assert_eq!(
            post.deep_link,
            "https://www.facebook.com/permalink.php?story_fbid=200&id=100"
        );
        assert_eq!(post.profile_link, "https://www.facebook.com/profile.php?id=100");
        assert_eq!(post.timestamp, Some(1_366_027_200_000));
    }

    #[tokio::test]
    async fn test_search_passes_access_token() {
        let fetcher =
            Arc::new(FakeFetcher::new().respond("graph.facebook.com", json!({"data": []})));
        let facebook = Facebook::new(fetcher.clone(), Some("token".to_string()), 2);
        assert!(facebook.search("Etna").await.unwrap().is_empty());
        let requested = fetcher.requested();
        assert_eq!(requested.len(), 1);
        assert!(requested[0].contains("access_token=token"));
        assert!(requested[0].contains("type=post"));
    }
}
