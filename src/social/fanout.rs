use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

use super::types::{Micropost, SocialResults};
use super::{Facebook, GooglePlus, SocialNetwork, Twitter};
use crate::edit::ArticleKey;
use crate::environment::Settings;
use crate::languages::{article_url, is_knowledge_base};
use crate::lookup::JsonFetcher;
use crate::TARGET_WEB_REQUEST;

/// Queries every network for every term and joins the answers.
#[derive(Clone)]
pub struct SocialSearch {
    networks: Vec<Arc<dyn SocialNetwork>>,
    request_timeout: Duration,
}

impl SocialSearch {
    pub fn new(networks: Vec<Arc<dyn SocialNetwork>>, request_timeout: Duration) -> Self {
        Self {
            networks,
            request_timeout,
        }
    }

    /// Twitter, Facebook and Google+, each with the configured credential.
    pub fn from_settings(settings: &Settings, fetcher: Arc<dyn JsonFetcher>) -> Self {
        let limit = settings.max_social_results;
        let networks: Vec<Arc<dyn SocialNetwork>> = vec![
            Arc::new(Twitter::new(
                fetcher.clone(),
                settings.twitter_bearer_token.clone(),
                limit,
            )),
            Arc::new(Facebook::new(
                fetcher.clone(),
                settings.facebook_access_token.clone(),
                limit,
            )),
            Arc::new(GooglePlus::new(fetcher, settings.google_key.clone(), limit)),
        ];
        Self::new(networks, settings.request_timeout)
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    /// Runs all `terms × networks` searches concurrently and returns once
    /// every one of them has settled. Errors and timeouts count as settled
    /// with no posts.
    pub async fn search_all(&self, terms: &[String]) -> SocialResults {
        let mut results = SocialResults::new();
        let mut tasks = Vec::new();

        for term in terms {
            let per_network = results.entry(term.clone()).or_default();
            for network in &self.networks {
                if per_network.contains_key(network.name()) {
                    continue;
                }
                per_network.insert(network.name().to_string(), Vec::new());

                let network = Arc::clone(network);
                let term = term.clone();
                let limit = self.request_timeout;
                tasks.push(tokio::spawn(async move {
                    let posts = match timeout(limit, network.search(&term)).await {
                        Ok(Ok(posts)) => posts,
                        Ok(Err(e)) => {
                            warn!(
                                target: TARGET_WEB_REQUEST,
                                "{} search for {:?} failed: {:#}",
                                network.name(),
                                term,
                                e
                            );
                            Vec::new()
                        }
                        Err(_) => {
                            warn!(
                                target: TARGET_WEB_REQUEST,
                                "{} search for {:?} timed out",
                                network.name(),
                                term
                            );
                            Vec::new()
                        }
                    };
                    (term, network.name(), posts)
                }));
            }
        }

        let pending = tasks.len();
        debug!(target: TARGET_WEB_REQUEST, "Waiting for {} social searches", pending);
        for joined in join_all(tasks).await {
            match joined {
                Ok((term, network, posts)) => {
                    if let Some(per_network) = results.get_mut(&term) {
                        per_network.insert(network.to_string(), posts);
                    }
                }
                Err(e) => warn!(target: TARGET_WEB_REQUEST, "Social search task failed: {}", e),
            }
        }

        info!(
            target: TARGET_WEB_REQUEST,
            " ** Social search settled: {} searches, {} posts",
            pending,
            post_count(&results)
        );
        results
    }

    /// Runs [`SocialSearch::search_all`] and hands the joined results to
    /// `on_complete` exactly once.
    pub async fn search_then<F>(&self, terms: Vec<String>, on_complete: F)
    where
        F: FnOnce(SocialResults),
    {
        let results = self.search_all(&terms).await;
        on_complete(results);
    }
}

/// Titles and public URLs of every encyclopedia variant, in a stable order
/// and without duplicates. Knowledge-base items have no searchable title.
pub fn search_terms(variants: &BTreeSet<ArticleKey>) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();
    for variant in variants
        .iter()
        .filter(|variant| !is_knowledge_base(&variant.language))
    {
        for term in [variant.display_title(), article_url(variant)] {
            if !terms.contains(&term) {
                terms.push(term);
            }
        }
    }
    terms
}

/// Total number of posts across all terms and networks.
pub fn post_count(results: &SocialResults) -> usize {
    results
        .values()
        .flat_map(|per_network| per_network.values())
        .map(|posts: &Vec<Micropost>| posts.len())
        .sum()
}
