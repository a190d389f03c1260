//! Ties the pieces together: relay messages in, cluster updates and events out.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::clustering::{
    ChangeStamp, ClusterSnapshot, ClusterStore, EditOutcome, MergeOutcome, RecordedEdit,
};
use crate::detector::{evaluate, Conditions};
use crate::edit::{parse_message, ArticleKey, Revisions};
use crate::environment::Settings;
use crate::languages::{tier, LanguageRegistry, Tier};
use crate::lookup::{fetch_diff, fetch_language_links, JsonFetcher, LanguageLink};
use crate::notify::{CandidateNotice, Event, MergeNotice, Notifier, SeenNotice};
use crate::social::{search_terms, SocialSearch};
use crate::tuning::Tuning;
use crate::{TARGET_CLUSTER, TARGET_INGEST};

/// Processes relay messages. Cheap to clone; clones share all state.
///
/// Recording an edit never waits for the network: the language-link lookup,
/// the diff lookup and any social search run as background tasks that apply
/// their results through the store when they complete.
#[derive(Clone)]
pub struct Monitor {
    relay_nick: Arc<str>,
    discard_bots: bool,
    registry: Arc<LanguageRegistry>,
    store: Arc<ClusterStore>,
    tuning: Arc<Tuning>,
    fetcher: Arc<dyn JsonFetcher>,
    social: SocialSearch,
    notifier: Arc<dyn Notifier>,
    background: Arc<Mutex<JoinSet<()>>>,
}

impl Monitor {
    pub fn new(
        settings: &Settings,
        tuning: Arc<Tuning>,
        fetcher: Arc<dyn JsonFetcher>,
        social: SocialSearch,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let registry = LanguageRegistry::new(&settings.monitored_languages);
        let major = registry
            .monitored()
            .filter(|code| tier(code) == Some(Tier::Major))
            .count();
        info!(
            "Monitoring {} editions ({} major), relay {}, bots {}",
            registry.len(),
            major,
            settings.relay_nick,
            if settings.discard_bots { "discarded" } else { "kept" }
        );
        Self {
            relay_nick: Arc::from(settings.relay_nick.as_str()),
            discard_bots: settings.discard_bots,
            registry: Arc::new(registry),
            store: Arc::new(ClusterStore::new()),
            tuning,
            fetcher,
            social,
            notifier,
            background: Arc::new(Mutex::new(JoinSet::new())),
        }
    }

    pub fn store(&self) -> &Arc<ClusterStore> {
        &self.store
    }

    pub fn tuning(&self) -> &Arc<Tuning> {
        &self.tuning
    }

    /// Handles one `(sender, channel, text)` triple from the chat network.
    pub fn handle_message(&self, from: &str, channel: &str, text: &str) -> Option<RecordedEdit> {
        self.handle_message_at(from, channel, text, Utc::now())
    }

    /// As [`Monitor::handle_message`], with the arrival time given.
    pub fn handle_message_at(
        &self,
        from: &str,
        channel: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Option<RecordedEdit> {
        if from != &*self.relay_nick {
            return None;
        }

        let event = match parse_message(channel, text, self.discard_bots) {
            Ok(event) => event,
            Err(rejection) => {
                debug!(target: TARGET_INGEST, "Skipping {} line: {}", channel, rejection);
                return None;
            }
        };
        if !self.registry.is_monitored(&event.language) {
            debug!(target: TARGET_INGEST, "Skipping unmonitored edition {}", event.language);
            return None;
        }

        let recorded = self.store.record_edit(&event, now);
        self.announce(&recorded);

        self.spawn_language_links(event.article.clone());
        if let Some(revisions) = event.revisions {
            self.spawn_diff(
                event.article.clone(),
                event.language.clone(),
                revisions,
                recorded.stamp,
            );
        }
        Some(recorded)
    }

    fn announce(&self, recorded: &RecordedEdit) {
        let snapshot = &recorded.snapshot;
        let conditions = evaluate(&snapshot.record, &self.tuning.detector_params());

        match recorded.outcome {
            EditOutcome::FirstSeen => self
                .notifier
                .notify(Event::FirstTimeSeen(snapshot.clone())),
            EditOutcome::Seen => self.notifier.notify(Event::NTimesSeen(SeenNotice {
                snapshot: snapshot.clone(),
                conditions,
            })),
        }

        if conditions.is_candidate() {
            info!(
                target: TARGET_CLUSTER,
                "[ ★ ] Breaking news candidate: {}. {} times seen, {} editors, {} languages",
                snapshot.article,
                snapshot.record.occurrences,
                snapshot.record.editor_count(),
                snapshot.record.language_count()
            );
            self.spawn_social_search(snapshot.clone(), conditions);
        }
    }

    fn spawn_social_search(&self, snapshot: ClusterSnapshot, conditions: Conditions) {
        let terms = search_terms(&snapshot.record.member_variants);
        let social = self.social.clone();
        let store = Arc::clone(&self.store);
        let notifier = Arc::clone(&self.notifier);

        self.track(async move {
            social
                .search_then(terms, move |results| {
                    // report the cluster as it is now if it is still tracked
                    let snapshot = store.snapshot(&snapshot.article).unwrap_or(snapshot);
                    notifier.notify(Event::BreakingNewsCandidate(CandidateNotice {
                        snapshot,
                        conditions,
                        social_networks_results: results,
                    }));
                })
                .await;
        });
    }

    fn spawn_language_links(&self, article: ArticleKey) {
        let monitor = self.clone();
        self.track(async move {
            let links =
                fetch_language_links(monitor.fetcher.as_ref(), &article, &monitor.registry).await;
            monitor.apply_language_links(&article, &links, Utc::now());
        });
    }

    fn spawn_diff(
        &self,
        article: ArticleKey,
        language: String,
        revisions: Revisions,
        stamp: ChangeStamp,
    ) {
        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        self.track(async move {
            if let Some(details) = fetch_diff(fetcher.as_ref(), &language, revisions).await {
                store.attach_diff(&article, stamp, details.added_lines, details.concepts);
            }
        });
    }

    /// Merges every linked article into the cluster `article` belongs to.
    /// Links arriving after that cluster was evicted are dropped.
    pub fn apply_language_links(
        &self,
        article: &ArticleKey,
        links: &[LanguageLink],
        now: DateTime<Utc>,
    ) -> Vec<MergeOutcome> {
        let mut outcomes = Vec::with_capacity(links.len());
        for link in links {
            let variant = link.key();
            let outcome = self.store.merge_variant(&variant, article);
            if let MergeOutcome::Merged { snapshot, .. } = &outcome {
                self.notifier.notify(Event::Merging(MergeNotice {
                    current: variant,
                    existing: article.clone(),
                    canonical: snapshot.article.clone(),
                    timestamp: now.timestamp_millis(),
                }));
            }
            let target_missing = outcome == MergeOutcome::TargetMissing;
            outcomes.push(outcome);
            if target_missing {
                break;
            }
        }
        outcomes
    }

    fn track<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self
            .background
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // reap whatever already finished so the set stays small
        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                warn!("Background lookup failed: {}", e);
            }
        }
        tasks.spawn(task);
    }

    /// Number of lookups and searches still running.
    pub fn in_flight(&self) -> usize {
        self.background
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Waits until every background task started so far has finished.
    pub async fn settle(&self) {
        loop {
            let mut tasks = std::mem::take(
                &mut *self
                    .background
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if tasks.is_empty() {
                break;
            }
            while let Some(finished) = tasks.join_next().await {
                if let Err(e) = finished {
                    warn!("Background lookup failed: {}", e);
                }
            }
        }
    }
}
