//! Outbound events and the gateway that hands them to live clients and to
//! downstream publishers.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clustering::ClusterSnapshot;
use crate::detector::Conditions;
use crate::edit::ArticleKey;
use crate::social::{post_count, SocialResults};
use crate::tuning::{DefaultSettings, Tuning};

/// Capacity of the broadcast channels; slow receivers skip older events.
const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Event {
    FirstTimeSeen(ClusterSnapshot),
    Merging(MergeNotice),
    NTimesSeen(SeenNotice),
    BreakingNewsCandidate(CandidateNotice),
    StatsUpdate(StatsNotice),
    DefaultSettings(DefaultSettings),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FirstTimeSeen(_) => "firstTimeSeen",
            Event::Merging(_) => "merging",
            Event::NTimesSeen(_) => "nTimesSeen",
            Event::BreakingNewsCandidate(_) => "breakingNewsCandidate",
            Event::StatsUpdate(_) => "statsUpdate",
            Event::DefaultSettings(_) => "defaultSettings",
        }
    }
}

/// A language link joined `current` to the cluster of `existing`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeNotice {
    pub current: ArticleKey,
    pub existing: ArticleKey,
    pub canonical: ArticleKey,
    /// Milliseconds since the epoch.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeenNotice {
    #[serde(flatten)]
    pub snapshot: ClusterSnapshot,
    pub conditions: Conditions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateNotice {
    #[serde(flatten)]
    pub snapshot: ClusterSnapshot,
    pub conditions: Conditions,
    pub social_networks_results: SocialResults,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsNotice {
    pub clusters_left: usize,
}

/// Receives every event the core emits. Must not block.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: Event);
}

/// Bounded memory of the subjects most recently announced to publishers.
#[derive(Debug)]
pub struct AnnouncementLog {
    capacity: usize,
    recent: VecDeque<ArticleKey>,
}

impl AnnouncementLog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: VecDeque::with_capacity(capacity),
        }
    }

    /// Records `key` and returns `true` unless it was announced recently.
    pub fn record(&mut self, key: &ArticleKey) -> bool {
        if self.recent.contains(key) {
            return false;
        }
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        self.recent.push_back(key.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }
}

/// Fans events out to live subscribers, and breaking-news candidates not
/// announced recently to publishers.
pub struct Gateway {
    live: broadcast::Sender<Event>,
    publications: broadcast::Sender<CandidateNotice>,
    announced: Mutex<AnnouncementLog>,
    tuning: Arc<Tuning>,
}

impl Gateway {
    pub fn new(tuning: Arc<Tuning>, announcement_buffer: usize) -> Self {
        let (live, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (publications, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            live,
            publications,
            announced: Mutex::new(AnnouncementLog::new(announcement_buffer)),
            tuning,
        }
    }

    /// Attaches a live client. The first event it should see is the returned
    /// `defaultSettings`, followed by everything from the receiver.
    pub fn subscribe(&self) -> (Event, broadcast::Receiver<Event>) {
        let receiver = self.live.subscribe();
        (Event::DefaultSettings(self.tuning.defaults()), receiver)
    }

    pub fn subscribe_publications(&self) -> broadcast::Receiver<CandidateNotice> {
        self.publications.subscribe()
    }

    fn should_publish(&self, key: &ArticleKey) -> bool {
        self.announced
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(key)
    }
}

impl Notifier for Gateway {
    fn notify(&self, event: Event) {
        if let Event::BreakingNewsCandidate(notice) = &event {
            let key = &notice.snapshot.article;
            if self.should_publish(key) {
                info!(
                    " ** Breaking news candidate {}: {} occurrences, {} editors, {} posts",
                    key,
                    notice.snapshot.record.occurrences,
                    notice.snapshot.record.editor_count(),
                    post_count(&notice.social_networks_results)
                );
                // no publisher attached is fine
                let _ = self.publications.send(notice.clone());
            } else {
                debug!("{} already announced, not publishing again", key);
            }
        }

        debug!("Emitting {}", event.kind());
        let _ = self.live.send(event);
    }
}

/// Drains the publication channel. Formatting and delivery of the outbound
/// posts happen elsewhere; this records what would be sent.
pub async fn log_publications(mut receiver: broadcast::Receiver<CandidateNotice>) {
    loop {
        match receiver.recv().await {
            Ok(notice) => info!(
                " ** Publishing {} ({} languages)",
                notice.snapshot.article,
                notice.snapshot.record.language_count()
            ),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(" !! Publisher lagged, skipped {} candidates", skipped)
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
pub(crate) mod recording {
    //! In-memory notifier for tests elsewhere in the crate.

    use super::*;

    #[derive(Default)]
    pub struct RecordingNotifier {
        pub events: Mutex<Vec<Event>>,
    }

    impl RecordingNotifier {
        pub fn kinds(&self) -> Vec<&'static str> {
            self.events.lock().unwrap().iter().map(Event::kind).collect()
        }

        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }
}
