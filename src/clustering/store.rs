use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use super::types::{ChangeStamp, ClusterRecord, ClusterSnapshot};
use crate::edit::{ArticleKey, EditEvent};
use crate::TARGET_CLUSTER;

/// Whether an edit opened a new cluster or landed in an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    FirstSeen,
    Seen,
}

/// The result of [`ClusterStore::record_edit`].
#[derive(Debug, Clone)]
pub struct RecordedEdit {
    pub outcome: EditOutcome,
    /// Identifies the change-log entry so the diff can be attached later.
    pub stamp: ChangeStamp,
    pub snapshot: ClusterSnapshot,
}

/// Sizes of the store at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub clusters: usize,
    pub variants: usize,
}

/// Mutable state behind the store lock.
#[derive(Default)]
pub(super) struct StoreState {
    pub(super) clusters: HashMap<ArticleKey, ClusterRecord>,
    /// Every known variant key to the canonical key of its cluster.
    pub(super) variants: HashMap<ArticleKey, ArticleKey>,
    next_seq: u64,
}

impl StoreState {
    pub(super) fn resolve(&self, key: &ArticleKey) -> ArticleKey {
        self.variants.get(key).cloned().unwrap_or_else(|| key.clone())
    }

    fn stamp(&mut self, at: DateTime<Utc>) -> ChangeStamp {
        self.next_seq += 1;
        ChangeStamp {
            at,
            seq: self.next_seq,
        }
    }
}

/// The shared cluster state: clusters by canonical key plus the variant index.
///
/// All operations take the single store lock, so every mutation of a cluster
/// is serialized with every other one, including merges and eviction.
#[derive(Default)]
pub struct ClusterStore {
    pub(super) state: Mutex<StoreState>,
}

impl ClusterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(super) fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Canonical key a variant belongs to; an unseen key resolves to itself.
    pub fn resolve(&self, key: &ArticleKey) -> ArticleKey {
        self.lock().resolve(key)
    }

    /// Applies one accepted edit, creating a singleton cluster for unseen keys.
    pub fn record_edit(&self, event: &EditEvent, now: DateTime<Utc>) -> RecordedEdit {
        let mut guard = self.lock();
        let state = &mut *guard;
        let canonical = state.resolve(&event.article);
        let stamp = state.stamp(now);

        let outcome = match state.clusters.get_mut(&canonical) {
            Some(record) => {
                record.append(event, stamp);
                EditOutcome::Seen
            }
            None => {
                state
                    .clusters
                    .insert(canonical.clone(), ClusterRecord::new(event, stamp));
                state
                    .variants
                    .insert(event.article.clone(), canonical.clone());
                EditOutcome::FirstSeen
            }
        };

        let record = state.clusters[&canonical].clone();
        match outcome {
            EditOutcome::FirstSeen => {
                debug!(target: TARGET_CLUSTER, "[ * ] First time seen: {}", canonical)
            }
            EditOutcome::Seen => debug!(
                target: TARGET_CLUSTER,
                "[ ! ] {} times seen: {} ({} editors, {} languages)",
                record.occurrences,
                canonical,
                record.editor_count(),
                record.language_count()
            ),
        }

        RecordedEdit {
            outcome,
            stamp,
            snapshot: ClusterSnapshot {
                article: canonical,
                record,
            },
        }
    }

    /// Copy of the cluster a key currently belongs to.
    pub fn snapshot(&self, key: &ArticleKey) -> Option<ClusterSnapshot> {
        let state = self.lock();
        let canonical = state.resolve(key);
        state.clusters.get(&canonical).map(|record| ClusterSnapshot {
            article: canonical.clone(),
            record: record.clone(),
        })
    }

    /// Fills in the diff details of an earlier edit. Returns `false` when the
    /// cluster or the entry is gone.
    pub fn attach_diff(
        &self,
        key: &ArticleKey,
        stamp: ChangeStamp,
        added_lines: Vec<String>,
        concepts: Vec<String>,
    ) -> bool {
        let mut state = self.lock();
        let canonical = state.resolve(key);
        let entry = state
            .clusters
            .get_mut(&canonical)
            .and_then(|record| record.change_log.get_mut(&stamp));
        match entry {
            Some(entry) => {
                entry.added_lines = added_lines;
                entry.concepts = concepts;
                true
            }
            None => {
                debug!(
                    target: TARGET_CLUSTER,
                    "Dropping diff for {}, cluster no longer tracked", key
                );
                false
            }
        }
    }

    /// Removes every cluster idle for longer than `max_idle` together with
    /// all variant-index entries pointing at it. Returns the evicted keys.
    pub fn evict_idle(&self, now: DateTime<Utc>, max_idle: chrono::Duration) -> Vec<ArticleKey> {
        let mut state = self.lock();
        let expired: HashSet<ArticleKey> = state
            .clusters
            .iter()
            .filter(|(_, record)| record.idle_for(now) > max_idle)
            .map(|(key, _)| key.clone())
            .collect();

        if expired.is_empty() {
            return Vec::new();
        }

        state.clusters.retain(|key, _| !expired.contains(key));
        state
            .variants
            .retain(|_, canonical| !expired.contains(canonical));

        let remaining = state.clusters.len();
        for key in &expired {
            debug!(
                target: TARGET_CLUSTER,
                "[ † ] No more mentions: {}. Clusters left: {}", key, remaining
            );
        }
        info!(
            target: TARGET_CLUSTER,
            "Evicted {} idle clusters, {} left",
            expired.len(),
            remaining
        );

        expired.into_iter().collect()
    }

    /// Number of live clusters.
    pub fn len(&self) -> usize {
        self.lock().clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of variant keys known to the index.
    pub fn variant_count(&self) -> usize {
        self.lock().variants.len()
    }

    pub fn stats(&self) -> StoreStats {
        let state = self.lock();
        StoreStats {
            clusters: state.clusters.len(),
            variants: state.variants.len(),
        }
    }
}
