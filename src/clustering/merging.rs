use std::time::Duration;
use tracing::{debug, info};

use super::store::ClusterStore;
use super::types::{ChangeStamp, ClusterRecord, ClusterSnapshot};
use crate::edit::ArticleKey;
use crate::TARGET_CLUSTER;

/// What [`ClusterStore::merge_variant`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The variant was unseen and now belongs to the cluster.
    AddedVariant { canonical: ArticleKey },
    /// The variant's own cluster was absorbed into the target.
    Merged {
        absorbed: ArticleKey,
        snapshot: ClusterSnapshot,
    },
    AlreadyMember,
    /// The target cluster was evicted before the merge arrived.
    TargetMissing,
}

impl ClusterRecord {
    /// Unions another cluster's state into this one.
    ///
    /// Intervals are rebuilt from the merged change log so that they stay in
    /// chronological order and `occurrences == 1 + edit_intervals.len()`.
    pub fn absorb(&mut self, other: ClusterRecord) {
        self.first_seen = self.first_seen.min(other.first_seen);
        self.last_edit_at = self.last_edit_at.max(other.last_edit_at);
        self.occurrences += other.occurrences;

        for (name, languages) in other.editors {
            self.editors.entry(name).or_default().extend(languages);
        }
        for (language, count) in other.language_counts {
            *self.language_counts.entry(language).or_insert(0) += count;
        }
        self.member_variants.extend(other.member_variants);
        self.change_log.extend(other.change_log);
        self.edit_intervals = intervals_between(self.change_log.keys());
    }
}

fn intervals_between<'a>(stamps: impl Iterator<Item = &'a ChangeStamp> + Clone) -> Vec<Duration> {
    stamps
        .clone()
        .zip(stamps.skip(1))
        .map(|(earlier, later)| (later.at - earlier.at).to_std().unwrap_or(Duration::ZERO))
        .collect()
}

impl ClusterStore {
    /// Declares `existing` a variant of the cluster `into` resolves to.
    ///
    /// Unseen variants are simply added. A variant that already heads or
    /// belongs to a different cluster causes that whole cluster to be
    /// absorbed and deleted. Repeating a merge is a no-op.
    pub fn merge_variant(&self, existing: &ArticleKey, into: &ArticleKey) -> MergeOutcome {
        let mut guard = self.lock();
        let state = &mut *guard;

        let target = state.resolve(into);
        if !state.clusters.contains_key(&target) {
            debug!(
                target: TARGET_CLUSTER,
                "Not merging {} into {}, cluster already evicted",
                existing,
                into
            );
            return MergeOutcome::TargetMissing;
        }

        if let Some(current) = state.variants.get(existing).cloned() {
            if current == target {
                return MergeOutcome::AlreadyMember;
            }
            if let Some(absorbed) = state.clusters.remove(&current) {
                for variant in &absorbed.member_variants {
                    state.variants.insert(variant.clone(), target.clone());
                }
                if let Some(record) = state.clusters.get_mut(&target) {
                    record.absorb(absorbed);
                    info!(
                        target: TARGET_CLUSTER,
                        "[ + ] Merged {} into {} ({} occurrences, {} variants)",
                        current,
                        target,
                        record.occurrences,
                        record.member_variants.len()
                    );
                    return MergeOutcome::Merged {
                        absorbed: current,
                        snapshot: ClusterSnapshot {
                            article: target,
                            record: record.clone(),
                        },
                    };
                }
            }
        }

        match state.clusters.get_mut(&target) {
            Some(record) => {
                record.member_variants.insert(existing.clone());
                state.variants.insert(existing.clone(), target.clone());
                debug!(target: TARGET_CLUSTER, "Added variant {} to {}", existing, target);
                MergeOutcome::AddedVariant { canonical: target }
            }
            None => MergeOutcome::TargetMissing,
        }
    }
}
