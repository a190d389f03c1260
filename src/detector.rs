use serde::Serialize;
use std::time::Duration;

use crate::clustering::ClusterRecord;

/// Editors required from a single-language cluster, as a multiple of the
/// multi-language bar. Policy, tuned empirically.
pub const SINGLE_LANGUAGE_EDITOR_MULTIPLIER: usize = 3;

/// How many trailing intervals the burst check looks at, given the volume
/// threshold. Policy, tuned empirically.
pub fn burst_window(breaking_news_threshold: usize) -> usize {
    breaking_news_threshold.saturating_sub(1)
}

/// The detector's thresholds, read from [`crate::tuning::Tuning`] before
/// each evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorParams {
    pub breaking_news_threshold: usize,
    pub seconds_between_edits: u64,
    pub number_of_concurrent_editors: usize,
}

/// Outcome of each breaking-news condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conditions {
    pub breaking_news_threshold: bool,
    pub seconds_between_edits: bool,
    pub number_of_concurrent_editors: bool,
}

impl Conditions {
    pub fn is_candidate(&self) -> bool {
        self.breaking_news_threshold
            && self.seconds_between_edits
            && self.number_of_concurrent_editors
    }
}

/// Evaluates a cluster against the three breaking-news conditions.
///
/// # Arguments
/// * `record` - Snapshot of the cluster after the latest edit
/// * `params` - Current thresholds
///
/// # Returns
/// * `Conditions` - Each condition individually; see [`Conditions::is_candidate`]
pub fn evaluate(record: &ClusterRecord, params: &DetectorParams) -> Conditions {
    Conditions {
        breaking_news_threshold: record.occurrences >= params.breaking_news_threshold,
        seconds_between_edits: is_burst(
            &record.edit_intervals,
            burst_window(params.breaking_news_threshold),
            Duration::from_secs(params.seconds_between_edits),
        ),
        number_of_concurrent_editors: has_enough_editors(
            record.editor_count(),
            record.language_count(),
            params.number_of_concurrent_editors,
        ),
    }
}

/// True when every one of the last `window` intervals is at most `max_gap`.
fn is_burst(intervals: &[Duration], window: usize, max_gap: Duration) -> bool {
    let start = intervals.len().saturating_sub(window);
    intervals[start..].iter().all(|interval| *interval <= max_gap)
}

fn has_enough_editors(editors: usize, languages: usize, required: usize) -> bool {
    if languages > 1 {
        editors >= required
    } else {
        editors >= required.saturating_mul(SINGLE_LANGUAGE_EDITOR_MULTIPLIER)
    }
}
