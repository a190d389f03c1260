use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::detector::DetectorParams;
use crate::environment::Settings;

/// Parameters that can be changed while the service runs. Every read happens
/// at evaluation or sweep time, so a change applies from the next one on.
#[derive(Debug)]
pub struct Tuning {
    seconds_since_last_edit: AtomicU64,
    seconds_between_edits: AtomicU64,
    breaking_news_threshold: AtomicU64,
    number_of_concurrent_editors: AtomicU64,
}

/// Current tuning as sent to clients when they attach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultSettings {
    pub seconds_since_last_edit: u64,
    pub seconds_between_edits: u64,
    pub breaking_news_threshold: u64,
    pub number_of_concurrent_editors: u64,
}

impl Tuning {
    pub fn from_settings(settings: &Settings) -> Self {
        let tuning = Self {
            seconds_since_last_edit: AtomicU64::new(0),
            seconds_between_edits: AtomicU64::new(0),
            breaking_news_threshold: AtomicU64::new(0),
            number_of_concurrent_editors: AtomicU64::new(0),
        };
        tuning.set_seconds_since_last_edit(settings.seconds_since_last_edit);
        tuning.set_seconds_between_edits(settings.seconds_between_edits);
        tuning.set_breaking_news_threshold(settings.breaking_news_threshold);
        tuning.set_number_of_concurrent_editors(settings.number_of_concurrent_editors);
        tuning
    }

    pub fn set_seconds_since_last_edit(&self, seconds: u64) {
        self.seconds_since_last_edit.store(seconds, Ordering::Relaxed);
    }

    pub fn set_seconds_between_edits(&self, seconds: u64) {
        self.seconds_between_edits.store(seconds, Ordering::Relaxed);
    }

    /// A threshold below one would flag every first edit.
    pub fn set_breaking_news_threshold(&self, threshold: u64) {
        self.breaking_news_threshold
            .store(threshold.max(1), Ordering::Relaxed);
    }

    pub fn set_number_of_concurrent_editors(&self, editors: u64) {
        self.number_of_concurrent_editors
            .store(editors, Ordering::Relaxed);
    }

    pub fn seconds_since_last_edit(&self) -> u64 {
        self.seconds_since_last_edit.load(Ordering::Relaxed)
    }

    /// Idle time after which the sweeper evicts a cluster.
    pub fn idle_window(&self) -> chrono::Duration {
        let seconds = i64::try_from(self.seconds_since_last_edit()).unwrap_or(i64::MAX);
        chrono::Duration::try_seconds(seconds).unwrap_or(chrono::Duration::MAX)
    }

    pub fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            breaking_news_threshold: usize::try_from(
                self.breaking_news_threshold.load(Ordering::Relaxed),
            )
            .unwrap_or(usize::MAX),
            seconds_between_edits: self.seconds_between_edits.load(Ordering::Relaxed),
            number_of_concurrent_editors: usize::try_from(
                self.number_of_concurrent_editors.load(Ordering::Relaxed),
            )
            .unwrap_or(usize::MAX),
        }
    }

    pub fn defaults(&self) -> DefaultSettings {
        DefaultSettings {
            seconds_since_last_edit: self.seconds_since_last_edit(),
            seconds_between_edits: self.seconds_between_edits.load(Ordering::Relaxed),
            breaking_news_threshold: self.breaking_news_threshold.load(Ordering::Relaxed),
            number_of_concurrent_editors: self
                .number_of_concurrent_editors
                .load(Ordering::Relaxed),
        }
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_settings() {
        let tuning = Tuning::default();
        assert_eq!(
            tuning.defaults(),
            DefaultSettings {
                seconds_since_last_edit: 240,
                seconds_between_edits: 60,
                breaking_news_threshold: 5,
                number_of_concurrent_editors: 2,
            }
        );
        assert_eq!(tuning.idle_window(), chrono::Duration::seconds(240));
    }

    #[test]
    fn test_changes_apply_to_next_read() {
        let tuning = Tuning::default();
        tuning.set_breaking_news_threshold(8);
        tuning.set_seconds_between_edits(30);
        tuning.set_number_of_concurrent_editors(4);
        tuning.set_seconds_since_last_edit(600);

        assert_eq!(
            tuning.detector_params(),
            DetectorParams {
                breaking_news_threshold: 8,
                seconds_between_edits: 30,
                number_of_concurrent_editors: 4,
            }
        );
        assert_eq!(tuning.idle_window(), chrono::Duration::seconds(600));
    }

    #[test]
    fn test_threshold_never_drops_below_one() {
        let tuning = Tuning::default();
        tuning.set_breaking_news_threshold(0);
        assert_eq!(tuning.detector_params().breaking_news_threshold, 1);
    }

    #[test]
    fn test_defaults_serialize_camel_case() {
        let json = serde_json::to_value(Tuning::default().defaults()).unwrap();
        assert_eq!(json["secondsSinceLastEdit"], 240);
        assert_eq!(json["numberOfConcurrentEditors"], 2);
    }
}
