use chrono::{DateTime, Utc};
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crate::edit::{ArticleKey, EditEvent};

/// Orders change-log entries by time, with ties broken by arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChangeStamp {
    pub at: DateTime<Utc>,
    pub seq: u64,
}

/// One edit as remembered in a cluster's change log.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEntry {
    pub diff_url: Option<String>,
    pub delta: i64,
    pub language: String,
    /// `lang:name` form.
    pub editor: String,
    pub comment: String,
    /// Cleaned text of the lines the edit added, filled in once the diff arrives.
    pub added_lines: Vec<String>,
    /// Link targets found in the added lines.
    pub concepts: Vec<String>,
}

impl ChangeEntry {
    pub fn from_event(event: &EditEvent) -> Self {
        Self {
            diff_url: event.diff_url.clone(),
            delta: event.delta,
            language: event.language.clone(),
            editor: event.editor_key(),
            comment: event.comment.clone(),
            added_lines: Vec::new(),
            concepts: Vec::new(),
        }
    }
}

/// One subject tracked across language editions.
///
/// Records only live inside the store; everything outside sees clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterRecord {
    #[serde(serialize_with = "serialize_millis")]
    pub first_seen: DateTime<Utc>,
    #[serde(serialize_with = "serialize_millis")]
    pub last_edit_at: DateTime<Utc>,
    pub occurrences: usize,
    #[serde(serialize_with = "serialize_intervals")]
    pub edit_intervals: Vec<Duration>,
    /// Bare editor name to the languages they edited in.
    #[serde(serialize_with = "serialize_editors")]
    pub editors: BTreeMap<String, BTreeSet<String>>,
    #[serde(rename = "languages")]
    pub language_counts: BTreeMap<String, usize>,
    #[serde(rename = "versions")]
    pub member_variants: BTreeSet<ArticleKey>,
    #[serde(rename = "changes", serialize_with = "serialize_change_log")]
    pub change_log: BTreeMap<ChangeStamp, ChangeEntry>,
}

impl ClusterRecord {
    /// A singleton cluster seeded from its first edit.
    pub fn new(event: &EditEvent, stamp: ChangeStamp) -> Self {
        let mut record = Self {
            first_seen: stamp.at,
            last_edit_at: stamp.at,
            occurrences: 1,
            edit_intervals: Vec::new(),
            editors: BTreeMap::new(),
            language_counts: BTreeMap::new(),
            member_variants: BTreeSet::new(),
            change_log: BTreeMap::new(),
        };
        record.member_variants.insert(event.article.clone());
        record.add_editor(&event.editor, &event.language);
        *record
            .language_counts
            .entry(event.language.clone())
            .or_insert(0) += 1;
        record
            .change_log
            .insert(stamp, ChangeEntry::from_event(event));
        record
    }

    /// Appends a subsequent edit.
    pub fn append(&mut self, event: &EditEvent, stamp: ChangeStamp) {
        let interval = (stamp.at - self.last_edit_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        self.occurrences += 1;
        self.edit_intervals.push(interval);
        self.last_edit_at = self.last_edit_at.max(stamp.at);
        self.add_editor(&event.editor, &event.language);
        *self
            .language_counts
            .entry(event.language.clone())
            .or_insert(0) += 1;
        self.change_log
            .insert(stamp, ChangeEntry::from_event(event));
    }

    /// Records an editor once by bare name, merging the language tag.
    pub fn add_editor(&mut self, editor: &str, language: &str) {
        self.editors
            .entry(editor.to_string())
            .or_default()
            .insert(language.to_string());
    }

    pub fn editor_count(&self) -> usize {
        self.editors.len()
    }

    pub fn language_count(&self) -> usize {
        self.language_counts.len()
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.last_edit_at
    }
}

/// A point-in-time copy of a cluster, as carried by outbound events.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    /// The canonical key; stable for as long as the cluster survives.
    pub article: ArticleKey,
    #[serde(flatten)]
    pub record: ClusterRecord,
}

fn serialize_millis<S: Serializer>(at: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_i64(at.timestamp_millis())
}

fn serialize_intervals<S: Serializer>(
    intervals: &[Duration],
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(intervals.len()))?;
    for interval in intervals {
        seq.serialize_element(&(interval.as_millis() as u64))?;
    }
    seq.end()
}

fn serialize_editors<S: Serializer>(
    editors: &BTreeMap<String, BTreeSet<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(editors.len()))?;
    for (name, languages) in editors {
        let tag = languages.iter().cloned().collect::<Vec<_>>().join(",");
        seq.serialize_element(&format!("{}:{}", tag, name))?;
    }
    seq.end()
}

#[derive(Serialize)]
struct TimedChange<'a> {
    timestamp: i64,
    #[serde(flatten)]
    entry: &'a ChangeEntry,
}

fn serialize_change_log<S: Serializer>(
    log: &BTreeMap<ChangeStamp, ChangeEntry>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut seq = serializer.serialize_seq(Some(log.len()))?;
    for (stamp, entry) in log {
        seq.serialize_element(&TimedChange {
            timestamp: stamp.at.timestamp_millis(),
            entry,
        })?;
    }
    seq.end()
}
