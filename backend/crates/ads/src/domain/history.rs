//! Ad History
//!
//! Bounded, time-ordered log of confirmed ad interactions.
//!
//! Entries are kept sorted by `(timestamp, sequence)`, where `sequence` is the
//! insertion counter. Events normally arrive in time order, so an append is a
//! push to the back; a late event is inserted in place. Eviction always pops
//! from the front.

use crate::domain::entities::AdHistoryEntry;
use crate::error::AdsError;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::str::FromStr;
use std::time::Duration;

/// Retrieval order for history queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

impl SortOrder {
    /// Single comparison used for both orders. Ties on timestamp fall back to
    /// insertion order, so Descending is the exact reverse of Ascending.
    pub fn compare(self, a: &SequencedEntry, b: &SequencedEntry) -> Ordering {
        let ascending = a
            .entry
            .timestamp
            .cmp(&b.entry.timestamp)
            .then(a.sequence.cmp(&b.sequence));
        match self {
            SortOrder::Ascending => ascending,
            SortOrder::Descending => ascending.reverse(),
        }
    }
}

impl FromStr for SortOrder {
    type Err = AdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(AdsError::InvalidRequest(format!("unknown sort order: {other}"))),
        }
    }
}

/// How many entries, and how old, the ledger may keep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub max_entries: usize,
    pub max_age: Duration,
}

impl RetentionPolicy {
    pub fn new(max_entries: usize, max_age: Duration) -> Self {
        Self {
            max_entries,
            max_age,
        }
    }

    /// Entries strictly older than this are expired. `None` when the age
    /// limit reaches past the start of representable time.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let max_age = TimeDelta::from_std(self.max_age).ok()?;
        now.checked_sub_signed(max_age)
    }
}

/// An entry together with its insertion sequence number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequencedEntry {
    pub sequence: u64,
    pub entry: AdHistoryEntry,
}

#[derive(Debug, Clone, Default)]
pub struct AdHistory {
    entries: VecDeque<SequencedEntry>,
    next_sequence: u64,
}

impl AdHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries in any order
    pub fn from_entries(mut entries: Vec<SequencedEntry>) -> Self {
        entries.sort_by(|a, b| SortOrder::Ascending.compare(a, b));
        let next_sequence = entries
            .iter()
            .map(|e| e.sequence + 1)
            .max()
            .unwrap_or_default();
        Self {
            entries: entries.into(),
            next_sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append and then enforce `policy`. Returns the number evicted.
    pub fn append(
        &mut self,
        entry: AdHistoryEntry,
        policy: &RetentionPolicy,
        now: DateTime<Utc>,
    ) -> usize {
        let sequenced = SequencedEntry {
            sequence: self.next_sequence,
            entry,
        };
        self.next_sequence += 1;

        // New sequence is the largest, so it goes after every entry with an
        // equal or earlier timestamp.
        let position = self
            .entries
            .partition_point(|existing| existing.entry.timestamp <= sequenced.entry.timestamp);
        if position == self.entries.len() {
            self.entries.push_back(sequenced);
        } else {
            self.entries.insert(position, sequenced);
        }

        self.evict(policy, now)
    }

    /// Drop oldest entries until both limits hold
    pub fn evict(&mut self, policy: &RetentionPolicy, now: DateTime<Utc>) -> usize {
        let cutoff = policy.cutoff(now);
        let mut evicted = 0;
        while let Some(oldest) = self.entries.front() {
            let too_many = self.entries.len() > policy.max_entries;
            let too_old = cutoff.is_some_and(|cutoff| oldest.entry.timestamp < cutoff);
            if !(too_many || too_old) {
                break;
            }
            self.entries.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Detached copy in ascending order
    pub fn snapshot(&self) -> Vec<SequencedEntry> {
        self.entries.iter().cloned().collect()
    }
}

/// Materialize `entries` in `order`
pub fn apply(mut entries: Vec<SequencedEntry>, order: SortOrder) -> Vec<AdHistoryEntry> {
    entries.sort_by(|a, b| order.compare(a, b));
    entries.into_iter().map(|sequenced| sequenced.entry).collect()
}

/// Like [`apply`], keeping only entries with `from <= timestamp <= to`
pub fn apply_range(
    entries: Vec<SequencedEntry>,
    order: SortOrder,
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Vec<AdHistoryEntry> {
    let in_range = entries
        .into_iter()
        .filter(|e| from.is_none_or(|from| e.entry.timestamp >= from))
        .filter(|e| to.is_none_or(|to| e.entry.timestamp <= to))
        .collect();
    apply(in_range, order)
}
