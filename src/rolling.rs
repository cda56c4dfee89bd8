//! # Rolling Window
//! Append-only store of scored items with a 24h query-time window.
//!
//! Nothing is evicted physically: the full sequence is the audit trail, and
//! "the last 24 hours" is a filter applied when a trend or ranking is asked
//! for. Recording an id that is already present replaces that entry in place.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashMap;

use crate::config::RETENTION_HOURS;
use crate::insight::ScoredItem;

/// Average sentiment of one fixed-width bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub bucket_start: DateTime<Utc>,
    /// `None` for an empty bucket, so charts keep a continuous time axis.
    pub avg_sentiment: Option<f64>,
    pub item_count: usize,
}

/// What `TrendStore::record` did with an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    Inserted,
    Replaced,
    /// Same id and same content; the stored entry was kept.
    Unchanged,
}

impl Recorded {
    pub fn is_new(self) -> bool {
        !matches!(self, Recorded::Unchanged)
    }
}

#[derive(Debug, Clone)]
pub struct TrendStore {
    items: Vec<ScoredItem>,
    by_id: HashMap<String, usize>,
    window: Duration,
}

impl Default for TrendStore {
    fn default() -> Self {
        Self::new_24h()
    }
}

impl TrendStore {
    pub fn new_24h() -> Self {
        Self {
            items: Vec::new(),
            by_id: HashMap::new(),
            window: Duration::hours(i64::from(RETENTION_HOURS)),
        }
    }

    /// Append `item`, or replace the entry with the same id.
    ///
    /// A re-fetch that only differs in impact or publish time (undated
    /// entries carry the fetch time) leaves the first-seen entry in place.
    pub fn record(&mut self, item: ScoredItem) -> Recorded {
        match self.by_id.get(item.id()) {
            Some(&idx) if self.items[idx].same_content(&item) => Recorded::Unchanged,
            Some(&idx) => {
                self.items[idx] = item;
                Recorded::Replaced
            }
            None => {
                self.by_id.insert(item.id().to_string(), self.items.len());
                self.items.push(item);
                Recorded::Inserted
            }
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Every recorded item in insertion order, including expired ones.
    pub fn all(&self) -> &[ScoredItem] {
        &self.items
    }

    pub fn cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.window
    }

    /// Items published at or after `now - 24h`.
    pub fn within_window(&self, now: DateTime<Utc>) -> impl Iterator<Item = &ScoredItem> + '_ {
        let cutoff = self.cutoff(now);
        self.items.iter().filter(move |it| it.published_at() >= cutoff)
    }

    /// Bucketed average sentiment over the window, ascending by bucket start.
    ///
    /// Buckets are aligned to multiples of `bucket` since the unix epoch and
    /// cover every slot from the one holding the cutoff to the one holding
    /// `now`. Items dated after `now` are ignored.
    pub fn trend(&self, now: DateTime<Utc>, bucket: Duration) -> Vec<TrendPoint> {
        let step = bucket.num_seconds();
        if step <= 0 {
            return Vec::new();
        }
        let cutoff = self.cutoff(now);
        let first = align(cutoff.timestamp(), step);
        let last = align(now.timestamp(), step);
        let slots = ((last - first) / step + 1) as usize;

        let mut sums = vec![0.0f64; slots];
        let mut counts = vec![0usize; slots];
        for it in self.within_window(now) {
            let ts = it.published_at();
            if ts > now {
                continue;
            }
            let idx = ((align(ts.timestamp(), step) - first) / step) as usize;
            sums[idx] += it.sentiment_score;
            counts[idx] += 1;
        }

        (0..slots)
            .filter_map(|i| {
                let start = DateTime::<Utc>::from_timestamp(first + i as i64 * step, 0)?;
                let n = counts[i];
                Some(TrendPoint {
                    bucket_start: start,
                    avg_sentiment: (n > 0).then(|| sums[i] / n as f64),
                    item_count: n,
                })
            })
            .collect()
    }

    /// Average and count over the whole window (informational).
    pub fn average_and_count(&self, now: DateTime<Utc>) -> (f64, usize) {
        let (sum, n) = self
            .within_window(now)
            .filter(|it| it.published_at() <= now)
            .fold((0.0f64, 0usize), |(s, n), it| (s + it.sentiment_score, n + 1));
        let avg = if n > 0 { sum / n as f64 } else { 0.0 };
        (avg, n)
    }
}

fn align(ts: i64, step: i64) -> i64 {
    ts.div_euclid(step) * step
}
