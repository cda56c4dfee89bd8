//! Scored items and the immutable snapshots handed to presentation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::ingest::types::NewsItem;
use crate::ranker::{display_order, ImpactRanker};
use crate::rolling::TrendPoint;
use crate::sentiment::{Conviction, SentimentLabel};
use crate::tagger::TagCategory;

/// A `NewsItem` after scoring, tagging and ranking. Never mutated; re-ranking
/// produces a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: NewsItem,
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub conviction: Conviction,
    pub tags: BTreeSet<TagCategory>,
    pub impact_score: f64,
    pub is_high_impact: bool,
}

impl ScoredItem {
    pub fn id(&self) -> &str {
        &self.item.id
    }

    pub fn published_at(&self) -> DateTime<Utc> {
        self.item.published_at
    }

    /// Same article with the same scoring; impact and publish time are
    /// not compared.
    pub fn same_content(&self, other: &ScoredItem) -> bool {
        let (a, b) = (&self.item, &other.item);
        a.id == b.id
            && a.title == b.title
            && a.summary == b.summary
            && a.source == b.source
            && a.link == b.link
            && self.sentiment_score == other.sentiment_score
            && self.tags == other.tags
    }

    /// Impact recomputed for `now`; sentiment and tags are carried over as-is.
    /// `None` once the item has aged out of the ranking horizon.
    pub fn reranked(&self, ranker: &ImpactRanker, now: DateTime<Utc>) -> Option<ScoredItem> {
        let impact = ranker.rank(self.sentiment_score, &self.tags, now - self.published_at())?;
        Some(ScoredItem {
            impact_score: impact.score,
            is_high_impact: impact.is_high,
            ..self.clone()
        })
    }
}

/// Display filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    All,
    HighImpactOnly,
}

impl ViewMode {
    pub fn toggled(self) -> Self {
        match self {
            ViewMode::All => ViewMode::HighImpactOnly,
            ViewMode::HighImpactOnly => ViewMode::All,
        }
    }

    pub fn admits(self, item: &ScoredItem) -> bool {
        match self {
            ViewMode::All => true,
            ViewMode::HighImpactOnly => item.is_high_impact,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::All => "all",
            ViewMode::HighImpactOnly => "high-impact only",
        }
    }
}

impl FromStr for ViewMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" | "a" => Ok(ViewMode::All),
            "high" | "h" | "high_impact" | "high-impact" | "high_impact_only" => {
                Ok(ViewMode::HighImpactOnly)
            }
            other => Err(format!("unknown view mode {other:?}")),
        }
    }
}

/// Result of one refresh: ranked items in the retention window plus trend.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub generated_at: DateTime<Utc>,
    /// Descending impact, newer first on ties.
    pub items: Vec<ScoredItem>,
    pub trend: Vec<TrendPoint>,
    /// Mean sentiment and item count over the whole 24h window.
    pub window_average: f64,
    pub window_count: usize,
    /// Items fetched this cycle (after dedup).
    pub fetched: usize,
    pub failed_sources: Vec<String>,
}

impl Snapshot {
    /// Pure re-filter; order is preserved and nothing is re-scored.
    pub fn view(&self, mode: ViewMode) -> Vec<&ScoredItem> {
        self.items.iter().filter(|it| mode.admits(it)).collect()
    }

    pub fn high_impact_count(&self) -> usize {
        self.items.iter().filter(|it| it.is_high_impact).count()
    }
}

/// Sort in display order.
pub fn sort_for_display(items: &mut [ScoredItem]) {
    items.sort_by(|a, b| {
        display_order(a.impact_score, a.published_at(), b.impact_score, b.published_at())
    });
}
