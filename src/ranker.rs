//! # Impact Ranker
//! `impact = (|score| * sentiment_weight + Σ tag_weight) * recency`, where
//! `recency` falls linearly from 1 at age 0 to 0 at the retention horizon.
//! Written as the base minus a linear recency penalty, the penalty reaches the
//! whole base at 24 h; older items are not ranked at all.
//!
//! Pure and deterministic in `(score, tags, age)`.

use chrono::Duration;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::config::{InsightConfig, RETENTION_HOURS};
use crate::tagger::TagCategory;

/// Ranking result for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub score: f64,
    pub is_high: bool,
}

#[derive(Debug, Clone)]
pub struct ImpactRanker {
    sentiment_weight: f64,
    tag_weights: BTreeMap<TagCategory, f64>,
    threshold: f64,
    horizon: Duration,
}

impl ImpactRanker {
    pub fn new(
        sentiment_weight: f64,
        tag_weights: BTreeMap<TagCategory, f64>,
        threshold: f64,
    ) -> Self {
        Self {
            sentiment_weight,
            tag_weights,
            threshold,
            horizon: Duration::hours(i64::from(RETENTION_HOURS)),
        }
    }

    pub fn from_config(cfg: &InsightConfig) -> Self {
        Self::new(
            cfg.insight.sentiment_weight,
            cfg.tag_weights(),
            cfg.insight.high_impact_threshold,
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Sum of configured weights for `tags` (unknown tags weigh nothing).
    pub fn tag_weight(&self, tags: &BTreeSet<TagCategory>) -> f64 {
        tags.iter()
            .map(|t| self.tag_weights.get(t).copied().unwrap_or(0.0))
            .sum()
    }

    /// Linear penalty: 0 for a fresh item, the whole base at the horizon.
    pub fn recency_penalty(&self, base: f64, age: Duration) -> f64 {
        let age = age.max(Duration::zero());
        let frac = age.num_milliseconds() as f64 / self.horizon.num_milliseconds() as f64;
        base * frac.clamp(0.0, 1.0)
    }

    /// Rank one item. `None` when it is older than the retention horizon.
    ///
    /// Future-dated items (negative age, clock skew) count as fresh.
    pub fn rank(&self, sentiment_score: f64, tags: &BTreeSet<TagCategory>, age: Duration) -> Option<Impact> {
        if age > self.horizon {
            return None;
        }
        let base = sentiment_score.abs() * self.sentiment_weight + self.tag_weight(tags);
        let score = base - self.recency_penalty(base, age);
        Some(Impact {
            score,
            is_high: score >= self.threshold,
        })
    }
}

/// Display order: impact descending, newer first on ties.
pub fn display_order(
    a_impact: f64,
    a_published: chrono::DateTime<chrono::Utc>,
    b_impact: f64,
    b_published: chrono::DateTime<chrono::Utc>,
) -> Ordering {
    b_impact
        .partial_cmp(&a_impact)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b_published.cmp(&a_published))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranker() -> ImpactRanker {
        let mut w = BTreeMap::new();
        w.insert(TagCategory::Regulatory, 0.4);
        w.insert(TagCategory::ExchangeSecurity, 0.3);
        ImpactRanker::new(1.0, w, 0.6)
    }

    fn tags(list: &[TagCategory]) -> BTreeSet<TagCategory> {
        list.iter().copied().collect()
    }

    #[test]
    fn fresh_item_gets_full_base() {
        let r = ranker();
        let i = r
            .rank(-0.5, &tags(&[TagCategory::Regulatory]), Duration::zero())
            .unwrap();
        assert!((i.score - 0.9).abs() < 1e-9);
        assert!(i.is_high);
    }

    #[test]
    fn impact_decays_linearly_to_zero_at_24h() {
        let r = ranker();
        let t = tags(&[TagCategory::ExchangeSecurity]);
        let half = r.rank(0.5, &t, Duration::hours(12)).unwrap();
        assert!((half.score - 0.4).abs() < 1e-9);
        let edge = r.rank(0.5, &t, Duration::hours(24)).unwrap();
        assert!(edge.score.abs() < 1e-9);
        assert!(!edge.is_high);
    }

    #[test]
    fn older_than_horizon_is_not_ranked() {
        let r = ranker();
        assert!(r
            .rank(0.9, &BTreeSet::new(), Duration::hours(24) + Duration::seconds(1))
            .is_none());
    }

    #[test]
    fn ranking_is_deterministic() {
        let r = ranker();
        let t = tags(&[TagCategory::Regulatory, TagCategory::ExchangeSecurity]);
        let a = r.rank(-0.3, &t, Duration::minutes(90));
        let b = r.rank(-0.3, &t, Duration::minutes(90));
        assert_eq!(a, b);
    }

    #[test]
    fn future_items_count_as_fresh() {
        let r = ranker();
        let i = r.rank(0.7, &BTreeSet::new(), Duration::minutes(-5)).unwrap();
        assert!((i.score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn ties_break_on_recency() {
        use chrono::{TimeZone, Utc};
        let early = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let late = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        assert_eq!(display_order(0.5, late, 0.5, early), Ordering::Less);
        assert_eq!(display_order(0.4, late, 0.5, early), Ordering::Greater);
    }
}
