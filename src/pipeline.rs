//! # Insight Pipeline
//! Normalize → score → tag → rank, then record into the rolling store and the
//! history log, and hand out an immutable `Snapshot`.
//!
//! No I/O besides the optional history log; fetching happens in `ingest`.

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};

use crate::config::InsightConfig;
use crate::error::{InsightError, Result};
use crate::history::HistoryLog;
use crate::ingest::types::NewsItem;
use crate::ingest::{ensure_metrics_described, fold_for_matching, FetchOutcome};
use crate::insight::{sort_for_display, ScoredItem, Snapshot};
use crate::ranker::ImpactRanker;
use crate::rolling::{Recorded, TrendStore};
use crate::sentiment::SentimentAnalyzer;
use crate::tagger::{TagCategory, Tagger};

pub struct InsightPipeline {
    analyzer: SentimentAnalyzer,
    tagger: Tagger,
    ranker: ImpactRanker,
    volatility_trigger: Option<f64>,
    bucket: Duration,
    store: TrendStore,
    log: Option<HistoryLog>,
}

impl InsightPipeline {
    /// Build all stages from a validated config. Keyword compilation errors
    /// surface here as `ConfigError`.
    pub fn new(cfg: &InsightConfig) -> Result<Self> {
        cfg.validate()?;
        ensure_metrics_described();
        Ok(Self {
            analyzer: SentimentAnalyzer::new(),
            tagger: Tagger::new(&cfg.tags)?,
            ranker: ImpactRanker::from_config(cfg),
            volatility_trigger: cfg.insight.volatility_trigger,
            bucket: cfg.bucket_size(),
            store: TrendStore::new_24h(),
            log: None,
        })
    }

    /// Attach a history log and replay it into the rolling store.
    pub fn with_history(mut self, log: HistoryLog) -> Result<Self> {
        let entries = log.load()?;
        let n = entries.len();
        for e in entries {
            self.store.record(e.item);
        }
        tracing::info!(
            target: "history",
            replayed = n,
            distinct = self.store.len(),
            path = %log.path().display(),
            "history replayed"
        );
        self.log = Some(log);
        Ok(self)
    }

    pub fn store(&self) -> &TrendStore {
        &self.store
    }

    pub fn ranker(&self) -> &ImpactRanker {
        &self.ranker
    }

    /// Score, tag and rank one item as of `now`.
    ///
    /// Items past the ranking horizon still get a `ScoredItem` (for the raw
    /// log) with zero impact.
    pub fn score_item(&self, item: NewsItem, now: DateTime<Utc>) -> ScoredItem {
        let text = fold_for_matching(&item.full_text());
        let sentiment = self.analyzer.score(&text);

        let mut tags = self.tagger.tag(&text);
        if tracing::enabled!(target: "pipeline", tracing::Level::TRACE) {
            tracing::trace!(target: "pipeline", id = %item.id, hits = ?self.tagger.explain(&text), "tag triggers");
        }
        if let Some(trigger) = self.volatility_trigger {
            if sentiment.score.abs() >= trigger {
                tags.insert(TagCategory::HighVolatility);
            }
        }

        let (impact_score, is_high_impact) = self
            .ranker
            .rank(sentiment.score, &tags, now - item.published_at)
            .map(|i| (i.score, i.is_high))
            .unwrap_or((0.0, false));

        ScoredItem {
            item,
            sentiment_score: sentiment.score,
            sentiment_label: sentiment.label,
            conviction: sentiment.conviction(),
            tags,
            impact_score,
            is_high_impact,
        }
    }

    /// Run the downstream stages over one joined fetch result.
    ///
    /// Returns `NothingFetched` when the cycle produced zero items; the store
    /// is left untouched in that case.
    pub fn ingest(&mut self, outcome: FetchOutcome, now: DateTime<Utc>) -> Result<Snapshot> {
        let failed_sources = outcome.failed_sources();
        if outcome.items.is_empty() {
            tracing::warn!(
                target: "pipeline",
                attempted = outcome.attempted,
                failed = failed_sources.len(),
                "refresh produced no items"
            );
            return Err(InsightError::NothingFetched {
                attempted: outcome.attempted,
            });
        }

        let fetched = outcome.items.len();
        let scored: Vec<ScoredItem> = outcome
            .items
            .into_iter()
            .map(|it| self.score_item(it, now))
            .collect();

        let high = scored.iter().filter(|s| s.is_high_impact).count();
        counter!("insight_items_scored_total").increment(scored.len() as u64);
        counter!("insight_high_impact_total").increment(high as u64);

        let mut replaced = 0usize;
        let mut unchanged = 0usize;
        let mut fresh = Vec::with_capacity(scored.len());
        for s in scored {
            match self.store.record(s.clone()) {
                Recorded::Inserted => fresh.push(s),
                Recorded::Replaced => {
                    replaced += 1;
                    fresh.push(s);
                }
                Recorded::Unchanged => unchanged += 1,
            }
        }

        // only new or changed entries reach the log
        if let Some(log) = &self.log {
            if let Err(e) = log.append(&fresh, now) {
                tracing::warn!(
                    target: "history",
                    error = %e,
                    path = %log.path().display(),
                    "history append failed; trend stays in memory only"
                );
            }
        }

        let snap = self.snapshot_with(now, fetched, failed_sources);
        gauge!("insight_last_refresh_ts").set(now.timestamp() as f64);
        tracing::info!(
            target: "pipeline",
            fetched,
            replaced,
            unchanged,
            high_impact = high,
            ranked = snap.items.len(),
            failed = snap.failed_sources.len(),
            "refresh complete"
        );
        Ok(snap)
    }

    /// Snapshot of what is already in the store, without fetching.
    pub fn snapshot(&self, now: DateTime<Utc>) -> Snapshot {
        self.snapshot_with(now, 0, Vec::new())
    }

    fn snapshot_with(&self, now: DateTime<Utc>, fetched: usize, failed_sources: Vec<String>) -> Snapshot {
        let mut items: Vec<ScoredItem> = self
            .store
            .within_window(now)
            .filter_map(|it| it.reranked(&self.ranker, now))
            .collect();
        sort_for_display(&mut items);
        let (window_average, window_count) = self.store.average_and_count(now);
        Snapshot {
            generated_at: now,
            items,
            trend: self.store.trend(now, self.bucket),
            window_average,
            window_count,
            fetched,
            failed_sources,
        }
    }
}
