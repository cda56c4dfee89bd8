// src/ingest/mod.rs
pub mod rss;
pub mod scheduler;
pub mod types;

use crate::error::InsightError;
use crate::ingest::types::{FeedProvider, NewsItem};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;
use std::collections::HashSet;
use std::time::Duration;

/// Display summaries are cut at a word boundary past this many chars.
pub const SUMMARY_MAX_CHARS: usize = 350;
const TEXT_MAX_CHARS: usize = 1500;

/// One-time metrics registration (so series show up once a recorder exists).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "insight_items_fetched_total",
            "Items parsed from feed sources."
        );
        describe_counter!(
            "insight_fetch_errors_total",
            "Feed sources dropped from a cycle (error or timeout)."
        );
        describe_counter!(
            "insight_items_scored_total",
            "Items scored, tagged and ranked."
        );
        describe_counter!(
            "insight_scoring_degraded_total",
            "Items whose text could not be scored (neutral default)."
        );
        describe_counter!(
            "insight_high_impact_total",
            "Scored items classified as high impact."
        );
        describe_counter!(
            "insight_refresh_superseded_total",
            "Refresh runs cancelled by a newer trigger."
        );
        describe_histogram!("insight_parse_ms", "Feed parse time in milliseconds.");
        describe_gauge!(
            "insight_last_refresh_ts",
            "Unix ts when the pipeline last produced a snapshot."
        );
    });
}

/// Normalize text for display: decode entities, strip tags, fold quotes,
/// collapse whitespace, cap length. Casing is preserved.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > TEXT_MAX_CHARS {
        out = out.chars().take(TEXT_MAX_CHARS).collect();
    }

    out
}

/// Lowercased form used by the scorer and tagger.
pub fn fold_for_matching(s: &str) -> String {
    normalize_text(s).to_lowercase()
}

/// Cut at the last space before `max` chars and append "...".
pub fn truncate_summary(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let head: String = s.chars().take(max).collect();
    let cut = match head.rfind(' ') {
        Some(i) if i > 0 => &head[..i],
        _ => head.as_str(),
    };
    format!("{}...", cut.trim_end())
}

/// Joined result of one fetch cycle.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub items: Vec<NewsItem>,
    /// One `InsightError::Fetch` per dropped source.
    pub failures: Vec<InsightError>,
    pub attempted: usize,
    pub duplicates: usize,
}

impl FetchOutcome {
    pub fn failed_sources(&self) -> Vec<String> {
        self.failures
            .iter()
            .map(|e| match e {
                InsightError::Fetch { feed, .. } => feed.clone(),
                other => other.to_string(),
            })
            .collect()
    }
}

/// Fetch every provider concurrently with a per-source timeout, then join.
///
/// A source that errors or times out is logged and dropped for this cycle.
/// Items sharing an id are merged (first occurrence wins).
pub async fn fetch_all(providers: &[Box<dyn FeedProvider>], timeout: Duration) -> FetchOutcome {
    ensure_metrics_described();

    let runs = providers.iter().map(|p| async move {
        let res = match tokio::time::timeout(timeout, p.fetch_latest()).await {
            Ok(r) => r,
            Err(_) => Err(InsightError::fetch(
                p.name(),
                format!("timed out after {}s", timeout.as_secs_f64()),
            )),
        };
        (p.name().to_string(), res)
    });
    let results = futures::future::join_all(runs).await;

    let mut raw = Vec::new();
    let mut failures = Vec::new();
    for (name, res) in results {
        match res {
            Ok(mut v) => {
                tracing::debug!(target: "ingest", provider = %name, items = v.len(), "source ok");
                raw.append(&mut v);
            }
            Err(e) => {
                tracing::warn!(target: "ingest", error = %e, provider = %name, "source dropped for this cycle");
                counter!("insight_fetch_errors_total").increment(1);
                failures.push(match e {
                    InsightError::Fetch { .. } => e,
                    other => InsightError::fetch(name, other),
                });
            }
        }
    }

    let (items, duplicates) = dedup_by_id(raw);
    FetchOutcome {
        items,
        failures,
        attempted: providers.len(),
        duplicates,
    }
}

/// Keep the first item per id, preserving order.
pub fn dedup_by_id(items: Vec<NewsItem>) -> (Vec<NewsItem>, usize) {
    let mut seen: HashSet<String> = HashSet::new();
    let mut keep = Vec::with_capacity(items.len());
    let mut dropped = 0usize;
    for it in items {
        if seen.insert(it.id.clone()) {
            keep.push(it);
        } else {
            dropped += 1;
        }
    }
    (keep, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn normalize_text_strips_markup_and_keeps_case() {
        let s = "  <p>Bitcoin&nbsp;&nbsp;<b>ETF</b> &ldquo;approved&rdquo;!</p>  ";
        assert_eq!(normalize_text(s), r#"Bitcoin ETF "approved"!"#);
    }

    #[test]
    fn fold_lowercases() {
        assert_eq!(fold_for_matching("SEC <i>Sues</i>"), "sec sues");
    }

    #[test]
    fn truncate_cuts_at_word_boundary() {
        let s = "alpha beta gamma delta";
        assert_eq!(truncate_summary(s, 13), "alpha beta...");
        assert_eq!(truncate_summary(s, 100), s);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let a = NewsItem::new("first", "", "A", t, Some("https://x/1".into()));
        let b = NewsItem::new("second", "", "B", t, Some("https://x/1".into()));
        let c = NewsItem::new("other", "", "A", t, Some("https://x/2".into()));
        let (kept, dropped) = dedup_by_id(vec![a, b, c]);
        assert_eq!(dropped, 1);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title, "first");
    }
}
