//! Plain-text rendering of a snapshot: overview table, trend series, cards.
//!
//! Pure functions over `Snapshot`; switching view mode only re-filters.

use std::fmt::Write as _;

use crate::insight::{ScoredItem, Snapshot, ViewMode};
use crate::rolling::TrendPoint;
use crate::sentiment::SentimentLabel;

const DISCLAIMER: &str = "Demo only - not investment advice.";

fn label_marker(label: SentimentLabel) -> &'static str {
    match label {
        SentimentLabel::Positive => "[+]",
        SentimentLabel::Neutral => "[=]",
        SentimentLabel::Negative => "[-]",
    }
}

fn tags_line(it: &ScoredItem) -> String {
    it.tags
        .iter()
        .map(|t| t.label())
        .collect::<Vec<_>>()
        .join(" | ")
}

/// Hourly (or configured) trend as rows: bucket, average, count, bar.
pub fn render_trend(trend: &[TrendPoint]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Sentiment trend (last 24h, UTC)");
    if trend.iter().all(|p| p.item_count == 0) {
        let _ = writeln!(out, "  no history yet - refresh a few times to build a trend");
        return out;
    }
    for p in trend {
        let bucket = p.bucket_start.format("%m-%d %H:%M");
        match p.avg_sentiment {
            Some(avg) => {
                let width = (avg.abs() * 10.0).round() as usize;
                let bar = if avg >= 0.0 { "+" } else { "-" }.repeat(width);
                let _ = writeln!(out, "  {bucket}  {avg:+.2}  n={:<3} {bar}", p.item_count);
            }
            None => {
                let _ = writeln!(out, "  {bucket}     --  n=0");
            }
        }
    }
    out
}

/// Overview table plus cards for at most `max_cards` items in `mode`.
pub fn render_cards(snap: &Snapshot, mode: ViewMode, max_cards: usize) -> String {
    let shown: Vec<&ScoredItem> = snap.view(mode).into_iter().take(max_cards).collect();
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Insights ({}): showing {} of {} ranked, {} high-impact",
        mode.as_str(),
        shown.len(),
        snap.items.len(),
        snap.high_impact_count()
    );
    if !snap.failed_sources.is_empty() {
        let _ = writeln!(out, "  skipped sources: {}", snap.failed_sources.join(", "));
    }
    if shown.is_empty() {
        let _ = writeln!(out, "  nothing to show in this view");
        return out;
    }

    for (i, it) in shown.iter().enumerate() {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{:>2}. {} {} | score {:+.2} | conviction {} | impact {:.2}{}",
            i + 1,
            label_marker(it.sentiment_label),
            it.sentiment_label.as_str().to_uppercase(),
            it.sentiment_score,
            it.conviction.as_str(),
            it.impact_score,
            if it.is_high_impact { " | HIGH IMPACT" } else { "" }
        );
        let _ = writeln!(out, "    {}", it.item.title);
        let _ = writeln!(
            out,
            "    {} - {}",
            it.item.source,
            it.item.published_at.format("%Y-%m-%d %H:%M UTC")
        );
        if !it.tags.is_empty() {
            let _ = writeln!(out, "    triggers: {}", tags_line(it));
        }
        if !it.item.summary.is_empty() {
            let _ = writeln!(out, "    {}", it.item.summary);
        }
        if let Some(link) = &it.item.link {
            let _ = writeln!(out, "    {link}");
        }
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "{DISCLAIMER}");
    out
}

/// One-line mood of the whole window.
pub fn render_window_summary(snap: &Snapshot) -> String {
    if snap.window_count == 0 {
        return "24h mood: no items yet\n".to_string();
    }
    format!(
        "24h mood: {} ({:+.2} across {} item(s))\n",
        SentimentLabel::from_score(snap.window_average).as_str(),
        snap.window_average,
        snap.window_count
    )
}

/// Full screen: window mood and trend first, then cards.
pub fn render_snapshot(snap: &Snapshot, mode: ViewMode, max_cards: usize) -> String {
    format!(
        "{}{}\n{}",
        render_window_summary(snap),
        render_trend(&snap.trend),
        render_cards(snap, mode, max_cards)
    )
}

/// Error/empty state when a refresh fetched nothing from any source.
pub fn render_empty(attempted: usize, failed_sources: &[String]) -> String {
    let mut out = format!("No news fetched from {attempted} source(s).");
    if !failed_sources.is_empty() {
        let _ = write!(out, " Failed: {}.", failed_sources.join(", "));
    }
    out.push('\n');
    out
}
