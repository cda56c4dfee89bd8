// tests/history_replay.rs
use asset_insight::config::InsightConfig;
use asset_insight::history::HistoryLog;
use asset_insight::ingest::types::NewsItem;
use asset_insight::ingest::FetchOutcome;
use asset_insight::pipeline::InsightPipeline;
use chrono::{Duration, Utc};

fn outcome(titles: &[(&str, &str)]) -> FetchOutcome {
    let now = Utc::now();
    FetchOutcome {
        items: titles
            .iter()
            .map(|(t, link)| {
                NewsItem::new(*t, "", "Wire", now - Duration::minutes(20), Some(link.to_string()))
            })
            .collect(),
        attempted: 1,
        ..Default::default()
    }
}

#[test]
fn trend_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("output/history.jsonl");
    let cfg = InsightConfig::default();

    let mut first = InsightPipeline::new(&cfg)
        .unwrap()
        .with_history(HistoryLog::new(&path))
        .unwrap();
    let snap = first
        .ingest(
            outcome(&[
                ("Exchange hacked, funds stolen", "https://w/1"),
                ("ETF inflows rally", "https://w/2"),
            ]),
            Utc::now(),
        )
        .unwrap();
    let counted: usize = snap.trend.iter().map(|t| t.item_count).sum();
    assert_eq!(counted, 2);
    drop(first);

    let restarted = InsightPipeline::new(&cfg)
        .unwrap()
        .with_history(HistoryLog::new(&path))
        .unwrap();
    assert_eq!(restarted.store().len(), 2);
    let replayed = restarted.snapshot(Utc::now());
    assert_eq!(replayed.items.len(), 2);
    assert_eq!(replayed.trend.iter().map(|t| t.item_count).sum::<usize>(), 2);
}

#[test]
fn unchanged_refetch_is_not_logged_again() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.jsonl");
    let log = HistoryLog::new(&path);
    let mut p = InsightPipeline::new(&InsightConfig::default())
        .unwrap()
        .with_history(log.clone())
        .unwrap();

    p.ingest(outcome(&[("Fed holds rates", "https://w/fed")]), Utc::now())
        .unwrap();
    p.ingest(outcome(&[("Fed holds rates", "https://w/fed")]), Utc::now())
        .unwrap();
    assert_eq!(log.load().unwrap().len(), 1);
    assert_eq!(p.store().len(), 1);

    // same link, corrected headline: new information
    p.ingest(
        outcome(&[("Fed holds rates, signals cuts", "https://w/fed")]),
        Utc::now(),
    )
    .unwrap();
    let rows = log.load().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].item.item.title, "Fed holds rates, signals cuts");
    assert_eq!(p.store().len(), 1);
}
