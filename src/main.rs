//! asset-insight: terminal entrypoint.
//! Loads config, replays history, then either renders one refresh
//! (`INSIGHT_RUN_ONCE=1`) or runs the refresh loop with keyboard commands.

use anyhow::Context;
use std::io::Write as _;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use asset_insight::config::InsightConfig;
use asset_insight::history::HistoryLog;
use asset_insight::ingest::rss::RssFeedProvider;
use asset_insight::ingest::scheduler::{spawn_refresh_loop, spawn_ticker, RefreshEvent, Trigger};
use asset_insight::ingest::{fetch_all, types::FeedProvider};
use asset_insight::insight::ViewMode;
use asset_insight::pipeline::InsightPipeline;
use asset_insight::render;
use asset_insight::InsightError;

/// Logs go to stderr so the rendered screen on stdout stays clean.
/// `INSIGHT_LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("asset_insight=info,warn"));

    let json = std::env::var("INSIGHT_LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|v| matches!(v.trim(), "1" | "true" | "yes"))
}

fn build_providers(cfg: &InsightConfig) -> anyhow::Result<Vec<Box<dyn FeedProvider>>> {
    let client = reqwest::Client::builder()
        .user_agent(cfg.fetch.user_agent.clone())
        .timeout(cfg.fetch_timeout())
        .build()
        .context("building http client")?;
    Ok(cfg
        .feeds
        .iter()
        .map(|src| {
            Box::new(RssFeedProvider::from_source(src, client.clone()).with_per_feed(cfg.insight.per_feed))
                as Box<dyn FeedProvider>
        })
        .collect())
}

fn print_event(ev: &RefreshEvent, mode: ViewMode, max_cards: usize) {
    let screen = match ev {
        RefreshEvent::Ready(snap) => render::render_snapshot(snap, mode, max_cards),
        RefreshEvent::Empty {
            attempted,
            failed_sources,
            previous,
        } => {
            let mut s = render::render_empty(*attempted, failed_sources);
            if !previous.items.is_empty() {
                s.push_str("Showing what is still inside the 24h window.\n\n");
                s.push_str(&render::render_snapshot(previous, mode, max_cards));
            }
            s
        }
    };
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{screen}");
    let _ = writeln!(out, "[r] refresh  [a] all  [h] high-impact only  [t] toggle  [q] quit");
    let _ = out.flush();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; missing file is fine.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = InsightConfig::load_default().context("loading configuration")?;
    let providers = build_providers(&cfg)?;
    let mut mode = std::env::var("INSIGHT_VIEW")
        .ok()
        .and_then(|v| ViewMode::from_str(&v).ok())
        .unwrap_or_default();
    let max_cards = cfg.insight.max_cards;

    let pipeline = InsightPipeline::new(&cfg)?
        .with_history(HistoryLog::new(&cfg.insight.history_path))
        .context("replaying history log")?;

    tracing::info!(
        feeds = cfg.feeds.len(),
        refresh_secs = cfg.fetch.refresh_interval_secs,
        view = mode.as_str(),
        "asset-insight starting"
    );

    if env_flag("INSIGHT_RUN_ONCE") {
        let mut pipeline = pipeline;
        let outcome = fetch_all(&providers, cfg.fetch_timeout()).await;
        let failed = outcome.failed_sources();
        let now = chrono::Utc::now();
        let ev = match pipeline.ingest(outcome, now) {
            Ok(snap) => RefreshEvent::Ready(snap.into()),
            Err(InsightError::NothingFetched { attempted }) => RefreshEvent::Empty {
                attempted,
                failed_sources: failed,
                previous: pipeline.snapshot(now).into(),
            },
            Err(e) => return Err(e.into()),
        };
        print_event(&ev, mode, max_cards);
        return Ok(());
    }

    let (handle, refresh_task) = spawn_refresh_loop(pipeline, providers, cfg.fetch_timeout());
    let ticker = spawn_ticker(
        &handle,
        std::time::Duration::from_secs(cfg.fetch.refresh_interval_secs.max(1)),
    );
    let mut events = handle.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            changed = events.changed() => {
                if changed.is_err() {
                    break;
                }
                let latest = events.borrow_and_update().clone();
                if let Some(ev) = latest {
                    print_event(&ev, mode, max_cards);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                match line.trim().to_ascii_lowercase().as_str() {
                    "r" => {
                        if !handle.trigger(Trigger::Manual).await {
                            break;
                        }
                    }
                    "q" => break,
                    "" => {}
                    other => {
                        let next = if other == "t" {
                            Ok(mode.toggled())
                        } else {
                            ViewMode::from_str(other)
                        };
                        match next {
                            Ok(m) => {
                                mode = m;
                                match handle.latest() {
                                    Some(ev) => print_event(&ev, mode, max_cards),
                                    None => println!("view: {} (waiting for first refresh)", mode.as_str()),
                                }
                            }
                            Err(_) => println!("unknown command {other:?}"),
                        }
                    }
                }
            }
        }
    }

    ticker.abort();
    drop(events);
    drop(handle);
    let pipeline = refresh_task.await.context("refresh loop panicked")?;
    tracing::info!(stored = pipeline.store().len(), "asset-insight stopped");
    Ok(())
}
