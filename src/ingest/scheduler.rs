// src/ingest/scheduler.rs
//! Serialized refresh loop.
//!
//! Triggers (timer ticks or manual requests) arrive on an mpsc channel and are
//! handled one at a time. While a refresh is still fetching, a newer trigger
//! cancels it: the in-flight fetch future is dropped before anything is
//! scored or recorded, and the newer trigger starts a fresh run. Results are
//! published on a `watch` channel as immutable snapshots.

use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::InsightError;
use crate::ingest::fetch_all;
use crate::ingest::types::FeedProvider;
use crate::insight::Snapshot;
use crate::pipeline::InsightPipeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Timer,
    Manual,
}

/// What the loop publishes after each completed refresh.
#[derive(Debug, Clone)]
pub enum RefreshEvent {
    Ready(Arc<Snapshot>),
    /// Zero items from every source; `previous` is what the store still holds.
    Empty {
        attempted: usize,
        failed_sources: Vec<String>,
        previous: Arc<Snapshot>,
    },
}

#[derive(Clone)]
pub struct RefreshHandle {
    triggers: mpsc::Sender<Trigger>,
    events: watch::Receiver<Option<RefreshEvent>>,
}

impl RefreshHandle {
    /// Queue a refresh. Returns `false` once the loop has stopped.
    pub async fn trigger(&self, t: Trigger) -> bool {
        self.triggers.send(t).await.is_ok()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<RefreshEvent>> {
        self.events.clone()
    }

    pub fn latest(&self) -> Option<RefreshEvent> {
        self.events.borrow().clone()
    }
}

struct RefreshLoop {
    pipeline: InsightPipeline,
    providers: Vec<Box<dyn FeedProvider>>,
    timeout: Duration,
    triggers: mpsc::Receiver<Trigger>,
    publish: watch::Sender<Option<RefreshEvent>>,
}

/// Spawn the loop. It ends when every `RefreshHandle` has been dropped and
/// returns the pipeline so callers can inspect the final store.
pub fn spawn_refresh_loop(
    pipeline: InsightPipeline,
    providers: Vec<Box<dyn FeedProvider>>,
    timeout: Duration,
) -> (RefreshHandle, JoinHandle<InsightPipeline>) {
    let (tx, rx) = mpsc::channel(16);
    let (publish, events) = watch::channel(None);
    let lp = RefreshLoop {
        pipeline,
        providers,
        timeout,
        triggers: rx,
        publish,
    };
    let join = tokio::spawn(lp.run());
    (
        RefreshHandle {
            triggers: tx,
            events,
        },
        join,
    )
}

/// Send `Trigger::Timer` every `every`, starting immediately.
pub fn spawn_ticker(handle: &RefreshHandle, every: Duration) -> JoinHandle<()> {
    let tx = handle.triggers.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match tx.try_send(Trigger::Timer) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            }
        }
    })
}

impl RefreshLoop {
    async fn run(mut self) -> InsightPipeline {
        let mut pending: Option<Trigger> = None;
        let mut closed = false;

        loop {
            let mut trigger = match pending.take() {
                Some(t) => t,
                None if closed => break,
                None => match self.triggers.recv().await {
                    Some(t) => t,
                    None => break,
                },
            };
            // coalesce whatever queued up while idle
            while let Ok(t) = self.triggers.try_recv() {
                trigger = t;
            }
            tracing::debug!(target: "ingest", ?trigger, "refresh started");

            let fetch = fetch_all(&self.providers, self.timeout);
            tokio::pin!(fetch);

            let outcome = tokio::select! {
                out = &mut fetch => out,
                next = self.triggers.recv() => match next {
                    Some(t) => {
                        tracing::info!(target: "ingest", ?trigger, superseded_by = ?t, "refresh superseded, discarding in-flight run");
                        counter!("insight_refresh_superseded_total").increment(1);
                        pending = Some(t);
                        continue;
                    }
                    None => {
                        // all handles gone: finish this run, then stop
                        closed = true;
                        (&mut fetch).await
                    }
                },
            };

            let now = Utc::now();
            let failed_sources = outcome.failed_sources();
            let event = match self.pipeline.ingest(outcome, now) {
                Ok(snap) => RefreshEvent::Ready(Arc::new(snap)),
                Err(InsightError::NothingFetched { attempted }) => RefreshEvent::Empty {
                    attempted,
                    failed_sources,
                    previous: Arc::new(self.pipeline.snapshot(now)),
                },
                Err(e) => {
                    tracing::error!(target: "ingest", error = %e, "refresh failed");
                    continue;
                }
            };
            self.publish.send_replace(Some(event));
        }

        tracing::debug!(target: "ingest", "refresh loop stopped");
        self.pipeline
    }
}
