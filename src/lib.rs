// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod error;
pub mod history;
pub mod insight;
pub mod pipeline;
pub mod ranker;
pub mod render;
pub mod rolling;
pub mod sentiment;
pub mod tagger;

// Feed fetching, normalization and the refresh scheduler
pub mod ingest;

// ---- Re-exports for stable public API ----
pub use crate::config::InsightConfig;
pub use crate::error::{InsightError, Result};
pub use crate::ingest::types::{FeedProvider, NewsItem};
pub use crate::insight::{ScoredItem, Snapshot, ViewMode};
pub use crate::pipeline::InsightPipeline;
