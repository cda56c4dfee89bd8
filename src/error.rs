//! Error types shared by the insight pipeline.

use thiserror::Error;

/// Errors surfaced by the library.
///
/// Only `Config` is fatal; the rest are recovered per source or per item.
#[derive(Debug, Error)]
pub enum InsightError {
    /// Network or parse failure on a single feed source.
    #[error("fetch failed for {feed}: {reason}")]
    Fetch { feed: String, reason: String },

    /// Text that could not be scored (empty after normalization, no tokens).
    #[error("scoring degraded: {0}")]
    ScoringDegraded(String),

    /// Missing or invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Every source was attempted and none produced a single item.
    #[error("no items fetched from {attempted} source(s)")]
    NothingFetched { attempted: usize },

    /// Reading or appending the history log failed.
    #[error("history log: {0}")]
    HistoryLog(#[from] std::io::Error),
}

impl InsightError {
    pub fn fetch(feed: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            feed: feed.into(),
            reason: reason.to_string(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

pub type Result<T, E = InsightError> = std::result::Result<T, E>;
