// src/ingest/types.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One normalized news entry, immutable once fetched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsItem {
    /// Stable id derived from the link, or title + timestamp without one.
    pub id: String,
    pub title: String,
    /// Display summary (markup stripped, original casing).
    pub summary: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub link: Option<String>,
}

impl NewsItem {
    /// Build an item and derive its id.
    pub fn new(
        title: impl Into<String>,
        summary: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
        link: Option<String>,
    ) -> Self {
        let title = title.into();
        let link = link.filter(|l| !l.trim().is_empty());
        let id = derive_id(link.as_deref(), &title, published_at);
        Self {
            id,
            title,
            summary: summary.into(),
            source: source.into(),
            published_at,
            link,
        }
    }

    /// Build an item whose feed gave no usable publish time.
    ///
    /// `published_at` is the fetch time, which changes every cycle, so a
    /// link-less entry is keyed on source, title and the raw `pubDate` text.
    pub fn undated(
        title: impl Into<String>,
        summary: impl Into<String>,
        source: impl Into<String>,
        fetched_at: DateTime<Utc>,
        link: Option<String>,
        raw_pub_date: Option<&str>,
    ) -> Self {
        let title = title.into();
        let source = source.into();
        let link = link.filter(|l| !l.trim().is_empty());
        let id = match link.as_deref() {
            Some(l) => derive_id(Some(l), &title, fetched_at),
            None => derive_undated_id(&source, &title, raw_pub_date),
        };
        Self {
            id,
            title,
            summary: summary.into(),
            source,
            published_at: fetched_at,
            link,
        }
    }

    /// Title and summary joined, as fed to the scorer and tagger.
    pub fn full_text(&self) -> String {
        if self.summary.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n{}", self.title, self.summary)
        }
    }
}

/// 16 hex chars of SHA-256 over the link (or title + unix timestamp).
pub fn derive_id(link: Option<&str>, title: &str, published_at: DateTime<Utc>) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    match link.map(str::trim).filter(|l| !l.is_empty()) {
        Some(l) => {
            hasher.update(b"link:");
            hasher.update(l.as_bytes());
        }
        None => {
            hasher.update(b"title:");
            hasher.update(title.trim().to_lowercase().as_bytes());
            hasher.update(published_at.timestamp().to_le_bytes());
        }
    }
    short_hex(&hasher.finalize())
}

/// Id for a link-less entry without a parseable timestamp.
pub fn derive_undated_id(source: &str, title: &str, raw_pub_date: Option<&str>) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(b"undated:");
    hasher.update(source.trim().to_lowercase().as_bytes());
    hasher.update(b"\0");
    hasher.update(title.trim().to_lowercase().as_bytes());
    hasher.update(b"\0");
    hasher.update(raw_pub_date.unwrap_or_default().trim().as_bytes());
    short_hex(&hasher.finalize())
}

fn short_hex(digest: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait::async_trait]
pub trait FeedProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn id_prefers_link_over_title() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let a = NewsItem::new("A", "", "X", t, Some("https://x/1".into()));
        let b = NewsItem::new("B", "", "Y", t + chrono::Duration::hours(1), Some("https://x/1".into()));
        assert_eq!(a.id, b.id);
        assert_eq!(a.id.len(), 16);
    }

    #[test]
    fn id_without_link_uses_title_and_time() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let a = NewsItem::new("Same", "", "X", t, None);
        let b = NewsItem::new("Same", "", "X", t, Some("  ".into()));
        let c = NewsItem::new("Same", "", "X", t + chrono::Duration::seconds(1), None);
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert!(b.link.is_none());
    }

    #[test]
    fn undated_id_ignores_fetch_time() {
        let t = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let later = t + chrono::Duration::minutes(5);
        let a = NewsItem::undated("Same", "", "Wire", t, None, Some("not a date"));
        let b = NewsItem::undated("Same", "", "Wire", later, None, Some("not a date"));
        let other_source = NewsItem::undated("Same", "", "Desk", t, None, Some("not a date"));
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, other_source.id);
        assert_eq!(b.published_at, later);
    }
}
