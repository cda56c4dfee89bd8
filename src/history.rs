//! history.rs: append-only JSON-lines log of scored items.
//!
//! One line per scored item, stamped with `logged_at`. The log is the
//! session-local source for the 24h trend and is replayed at startup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::insight::ScoredItem;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub logged_at: DateTime<Utc>,
    #[serde(flatten)]
    pub item: ScoredItem,
}

#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one line per item. Parent directories are created on demand.
    pub fn append(&self, items: &[ScoredItem], logged_at: DateTime<Utc>) -> io::Result<usize> {
        if items.is_empty() {
            return Ok(0);
        }
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut w = BufWriter::new(file);
        for it in items {
            let entry = HistoryEntry {
                logged_at,
                item: it.clone(),
            };
            serde_json::to_writer(&mut w, &entry)?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
        Ok(items.len())
    }

    /// Read every well-formed entry. A missing file is an empty history;
    /// malformed lines are skipped with a warning.
    pub fn load(&self) -> io::Result<Vec<HistoryEntry>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut out = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(e) => out.push(e),
                Err(err) => tracing::warn!(
                    target: "history",
                    line = lineno + 1,
                    error = %err,
                    path = %self.path.display(),
                    "skipping malformed history line"
                ),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::types::NewsItem;
    use crate::sentiment::{Conviction, SentimentLabel};
    use crate::tagger::TagCategory;
    use chrono::TimeZone;

    fn sample() -> ScoredItem {
        let t = Utc.with_ymd_and_hms(2025, 7, 1, 8, 0, 0).unwrap();
        ScoredItem {
            item: NewsItem::new("Exchange hacked", "Funds stolen", "Wire", t, None),
            sentiment_score: -0.72,
            sentiment_label: SentimentLabel::Negative,
            conviction: Conviction::High,
            tags: [TagCategory::ExchangeSecurity].into_iter().collect(),
            impact_score: 1.07,
            is_high_impact: true,
        }
    }

    #[test]
    fn append_then_load_skips_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("nested/history.jsonl"));
        let now = Utc::now();

        assert_eq!(log.append(&[sample()], now).unwrap(), 1);
        fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .unwrap()
            .write_all(b"{not json}\n\n")
            .unwrap();
        log.append(&[sample()], now).unwrap();

        let rows = log.load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].item, sample());
    }

    #[test]
    fn missing_file_is_empty_history() {
        let dir = tempfile::tempdir().unwrap();
        let log = HistoryLog::new(dir.path().join("absent.jsonl"));
        assert!(log.load().unwrap().is_empty());
    }
}
