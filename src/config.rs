// src/config.rs
//! Immutable runtime configuration, loaded once at startup.
//!
//! Lookup order:
//! 1) `$INSIGHT_CONFIG_PATH` (must exist)
//! 2) `config/insight.toml`
//! 3) built-in defaults
//!
//! Every value is validated before the pipeline is built; a failure is a
//! `ConfigError` and the binary refuses to start.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{InsightError, Result};
use crate::tagger::{TagCategory, TagRule};

pub const ENV_CONFIG_PATH: &str = "INSIGHT_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/insight.toml";

/// The rolling window is fixed; the option exists so files can state it.
pub const RETENTION_HOURS: u32 = 24;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InsightConfig {
    #[serde(default)]
    pub insight: InsightSection,
    #[serde(default)]
    pub fetch: FetchSection,
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedSource>,
    #[serde(default = "TagRule::default_set", deserialize_with = "de_tags")]
    pub tags: BTreeMap<TagCategory, TagRule>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct InsightSection {
    pub high_impact_threshold: f64,
    pub bucket_size_minutes: u32,
    pub retention_hours: u32,
    pub sentiment_weight: f64,
    /// `|score|` at which `HighVolatility` is added regardless of keywords.
    pub volatility_trigger: Option<f64>,
    pub max_cards: usize,
    pub per_feed: usize,
    pub history_path: PathBuf,
}

impl Default for InsightSection {
    fn default() -> Self {
        Self {
            high_impact_threshold: 0.6,
            bucket_size_minutes: 60,
            retention_hours: RETENTION_HOURS,
            sentiment_weight: 1.0,
            volatility_trigger: Some(0.6),
            max_cards: 10,
            per_feed: 6,
            history_path: PathBuf::from("output/history.jsonl"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FetchSection {
    pub timeout_secs: u64,
    pub refresh_interval_secs: u64,
    pub user_agent: String,
}

impl Default for FetchSection {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            refresh_interval_secs: 300,
            user_agent: concat!("asset-insight/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// One RSS endpoint. `name` overrides the channel title as display source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FeedSource {
    #[serde(default)]
    pub name: Option<String>,
    pub url: String,
}

fn de_tags<'de, D>(d: D) -> std::result::Result<BTreeMap<TagCategory, TagRule>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = BTreeMap::<String, TagRule>::deserialize(d)?;
    raw.into_iter()
        .map(|(k, v)| {
            TagCategory::from_key(&k)
                .map(|cat| (cat, v))
                .ok_or_else(|| serde::de::Error::custom(format!("unknown tag category {k:?}")))
        })
        .collect()
}

fn default_feeds() -> Vec<FeedSource> {
    [
        ("Cointelegraph", "https://cointelegraph.com/rss"),
        ("CoinDesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
        ("Bitcoin.com", "https://news.bitcoin.com/feed/"),
    ]
    .into_iter()
    .map(|(name, url)| FeedSource {
        name: Some(name.to_string()),
        url: url.to_string(),
    })
    .collect()
}

impl Default for InsightConfig {
    fn default() -> Self {
        Self {
            insight: InsightSection::default(),
            fetch: FetchSection::default(),
            feeds: default_feeds(),
            tags: TagRule::default_set(),
        }
    }
}

impl InsightConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: InsightConfig =
            toml::from_str(s).map_err(|e| InsightError::config(format!("toml: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            InsightError::config(format!("reading config from {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Load using env var + fallbacks.
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(InsightError::config(format!(
                    "{ENV_CONFIG_PATH} points to non-existent path {}",
                    pb.display()
                )));
            }
            return Self::load_from(&pb);
        }
        let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
        if fallback.exists() {
            return Self::load_from(&fallback);
        }
        let cfg = Self::default();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        let s = &self.insight;
        if !s.high_impact_threshold.is_finite() || s.high_impact_threshold < 0.0 {
            return Err(InsightError::config(
                "high_impact_threshold must be a finite, non-negative number",
            ));
        }
        if !(1..=24 * 60).contains(&s.bucket_size_minutes) {
            return Err(InsightError::config(
                "bucket_size_minutes must be between 1 and 1440",
            ));
        }
        if s.retention_hours != RETENTION_HOURS {
            return Err(InsightError::config(format!(
                "retention_hours is fixed at {RETENTION_HOURS}, got {}",
                s.retention_hours
            )));
        }
        if !s.sentiment_weight.is_finite() || s.sentiment_weight < 0.0 {
            return Err(InsightError::config(
                "sentiment_weight must be a finite, non-negative number",
            ));
        }
        if let Some(v) = s.volatility_trigger {
            if !(0.0..=1.0).contains(&v) {
                return Err(InsightError::config("volatility_trigger must be within [0, 1]"));
            }
        }
        if s.per_feed == 0 {
            return Err(InsightError::config("per_feed must be at least 1"));
        }
        if self.fetch.timeout_secs == 0 {
            return Err(InsightError::config("fetch.timeout_secs must be at least 1"));
        }
        if self.feeds.is_empty() {
            return Err(InsightError::config("at least one feed source is required"));
        }
        for f in &self.feeds {
            if !(f.url.starts_with("http://") || f.url.starts_with("https://")) {
                return Err(InsightError::config(format!("feed url {:?} is not http(s)", f.url)));
            }
        }
        for cat in TagCategory::ALL {
            let rule = self
                .tags
                .get(&cat)
                .ok_or_else(|| InsightError::config(format!("missing keyword set for {cat:?}")))?;
            if rule.keywords.iter().all(|k| k.trim().is_empty()) {
                return Err(InsightError::config(format!("empty keyword set for {cat:?}")));
            }
            if !rule.weight.is_finite() || rule.weight < 0.0 {
                return Err(InsightError::config(format!(
                    "weight for {cat:?} must be a finite, non-negative number"
                )));
            }
        }
        Ok(())
    }

    pub fn bucket_size(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.insight.bucket_size_minutes))
    }

    pub fn fetch_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.fetch.timeout_secs)
    }

    pub fn tag_weights(&self) -> BTreeMap<TagCategory, f64> {
        self.tags.iter().map(|(k, v)| (*k, v.weight)).collect()
    }
}
