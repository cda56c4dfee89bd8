// src/ingest/rss.rs
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::config::FeedSource;
use crate::error::{InsightError, Result};
use crate::ingest::types::{FeedProvider, NewsItem};
use crate::ingest::{normalize_text, truncate_summary, SUMMARY_MAX_CHARS};

const UNKNOWN_SOURCE: &str = "Unknown Source";

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// RFC 2822 first (RSS), RFC 3339 as a fallback for feeds that ignore the spec.
fn parse_pub_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    let unix = OffsetDateTime::parse(ts, &Rfc2822)
        .or_else(|_| OffsetDateTime::parse(ts, &Rfc3339))
        .map(|dt| dt.unix_timestamp())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|dt| dt.timestamp())
        })?;
    DateTime::<Utc>::from_timestamp(unix, 0)
}

/// Channel title plus the raw `<item>` spans of one document.
#[derive(Debug, Default)]
struct FeedSkeleton<'a> {
    channel_title: Option<String>,
    items: Vec<&'a str>,
    /// The document broke off after at least one complete item.
    truncated: bool,
}

/// Streaming pass over the document that only locates entries, so each
/// `<item>` can be deserialized (and rejected) on its own.
fn scan_feed(xml: &str) -> std::result::Result<FeedSkeleton<'_>, String> {
    let mut reader = Reader::from_str(xml);
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut out = FeedSkeleton::default();
    let mut saw_channel = false;

    loop {
        let ev = match reader.read_event() {
            Ok(ev) => ev,
            Err(e) if out.items.is_empty() => {
                return Err(format!("at byte {}: {e}", reader.error_position()))
            }
            Err(_) => {
                out.truncated = true;
                break;
            }
        };
        match ev {
            Event::Start(e) => {
                let in_channel = path.last().is_some_and(|p| p.as_slice() == b"channel");
                match e.local_name().as_ref() {
                    b"item" if in_channel => {
                        // the start tag ends at the current position; its `<` is the last one before it
                        let open_end = reader.buffer_position() as usize;
                        let start = xml[..open_end].rfind('<').unwrap_or(0);
                        let end = e.to_end().into_owned();
                        match reader.read_to_end(end.name()) {
                            Ok(_) => {
                                let after = reader.buffer_position() as usize;
                                out.items.push(&xml[start..after]);
                            }
                            Err(e) if out.items.is_empty() => {
                                return Err(format!("at byte {}: {e}", reader.error_position()))
                            }
                            Err(_) => {
                                out.truncated = true;
                                break;
                            }
                        }
                    }
                    b"title" if in_channel => {
                        let end = e.to_end().into_owned();
                        let raw = reader
                            .read_text(end.name())
                            .map_err(|e| format!("channel title: {e}"))?;
                        out.channel_title = Some(strip_cdata(&raw).to_string());
                    }
                    name => {
                        if name == b"channel" {
                            saw_channel = true;
                        }
                        path.push(name.to_vec());
                    }
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => {
                if !path.is_empty() {
                    if out.items.is_empty() {
                        return Err("unexpected end of document".to_string());
                    }
                    out.truncated = true;
                }
                break;
            }
            _ => {}
        }
    }

    if !saw_channel {
        return Err("no <channel> element".to_string());
    }
    Ok(out)
}

fn strip_cdata(s: &str) -> &str {
    let t = s.trim();
    t.strip_prefix("<![CDATA[")
        .and_then(|r| r.strip_suffix("]]>"))
        .unwrap_or(t)
}

/// RSS 2.0 provider, either over HTTP or from an in-memory document.
pub struct RssFeedProvider {
    name: String,
    /// Display source; channel title is used when `None`.
    source_override: Option<String>,
    per_feed: usize,
    mode: Mode,
}

enum Mode {
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

impl RssFeedProvider {
    pub fn from_fixture(name: &str, xml: &str) -> Self {
        Self {
            name: name.to_string(),
            source_override: Some(name.to_string()),
            per_feed: usize::MAX,
            mode: Mode::Fixture(xml.to_string()),
        }
    }

    pub fn from_source(src: &FeedSource, client: reqwest::Client) -> Self {
        Self {
            name: src.name.clone().unwrap_or_else(|| src.url.clone()),
            source_override: src.name.clone(),
            per_feed: usize::MAX,
            mode: Mode::Http {
                url: src.url.clone(),
                client,
            },
        }
    }

    /// Only the first `n` entries of the feed are used.
    pub fn with_per_feed(mut self, n: usize) -> Self {
        self.per_feed = n.max(1);
        self
    }

    fn parse_items_from_str(&self, s: &str, fetched_at: DateTime<Utc>) -> Result<Vec<NewsItem>> {
        let t0 = std::time::Instant::now();
        let xml_clean = scrub_html_entities_for_xml(s);
        let feed = scan_feed(&xml_clean).map_err(|e| InsightError::fetch(&self.name, e))?;
        if feed.truncated {
            tracing::warn!(target: "ingest", provider = %self.name, kept = feed.items.len(), "feed document cut short, keeping complete entries");
        }

        let source = self
            .source_override
            .clone()
            .or_else(|| {
                feed.channel_title
                    .as_deref()
                    .map(normalize_text)
                    .filter(|t| !t.is_empty())
            })
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

        let mut out = Vec::new();
        let mut skipped = 0usize;
        for span in feed.items.into_iter().take(self.per_feed) {
            let it: Item = match from_str(span) {
                Ok(it) => it,
                Err(e) => {
                    tracing::debug!(target: "ingest", provider = %self.name, error = %e, "skipping malformed entry");
                    skipped += 1;
                    continue;
                }
            };
            let title = normalize_text(it.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                skipped += 1;
                continue;
            }
            let summary = truncate_summary(
                &normalize_text(it.description.as_deref().unwrap_or_default()),
                SUMMARY_MAX_CHARS,
            );
            let link = it.link.map(|l| l.trim().to_string());
            let raw_date = it.pub_date.as_deref().map(str::trim);
            match raw_date.and_then(parse_pub_date) {
                Some(published_at) => {
                    out.push(NewsItem::new(title, summary, source.clone(), published_at, link))
                }
                None => {
                    tracing::debug!(target: "ingest", provider = %self.name, raw = ?raw_date, "no usable pubDate, using fetch time");
                    out.push(NewsItem::undated(
                        title,
                        summary,
                        source.clone(),
                        fetched_at,
                        link,
                        raw_date,
                    ));
                }
            }
        }

        if skipped > 0 {
            tracing::debug!(target: "ingest", provider = %self.name, skipped, "skipped malformed entries");
        }

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("insight_parse_ms").record(ms);
        counter!("insight_items_fetched_total").increment(out.len() as u64);
        Ok(out)
    }
}

#[async_trait]
impl FeedProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let fetched_at = Utc::now();
        match &self.mode {
            Mode::Fixture(s) => self.parse_items_from_str(s, fetched_at),
            Mode::Http { url, client } => {
                let body = client
                    .get(url.as_str())
                    .send()
                    .await
                    .and_then(|r| r.error_for_status())
                    .map_err(|e| InsightError::fetch(&self.name, e))?
                    .text()
                    .await
                    .map_err(|e| InsightError::fetch(&self.name, e))?;
                self.parse_items_from_str(&body, fetched_at)
            }
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// XML only knows five named entities; feeds routinely use HTML ones.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const XML: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Chain Wire</title>
  <link>https://chainwire.example</link>
  <item>
    <title>Bitcoin ETF inflows hit record</title>
    <link>https://chainwire.example/a</link>
    <pubDate>Tue, 04 Mar 2025 09:15:00 +0000</pubDate>
    <description><![CDATA[<p>Funds added&nbsp;<b>$1B</b>.</p>]]></description>
  </item>
  <item>
    <title>   </title>
    <link>https://chainwire.example/broken</link>
  </item>
  <item>
    <title>Exchange outage&hellip;</title>
    <pubDate>not a date</pubDate>
  </item>
</channel></rss>"#;

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 12, 0, 0).unwrap()
    }

    #[test]
    fn parses_items_and_skips_malformed_entries() {
        let p = RssFeedProvider {
            name: "wire".into(),
            source_override: None,
            per_feed: usize::MAX,
            mode: Mode::Fixture(String::new()),
        };
        let items = p.parse_items_from_str(XML, fetched_at()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.source, "Chain Wire");
        assert_eq!(first.summary, "Funds added $1B .");
        assert_eq!(
            first.published_at,
            Utc.with_ymd_and_hms(2025, 3, 4, 9, 15, 0).unwrap()
        );

        let second = &items[1];
        assert_eq!(second.title, "Exchange outage...");
        assert_eq!(second.published_at, fetched_at());
        assert!(second.link.is_none());
    }

    #[test]
    fn per_feed_caps_entries() {
        let p = RssFeedProvider::from_fixture("wire", XML).with_per_feed(1);
        let items = p.parse_items_from_str(XML, fetched_at()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].source, "wire");
    }

    #[test]
    fn broken_document_is_a_fetch_error() {
        let p = RssFeedProvider::from_fixture("wire", "");
        let err = p.parse_items_from_str("<rss><channel>", fetched_at()).unwrap_err();
        assert!(matches!(err, InsightError::Fetch { ref feed, .. } if feed == "wire"));
    }

    #[test]
    fn rfc3339_dates_are_accepted() {
        let d = parse_pub_date("2025-03-04T09:15:00Z").unwrap();
        assert_eq!(d, Utc.with_ymd_and_hms(2025, 3, 4, 9, 15, 0).unwrap());
        assert!(parse_pub_date("yesterday").is_none());
    }

    #[test]
    fn entry_with_nested_markup_is_skipped_alone() {
        let xml = r#"<rss><channel><title>W</title>
  <item><title>Bitcoin climbs</title><link>https://w/1</link></item>
  <item><title>Ether steady</title><description>Price <b>up</b> today</description></item>
  <item><title>Fed holds rates</title><link>https://w/3</link></item>
</channel></rss>"#;
        let p = RssFeedProvider::from_fixture("W", xml);
        let items = p.parse_items_from_str(xml, fetched_at()).unwrap();
        let titles: Vec<_> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Bitcoin climbs", "Fed holds rates"]);
    }

    #[test]
    fn document_cut_short_keeps_complete_entries() {
        let xml = "<rss><channel><item><title>Exchange hacked</title></item><item><title>Cut";
        let p = RssFeedProvider::from_fixture("W", xml);
        let items = p.parse_items_from_str(xml, fetched_at()).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Exchange hacked");
    }

    #[test]
    fn undated_entry_without_link_keeps_its_id_across_fetches() {
        let xml = "<rss><channel><item><title>Exchange hacked, funds stolen</title></item></channel></rss>";
        let p = RssFeedProvider::from_fixture("W", xml);
        let a = p.parse_items_from_str(xml, fetched_at()).unwrap();
        let b = p
            .parse_items_from_str(xml, fetched_at() + chrono::Duration::minutes(5))
            .unwrap();
        assert_eq!(a[0].id, b[0].id);
        assert_ne!(a[0].published_at, b[0].published_at);
    }

    #[test]
    fn html_page_is_not_a_feed() {
        let p = RssFeedProvider::from_fixture("W", "");
        assert!(p
            .parse_items_from_str("<html><body>maintenance</body></html>", fetched_at())
            .is_err());
    }
}
