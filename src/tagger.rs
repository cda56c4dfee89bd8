//! # Trigger Tagger
//! Maps normalized text onto contextual categories by keyword matching.
//!
//! Every category owns a keyword list and an impact weight (see `TagRule`).
//! Keywords are matched case-insensitively on word boundaries; a trailing `*`
//! turns a keyword into a prefix match (`hack*` covers "hacked", "hackers").
//! All matching categories are kept, so an item may carry several tags or none.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::{InsightError, Result};

/// Fixed set of contextual categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagCategory {
    Regulatory,
    MacroEconomic,
    ExchangeSecurity,
    AdoptionInstitutional,
    HighVolatility,
}

impl TagCategory {
    pub const ALL: [TagCategory; 5] = [
        TagCategory::Regulatory,
        TagCategory::MacroEconomic,
        TagCategory::ExchangeSecurity,
        TagCategory::AdoptionInstitutional,
        TagCategory::HighVolatility,
    ];

    /// Config key, e.g. `exchange_security`.
    pub fn key(self) -> &'static str {
        match self {
            TagCategory::Regulatory => "regulatory",
            TagCategory::MacroEconomic => "macro_economic",
            TagCategory::ExchangeSecurity => "exchange_security",
            TagCategory::AdoptionInstitutional => "adoption_institutional",
            TagCategory::HighVolatility => "high_volatility",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.key().eq_ignore_ascii_case(key.trim()))
    }

    /// Label used on cards.
    pub fn label(self) -> &'static str {
        match self {
            TagCategory::Regulatory => "Regulatory",
            TagCategory::MacroEconomic => "Macro",
            TagCategory::ExchangeSecurity => "Exchange / Security",
            TagCategory::AdoptionInstitutional => "Adoption / Institutional",
            TagCategory::HighVolatility => "High Volatility",
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Keyword list plus impact weight for one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRule {
    pub weight: f64,
    pub keywords: Vec<String>,
}

impl TagRule {
    fn seed(weight: f64, keywords: &[&str]) -> Self {
        Self {
            weight,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Built-in keyword sets used when the config file has no `[tags]` table.
    pub fn default_set() -> BTreeMap<TagCategory, TagRule> {
        let mut out = BTreeMap::new();
        out.insert(
            TagCategory::Regulatory,
            TagRule::seed(
                0.35,
                &[
                    "sec", "cftc", "regulation", "regulations", "regulatory", "regulator*",
                    "ban", "bans", "banned", "lawsuit*", "sue", "sues", "sued", "court",
                    "etf", "government", "legislation", "compliance", "unregistered",
                ],
            ),
        );
        out.insert(
            TagCategory::MacroEconomic,
            TagRule::seed(
                0.30,
                &[
                    "fed", "federal reserve", "fomc", "interest rate*", "rate cut*",
                    "rate hike*", "inflation", "cpi", "macro", "economy", "recession",
                    "jobs report", "treasury yield*",
                ],
            ),
        );
        out.insert(
            TagCategory::ExchangeSecurity,
            TagRule::seed(
                0.35,
                &[
                    "exchange", "exchanges", "hack*", "breach*", "exploit*", "security",
                    "attack*", "phishing", "drained", "stolen", "outage", "withdrawal*",
                ],
            ),
        );
        out.insert(
            TagCategory::AdoptionInstitutional,
            TagRule::seed(
                0.20,
                &[
                    "adoption", "partnership*", "institutional", "investment", "fund", "funds",
                    "inflow*", "bank", "banks", "corporate", "treasury", "custody",
                ],
            ),
        );
        out.insert(
            TagCategory::HighVolatility,
            TagRule::seed(
                0.25,
                &[
                    "volatil*", "plunge*", "crash*", "surge*", "soar*", "tumble*",
                    "skyrocket*", "liquidat*", "sell-off", "selloff", "rally", "rallies",
                ],
            ),
        );
        out
    }
}

/// Compiled matcher, one regex per category.
#[derive(Debug, Clone)]
pub struct Tagger {
    rules: Vec<(TagCategory, Regex)>,
}

impl Tagger {
    /// Compile keyword sets. Every category must be present and non-empty.
    pub fn new(sets: &BTreeMap<TagCategory, TagRule>) -> Result<Self> {
        let mut rules = Vec::with_capacity(TagCategory::ALL.len());
        for cat in TagCategory::ALL {
            let rule = sets
                .get(&cat)
                .ok_or_else(|| InsightError::config(format!("missing keyword set for {cat:?}")))?;
            rules.push((cat, compile_keywords(cat, &rule.keywords)?));
        }
        Ok(Self { rules })
    }

    /// Categories whose keyword set matches `text`.
    pub fn tag(&self, text: &str) -> BTreeSet<TagCategory> {
        self.rules
            .iter()
            .filter(|(_, re)| re.is_match(text))
            .map(|(cat, _)| *cat)
            .collect()
    }

    /// First matching keyword per category (for diagnostics).
    pub fn explain(&self, text: &str) -> Vec<(TagCategory, String)> {
        self.rules
            .iter()
            .filter_map(|(cat, re)| re.find(text).map(|m| (*cat, m.as_str().to_lowercase())))
            .collect()
    }
}

fn compile_keywords(cat: TagCategory, keywords: &[String]) -> Result<Regex> {
    let mut alts = Vec::with_capacity(keywords.len());
    for raw in keywords {
        let kw = raw.trim();
        let (stem, prefix) = match kw.strip_suffix('*') {
            Some(s) => (s.trim_end(), true),
            None => (kw, false),
        };
        let edges_ok = stem.chars().next().is_some_and(char::is_alphanumeric)
            && stem.chars().last().is_some_and(char::is_alphanumeric);
        if !edges_ok {
            return Err(InsightError::config(format!(
                "keyword {raw:?} for {cat:?} must start and end with a letter or digit"
            )));
        }
        let body = regex::escape(stem);
        alts.push(if prefix {
            format!(r"{body}\w*")
        } else {
            body
        });
    }
    if alts.is_empty() {
        return Err(InsightError::config(format!("empty keyword set for {cat:?}")));
    }
    let pattern = format!(r"(?iu)\b(?:{})\b", alts.join("|"));
    Regex::new(&pattern).map_err(|e| InsightError::config(format!("keywords for {cat:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tagger() -> Tagger {
        Tagger::new(&TagRule::default_set()).unwrap()
    }

    #[test]
    fn sec_lawsuit_hits_regulatory_and_exchange() {
        let tags = tagger().tag("sec sues major exchange over unregistered securities");
        assert!(tags.contains(&TagCategory::Regulatory));
        assert!(tags.contains(&TagCategory::ExchangeSecurity));
    }

    #[test]
    fn word_boundaries_are_respected() {
        // "sec" must not fire inside "second" or "securities"
        let tags = tagger().tag("second-quarter securities report");
        assert!(!tags.contains(&TagCategory::Regulatory));
        assert!(!tags.contains(&TagCategory::ExchangeSecurity));
    }

    #[test]
    fn prefix_keywords_cover_inflections() {
        let tags = tagger().tag("protocol hacked, attackers drained the pool");
        assert_eq!(
            tags.into_iter().collect::<Vec<_>>(),
            vec![TagCategory::ExchangeSecurity]
        );
    }

    #[test]
    fn no_match_is_empty_set() {
        assert!(tagger().tag("a quiet weekend for developers").is_empty());
    }

    #[test]
    fn missing_category_is_config_error() {
        let mut sets = TagRule::default_set();
        sets.remove(&TagCategory::MacroEconomic);
        let err = Tagger::new(&sets).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn keyword_with_punctuation_edge_is_rejected() {
        let mut sets = TagRule::default_set();
        sets.insert(TagCategory::Regulatory, TagRule::seed(0.3, &["-ban"]));
        assert!(Tagger::new(&sets).is_err());
    }

    #[test]
    fn explain_reports_first_keyword() {
        let hits = tagger().explain("fed signals rate cuts as inflation cools");
        assert_eq!(hits, vec![(TagCategory::MacroEconomic, "fed".to_string())]);
    }
}
