//! # Sentiment Scorer
//! Lexicon-based compound polarity in `[-1, 1]`.
//!
//! Per-token valences come from `sentiment_lexicon.json`. A valence is
//! strengthened or weakened by an intensifier up to three tokens before it,
//! flipped (and damped) by a negator in the same range, and re-weighted around
//! a contrastive "but". The raw sum is squashed with `x / sqrt(x^2 + 15)`.
//!
//! Text with no domain lexicon hit falls back to the VADER compound score,
//! so general-purpose wording ("delighted", "furious") still registers.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vader_sentiment::SentimentIntensityAnalyzer;

use crate::error::{InsightError, Result};

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../sentiment_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).expect("valid sentiment lexicon")
});

static VADER: Lazy<SentimentIntensityAnalyzer<'static>> = Lazy::new(SentimentIntensityAnalyzer::new);

/// Label thresholds on the compound score.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

const NORMALIZATION_ALPHA: f64 = 15.0;
const NEGATION_SCALAR: f64 = -0.74;
const BOOSTER_INCR: f64 = 0.293;
const EXCLAMATION_INCR: f64 = 0.292;
const MAX_EXCLAMATIONS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SentimentLabel::Positive => "positive",
            SentimentLabel::Neutral => "neutral",
            SentimentLabel::Negative => "negative",
        }
    }
}

/// How strongly an item leans either way, independent of direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Conviction {
    Low,
    Medium,
    High,
}

impl Conviction {
    pub fn from_score(score: f64) -> Self {
        let s = score.abs();
        if s >= 0.6 {
            Conviction::High
        } else if s >= 0.3 {
            Conviction::Medium
        } else {
            Conviction::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Conviction::Low => "low",
            Conviction::Medium => "medium",
            Conviction::High => "high",
        }
    }
}

/// Result of scoring one text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sentiment {
    pub score: f64,
    pub label: SentimentLabel,
}

impl Sentiment {
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
        }
    }

    fn from_score(score: f64) -> Self {
        let score = if score.is_finite() {
            score.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        Self {
            score,
            label: SentimentLabel::from_score(score),
        }
    }

    pub fn conviction(&self) -> Conviction {
        Conviction::from_score(self.score)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_valence(&self, w: &str) -> f64 {
        LEXICON.get(w).copied().unwrap_or(0.0)
    }

    /// Score `text`, or report `ScoringDegraded` when it has no tokens.
    pub fn try_score(&self, text: &str) -> Result<Sentiment> {
        let tokens: Vec<String> = tokenize(text).collect();
        if tokens.is_empty() {
            return Err(InsightError::ScoringDegraded(
                "no scoreable tokens in text".to_string(),
            ));
        }

        let but_at = tokens.iter().position(|t| t == "but");
        let mut sum = 0.0f64;
        let mut hits = 0usize;

        for (i, tok) in tokens.iter().enumerate() {
            let base = self.word_valence(tok);
            if base == 0.0 {
                continue;
            }
            hits += 1;
            let mut v = base;

            // intensifiers in the previous 1..=3 tokens, damped by distance
            for k in 1..=3usize {
                if i < k {
                    break;
                }
                let b = booster(tokens[i - k].as_str());
                if b != 0.0 {
                    let damp = 1.0 - 0.05 * (k as f64 - 1.0);
                    v += b * damp * v.signum();
                }
            }

            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            if negated {
                v *= NEGATION_SCALAR;
            }

            if let Some(b) = but_at {
                if i < b {
                    v *= 0.5;
                } else if i > b {
                    v *= 1.5;
                }
            }

            sum += v;
        }

        if hits == 0 {
            return Ok(Sentiment::from_score(general_compound(text)));
        }

        if sum != 0.0 {
            let bangs = text.chars().filter(|&c| c == '!').count().min(MAX_EXCLAMATIONS);
            sum += sum.signum() * bangs as f64 * EXCLAMATION_INCR;
        }

        Ok(Sentiment::from_score(normalize(sum)))
    }

    /// Infallible variant: degraded input scores as neutral.
    pub fn score(&self, text: &str) -> Sentiment {
        match self.try_score(text) {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(target: "pipeline", error = %e, "scoring degraded, using neutral");
                metrics::counter!("insight_scoring_degraded_total").increment(1);
                Sentiment::neutral()
            }
        }
    }
}

/// VADER compound for text the domain lexicon says nothing about.
fn general_compound(text: &str) -> f64 {
    VADER
        .polarity_scores(text)
        .get("compound")
        .copied()
        .unwrap_or(0.0)
}

fn normalize(sum: f64) -> f64 {
    sum / (sum * sum + NORMALIZATION_ALPHA).sqrt()
}

/// Lowercased word tokens; apostrophes stay inside words ("isn't").
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
            | "nor"
    )
}

fn booster(tok: &str) -> f64 {
    match tok {
        "very" | "extremely" | "highly" | "hugely" | "massive" | "massively" | "sharply"
        | "significantly" | "strongly" | "deeply" | "major" | "huge" => BOOSTER_INCR,
        "slightly" | "somewhat" | "barely" | "marginally" | "mildly" | "modestly" => {
            -BOOSTER_INCR
        }
        _ => 0.0,
    }
}
