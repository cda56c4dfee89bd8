// tests/sentiment_examples.rs
use asset_insight::config::InsightConfig;
use asset_insight::sentiment::{Conviction, SentimentAnalyzer, SentimentLabel};
use asset_insight::tagger::{TagCategory, Tagger};

fn tagger() -> Tagger {
    Tagger::new(&InsightConfig::default().tags).expect("default keyword sets compile")
}

#[test]
fn lawsuit_headline_is_negative_and_regulatory() {
    let text = "SEC sues major exchange over unregistered securities";
    let s = SentimentAnalyzer::new().score(text);
    assert_eq!(s.label, SentimentLabel::Negative);

    let tags = tagger().tag(text);
    assert!(tags.contains(&TagCategory::Regulatory));
    assert!(tags.contains(&TagCategory::ExchangeSecurity));
}

#[test]
fn adoption_headline_is_positive() {
    let text = "Bitcoin adoption surges as institutional inflows hit record high";
    let s = SentimentAnalyzer::new().score(text);
    assert_eq!(s.label, SentimentLabel::Positive);
    assert!(tagger()
        .tag(text)
        .contains(&TagCategory::AdoptionInstitutional));
}

#[test]
fn scores_stay_in_range_and_labels_follow_thresholds() {
    let analyzer = SentimentAnalyzer::new();
    let texts = [
        "",
        "!!!!!!!!",
        "crash crash crash crash crash crash crash crash fraud theft panic!!!!",
        "success success success upgrade rally surge win win win!!!",
        "the exchange published its quarterly report",
        "not bad, but the outlook is very weak",
    ];
    for t in texts {
        let s = analyzer.score(t);
        assert!((-1.0..=1.0).contains(&s.score), "{t:?} -> {}", s.score);
        let expected = if s.score >= 0.05 {
            SentimentLabel::Positive
        } else if s.score <= -0.05 {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };
        assert_eq!(s.label, expected, "{t:?}");
    }
}

#[test]
fn text_without_lexicon_words_is_neutral() {
    let s = SentimentAnalyzer::new().score("Quarterly report published on Tuesday");
    assert_eq!(s.score, 0.0);
    assert_eq!(s.label, SentimentLabel::Neutral);
    assert_eq!(s.conviction(), Conviction::Low);
}

#[test]
fn empty_text_is_degraded_but_scores_neutral() {
    let analyzer = SentimentAnalyzer::new();
    assert!(analyzer.try_score("  ...  ").is_err());
    assert_eq!(analyzer.score("  ...  ").label, SentimentLabel::Neutral);
}

#[test]
fn matching_is_on_word_boundaries() {
    let t = tagger();
    // "sec" must not fire inside "second"
    assert!(!t.tag("A second look at layer two").contains(&TagCategory::Regulatory));
    assert!(t.tag("The SEC responded").contains(&TagCategory::Regulatory));
    assert!(t.tag("plain market chatter").is_empty());
}

#[test]
fn plain_english_mood_outside_the_crypto_lexicon_still_scores() {
    let analyzer = SentimentAnalyzer::new();
    let glum = analyzer.score("Holders feel miserable and angry after a terrible week");
    assert_eq!(glum.label, SentimentLabel::Negative);
    let cheerful = analyzer.score("Developers are thrilled and grateful for the community");
    assert_eq!(cheerful.label, SentimentLabel::Positive);
}
