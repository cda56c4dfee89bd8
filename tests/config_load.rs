// tests/config_load.rs
use asset_insight::config::{InsightConfig, ENV_CONFIG_PATH};
use asset_insight::tagger::TagCategory;
use serial_test::serial;
use std::io::Write;

const SAMPLE: &str = include_str!("../config/insight.toml");

#[test]
fn bundled_sample_is_valid() {
    let cfg = InsightConfig::from_toml_str(SAMPLE).expect("sample config parses");
    assert_eq!(cfg.feeds.len(), 3);
    assert_eq!(cfg.tags.len(), TagCategory::ALL.len());
    assert_eq!(cfg.insight.bucket_size_minutes, 60);
}

#[test]
#[serial]
fn env_path_takes_precedence() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        f,
        r#"
[insight]
high_impact_threshold = 0.9
bucket_size_minutes = 30

[[feeds]]
url = "https://example.org/rss"
"#
    )
    .unwrap();

    std::env::set_var(ENV_CONFIG_PATH, f.path());
    let cfg = InsightConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);

    let cfg = cfg.unwrap();
    assert!((cfg.insight.high_impact_threshold - 0.9).abs() < f64::EPSILON);
    assert_eq!(cfg.bucket_size(), chrono::Duration::minutes(30));
    assert_eq!(cfg.feeds.len(), 1);
    assert!(cfg.feeds[0].name.is_none());
}

#[test]
#[serial]
fn missing_env_path_is_fatal() {
    std::env::set_var(ENV_CONFIG_PATH, "/definitely/not/here/insight.toml");
    let err = InsightConfig::load_default().unwrap_err();
    std::env::remove_var(ENV_CONFIG_PATH);
    assert!(err.is_fatal());
}

#[test]
#[serial]
fn invalid_bucket_size_is_fatal() {
    let mut f = tempfile::NamedTempFile::new().unwrap();
    writeln!(f, "[insight]\nbucket_size_minutes = 0").unwrap();
    std::env::set_var(ENV_CONFIG_PATH, f.path());
    let res = InsightConfig::load_default();
    std::env::remove_var(ENV_CONFIG_PATH);
    assert!(res.unwrap_err().is_fatal());
}

#[test]
fn keyword_with_punctuation_edges_fails_pipeline_build() {
    let doc = SAMPLE.replace(r#""custody"]"#, r#""custody", "(unbalanced"]"#);
    let cfg = InsightConfig::from_toml_str(&doc).expect("toml itself is fine");
    let err = asset_insight::pipeline::InsightPipeline::new(&cfg)
        .err()
        .expect("keyword edges are checked when compiling");
    assert!(err.is_fatal());
}
