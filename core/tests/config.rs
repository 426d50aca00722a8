//! Config files and the seed replay path.
//!
//! This binary is the only one that sets `TIMESCOPE_SEED`, and only
//! `seed_from_environment_replays_fixtures` builds a harness.

use std::path::PathBuf;
use std::sync::Arc;
use timescope_core::{
    calendar::ymd,
    clock::{Clock, FixedTimeSource},
    config::{HarnessConfig, SEED_ENV_VAR},
    AttributeSpec, FixtureDefinition, Harness, Overrides,
};

fn temp_file(name: &str, content: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("timescope-{}-{name}", std::process::id()));
    std::fs::write(&path, content).expect("write temp config");
    path
}

#[test]
fn load_reads_a_json_file() {
    let path = temp_file(
        "full.json",
        r#"{"seed": 42, "frozen_at": "2017-05-06T00:00:00Z", "timestamp_attribute": "placed_at"}"#,
    );
    let config = HarnessConfig::load(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.seed, Some(42));
    assert_eq!(config.frozen_at, Some(ymd(2017, 5, 6).unwrap()));
    assert_eq!(config.timestamp_attribute, "placed_at");
}

#[test]
fn load_fills_missing_fields() {
    let path = temp_file("partial.json", r#"{"seed": 7}"#);
    let config = HarnessConfig::load(path.to_str().unwrap()).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.seed, Some(7));
    assert_eq!(config.frozen_at, None);
    assert_eq!(config.timestamp_attribute, "created_at");
}

#[test]
fn load_reports_unreadable_file() {
    let path = std::env::temp_dir().join(format!("timescope-{}-missing.json", std::process::id()));
    let err = HarnessConfig::load(path.to_str().unwrap()).unwrap_err();
    assert!(err.to_string().starts_with("Cannot read"), "{err}");
    assert!(err.to_string().contains("missing.json"), "{err}");
}

#[test]
fn load_reports_bad_json() {
    let path = temp_file("broken.json", r#"{"seed": "not a number""#);
    let err = HarnessConfig::load(path.to_str().unwrap()).unwrap_err();
    std::fs::remove_file(&path).ok();
    assert!(err.to_string().starts_with("Cannot parse"), "{err}");
}

#[test]
fn seed_from_environment_replays_fixtures() {
    let clock = Arc::new(Clock::with_source(Box::new(FixedTimeSource(ymd(2026, 10, 18).unwrap()))));
    let definition = || FixtureDefinition::new("user").attribute("admin", AttributeSpec::flag());

    std::env::set_var(SEED_ENV_VAR, "42");
    let mut replayed = Harness::from_config(Arc::clone(&clock), &HarnessConfig::default()).unwrap();
    let mut overridden = Harness::from_config(Arc::clone(&clock), &HarnessConfig::default_test()).unwrap();

    std::env::set_var(SEED_ENV_VAR, "0x2A");
    let hex = Harness::from_config(Arc::clone(&clock), &HarnessConfig::default()).unwrap();

    std::env::set_var(SEED_ENV_VAR, "forty-two");
    let invalid = Harness::from_config(Arc::clone(&clock), &HarnessConfig::default());
    std::env::remove_var(SEED_ENV_VAR);

    assert_eq!(replayed.fixtures().seed(), 42);
    assert_eq!(overridden.fixtures().seed(), 42, "the variable beats the configured seed");
    assert_eq!(hex.config().seed, Some(42));
    assert!(invalid.is_err());

    let mut explicit = Harness::new(Arc::clone(&clock), 42);
    replayed.register(definition()).unwrap();
    explicit.register(definition()).unwrap();
    let a = replayed.fixtures().build_list("user", 10, &Overrides::new()).unwrap();
    let b = explicit.fixtures().build_list("user", 10, &Overrides::new()).unwrap();
    assert_eq!(a, b);
}
