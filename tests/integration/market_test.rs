//! Market boundary integration tests

use arb_sentinel::config::Config;
use arb_sentinel::market::{BookmakerRegistry, StaticBookmakerRegistry, Tick, TickError};
use serde_json::json;

fn registry() -> StaticBookmakerRegistry {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    StaticBookmakerRegistry::new(config.bookmakers)
}

#[test]
fn test_registry_from_example_config() {
    let registry = registry();
    assert_eq!(registry.len(), 2);

    let pinnacle = registry.resolve("PIN").unwrap();
    assert_eq!(pinnacle.id, "pinnacle");
    assert!(registry.resolve("UNKNOWN").is_none());
}

#[test]
fn test_rotation_numbers_per_sport() {
    let registry = registry();
    assert_eq!(
        registry.generate_rotation_number("pinnacle", "nfl", 7).as_deref(),
        Some("107")
    );
    assert_eq!(
        registry.generate_rotation_number("betfair", "nba", 1).as_deref(),
        Some("701")
    );
    assert!(registry.generate_rotation_number("betfair", "nfl", 1).is_none());
    assert!(registry.generate_rotation_number("nobody", "nba", 1).is_none());
}

#[test]
fn test_tick_parse_errors_are_descriptive() {
    let err = Tick::parse(&json!({"gameId": "g1", "odds": {"home": true, "away": 100}, "exchange": "PIN", "timestamp": "2026-03-01T12:00:00Z"}))
        .unwrap_err();
    assert_eq!(err, TickError::NonNumericOdds("home"));
    assert_eq!(err.to_string(), "Odds field home is not numeric");

    let err = Tick::parse(&json!({"gameId": "g1"})).unwrap_err();
    assert_eq!(err, TickError::MissingField("odds"));
}

#[test]
fn test_tick_parse_rejects_bad_timestamp() {
    let err = Tick::parse(&json!({"gameId": "g1", "odds": {"home": -110, "away": 100}, "exchange": "PIN", "timestamp": "yesterday"}))
        .unwrap_err();
    assert!(matches!(err, TickError::Malformed(_)));
}
