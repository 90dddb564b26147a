//! End-to-end integration tests

use arb_sentinel::config::Config;
use arb_sentinel::market::Tick;
use arb_sentinel::processor::{RiskControlProcessor, RiskControlService};
use arb_sentinel::risk::{AlertKind, AlertSink, BreakerState, BreakerStatus, DailyLossTracker};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
}

fn pair(game: &str, primary_home: f64, hedge_home: f64, at: DateTime<Utc>) -> (Vec<Tick>, Vec<Tick>) {
    (
        vec![Tick::new(game, primary_home, -primary_home, "PIN", at).unwrap()],
        vec![Tick::new(game, hedge_home, -hedge_home, "BFX", at).unwrap()],
    )
}

#[derive(Default)]
struct RecordingSink {
    alerts: Mutex<Vec<(AlertKind, String)>>,
    trips: Mutex<usize>,
}

impl AlertSink for RecordingSink {
    fn on_trip(&self, _status: &BreakerStatus, _reasons: &[String]) {
        *self.trips.lock().unwrap() += 1;
    }

    fn on_alert(&self, kind: AlertKind, relationship_key: &str) {
        self.alerts
            .lock()
            .unwrap()
            .push((kind, relationship_key.to_string()));
    }
}

#[test]
fn test_config_example_loads() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    assert_eq!(config.breaker.max_consecutive_rejects, 3);
    assert_eq!(config.bookmakers.len(), 2);
}

#[test]
fn test_hard_stop_until_operator_reset() {
    let mut config = Config::default();
    config.breaker.cooldown_ms = 1_000;
    let sink = Arc::new(RecordingSink::default());
    let mut processor = RiskControlProcessor::new(&config)
        .with_alert_sink(sink.clone())
        .with_daily_loss_tracker(DailyLossTracker::new_at(&config.daily_loss, t0()));

    // z = -6 on every probe
    for i in 0..3 {
        let at = t0() + Duration::seconds(i);
        let (primary, hedge) = pair("g1", -140.0, -80.0, at);
        assert!(processor
            .process_cross_market_stream_at(&primary, &hedge, "nba-ml", at)
            .is_empty());
    }

    let status = processor.breaker_status("nba-ml").unwrap();
    assert_eq!(status.consecutive_failures, 3);
    assert!(status.hard_stopped);
    assert_eq!(
        *sink.alerts.lock().unwrap(),
        vec![(AlertKind::HardStop, "nba-ml".to_string())]
    );
    assert_eq!(*sink.trips.lock().unwrap(), 3);

    // Cooldown no longer helps
    let later = t0() + Duration::minutes(10);
    let (primary, hedge) = pair("g1", -125.0, -95.0, later);
    assert!(processor
        .process_cross_market_stream_at(&primary, &hedge, "nba-ml", later)
        .is_empty());

    let report = processor.health_check();
    assert!(report.issues.iter().any(|issue| issue.contains("hard-stopped")));

    assert!(processor.reset_circuit_breaker("nba-ml"));
    assert_eq!(
        processor
            .process_cross_market_stream_at(&primary, &hedge, "nba-ml", later)
            .len(),
        1
    );
    assert_eq!(
        processor.breaker_status("nba-ml").unwrap().state,
        BreakerState::Closed
    );
}

#[test]
fn test_half_open_probe_recovers() {
    let mut config = Config::default();
    config.breaker.cooldown_ms = 1_000;
    let mut processor = RiskControlProcessor::new(&config)
        .with_daily_loss_tracker(DailyLossTracker::new_at(&config.daily_loss, t0()));

    let (primary, hedge) = pair("g1", -140.0, -80.0, t0());
    processor.process_cross_market_stream_at(&primary, &hedge, "nba-ml", t0());

    // Still cooling down
    let soon = t0() + Duration::milliseconds(500);
    let (primary, hedge) = pair("g1", -125.0, -95.0, soon);
    assert!(processor
        .process_cross_market_stream_at(&primary, &hedge, "nba-ml", soon)
        .is_empty());

    let after = t0() + Duration::seconds(2);
    let (primary, hedge) = pair("g1", -125.0, -95.0, after);
    assert_eq!(
        processor
            .process_cross_market_stream_at(&primary, &hedge, "nba-ml", after)
            .len(),
        1
    );
    let status = processor.breaker_status("nba-ml").unwrap();
    assert_eq!(status.state, BreakerState::Closed);
    assert_eq!(status.consecutive_failures, 0);
}

#[test]
fn test_daily_loss_trips_every_relationship() {
    let config = Config::default();
    let mut processor = RiskControlProcessor::new(&config)
        .with_daily_loss_tracker(DailyLossTracker::new_at(&config.daily_loss, t0()));

    for key in ["nba-ml", "nfl-spread", "nba-total"] {
        let (primary, hedge) = pair("g1", -125.0, -95.0, t0());
        processor.process_cross_market_stream_at(&primary, &hedge, key, t0());
    }

    assert!(processor.on_trade_settlement_at("t1", dec!(-8000), t0()));
    assert!(!processor.on_trade_settlement_at("t2", dec!(-3000), t0()));

    let report = processor.health_check();
    assert!(!report.is_healthy);
    assert!(!report.pnl_status.within_limits);
    assert_eq!(report.pnl_status.utilization_pct, 110.0);
    assert_eq!(report.breaker_statuses.len(), 3);
    assert!(report
        .breaker_statuses
        .values()
        .all(|status| status.state == BreakerState::Open));

    processor.reset_daily_loss();
    assert!(processor.daily_loss().is_within_limits());
}

#[tokio::test]
async fn test_raw_replay_through_service() {
    let (handle, task) = RiskControlService::spawn(RiskControlProcessor::new(&Config::default()));
    let now = Utc::now();

    let primary = vec![
        json!({"gameId": "g1", "odds": {"home": -125, "away": 115}, "exchange": "PIN", "timestamp": now}),
        json!({"gameId": "g2", "odds": {"home": -130, "away": 120}, "exchange": "PIN", "timestamp": now}),
        json!({"gameId": "", "odds": {"home": -130, "away": 120}, "exchange": "PIN", "timestamp": now}),
        json!({"gameId": "g3", "exchange": "PIN", "timestamp": now}),
    ];
    let hedge = vec![
        json!({"gameId": "g1", "odds": {"home": -95, "away": 85}, "exchange": "BFX", "timestamp": now}),
        json!({"gameId": "g2", "odds": {"home": -90, "away": 80}, "exchange": "BFX", "timestamp": now}),
    ];

    let accepted = handle
        .process_raw_stream(primary, hedge, "nba-ml")
        .await
        .unwrap();
    assert_eq!(accepted.len(), 2);
    // No bookmakers configured
    assert!(accepted.iter().all(|o| o.primary_market.bookmaker.is_none()));

    let report = handle.health_check().await.unwrap();
    assert_eq!(report.metrics.malformed_ticks, 2);
    assert_eq!(report.metrics.opportunities_accepted, 2);
    assert!(report.is_healthy);

    handle.shutdown().await;
    task.await.unwrap();
}

#[test]
fn test_bookmaker_labels_from_config() {
    let config: Config = toml::from_str(include_str!("../../config.toml.example")).unwrap();
    let mut processor = RiskControlProcessor::new(&config);
    let now = Utc::now();

    let (primary, hedge) = pair("g1", -125.0, -95.0, now);
    let accepted = processor.process_cross_market_stream_at(&primary, &hedge, "nba-ml", now);
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].primary_market.bookmaker.as_deref(), Some("pinnacle"));
    assert_eq!(accepted[0].hedge_market.market.bookmaker.as_deref(), Some("betfair"));
}
