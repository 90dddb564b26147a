//! Replay source integration tests

use arb_sentinel::cli::{OutputFormat, ReplayArgs};
use arb_sentinel::config::Config;
use arb_sentinel::feed::{JsonFileSource, TickSource};
use arb_sentinel::processor::RiskControlProcessor;
use arb_sentinel::risk::BreakerState;
use rust_decimal_macros::dec;
use std::io::Write;

const REPLAY: &str = r#"[
    {
        "relationship_key": "nba-ml",
        "correlation": 0.9,
        "primary": [
            {"gameId": "g1", "odds": {"home": -125, "away": 115}, "exchange": "PIN", "timestamp": "2026-03-01T12:00:00Z"},
            {"gameId": "g2", "odds": {"home": "oops", "away": 115}, "exchange": "PIN", "timestamp": "2026-03-01T12:00:00Z"}
        ],
        "hedge": [
            {"gameId": "g1", "odds": {"home": -95, "away": 85}, "exchange": "BFX", "timestamp": "2026-03-01T12:00:00Z"}
        ],
        "settlements": [{"id": "t1", "pnl": "-8000"}]
    },
    {
        "relationship_key": "nba-ml",
        "primary": [
            {"gameId": "g3", "odds": {"home": -125, "away": 115}, "exchange": "PIN", "timestamp": "2026-03-01T12:01:00Z"}
        ],
        "hedge": [
            {"gameId": "g3", "odds": {"home": -95, "away": 85}, "exchange": "BFX", "timestamp": "2026-03-01T12:01:00Z"}
        ],
        "settlements": [{"id": "t2", "pnl": "-3000"}]
    }
]"#;

/// Same low-correlation pair recorded once a minute
const LOW_CORRELATION_REPLAY: &str = r#"[
    {
        "relationship_key": "nba-ml",
        "correlation": 0.5,
        "primary": [{"gameId": "g1", "odds": {"home": -125, "away": 115}, "exchange": "PIN", "timestamp": "2026-03-01T12:00:00Z"}],
        "hedge": [{"gameId": "g1", "odds": {"home": -95, "away": 85}, "exchange": "BFX", "timestamp": "2026-03-01T12:00:00Z"}]
    },
    {
        "relationship_key": "nba-ml",
        "primary": [{"gameId": "g1", "odds": {"home": -125, "away": 115}, "exchange": "PIN", "timestamp": "2026-03-01T12:01:00Z"}],
        "hedge": [{"gameId": "g1", "odds": {"home": -95, "away": 85}, "exchange": "BFX", "timestamp": "2026-03-01T12:01:00Z"}]
    },
    {
        "relationship_key": "nba-ml",
        "primary": [{"gameId": "g1", "odds": {"home": -125, "away": 115}, "exchange": "PIN", "timestamp": "2026-03-01T12:02:00Z"}],
        "hedge": [{"gameId": "g1", "odds": {"home": -95, "away": 85}, "exchange": "BFX", "timestamp": "2026-03-01T12:02:00Z"}]
    }
]"#;

fn write_replay(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

fn replay_file() -> tempfile::NamedTempFile {
    write_replay(REPLAY)
}

#[tokio::test]
async fn test_replay_file_through_processor() {
    let file = replay_file();
    let batches = JsonFileSource::new(file.path()).load().await.unwrap();
    assert_eq!(batches.len(), 2);

    let mut processor = RiskControlProcessor::new(&Config::default());
    let mut accepted = 0;
    let mut within_limits = true;
    for batch in batches {
        if let Some(correlation) = batch.correlation {
            processor.set_correlation(&batch.relationship_key, correlation);
        }
        accepted += processor
            .process_raw_stream(&batch.primary, &batch.hedge, &batch.relationship_key)
            .len();
        for settlement in batch.settlements {
            within_limits = processor.on_trade_settlement(&settlement.id, settlement.pnl);
        }
    }

    assert_eq!(accepted, 2);
    assert!(!within_limits);
    assert_eq!(processor.metrics().malformed_ticks, 1);
    assert_eq!(processor.daily_loss().accumulated_pnl(), dec!(-11000));
    assert!(!processor.health_check().is_healthy);
}

#[tokio::test]
async fn test_replay_command() {
    let file = replay_file();
    let args = ReplayArgs {
        input: file.path().to_path_buf(),
        format: OutputFormat::Json,
    };
    args.execute(&Config::default()).await.unwrap();
}

#[tokio::test]
async fn test_replay_command_missing_input() {
    let args = ReplayArgs {
        input: "/nonexistent/replay.json".into(),
        format: OutputFormat::Summary,
    };
    assert!(args.execute(&Config::default()).await.is_err());
}

#[tokio::test]
async fn test_replay_runs_on_recorded_time() {
    let file = write_replay(LOW_CORRELATION_REPLAY);
    let args = ReplayArgs {
        input: file.path().to_path_buf(),
        format: OutputFormat::Summary,
    };

    let report = args.replay(&Config::default()).await.unwrap();

    assert_eq!(report.accepted_per_batch, vec![1, 0, 0]);
    let status = &report.health.breaker_statuses["nba-ml"];
    assert_eq!(status.state, BreakerState::Open);
    assert!(status
        .trip_reason
        .as_deref()
        .unwrap()
        .starts_with("correlation_drop"));
}

#[tokio::test]
async fn test_replay_settles_on_recorded_day() {
    let file = replay_file();
    let args = ReplayArgs {
        input: file.path().to_path_buf(),
        format: OutputFormat::Json,
    };

    let report = args.replay(&Config::default()).await.unwrap();

    assert_eq!(report.accepted.len(), 2);
    assert_eq!(report.health.metrics.malformed_ticks, 1);
    assert_eq!(
        report.health.pnl_status.current_day,
        chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()
    );
    assert_eq!(report.health.pnl_status.accumulated_pnl, dec!(-11000));
}
