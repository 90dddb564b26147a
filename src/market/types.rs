//! Tick types and boundary validation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a tick record is refused at the boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TickError {
    /// Record is not an object of the expected shape
    #[error("Malformed tick record: {0}")]
    Malformed(String),
    /// A required field is absent
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
    /// An odds field is present but not a number
    #[error("Odds field {0} is not numeric")]
    NonNumericOdds(&'static str),
    /// An odds field is NaN or infinite
    #[error("Odds field {0} is not finite")]
    NonFiniteOdds(&'static str),
    /// Game identifier is blank
    #[error("Game identifier is empty")]
    EmptyGameId,
}

/// Home/away price pair for one market
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Odds {
    /// Home side price (signed)
    pub home: f64,
    /// Away side price (signed)
    pub away: f64,
}

impl Odds {
    /// Create a validated odds pair
    pub fn new(home: f64, away: f64) -> Result<Self, TickError> {
        if !home.is_finite() {
            return Err(TickError::NonFiniteOdds("home"));
        }
        if !away.is_finite() {
            return Err(TickError::NonFiniteOdds("away"));
        }
        Ok(Self { home, away })
    }
}

/// A validated market observation
///
/// Only constructed through [`Tick::new`] or [`Tick::parse`], so every
/// instance has a non-empty game id and finite prices.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tick {
    game_id: String,
    odds: Odds,
    exchange: String,
    timestamp: DateTime<Utc>,
}

/// Loose wire shape of a tick record
#[derive(Debug, Clone, Default, Deserialize)]
struct RawTick {
    #[serde(default, alias = "gameId")]
    game_id: Option<String>,
    #[serde(default)]
    odds: Option<RawOdds>,
    #[serde(default)]
    exchange: Option<String>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawOdds {
    #[serde(default)]
    home: Option<serde_json::Value>,
    #[serde(default)]
    away: Option<serde_json::Value>,
}

impl Tick {
    /// Create a tick from typed parts
    pub fn new(
        game_id: impl Into<String>,
        home: f64,
        away: f64,
        exchange: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, TickError> {
        let game_id = game_id.into();
        if game_id.trim().is_empty() {
            return Err(TickError::EmptyGameId);
        }
        Ok(Self {
            game_id,
            odds: Odds::new(home, away)?,
            exchange: exchange.into(),
            timestamp,
        })
    }

    /// Parse and validate an untyped record
    pub fn parse(value: &serde_json::Value) -> Result<Self, TickError> {
        let raw: RawTick = serde_json::from_value(value.clone())
            .map_err(|e| TickError::Malformed(e.to_string()))?;

        let game_id = raw.game_id.ok_or(TickError::MissingField("game_id"))?;
        let odds = raw.odds.ok_or(TickError::MissingField("odds"))?;
        let exchange = raw.exchange.ok_or(TickError::MissingField("exchange"))?;
        let timestamp = raw.timestamp.ok_or(TickError::MissingField("timestamp"))?;

        let home = numeric_field(odds.home, "home")?;
        let away = numeric_field(odds.away, "away")?;

        Self::new(game_id, home, away, exchange, timestamp)
    }

    /// Game identifier shared by primary and hedge streams
    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Home/away prices
    pub fn odds(&self) -> Odds {
        self.odds
    }

    /// Home price, the series tracked after a fill
    pub fn price(&self) -> f64 {
        self.odds.home
    }

    /// Exchange identifier
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    /// Observation time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

fn numeric_field(value: Option<serde_json::Value>, field: &'static str) -> Result<f64, TickError> {
    match value {
        None | Some(serde_json::Value::Null) => Err(TickError::MissingField(field)),
        Some(serde_json::Value::Number(n)) => n.as_f64().ok_or(TickError::NonFiniteOdds(field)),
        Some(_) => Err(TickError::NonNumericOdds(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_record() -> serde_json::Value {
        json!({
            "game_id": "LAL-BOS",
            "odds": { "home": -110, "away": 105.5 },
            "exchange": "PIN",
            "timestamp": "2026-03-01T18:30:00Z"
        })
    }

    #[test]
    fn test_parse_valid_tick() {
        let tick = Tick::parse(&valid_record()).unwrap();
        assert_eq!(tick.game_id(), "LAL-BOS");
        assert_eq!(tick.odds(), Odds { home: -110.0, away: 105.5 });
        assert_eq!(tick.price(), -110.0);
        assert_eq!(tick.exchange(), "PIN");
    }

    #[test]
    fn test_parse_accepts_camel_case_game_id() {
        let mut record = valid_record();
        let obj = record.as_object_mut().unwrap();
        let game = obj.remove("game_id").unwrap();
        obj.insert("gameId".to_string(), game);

        assert_eq!(Tick::parse(&record).unwrap().game_id(), "LAL-BOS");
    }

    #[test]
    fn test_parse_missing_field() {
        let mut record = valid_record();
        record.as_object_mut().unwrap().remove("exchange");

        assert_eq!(
            Tick::parse(&record).unwrap_err(),
            TickError::MissingField("exchange")
        );
    }

    #[test]
    fn test_parse_missing_odds_side() {
        let mut record = valid_record();
        record["odds"] = json!({ "home": -110 });

        assert_eq!(
            Tick::parse(&record).unwrap_err(),
            TickError::MissingField("away")
        );
    }

    #[test]
    fn test_parse_string_odds_rejected() {
        let mut record = valid_record();
        record["odds"]["home"] = json!("-110");

        assert_eq!(
            Tick::parse(&record).unwrap_err(),
            TickError::NonNumericOdds("home")
        );
    }

    #[test]
    fn test_parse_non_object_is_malformed() {
        let result = Tick::parse(&json!([1, 2, 3]));
        assert!(matches!(result, Err(TickError::Malformed(_))));
    }

    #[test]
    fn test_new_rejects_non_finite() {
        let now = Utc::now();
        assert_eq!(
            Tick::new("g1", f64::NAN, 100.0, "PIN", now).unwrap_err(),
            TickError::NonFiniteOdds("home")
        );
        assert_eq!(
            Tick::new("g1", -110.0, f64::INFINITY, "PIN", now).unwrap_err(),
            TickError::NonFiniteOdds("away")
        );
    }

    #[test]
    fn test_new_rejects_blank_game() {
        let result = Tick::new("  ", -110.0, 100.0, "PIN", Utc::now());
        assert_eq!(result.unwrap_err(), TickError::EmptyGameId);
    }
}
