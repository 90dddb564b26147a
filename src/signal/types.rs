//! Opportunity types

use crate::market::{Odds, Tick};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One side of a market pair as observed when the opportunity was detected
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Home/away prices
    pub odds: Odds,
    /// Exchange identifier
    pub exchange: String,
    /// Observation time
    pub observed_at: DateTime<Utc>,
    /// Resolved bookmaker id, for labeling only
    pub bookmaker: Option<String>,
    /// Sport-specific rotation number, for labeling only
    pub rotation_number: Option<String>,
}

impl MarketSnapshot {
    /// Snapshot a tick without labels
    pub fn from_tick(tick: &Tick) -> Self {
        Self {
            odds: tick.odds(),
            exchange: tick.exchange().to_string(),
            observed_at: tick.timestamp(),
            bookmaker: None,
            rotation_number: None,
        }
    }
}

/// The hedge side, with its estimated co-movement with the primary market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeMarket {
    /// Hedge market snapshot
    #[serde(flatten)]
    pub market: MarketSnapshot,
    /// Correlation with the primary market (0.0 to 1.0)
    pub correlation: f64,
}

/// A candidate synthetic arbitrage instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Unique opportunity identifier
    pub id: Uuid,
    /// Game shared by both markets
    pub game_id: String,
    /// Primary/hedge pairing this opportunity belongs to
    pub relationship_key: String,
    /// Primary market snapshot
    pub primary_market: MarketSnapshot,
    /// Hedge market snapshot
    pub hedge_market: HedgeMarket,
    /// Signed deviation from theoretical price in residual standard deviations
    pub mispricing_z_score: f64,
    /// Model price of the primary home side
    pub theoretical_price: f64,
    /// Residual standard deviation used for the Z-score
    pub residual_std_dev: f64,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
    /// Detection timestamp
    pub detected_at: DateTime<Utc>,
}

impl Opportunity {
    /// Price the primary market was observed at, used as the fill price
    pub fn observed_price(&self) -> f64 {
        self.primary_market.odds.home
    }
}
