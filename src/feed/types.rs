//! Replay batch types

use crate::market::Tick;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A realized P&L event to apply after a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    /// Trade identifier
    pub id: String,
    /// Realized P&L (signed)
    pub pnl: Decimal,
}

/// One relationship's paired streams, as recorded
///
/// Tick records stay untyped so that malformed entries reach the processor
/// boundary and are counted there.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayBatch {
    /// Primary/hedge pairing the streams belong to
    pub relationship_key: String,
    /// Correlation estimate to apply before processing
    #[serde(default)]
    pub correlation: Option<f64>,
    /// Raw primary tick records
    #[serde(default)]
    pub primary: Vec<serde_json::Value>,
    /// Raw hedge tick records
    #[serde(default)]
    pub hedge: Vec<serde_json::Value>,
    /// Settlements applied after the streams
    #[serde(default)]
    pub settlements: Vec<Settlement>,
}

impl ReplayBatch {
    /// Latest timestamp among the well-formed tick records
    ///
    /// Replays run on this recorded clock, not the wall clock.
    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.primary
            .iter()
            .chain(&self.hedge)
            .filter_map(|value| Tick::parse(value).ok())
            .map(|tick| tick.timestamp())
            .max()
    }
}

/// A replay file holds one batch or a list of them
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum ReplayFile {
    Many(Vec<ReplayBatch>),
    One(ReplayBatch),
}

impl ReplayFile {
    pub(crate) fn into_batches(self) -> Vec<ReplayBatch> {
        match self {
            ReplayFile::Many(batches) => batches,
            ReplayFile::One(batch) => vec![batch],
        }
    }
}
