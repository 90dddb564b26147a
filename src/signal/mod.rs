//! Signal generation module
//!
//! Pairs primary and hedge ticks into candidate synthetic arbitrage opportunities

mod detector;
mod types;

pub use detector::{DetectorConfig, OpportunityDetector};
pub use types::{HedgeMarket, MarketSnapshot, Opportunity};
