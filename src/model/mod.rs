//! Pricing and statistics module
//!
//! Theoretical pricing across a market pair and rolling price statistics

mod pricing;
pub mod statistics;

pub use pricing::MidpointPricing;
pub use statistics::{rolling_std_dev, STD_DEV_FLOOR};

use crate::market::Tick;

/// Trait for theoretical price models over a primary/hedge pair
pub trait PricingModel: Send + Sync {
    /// Theoretical price the primary market's home side should trade at
    fn theoretical_price(&self, primary: &Tick, hedge: &Tick) -> f64;
}
