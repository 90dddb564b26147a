//! Two-market midpoint pricing

use super::PricingModel;
use crate::market::Tick;

/// Theoretical price as the average of primary and hedge home prices
#[derive(Debug, Clone, Copy, Default)]
pub struct MidpointPricing;

impl MidpointPricing {
    /// Create a new midpoint pricer
    pub fn new() -> Self {
        Self
    }
}

impl PricingModel for MidpointPricing {
    fn theoretical_price(&self, primary: &Tick, hedge: &Tick) -> f64 {
        (primary.odds().home + hedge.odds().home) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_midpoint() {
        let now = Utc::now();
        let primary = Tick::new("g1", -120.0, 110.0, "PIN", now).unwrap();
        let hedge = Tick::new("g1", -100.0, -105.0, "BFX", now).unwrap();

        assert_eq!(MidpointPricing::new().theoretical_price(&primary, &hedge), -110.0);
    }
}
