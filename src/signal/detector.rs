//! Cross-market opportunity detection

use super::{HedgeMarket, MarketSnapshot, Opportunity};
use crate::market::{BookmakerRegistry, Tick};
use crate::model::{MidpointPricing, PricingModel};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Configuration for opportunity detection
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Pairs need |Z| strictly above this to become candidates
    pub detection_z_threshold: f64,
    /// Normalizer for the mispricing Z-score
    pub residual_std_dev: f64,
    /// Sport used for rotation-number labels
    pub sport: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detection_z_threshold: 2.0,
            residual_std_dev: 5.0,
            sport: "nba".to_string(),
        }
    }
}

/// Pairs primary and hedge ticks by game and scores the mispricing
///
/// This is a pre-filter. Whether a candidate is admitted is decided by the
/// relationship's circuit breaker.
pub struct OpportunityDetector {
    config: DetectorConfig,
    pricing: Box<dyn PricingModel>,
    registry: Option<Arc<dyn BookmakerRegistry>>,
    /// Sequence used for rotation-number labels
    sequence: u32,
}

impl OpportunityDetector {
    /// Create a detector with midpoint pricing
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            pricing: Box::new(MidpointPricing::new()),
            registry: None,
            sequence: 0,
        }
    }

    /// Replace the pricing model
    pub fn with_pricing_model(mut self, pricing: Box<dyn PricingModel>) -> Self {
        self.pricing = pricing;
        self
    }

    /// Attach a bookmaker registry for labeling
    pub fn with_registry(mut self, registry: Arc<dyn BookmakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Pair ticks sharing a game and return the candidates
    ///
    /// Each primary tick is paired with the most recent hedge tick for the same
    /// game. Primary ticks without a hedge counterpart are skipped.
    pub fn detect_at(
        &mut self,
        primary: &[Tick],
        hedge: &[Tick],
        relationship_key: &str,
        correlation: f64,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let mut latest_hedge: HashMap<&str, &Tick> = HashMap::new();
        for tick in hedge {
            let entry = latest_hedge.entry(tick.game_id()).or_insert(tick);
            if tick.timestamp() >= entry.timestamp() {
                *entry = tick;
            }
        }

        let mut candidates = Vec::new();
        for primary_tick in primary {
            let Some(hedge_tick) = latest_hedge.get(primary_tick.game_id()) else {
                continue;
            };

            let theoretical = self.pricing.theoretical_price(primary_tick, hedge_tick);
            let z_score = (primary_tick.price() - theoretical) / self.config.residual_std_dev;
            if !z_score.is_finite() || z_score.abs() <= self.config.detection_z_threshold {
                continue;
            }

            tracing::debug!(
                relationship = relationship_key,
                game = primary_tick.game_id(),
                z_score,
                theoretical,
                "Candidate opportunity"
            );

            candidates.push(Opportunity {
                id: Uuid::new_v4(),
                game_id: primary_tick.game_id().to_string(),
                relationship_key: relationship_key.to_string(),
                primary_market: self.label(primary_tick),
                hedge_market: HedgeMarket {
                    market: self.label(hedge_tick),
                    correlation: correlation.clamp(0.0, 1.0),
                },
                mispricing_z_score: z_score,
                theoretical_price: theoretical,
                residual_std_dev: self.config.residual_std_dev,
                confidence: confidence(z_score, correlation),
                detected_at: now,
            });
        }

        candidates
    }

    /// Snapshot a tick, adding bookmaker labels when the registry knows the exchange
    fn label(&mut self, tick: &Tick) -> MarketSnapshot {
        let mut snapshot = MarketSnapshot::from_tick(tick);
        let Some(registry) = &self.registry else {
            return snapshot;
        };

        if let Some(bookmaker) = registry.resolve(tick.exchange()) {
            self.sequence = self.sequence.wrapping_add(1);
            snapshot.rotation_number =
                registry.generate_rotation_number(&bookmaker.id, &self.config.sport, self.sequence);
            snapshot.bookmaker = Some(bookmaker.id);
        }
        snapshot
    }
}

/// Larger mispricing on a well-correlated pair is more trustworthy
fn confidence(z_score: f64, correlation: f64) -> f64 {
    let z = z_score.abs();
    (correlation * z / (z + 1.0)).clamp(0.0, 1.0)
}
