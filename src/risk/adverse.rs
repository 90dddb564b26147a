//! Post-fill adverse move monitoring
//!
//! Each filled opportunity gets a tracker seeded with its fill price. Sigma is
//! taken from the tracker's own post-fill series, so the threshold adapts to
//! the volatility each market actually shows after the trade.

use crate::config::AdverseMoveConfig;
use crate::market::Tick;
use crate::model::statistics::{rolling_std_dev, tail};
use crate::signal::Opportunity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Callback invoked for each adverse move
pub type AdverseMoveHandler = Box<dyn Fn(&AdverseMoveEvent) + Send + Sync>;

/// A fill under observation
#[derive(Debug, Clone)]
pub struct PostFillTracker {
    /// Filled opportunity
    pub opportunity_id: Uuid,
    /// Relationship whose breaker owns this fill
    pub relationship_key: String,
    /// Game whose ticks feed the series
    pub game_id: String,
    /// Price the fill was taken at
    pub fill_price: f64,
    /// Fill price followed by every observed price, append-only
    pub price_series: Vec<f64>,
    /// When observation began
    pub start_timestamp: DateTime<Utc>,
}

/// An adverse price move after a fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdverseMoveEvent {
    /// Filled opportunity
    pub opportunity_id: Uuid,
    /// Relationship whose breaker owns this fill
    pub relationship_key: String,
    /// Game the move was observed on
    pub game_id: String,
    /// Price the fill was taken at
    pub fill_price: f64,
    /// Price that triggered the event
    pub latest_price: f64,
    /// Absolute distance from the fill price
    pub price_move: f64,
    /// Standard deviation of the rolling window
    pub sigma: f64,
    /// `price_move / sigma`
    pub z_score: f64,
    /// Configured sigma multiple
    pub threshold_sigma: f64,
    /// When the move was detected
    pub detected_at: DateTime<Utc>,
}

/// Tracks price drift for every open fill
pub struct AdverseMoveMonitor {
    config: AdverseMoveConfig,
    trackers: HashMap<Uuid, PostFillTracker>,
    handler: Option<AdverseMoveHandler>,
}

impl AdverseMoveMonitor {
    /// Create a monitor with the given configuration
    pub fn new(config: AdverseMoveConfig) -> Self {
        Self {
            config,
            trackers: HashMap::new(),
            handler: None,
        }
    }

    /// Register a callback for adverse moves
    pub fn set_handler<F>(&mut self, handler: F)
    where
        F: Fn(&AdverseMoveEvent) + Send + Sync + 'static,
    {
        self.handler = Some(Box::new(handler));
    }

    /// Get the configuration
    pub fn config(&self) -> &AdverseMoveConfig {
        &self.config
    }

    /// Fills currently under observation
    pub fn active_count(&self) -> usize {
        self.trackers.len()
    }

    /// Look up the tracker for a fill
    pub fn tracker(&self, opportunity_id: &Uuid) -> Option<&PostFillTracker> {
        self.trackers.get(opportunity_id)
    }

    /// Start observing a fill
    pub fn on_fill(&mut self, opportunity: &Opportunity) {
        self.on_fill_at(opportunity, Utc::now());
    }

    /// Start observing a fill at a given time
    pub fn on_fill_at(&mut self, opportunity: &Opportunity, now: DateTime<Utc>) {
        let fill_price = opportunity.observed_price();
        self.trackers.insert(
            opportunity.id,
            PostFillTracker {
                opportunity_id: opportunity.id,
                relationship_key: opportunity.relationship_key.clone(),
                game_id: opportunity.game_id.clone(),
                fill_price,
                price_series: vec![fill_price],
                start_timestamp: now,
            },
        );
    }

    /// Feed a tick to the trackers of its game
    pub fn on_new_tick(&mut self, tick: &Tick) -> Vec<AdverseMoveEvent> {
        self.on_new_tick_at(tick, Utc::now())
    }

    /// Feed a tick at a given time
    ///
    /// Every tracker past its observation window is evicted first, whatever its
    /// game. Each returned event has already been passed to the handler and
    /// its tracker removed.
    pub fn on_new_tick_at(&mut self, tick: &Tick, now: DateTime<Utc>) -> Vec<AdverseMoveEvent> {
        let observation = Duration::milliseconds(self.config.observation_ms as i64);
        let sample_size = self.config.sample_size.max(2);
        let min_points = self.config.min_samples.clamp(2, sample_size);
        let latest = tick.price();

        let mut events = Vec::new();
        let mut evicted = Vec::new();

        for (id, tracker) in self.trackers.iter_mut() {
            if now - tracker.start_timestamp > observation {
                tracing::debug!(opportunity = %id, "Observation window expired");
                evicted.push(*id);
                continue;
            }
            if tracker.game_id != tick.game_id() {
                continue;
            }

            tracker.price_series.push(latest);
            let window = tail(&tracker.price_series, sample_size);

            if window.len() >= min_points {
                let sigma = rolling_std_dev(window);
                // Zero variance carries no signal
                if sigma > 0.0 {
                    let price_move = (latest - tracker.fill_price).abs();
                    let threshold = self.config.sigma_threshold * sigma;
                    if price_move > threshold {
                        events.push(AdverseMoveEvent {
                            opportunity_id: *id,
                            relationship_key: tracker.relationship_key.clone(),
                            game_id: tracker.game_id.clone(),
                            fill_price: tracker.fill_price,
                            latest_price: latest,
                            price_move,
                            sigma,
                            z_score: price_move / sigma,
                            threshold_sigma: self.config.sigma_threshold,
                            detected_at: now,
                        });
                        evicted.push(*id);
                        continue;
                    }
                }
            }

            if tracker.price_series.len() >= sample_size {
                tracing::debug!(opportunity = %id, "Observation complete");
                evicted.push(*id);
            }
        }

        for id in &evicted {
            self.trackers.remove(id);
        }

        for event in &events {
            tracing::warn!(
                opportunity = %event.opportunity_id,
                relationship = %event.relationship_key,
                price_move = event.price_move,
                sigma = event.sigma,
                z_score = event.z_score,
                "Adverse move after fill"
            );
            if let Some(handler) = &self.handler {
                handler(event);
            }
        }

        events
    }

    /// Evict trackers past their observation window
    pub fn cleanup(&mut self) -> usize {
        self.cleanup_at(Utc::now())
    }

    /// Evict trackers past their observation window at a given time
    pub fn cleanup_at(&mut self, now: DateTime<Utc>) -> usize {
        let observation = Duration::milliseconds(self.config.observation_ms as i64);
        let before = self.trackers.len();
        self.trackers
            .retain(|_, tracker| now - tracker.start_timestamp <= observation);
        before - self.trackers.len()
    }
}
