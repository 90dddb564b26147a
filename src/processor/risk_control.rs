//! Risk control processor
//!
//! Ties the pieces together over a stream of cross-market ticks:
//!
//! 1. Pair primary and hedge ticks into candidates (pre-filter on |Z|)
//! 2. Feed every primary tick to the monitor; adverse moves on earlier fills
//!    trip the owning breaker
//! 3. Refuse everything while the daily loss limit is breached
//! 4. Ask the relationship's breaker for admission
//! 5. Hand admitted candidates to the adverse move monitor

use super::report::{HealthReport, ProcessorMetrics};
use crate::config::{BreakerConfig, Config, ProcessorConfig};
use crate::market::{BookmakerRegistry, StaticBookmakerRegistry, Tick};
use crate::model::PricingModel;
use crate::risk::{
    AdverseMoveMonitor, AlertSink, BreakerState, BreakerStatus, DailyLossTracker,
    RelationshipCircuitBreaker, TracingAlertSink,
};
use crate::signal::{DetectorConfig, Opportunity, OpportunityDetector};
use crate::telemetry::{
    increment_counter, record_latency, set_gauge, CounterMetric, GaugeMetric, LatencyMetric,
};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Samples kept for the processing-time moving average
const PROCESSING_WINDOW: usize = 100;

/// Orchestrates detection, admission and post-fill monitoring
///
/// Every mutation takes `&mut self`; run one processor per writer (see
/// [`super::RiskControlService`] for a shared, serialized handle).
pub struct RiskControlProcessor {
    breaker_config: BreakerConfig,
    processor_config: ProcessorConfig,
    detector: OpportunityDetector,
    /// One breaker per relationship, created on first use
    breakers: HashMap<String, RelationshipCircuitBreaker>,
    daily_loss: DailyLossTracker,
    adverse: AdverseMoveMonitor,
    /// Latest correlation estimate per relationship
    correlations: HashMap<String, f64>,
    alerts: Arc<dyn AlertSink>,
    metrics: ProcessorMetrics,
    processing_times: VecDeque<f64>,
}

impl RiskControlProcessor {
    /// Create a processor from configuration
    ///
    /// Configured bookmakers are used to label opportunities.
    pub fn new(config: &Config) -> Self {
        let mut detector = OpportunityDetector::new(DetectorConfig {
            detection_z_threshold: config.processor.detection_z_threshold,
            residual_std_dev: config.processor.residual_std_dev,
            sport: config.processor.sport.clone(),
        });
        if !config.bookmakers.is_empty() {
            let registry = StaticBookmakerRegistry::new(config.bookmakers.clone());
            detector = detector.with_registry(Arc::new(registry));
        }

        Self {
            breaker_config: config.breaker.clone(),
            processor_config: config.processor.clone(),
            detector,
            breakers: HashMap::new(),
            daily_loss: DailyLossTracker::new(&config.daily_loss),
            adverse: AdverseMoveMonitor::new(config.adverse_move.clone()),
            correlations: HashMap::new(),
            alerts: Arc::new(TracingAlertSink),
            metrics: ProcessorMetrics::default(),
            processing_times: VecDeque::with_capacity(PROCESSING_WINDOW),
        }
    }

    /// Route breaker trips and alerts to a custom sink
    ///
    /// Applies to breakers created after this call.
    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Replace the theoretical pricing model
    pub fn with_pricing_model(mut self, pricing: Box<dyn PricingModel>) -> Self {
        self.detector = self.detector.with_pricing_model(pricing);
        self
    }

    /// Replace the bookmaker registry used for labels
    pub fn with_registry(mut self, registry: Arc<dyn BookmakerRegistry>) -> Self {
        self.detector = self.detector.with_registry(registry);
        self
    }

    /// Replace the daily loss tracker (e.g. one anchored to a replay clock)
    pub fn with_daily_loss_tracker(mut self, tracker: DailyLossTracker) -> Self {
        self.daily_loss = tracker;
        self
    }

    /// Counters so far
    pub fn metrics(&self) -> &ProcessorMetrics {
        &self.metrics
    }

    /// The daily loss tracker
    pub fn daily_loss(&self) -> &DailyLossTracker {
        &self.daily_loss
    }

    /// The adverse move monitor
    pub fn adverse_monitor(&self) -> &AdverseMoveMonitor {
        &self.adverse
    }

    /// The adverse move monitor, e.g. to register a handler
    pub fn adverse_monitor_mut(&mut self) -> &mut AdverseMoveMonitor {
        &mut self.adverse
    }

    /// Snapshot of one relationship's breaker
    pub fn breaker_status(&self, relationship_key: &str) -> Option<BreakerStatus> {
        self.breakers.get(relationship_key).map(|b| b.status())
    }

    /// Feed the latest correlation estimate for a relationship
    pub fn set_correlation(&mut self, relationship_key: &str, correlation: f64) {
        if !correlation.is_finite() {
            tracing::warn!(
                relationship = relationship_key,
                "Ignoring non-finite correlation"
            );
            return;
        }
        self.correlations
            .insert(relationship_key.to_string(), correlation.clamp(0.0, 1.0));
    }

    /// Record a fill outcome for a relationship's execution-gap rule
    pub fn record_execution(&mut self, relationship_key: &str, success: bool) {
        self.record_execution_at(relationship_key, success, Utc::now());
    }

    /// Record a fill outcome at a given time
    pub fn record_execution_at(&mut self, relationship_key: &str, success: bool, now: DateTime<Utc>) {
        self.breaker_mut(relationship_key)
            .record_execution_at(success, now);
    }

    /// Record a tick latency sample for a relationship
    pub fn record_tick_latency(&mut self, relationship_key: &str, latency_ms: f64) {
        self.breaker_mut(relationship_key).record_latency(latency_ms);
    }

    /// Set how many ticks a game is expected to produce for a relationship
    pub fn set_expected_ticks(&mut self, relationship_key: &str, game_id: &str, expected: u64) {
        self.breaker_mut(relationship_key)
            .set_expected_ticks(game_id, expected);
    }

    /// Parse untyped records, then process them
    ///
    /// Malformed records are logged, counted and skipped.
    pub fn process_raw_stream(
        &mut self,
        primary: &[serde_json::Value],
        hedge: &[serde_json::Value],
        relationship_key: &str,
    ) -> Vec<Opportunity> {
        self.process_raw_stream_at(primary, hedge, relationship_key, Utc::now())
    }

    /// Parse untyped records, then process them at a given time
    pub fn process_raw_stream_at(
        &mut self,
        primary: &[serde_json::Value],
        hedge: &[serde_json::Value],
        relationship_key: &str,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let primary = self.parse_ticks(primary, relationship_key, "primary");
        let hedge = self.parse_ticks(hedge, relationship_key, "hedge");
        self.process_cross_market_stream_at(&primary, &hedge, relationship_key, now)
    }

    /// Process one batch of paired streams and return admitted opportunities
    pub fn process_cross_market_stream(
        &mut self,
        primary: &[Tick],
        hedge: &[Tick],
        relationship_key: &str,
    ) -> Vec<Opportunity> {
        self.process_cross_market_stream_at(primary, hedge, relationship_key, Utc::now())
    }

    /// Process one batch at a given time
    pub fn process_cross_market_stream_at(
        &mut self,
        primary: &[Tick],
        hedge: &[Tick],
        relationship_key: &str,
        now: DateTime<Utc>,
    ) -> Vec<Opportunity> {
        let started = Instant::now();
        self.daily_loss.roll_over_at(now);

        let correlation = self.correlation_for(relationship_key);
        let candidates = self
            .detector
            .detect_at(primary, hedge, relationship_key, correlation, now);

        // Drift on earlier fills; fills admitted below start from their own fill price
        for tick in primary {
            for event in self.adverse.on_new_tick_at(tick, now) {
                self.metrics.adverse_moves += 1;
                increment_counter(CounterMetric::AdverseMoves, 1);

                let reason = format!(
                    "adverse_move: {:.2} sigma move on {} exceeds {:.2} sigma",
                    event.z_score, event.game_id, event.threshold_sigma
                );
                let owner = breaker_entry(
                    &mut self.breakers,
                    &event.relationship_key,
                    &self.breaker_config,
                    &self.alerts,
                );
                if owner.trip_at(vec![reason], now) {
                    self.metrics.circuit_breaker_trips += 1;
                    increment_counter(CounterMetric::BreakerTrips, 1);
                }
            }
        }

        let breaker = breaker_entry(
            &mut self.breakers,
            relationship_key,
            &self.breaker_config,
            &self.alerts,
        );

        let mut accepted = Vec::new();
        for candidate in candidates {
            self.metrics.opportunities_processed += 1;
            increment_counter(CounterMetric::OpportunitiesProcessed, 1);
            breaker.record_data_point(&candidate.game_id);

            if let Some(reason) = self.daily_loss.breach_reason() {
                if breaker.trip_at(vec![reason], now) {
                    self.metrics.circuit_breaker_trips += 1;
                    increment_counter(CounterMetric::BreakerTrips, 1);
                }
                self.metrics.daily_loss_breaches += 1;
                increment_counter(CounterMetric::DailyLossBreaches, 1);
                continue;
            }

            if breaker.evaluate_at(&candidate, now) {
                self.metrics.opportunities_accepted += 1;
                increment_counter(CounterMetric::OpportunitiesAccepted, 1);
                self.adverse.on_fill_at(&candidate, now);
                accepted.push(candidate);
            } else {
                self.metrics.opportunities_rejected += 1;
                increment_counter(CounterMetric::OpportunitiesRejected, 1);
                if breaker.state() == BreakerState::Open {
                    self.metrics.circuit_breaker_trips += 1;
                    increment_counter(CounterMetric::BreakerTrips, 1);
                }
            }
        }

        self.record_processing_time(started);
        self.adverse.cleanup_at(now);
        self.publish_gauges();

        tracing::debug!(
            relationship = relationship_key,
            primary = primary.len(),
            hedge = hedge.len(),
            accepted = accepted.len(),
            "Processed cross-market batch"
        );

        accepted
    }

    /// Record realized P&L; a breach trips every breaker
    ///
    /// Returns whether the daily loss limit still holds.
    pub fn on_trade_settlement(&mut self, id: &str, settled_pnl: Decimal) -> bool {
        self.on_trade_settlement_at(id, settled_pnl, Utc::now())
    }

    /// Record realized P&L at a given time
    pub fn on_trade_settlement_at(
        &mut self,
        id: &str,
        settled_pnl: Decimal,
        now: DateTime<Utc>,
    ) -> bool {
        self.daily_loss.record_pnl_at(id, settled_pnl, now);
        self.publish_gauges();

        let Some(reason) = self.daily_loss.breach_reason() else {
            return true;
        };

        tracing::warn!(
            trade = id,
            breakers = self.breakers.len(),
            %reason,
            "Daily loss limit breached, tripping all breakers"
        );
        for breaker in self.breakers.values_mut() {
            if breaker.trip_at(vec![reason.clone()], now) {
                self.metrics.circuit_breaker_trips += 1;
                increment_counter(CounterMetric::BreakerTrips, 1);
            }
        }
        false
    }

    /// Operator reset of one breaker; false for an unknown relationship
    pub fn reset_circuit_breaker(&mut self, relationship_key: &str) -> bool {
        match self.breakers.get_mut(relationship_key) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    /// Operator reset of today's P&L
    pub fn reset_daily_loss(&mut self) {
        self.daily_loss.reset();
        self.publish_gauges();
    }

    /// Evict adverse-move trackers past their observation window
    ///
    /// Expiry is cooperative; call this periodically when ticks are sparse.
    pub fn cleanup(&mut self) -> usize {
        self.cleanup_at(Utc::now())
    }

    /// Evict expired trackers at a given time
    pub fn cleanup_at(&mut self, now: DateTime<Utc>) -> usize {
        let evicted = self.adverse.cleanup_at(now);
        set_gauge(GaugeMetric::ActiveTrackers, self.adverse.active_count() as f64);
        evicted
    }

    /// Aggregate health without changing any state
    pub fn health_check(&self) -> HealthReport {
        let mut issues = Vec::new();

        if let Some(reason) = self.daily_loss.breach_reason() {
            issues.push(format!("Daily loss limit breached ({})", reason));
        }

        let breaker_statuses: BTreeMap<String, BreakerStatus> = self
            .breakers
            .iter()
            .map(|(key, breaker)| (key.clone(), breaker.status()))
            .collect();

        for (key, status) in &breaker_statuses {
            if status.state == BreakerState::Open {
                issues.push(format!(
                    "Circuit breaker open for {}: {}",
                    key,
                    status.trip_reason.as_deref().unwrap_or("unknown")
                ));
            }
            if status.hard_stopped {
                issues.push(format!(
                    "Circuit breaker hard-stopped for {}, operator reset required",
                    key
                ));
            }
        }

        let budget = self.processor_config.max_processing_time_ms;
        if self.metrics.avg_processing_time_ms > budget {
            issues.push(format!(
                "Average processing time {:.1}ms exceeds {:.1}ms",
                self.metrics.avg_processing_time_ms, budget
            ));
        }

        HealthReport {
            is_healthy: issues.is_empty(),
            issues,
            metrics: self.metrics.clone(),
            pnl_status: self.daily_loss.status(),
            breaker_statuses,
        }
    }

    fn correlation_for(&self, relationship_key: &str) -> f64 {
        self.correlations
            .get(relationship_key)
            .copied()
            .unwrap_or(self.processor_config.default_correlation)
    }

    fn breaker_mut(&mut self, relationship_key: &str) -> &mut RelationshipCircuitBreaker {
        breaker_entry(
            &mut self.breakers,
            relationship_key,
            &self.breaker_config,
            &self.alerts,
        )
    }

    fn parse_ticks(
        &mut self,
        records: &[serde_json::Value],
        relationship_key: &str,
        stream: &str,
    ) -> Vec<Tick> {
        records
            .iter()
            .filter_map(|record| match Tick::parse(record) {
                Ok(tick) => Some(tick),
                Err(e) => {
                    self.metrics.malformed_ticks += 1;
                    increment_counter(CounterMetric::MalformedTicks, 1);
                    tracing::warn!(
                        relationship = relationship_key,
                        stream,
                        error = %e,
                        "Skipping malformed tick"
                    );
                    None
                }
            })
            .collect()
    }

    fn record_processing_time(&mut self, started: Instant) {
        let elapsed = started.elapsed();
        record_latency(LatencyMetric::StreamProcessing, elapsed);

        if self.processing_times.len() == PROCESSING_WINDOW {
            self.processing_times.pop_front();
        }
        self.processing_times
            .push_back(elapsed.as_secs_f64() * 1000.0);
        self.metrics.avg_processing_time_ms =
            self.processing_times.iter().sum::<f64>() / self.processing_times.len() as f64;
    }

    fn publish_gauges(&self) {
        let open = self
            .breakers
            .values()
            .filter(|b| b.state() == BreakerState::Open)
            .count();
        set_gauge(GaugeMetric::OpenBreakers, open as f64);
        set_gauge(GaugeMetric::ActiveTrackers, self.adverse.active_count() as f64);
        set_gauge(
            GaugeMetric::DailyPnl,
            self.daily_loss.accumulated_pnl().to_f64().unwrap_or(0.0),
        );
        set_gauge(
            GaugeMetric::DailyLossUtilization,
            self.daily_loss.utilization(),
        );
    }
}

/// Look up a relationship's breaker, creating it on first use
fn breaker_entry<'a>(
    breakers: &'a mut HashMap<String, RelationshipCircuitBreaker>,
    relationship_key: &str,
    config: &BreakerConfig,
    alerts: &Arc<dyn AlertSink>,
) -> &'a mut RelationshipCircuitBreaker {
    breakers
        .entry(relationship_key.to_string())
        .or_insert_with(|| {
            tracing::info!(relationship = relationship_key, "Creating circuit breaker");
            RelationshipCircuitBreaker::with_alert_sink(
                relationship_key,
                config.clone(),
                Arc::clone(alerts),
            )
        })
}
