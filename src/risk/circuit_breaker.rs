//! Per-relationship circuit breaker
//!
//! Admission gate for one primary/hedge relationship. Every candidate runs
//! through a unified rule set:
//!
//! - **correlation_drop**: hedge correlation below threshold, sustained for a duration
//! - **residual_explosion**: a single |Z| above the explosion multiplier
//! - **execution_gap**: fill success rate in a sliding window too low
//! - **systemic_health**: data completeness or tick latency degraded
//!
//! ## States
//!
//! - **Closed**: Normal operation, candidates admitted when no rule is violated
//! - **Open**: Tripped, candidates refused until the cooldown has elapsed
//! - **HalfOpen**: A single probe candidate decides between Closed and Open
//!
//! A breaker that trips `max_consecutive_rejects` times in a row is hard-stopped:
//! it stays open until [`RelationshipCircuitBreaker::reset`] is called.

use super::alert::{AlertKind, AlertSink, TracingAlertSink};
use super::health::{ExecutionGapMonitor, SystemicHealthMonitor};
use crate::config::BreakerConfig;
use crate::signal::Opportunity;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const CORRELATION_DROP: &str = "correlation_drop";

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BreakerState {
    /// Circuit breaker is closed - admission allowed.
    Closed,

    /// Circuit breaker is open - admission blocked.
    Open,

    /// Circuit breaker is half-open - probing recovery.
    HalfOpen,
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "Closed"),
            BreakerState::Open => write!(f, "Open"),
            BreakerState::HalfOpen => write!(f, "HalfOpen"),
        }
    }
}

/// Read-only snapshot of a breaker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerStatus {
    /// Relationship this breaker guards.
    pub relationship_key: String,

    /// Current state.
    pub state: BreakerState,

    /// When the breaker last tripped.
    pub last_trip_timestamp: Option<DateTime<Utc>>,

    /// First reason of the last trip.
    pub trip_reason: Option<String>,

    /// Trips since the last successful admission.
    pub consecutive_failures: u32,

    /// Whether only an operator reset can reopen admission.
    pub hard_stopped: bool,

    /// Total transitions into the open state.
    pub total_trips: u64,

    /// Sustained rules currently timing a violation.
    pub pending_violations: Vec<String>,
}

/// Result of running the rule set once.
struct RuleOutcome {
    violations: Vec<String>,
    /// Sustained rules below threshold but not yet violated
    pending: Vec<&'static str>,
}

/// Circuit breaker for a single primary/hedge relationship.
///
/// Not internally synchronized: callers serialize access per relationship.
pub struct RelationshipCircuitBreaker {
    relationship_key: String,
    config: BreakerConfig,
    state: BreakerState,
    last_trip_timestamp: Option<DateTime<Utc>>,
    trip_reason: Option<String>,
    consecutive_failures: u32,
    total_trips: u64,
    /// When each sustained rule's violation first began
    violation_timers: HashMap<&'static str, DateTime<Utc>>,
    execution: ExecutionGapMonitor,
    systemic: SystemicHealthMonitor,
    alerts: Arc<dyn AlertSink>,
}

impl std::fmt::Debug for RelationshipCircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationshipCircuitBreaker")
            .field("relationship_key", &self.relationship_key)
            .field("state", &self.state)
            .field("consecutive_failures", &self.consecutive_failures)
            .field("trip_reason", &self.trip_reason)
            .finish()
    }
}

impl RelationshipCircuitBreaker {
    /// Create a closed breaker that alerts through tracing.
    pub fn new(relationship_key: impl Into<String>, config: BreakerConfig) -> Self {
        Self::with_alert_sink(relationship_key, config, Arc::new(TracingAlertSink))
    }

    /// Create a closed breaker with a custom alert sink.
    pub fn with_alert_sink(
        relationship_key: impl Into<String>,
        config: BreakerConfig,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        Self {
            relationship_key: relationship_key.into(),
            execution: ExecutionGapMonitor::new(&config.execution_gap),
            systemic: SystemicHealthMonitor::new(&config.systemic),
            config,
            state: BreakerState::Closed,
            last_trip_timestamp: None,
            trip_reason: None,
            consecutive_failures: 0,
            total_trips: 0,
            violation_timers: HashMap::new(),
            alerts,
        }
    }

    /// Relationship this breaker guards.
    pub fn relationship_key(&self) -> &str {
        &self.relationship_key
    }

    /// Get the current state.
    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Trips since the last successful admission.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// First reason of the last trip.
    pub fn trip_reason(&self) -> Option<&str> {
        self.trip_reason.as_deref()
    }

    /// When the breaker last tripped.
    pub fn last_trip_timestamp(&self) -> Option<DateTime<Utc>> {
        self.last_trip_timestamp
    }

    /// Whether automatic reset is disabled until an operator intervenes.
    pub fn is_hard_stopped(&self) -> bool {
        self.consecutive_failures >= self.config.max_consecutive_rejects
    }

    /// Snapshot of the breaker.
    pub fn status(&self) -> BreakerStatus {
        let mut pending_violations: Vec<String> = self
            .violation_timers
            .keys()
            .map(|rule| rule.to_string())
            .collect();
        pending_violations.sort();

        BreakerStatus {
            relationship_key: self.relationship_key.clone(),
            state: self.state,
            last_trip_timestamp: self.last_trip_timestamp,
            trip_reason: self.trip_reason.clone(),
            consecutive_failures: self.consecutive_failures,
            hard_stopped: self.is_hard_stopped(),
            total_trips: self.total_trips,
            pending_violations,
        }
    }

    /// Decide whether to admit an opportunity.
    pub fn evaluate(&mut self, opportunity: &Opportunity) -> bool {
        self.evaluate_at(opportunity, Utc::now())
    }

    /// Decide whether to admit an opportunity at a given time.
    pub fn evaluate_at(&mut self, opportunity: &Opportunity, now: DateTime<Utc>) -> bool {
        if self.state == BreakerState::Open && !self.attempt_reset_at(now) {
            tracing::debug!(
                relationship = %self.relationship_key,
                opportunity = %opportunity.id,
                "Breaker open, candidate refused"
            );
            return false;
        }

        let outcome = self.check_rules_at(opportunity, now);
        if !outcome.violations.is_empty() {
            self.trip_at(outcome.violations, now);
            return false;
        }

        if self.state == BreakerState::HalfOpen {
            tracing::info!(relationship = %self.relationship_key, "Breaker recovered");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.violation_timers
            .retain(|rule, _| outcome.pending.contains(rule));
        true
    }

    /// Move from Open to HalfOpen if the cooldown has elapsed and the breaker
    /// is not hard-stopped.
    fn attempt_reset_at(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_hard_stopped() {
            return false;
        }

        let cooldown = Duration::milliseconds(self.config.cooldown_ms as i64);
        let cooled_down = self
            .last_trip_timestamp
            .map_or(true, |tripped_at| now - tripped_at >= cooldown);
        if !cooled_down {
            return false;
        }

        self.state = BreakerState::HalfOpen;
        tracing::info!(relationship = %self.relationship_key, "Breaker half-open, probing");
        true
    }

    fn check_rules_at(&mut self, opportunity: &Opportunity, now: DateTime<Utc>) -> RuleOutcome {
        let mut violations = Vec::new();
        let mut pending = Vec::new();

        // Sustained: only a continuous sub-threshold run counts
        let correlation = opportunity.hedge_market.correlation;
        let drop_rule = &self.config.correlation_drop;
        if correlation < drop_rule.threshold {
            let started = *self.violation_timers.entry(CORRELATION_DROP).or_insert(now);
            let elapsed = now - started;
            if elapsed >= Duration::milliseconds(drop_rule.duration_ms as i64) {
                violations.push(format!(
                    "{}: correlation {:.2} below {:.2} for {}ms",
                    CORRELATION_DROP,
                    correlation,
                    drop_rule.threshold,
                    elapsed.num_milliseconds()
                ));
            }
            pending.push(CORRELATION_DROP);
        } else {
            self.violation_timers.remove(CORRELATION_DROP);
        }

        let z = opportunity.mispricing_z_score.abs();
        let multiplier = self.config.residual_explosion.multiplier;
        if z > multiplier {
            violations.push(format!(
                "residual_explosion: |z| {:.2} above {:.2}",
                z, multiplier
            ));
        }

        if let Some(reason) = self.execution.check_at(now) {
            violations.push(reason);
        }

        violations.extend(self.systemic.check());

        RuleOutcome {
            violations,
            pending,
        }
    }

    /// Trip the breaker now.
    ///
    /// Returns true if this call moved the breaker into the open state.
    pub fn trip(&mut self, reasons: Vec<String>) -> bool {
        self.trip_at(reasons, Utc::now())
    }

    /// Trip the breaker at a given time.
    ///
    /// Consecutive failures only count transitions into Open, so tripping an
    /// already open breaker refreshes its reason and timestamp without
    /// moving it closer to a hard stop.
    pub fn trip_at(&mut self, reasons: Vec<String>, now: DateTime<Utc>) -> bool {
        let newly_open = self.state != BreakerState::Open;

        self.state = BreakerState::Open;
        self.last_trip_timestamp = Some(now);
        self.trip_reason = Some(
            reasons
                .first()
                .cloned()
                .unwrap_or_else(|| "unspecified".to_string()),
        );

        if newly_open {
            self.consecutive_failures += 1;
            self.total_trips += 1;
        }

        self.alerts.on_trip(&self.status(), &reasons);

        if newly_open && self.consecutive_failures == self.config.max_consecutive_rejects {
            tracing::error!(
                relationship = %self.relationship_key,
                consecutive_failures = self.consecutive_failures,
                "Breaker hard-stopped, operator reset required"
            );
            self.alerts
                .on_alert(AlertKind::HardStop, &self.relationship_key);
        }

        newly_open
    }

    /// Operator reset: close the breaker and forget its failure history.
    pub fn reset(&mut self) {
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.last_trip_timestamp = None;
        self.trip_reason = None;
        self.violation_timers.clear();
        tracing::info!(relationship = %self.relationship_key, "Breaker manually reset");
    }

    /// Record a fill outcome for the execution-gap rule.
    pub fn record_execution_at(&mut self, success: bool, now: DateTime<Utc>) {
        self.execution.record_execution_at(success, now);
    }

    /// Count a received data point for the systemic-health rule.
    pub fn record_data_point(&mut self, game_id: &str) {
        self.systemic.record_data_point(game_id);
    }

    /// Set the expected tick count for a game.
    pub fn set_expected_ticks(&mut self, game_id: &str, expected: u64) {
        self.systemic.set_expected_ticks(game_id, expected);
    }

    /// Record a tick latency sample.
    pub fn record_latency(&mut self, latency_ms: f64) {
        self.systemic.record_latency(latency_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CorrelationDropConfig, ExecutionGapConfig};
    use crate::market::Odds;
    use crate::signal::{HedgeMarket, MarketSnapshot};
    use std::sync::Mutex;
    use uuid::Uuid;

    #[derive(Default)]
    struct RecordingSink {
        trips: Mutex<Vec<(String, Vec<String>)>>,
        alerts: Mutex<Vec<(AlertKind, String)>>,
    }

    impl AlertSink for RecordingSink {
        fn on_trip(&self, status: &BreakerStatus, reasons: &[String]) {
            self.trips
                .lock()
                .unwrap()
                .push((status.relationship_key.clone(), reasons.to_vec()));
        }

        fn on_alert(&self, kind: AlertKind, relationship_key: &str) {
            self.alerts
                .lock()
                .unwrap()
                .push((kind, relationship_key.to_string()));
        }
    }

    fn create_opportunity(correlation: f64, z_score: f64) -> Opportunity {
        let snapshot = MarketSnapshot {
            odds: Odds {
                home: -120.0,
                away: 110.0,
            },
            exchange: "PIN".to_string(),
            observed_at: Utc::now(),
            bookmaker: None,
            rotation_number: None,
        };
        Opportunity {
            id: Uuid::new_v4(),
            game_id: "g1".to_string(),
            relationship_key: "rel-1".to_string(),
            primary_market: snapshot.clone(),
            hedge_market: HedgeMarket {
                market: snapshot,
                correlation,
            },
            mispricing_z_score: z_score,
            theoretical_price: -110.0,
            residual_std_dev: 5.0,
            confidence: 0.7,
            detected_at: Utc::now(),
        }
    }

    fn healthy() -> Opportunity {
        create_opportunity(0.95, 2.5)
    }

    fn exploding() -> Opportunity {
        create_opportunity(0.95, 6.0)
    }

    fn config() -> BreakerConfig {
        BreakerConfig {
            cooldown_ms: 1_000,
            max_consecutive_rejects: 3,
            correlation_drop: CorrelationDropConfig {
                threshold: 0.8,
                duration_ms: 100,
            },
            ..Default::default()
        }
    }

    fn breaker_with_sink() -> (RelationshipCircuitBreaker, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let breaker = RelationshipCircuitBreaker::with_alert_sink("rel-1", config(), sink.clone());
        (breaker, sink)
    }

    #[test]
    fn test_starts_closed_and_admits() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.evaluate(&healthy()));
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_residual_explosion_trips_immediately() {
        let (mut breaker, sink) = breaker_with_sink();
        let now = Utc::now();

        assert!(!breaker.evaluate_at(&exploding(), now));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.consecutive_failures(), 1);
        assert!(breaker.trip_reason().unwrap().starts_with("residual_explosion"));
        assert_eq!(breaker.last_trip_timestamp(), Some(now));
        assert_eq!(sink.trips.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_negative_z_explosion_trips() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        assert!(!breaker.evaluate(&create_opportunity(0.95, -4.5)));
    }

    #[test]
    fn test_open_refuses_until_cooldown() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        let start = Utc::now();
        breaker.evaluate_at(&exploding(), start);

        assert!(!breaker.evaluate_at(&healthy(), start + Duration::milliseconds(500)));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.consecutive_failures(), 1);
    }

    #[test]
    fn test_half_open_probe_success_closes() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        let start = Utc::now();
        breaker.evaluate_at(&exploding(), start);

        assert!(breaker.evaluate_at(&healthy(), start + Duration::milliseconds(1_000)));
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
    }

    #[test]
    fn test_half_open_probe_failure_retrips() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        let start = Utc::now();
        breaker.evaluate_at(&exploding(), start);

        let probe_time = start + Duration::milliseconds(1_000);
        assert!(!breaker.evaluate_at(&exploding(), probe_time));
        assert_eq!(breaker.state(), BreakerState::Open);
        assert_eq!(breaker.consecutive_failures(), 2);
        assert_eq!(breaker.last_trip_timestamp(), Some(probe_time));
    }

    #[test]
    fn test_trip_while_open_does_not_double_count() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        assert!(breaker.trip(vec!["daily_loss".to_string()]));
        assert!(!breaker.trip(vec!["daily_loss".to_string()]));
        assert_eq!(breaker.consecutive_failures(), 1);
        assert_eq!(breaker.status().total_trips, 1);
    }

    #[test]
    fn test_trip_without_reasons() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        breaker.trip(vec![]);
        assert_eq!(breaker.trip_reason(), Some("unspecified"));
    }

    #[test]
    fn test_hard_stop_requires_manual_reset() {
        let (mut breaker, sink) = breaker_with_sink();
        let mut now = Utc::now();

        for _ in 0..3 {
            breaker.evaluate_at(&exploding(), now);
            now += Duration::milliseconds(1_000);
        }
        assert_eq!(breaker.consecutive_failures(), 3);
        assert!(breaker.is_hard_stopped());
        assert_eq!(
            sink.alerts.lock().unwrap().as_slice(),
            &[(AlertKind::HardStop, "rel-1".to_string())]
        );

        // Long after cooldown, still refused
        now += Duration::hours(1);
        assert!(!breaker.evaluate_at(&healthy(), now));
        assert_eq!(breaker.state(), BreakerState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.last_trip_timestamp().is_none());
        assert!(breaker.evaluate_at(&healthy(), now));
    }

    #[test]
    fn test_hard_stop_alert_fires_once() {
        let (mut breaker, sink) = breaker_with_sink();
        let mut now = Utc::now();
        for _ in 0..6 {
            breaker.evaluate_at(&exploding(), now);
            breaker.trip_at(vec!["external".to_string()], now);
            now += Duration::milliseconds(1_000);
        }
        assert_eq!(sink.alerts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_correlation_drop_requires_sustained_run() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        let start = Utc::now();
        let low = create_opportunity(0.5, 2.5);

        let mut results = Vec::new();
        for step in 0..15 {
            let now = start + Duration::milliseconds(step * 10);
            results.push(breaker.evaluate_at(&low, now));
        }

        assert!(results[..10].iter().all(|accepted| *accepted));
        assert!(results[10..].iter().all(|accepted| !*accepted));
        assert!(breaker.trip_reason().unwrap().starts_with("correlation_drop"));
    }

    #[test]
    fn test_correlation_recovery_resets_timer() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        let start = Utc::now();
        let low = create_opportunity(0.5, 2.5);

        assert!(breaker.evaluate_at(&low, start));
        assert!(breaker.evaluate_at(&low, start + Duration::milliseconds(90)));
        assert_eq!(breaker.status().pending_violations, vec!["correlation_drop"]);

        // One healthy reading clears the run
        assert!(breaker.evaluate_at(&healthy(), start + Duration::milliseconds(95)));
        assert!(breaker.status().pending_violations.is_empty());

        assert!(breaker.evaluate_at(&low, start + Duration::milliseconds(110)));
        assert!(breaker.evaluate_at(&low, start + Duration::milliseconds(200)));
        assert!(!breaker.evaluate_at(&low, start + Duration::milliseconds(210)));
    }

    #[test]
    fn test_execution_gap_trips() {
        let mut breaker = RelationshipCircuitBreaker::new(
            "rel-1",
            BreakerConfig {
                execution_gap: ExecutionGapConfig {
                    window_ms: 60_000,
                    min_success_rate: 0.6,
                },
                ..config()
            },
        );
        let now = Utc::now();
        breaker.record_execution_at(true, now);
        breaker.record_execution_at(false, now);

        assert!(!breaker.evaluate_at(&healthy(), now));
        assert!(breaker.trip_reason().unwrap().starts_with("execution_gap"));
    }

    #[test]
    fn test_systemic_health_trips_on_data_quality() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        breaker.set_expected_ticks("g1", 10);
        breaker.record_data_point("g1");

        assert!(!breaker.evaluate(&healthy()));
        assert!(breaker.trip_reason().unwrap().starts_with("systemic_health"));
    }

    #[test]
    fn test_systemic_health_trips_on_latency() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        breaker.record_latency(900.0);
        assert!(!breaker.evaluate(&healthy()));
    }

    #[test]
    fn test_all_violations_reported_to_sink() {
        let (mut breaker, sink) = breaker_with_sink();
        breaker.record_latency(900.0);
        breaker.evaluate(&exploding());

        let trips = sink.trips.lock().unwrap();
        assert_eq!(trips[0].1.len(), 2);
        assert!(trips[0].1[0].starts_with("residual_explosion"));
    }

    #[test]
    fn test_status_is_idempotent() {
        let mut breaker = RelationshipCircuitBreaker::new("rel-1", config());
        breaker.evaluate(&exploding());
        assert_eq!(breaker.status(), breaker.status());
        assert_eq!(breaker.state(), breaker.state());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(BreakerState::HalfOpen.to_string(), "HalfOpen");
    }
}
