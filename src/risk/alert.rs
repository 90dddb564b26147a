//! Alert delivery for breaker trips and hard stops

use super::BreakerStatus;
use serde::{Deserialize, Serialize};

/// Alerts raised outside the normal trip path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// Breaker exhausted its consecutive rejects and needs an operator reset
    HardStop,
}

impl std::fmt::Display for AlertKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertKind::HardStop => write!(f, "hard_stop"),
        }
    }
}

/// Trait for alert sinks
///
/// Delivery (log, page, metric) is up to the implementation.
pub trait AlertSink: Send + Sync {
    /// Called on every trip with the post-trip status and all violation reasons
    fn on_trip(&self, status: &BreakerStatus, reasons: &[String]);
    /// Called when an alert condition is reached for a relationship
    fn on_alert(&self, kind: AlertKind, relationship_key: &str);
}

/// Alert sink that writes to the tracing subscriber
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn on_trip(&self, status: &BreakerStatus, reasons: &[String]) {
        tracing::warn!(
            relationship = %status.relationship_key,
            consecutive_failures = status.consecutive_failures,
            reasons = ?reasons,
            "Circuit breaker tripped"
        );
    }

    fn on_alert(&self, kind: AlertKind, relationship_key: &str) {
        tracing::error!(
            relationship = relationship_key,
            alert = %kind,
            "Circuit breaker alert"
        );
    }
}
