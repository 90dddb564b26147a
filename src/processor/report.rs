//! Processor counters and health report

use crate::risk::{BreakerStatus, DailyLossStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Operational counters for a processor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessorMetrics {
    /// Candidates that reached admission
    pub opportunities_processed: u64,
    /// Candidates admitted
    pub opportunities_accepted: u64,
    /// Candidates refused by a breaker
    pub opportunities_rejected: u64,
    /// Trips observed by the processor
    pub circuit_breaker_trips: u64,
    /// Candidates refused because the daily loss limit was breached
    pub daily_loss_breaches: u64,
    /// Adverse moves detected after fills
    pub adverse_moves: u64,
    /// Tick records rejected at the boundary
    pub malformed_ticks: u64,
    /// Moving average of batch processing time
    pub avg_processing_time_ms: f64,
}

/// Aggregated health of a processor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// True when there are no issues
    pub is_healthy: bool,
    /// Human-readable diagnostics
    pub issues: Vec<String>,
    /// Counters at the time of the check
    pub metrics: ProcessorMetrics,
    /// Daily P&L against its limit
    pub pnl_status: DailyLossStatus,
    /// Every breaker, ordered by relationship key
    pub breaker_statuses: BTreeMap<String, BreakerStatus>,
}
