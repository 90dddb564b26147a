//! Prometheus metrics

use std::time::Duration;

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Candidate opportunities evaluated
    OpportunitiesProcessed,
    /// Candidates admitted by a breaker
    OpportunitiesAccepted,
    /// Candidates refused by a breaker
    OpportunitiesRejected,
    /// Transitions into the open state
    BreakerTrips,
    /// Candidates refused because the daily loss limit was breached
    DailyLossBreaches,
    /// Post-fill adverse moves detected
    AdverseMoves,
    /// Tick records rejected at the boundary
    MalformedTicks,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Accumulated P&L for the current UTC day
    DailyPnl,
    /// Daily loss utilization percentage
    DailyLossUtilization,
    /// Breakers currently open
    OpenBreakers,
    /// Fills under adverse-move observation
    ActiveTrackers,
}

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// One cross-market batch through the processor
    StreamProcessing,
}

/// Increment a counter
pub fn increment_counter(metric: CounterMetric, value: u64) {
    let metric_name = match metric {
        CounterMetric::OpportunitiesProcessed => "arbsentinel_opportunities_processed_total",
        CounterMetric::OpportunitiesAccepted => "arbsentinel_opportunities_accepted_total",
        CounterMetric::OpportunitiesRejected => "arbsentinel_opportunities_rejected_total",
        CounterMetric::BreakerTrips => "arbsentinel_breaker_trips_total",
        CounterMetric::DailyLossBreaches => "arbsentinel_daily_loss_breaches_total",
        CounterMetric::AdverseMoves => "arbsentinel_adverse_moves_total",
        CounterMetric::MalformedTicks => "arbsentinel_malformed_ticks_total",
    };

    metrics::counter!(metric_name).increment(value);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    let metric_name = match metric {
        GaugeMetric::DailyPnl => "arbsentinel_daily_pnl_usd",
        GaugeMetric::DailyLossUtilization => "arbsentinel_daily_loss_utilization_pct",
        GaugeMetric::OpenBreakers => "arbsentinel_open_breakers",
        GaugeMetric::ActiveTrackers => "arbsentinel_active_adverse_trackers",
    };

    metrics::gauge!(metric_name).set(value);
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    let metric_name = match metric {
        LatencyMetric::StreamProcessing => "arbsentinel_stream_processing_latency_ms",
    };

    metrics::histogram!(metric_name).record(duration.as_secs_f64() * 1000.0);
}
