//! Daily loss limit tracking

use crate::config::DailyLossConfig;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Read-only view of the day's P&L against the limit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyLossStatus {
    /// UTC trading day
    pub current_day: NaiveDate,
    /// Realized P&L accumulated today
    pub accumulated_pnl: Decimal,
    /// Configured limit
    pub max_daily_loss: Decimal,
    /// Percentage of the limit used (infinite when the limit is zero)
    pub utilization_pct: f64,
    /// Room left before the limit
    pub remaining_limit: Decimal,
    /// Whether trading may continue
    pub within_limits: bool,
}

/// Accumulates realized P&L for the current UTC day
///
/// Rollover is lazy: the day is only compared on writes and explicit
/// [`DailyLossTracker::roll_over_at`] calls, never on a timer.
#[derive(Debug, Clone)]
pub struct DailyLossTracker {
    max_daily_loss: Decimal,
    accumulated_pnl: Decimal,
    current_day: NaiveDate,
}

impl DailyLossTracker {
    /// Create a tracker starting today
    pub fn new(config: &DailyLossConfig) -> Self {
        Self::new_at(config, Utc::now())
    }

    /// Create a tracker starting on the day of `now`
    pub fn new_at(config: &DailyLossConfig, now: DateTime<Utc>) -> Self {
        Self {
            max_daily_loss: config.max_daily_loss,
            accumulated_pnl: Decimal::ZERO,
            current_day: now.date_naive(),
        }
    }

    /// Record realized P&L for a settled trade
    pub fn record_pnl(&mut self, id: &str, pnl: Decimal) {
        self.record_pnl_at(id, pnl, Utc::now());
    }

    /// Record realized P&L at a given time
    pub fn record_pnl_at(&mut self, id: &str, pnl: Decimal, now: DateTime<Utc>) {
        self.roll_over_at(now);
        self.accumulated_pnl += pnl;
        tracing::debug!(
            trade = id,
            pnl = %pnl,
            accumulated = %self.accumulated_pnl,
            "Recorded P&L"
        );
    }

    /// Start a new day if `now` falls on a later UTC date
    ///
    /// Returns true if a rollover happened. The previous day's total is
    /// logged and discarded. An earlier date never rolls back; the P&L stays
    /// on the current day.
    pub fn roll_over_at(&mut self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        if today < self.current_day {
            tracing::warn!(
                current_day = %self.current_day,
                stale_day = %today,
                "Ignoring time before the current trading day"
            );
            return false;
        }
        if today == self.current_day {
            return false;
        }

        tracing::info!(
            previous_day = %self.current_day,
            final_pnl = %self.accumulated_pnl,
            "Daily P&L rollover"
        );
        self.current_day = today;
        self.accumulated_pnl = Decimal::ZERO;
        true
    }

    /// Check the configured limit
    pub fn is_within_limits(&self) -> bool {
        self.is_within_limits_with(self.max_daily_loss)
    }

    /// Check against an ad hoc limit without changing the tracker
    pub fn is_within_limits_with(&self, max_daily_loss: Decimal) -> bool {
        self.accumulated_pnl.abs() < max_daily_loss
    }

    /// Percentage of the daily limit used
    pub fn utilization(&self) -> f64 {
        if self.max_daily_loss.is_zero() {
            return f64::INFINITY;
        }
        (self.accumulated_pnl.abs() / self.max_daily_loss * Decimal::ONE_HUNDRED)
            .to_f64()
            .unwrap_or(f64::INFINITY)
    }

    /// Room left before the limit, never negative
    pub fn remaining_limit(&self) -> Decimal {
        (self.max_daily_loss - self.accumulated_pnl.abs()).max(Decimal::ZERO)
    }

    /// Realized P&L accumulated today
    pub fn accumulated_pnl(&self) -> Decimal {
        self.accumulated_pnl
    }

    /// Current UTC trading day
    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }

    /// Reason string for trips caused by a breach, if breached
    pub fn breach_reason(&self) -> Option<String> {
        if self.is_within_limits() {
            return None;
        }
        Some(format!(
            "daily_loss_limit: |pnl| {} reached limit {}",
            self.accumulated_pnl.abs(),
            self.max_daily_loss
        ))
    }

    /// Snapshot for health reporting
    pub fn status(&self) -> DailyLossStatus {
        DailyLossStatus {
            current_day: self.current_day,
            accumulated_pnl: self.accumulated_pnl,
            max_daily_loss: self.max_daily_loss,
            utilization_pct: self.utilization(),
            remaining_limit: self.remaining_limit(),
            within_limits: self.is_within_limits(),
        }
    }

    /// Operator reset of today's total
    pub fn reset(&mut self) {
        tracing::info!(discarded_pnl = %self.accumulated_pnl, "Daily P&L manually reset");
        self.accumulated_pnl = Decimal::ZERO;
    }
}
