//! Execution and systemic health monitors feeding the breaker rules

use crate::config::{ExecutionGapConfig, SystemicHealthConfig};
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

/// Samples kept for the latency moving average
const LATENCY_WINDOW: usize = 100;

/// Sliding window of recent fill outcomes
#[derive(Debug, Clone)]
pub struct ExecutionGapMonitor {
    window: Duration,
    min_success_rate: f64,
    outcomes: VecDeque<(DateTime<Utc>, bool)>,
}

impl ExecutionGapMonitor {
    /// Create a monitor from configuration
    pub fn new(config: &ExecutionGapConfig) -> Self {
        Self {
            window: Duration::milliseconds(config.window_ms as i64),
            min_success_rate: config.min_success_rate,
            outcomes: VecDeque::new(),
        }
    }

    /// Record whether an execution filled
    pub fn record_execution_at(&mut self, success: bool, now: DateTime<Utc>) {
        self.outcomes.push_back((now, success));
        self.prune(now);
    }

    /// Success rate within the window, `None` when the window is empty
    pub fn success_rate_at(&mut self, now: DateTime<Utc>) -> Option<f64> {
        self.prune(now);
        if self.outcomes.is_empty() {
            return None;
        }
        let successes = self.outcomes.iter().filter(|(_, ok)| *ok).count();
        Some(successes as f64 / self.outcomes.len() as f64)
    }

    /// Violation reason if the window's success rate is too low
    pub fn check_at(&mut self, now: DateTime<Utc>) -> Option<String> {
        let rate = self.success_rate_at(now)?;
        if rate < self.min_success_rate {
            return Some(format!(
                "execution_gap: success rate {:.1}% below {:.1}%",
                rate * 100.0,
                self.min_success_rate * 100.0
            ));
        }
        None
    }

    /// Outcomes currently retained
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether no outcomes are retained
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while let Some((ts, _)) = self.outcomes.front() {
            if *ts < cutoff {
                self.outcomes.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Data completeness and latency inputs from external monitoring
#[derive(Debug, Clone)]
pub struct SystemicHealthMonitor {
    min_data_quality: f64,
    max_latency_ms: f64,
    /// Received tick count per game
    received: HashMap<String, u64>,
    /// Expected tick count per game
    expected: HashMap<String, u64>,
    latencies: VecDeque<f64>,
}

impl SystemicHealthMonitor {
    /// Create a monitor from configuration
    pub fn new(config: &SystemicHealthConfig) -> Self {
        Self {
            min_data_quality: config.min_data_quality,
            max_latency_ms: config.max_latency_ms,
            received: HashMap::new(),
            expected: HashMap::new(),
            latencies: VecDeque::with_capacity(LATENCY_WINDOW),
        }
    }

    /// Count one received data point for a game
    pub fn record_data_point(&mut self, game_id: &str) {
        *self.received.entry(game_id.to_string()).or_insert(0) += 1;
    }

    /// Set how many ticks a game is expected to produce
    pub fn set_expected_ticks(&mut self, game_id: &str, expected: u64) {
        self.expected.insert(game_id.to_string(), expected);
    }

    /// Record one tick latency sample
    pub fn record_latency(&mut self, latency_ms: f64) {
        if !latency_ms.is_finite() {
            return;
        }
        if self.latencies.len() == LATENCY_WINDOW {
            self.latencies.pop_front();
        }
        self.latencies.push_back(latency_ms);
    }

    /// Worst received/expected ratio across games with an expectation
    ///
    /// 1.0 when no game has an expectation.
    pub fn data_quality(&self) -> f64 {
        self.expected
            .iter()
            .filter(|(_, expected)| **expected > 0)
            .map(|(game, expected)| {
                let received = self.received.get(game).copied().unwrap_or(0);
                (received as f64 / *expected as f64).min(1.0)
            })
            .fold(1.0, f64::min)
    }

    /// Moving average of recorded latency, `None` before any sample
    pub fn average_latency_ms(&self) -> Option<f64> {
        if self.latencies.is_empty() {
            return None;
        }
        Some(self.latencies.iter().sum::<f64>() / self.latencies.len() as f64)
    }

    /// Violation reasons for degraded data quality or latency
    pub fn check(&self) -> Vec<String> {
        let mut violations = Vec::new();

        let quality = self.data_quality();
        if quality < self.min_data_quality {
            violations.push(format!(
                "systemic_health: data quality {:.2} below {:.2}",
                quality, self.min_data_quality
            ));
        }

        if let Some(latency) = self.average_latency_ms() {
            if latency > self.max_latency_ms {
                violations.push(format!(
                    "systemic_health: average latency {:.1}ms above {:.1}ms",
                    latency, self.max_latency_ms
                ));
            }
        }

        violations
    }
}
