//! Configuration types for arb-sentinel

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub daily_loss: DailyLossConfig,
    #[serde(default)]
    pub adverse_move: AdverseMoveConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub bookmakers: Vec<BookmakerConfig>,
}

/// Circuit breaker configuration, shared by every relationship
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BreakerConfig {
    /// Minimum time an open breaker waits before a half-open probe
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Consecutive trips after which only an operator reset reopens the breaker
    #[serde(default = "default_max_consecutive_rejects")]
    pub max_consecutive_rejects: u32,

    #[serde(default)]
    pub correlation_drop: CorrelationDropConfig,

    #[serde(default)]
    pub residual_explosion: ResidualExplosionConfig,

    #[serde(default)]
    pub execution_gap: ExecutionGapConfig,

    #[serde(default)]
    pub systemic: SystemicHealthConfig,
}

fn default_cooldown_ms() -> u64 {
    60_000
}
fn default_max_consecutive_rejects() -> u32 {
    3
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            max_consecutive_rejects: default_max_consecutive_rejects(),
            correlation_drop: CorrelationDropConfig::default(),
            residual_explosion: ResidualExplosionConfig::default(),
            execution_gap: ExecutionGapConfig::default(),
            systemic: SystemicHealthConfig::default(),
        }
    }
}

/// Sustained correlation breakdown between primary and hedge markets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorrelationDropConfig {
    /// Correlation below this value starts the persistence timer
    #[serde(default = "default_correlation_threshold")]
    pub threshold: f64,

    /// How long the correlation must stay below threshold before tripping
    #[serde(default = "default_correlation_duration_ms")]
    pub duration_ms: u64,
}

fn default_correlation_threshold() -> f64 {
    0.7
}
fn default_correlation_duration_ms() -> u64 {
    30_000
}

impl Default for CorrelationDropConfig {
    fn default() -> Self {
        Self {
            threshold: default_correlation_threshold(),
            duration_ms: default_correlation_duration_ms(),
        }
    }
}

/// Instantaneous residual blow-out
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResidualExplosionConfig {
    /// Absolute mispricing Z-score above which a single reading trips
    #[serde(default = "default_residual_multiplier")]
    pub multiplier: f64,
}

fn default_residual_multiplier() -> f64 {
    4.0
}

impl Default for ResidualExplosionConfig {
    fn default() -> Self {
        Self {
            multiplier: default_residual_multiplier(),
        }
    }
}

/// Execution success-rate health
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionGapConfig {
    /// Sliding window of fill outcomes considered
    #[serde(default = "default_execution_window_ms")]
    pub window_ms: u64,

    /// Success rate (0.0 to 1.0) below which the relationship is unhealthy
    #[serde(default = "default_min_success_rate")]
    pub min_success_rate: f64,
}

fn default_execution_window_ms() -> u64 {
    300_000
}
fn default_min_success_rate() -> f64 {
    0.6
}

impl Default for ExecutionGapConfig {
    fn default() -> Self {
        Self {
            window_ms: default_execution_window_ms(),
            min_success_rate: default_min_success_rate(),
        }
    }
}

/// Data quality and latency health
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemicHealthConfig {
    /// Minimum received/expected tick ratio per game
    #[serde(default = "default_min_data_quality")]
    pub min_data_quality: f64,

    /// Maximum moving-average tick latency
    #[serde(default = "default_max_latency_ms")]
    pub max_latency_ms: f64,
}

fn default_min_data_quality() -> f64 {
    0.8
}
fn default_max_latency_ms() -> f64 {
    500.0
}

impl Default for SystemicHealthConfig {
    fn default() -> Self {
        Self {
            min_data_quality: default_min_data_quality(),
            max_latency_ms: default_max_latency_ms(),
        }
    }
}

/// Daily loss limit configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DailyLossConfig {
    /// Absolute accumulated P&L at which trading halts for the UTC day
    #[serde(default = "default_max_daily_loss")]
    pub max_daily_loss: Decimal,
}

fn default_max_daily_loss() -> Decimal {
    Decimal::new(10_000, 0)
}

impl Default for DailyLossConfig {
    fn default() -> Self {
        Self {
            max_daily_loss: default_max_daily_loss(),
        }
    }
}

/// Post-fill adverse move monitoring
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdverseMoveConfig {
    /// Move from the fill price, in sigmas, that counts as adverse
    #[serde(default = "default_sigma_threshold")]
    pub sigma_threshold: f64,

    /// Rolling window length; a tracker that reaches it without tripping completes
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Hard timeout for a tracker regardless of sample count
    #[serde(default = "default_observation_ms")]
    pub observation_ms: u64,

    /// Window points required before sigma is trusted (never below 2)
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
}

fn default_sigma_threshold() -> f64 {
    2.0
}
fn default_sample_size() -> usize {
    20
}
fn default_observation_ms() -> u64 {
    300_000
}
fn default_min_samples() -> usize {
    5
}

impl Default for AdverseMoveConfig {
    fn default() -> Self {
        Self {
            sigma_threshold: default_sigma_threshold(),
            sample_size: default_sample_size(),
            observation_ms: default_observation_ms(),
            min_samples: default_min_samples(),
        }
    }
}

/// Stream processing configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorConfig {
    /// Pre-filter: pairs with |Z| at or below this never reach a breaker
    #[serde(default = "default_detection_z_threshold")]
    pub detection_z_threshold: f64,

    /// Residual standard deviation used to normalize mispricing
    #[serde(default = "default_residual_std_dev")]
    pub residual_std_dev: f64,

    /// Correlation assumed for relationships with no estimate fed in
    #[serde(default = "default_correlation")]
    pub default_correlation: f64,

    /// Average batch processing time above which health degrades
    #[serde(default = "default_max_processing_time_ms")]
    pub max_processing_time_ms: f64,

    /// Sport used when generating rotation-number labels
    #[serde(default = "default_sport")]
    pub sport: String,
}

fn default_detection_z_threshold() -> f64 {
    2.0
}
fn default_residual_std_dev() -> f64 {
    5.0
}
fn default_correlation() -> f64 {
    0.9
}
fn default_max_processing_time_ms() -> f64 {
    100.0
}
fn default_sport() -> String {
    "nba".to_string()
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            detection_z_threshold: default_detection_z_threshold(),
            residual_std_dev: default_residual_std_dev(),
            default_correlation: default_correlation(),
            max_processing_time_ms: default_max_processing_time_ms(),
            sport: default_sport(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormatConfig,
    /// Prometheus exporter port; no exporter when absent
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormatConfig::default(),
            metrics_port: None,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormatConfig {
    #[default]
    Pretty,
    Json,
}

/// A bookmaker known to the rotation-number registry
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct BookmakerConfig {
    pub id: String,
    /// Exchange identifier as it appears on ticks
    pub exchange: String,
    pub name: String,
    /// Base rotation number per sport
    #[serde(default)]
    pub rotation_bases: HashMap<String, u32>,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
