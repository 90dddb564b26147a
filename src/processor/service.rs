//! Single-writer service around a [`RiskControlProcessor`]
//!
//! The processor lives on one task and every caller talks to it through a
//! cloneable [`RiskControlHandle`]. Commands are applied in arrival order,
//! so batches, settlements and resets never interleave.

use super::report::HealthReport;
use super::RiskControlProcessor;
use crate::market::Tick;
use crate::risk::BreakerStatus;
use crate::signal::Opportunity;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Command channel capacity
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Errors returned by [`RiskControlHandle`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The service task has shut down
    #[error("Risk control service stopped")]
    Stopped,
}

/// Command sent from a handle to the service task
#[derive(Debug)]
enum Command {
    ProcessStream {
        primary: Vec<Tick>,
        hedge: Vec<Tick>,
        relationship_key: String,
        now: DateTime<Utc>,
        response: oneshot::Sender<Vec<Opportunity>>,
    },
    ProcessRaw {
        primary: Vec<serde_json::Value>,
        hedge: Vec<serde_json::Value>,
        relationship_key: String,
        now: DateTime<Utc>,
        response: oneshot::Sender<Vec<Opportunity>>,
    },
    Settlement {
        id: String,
        pnl: Decimal,
        now: DateTime<Utc>,
        response: oneshot::Sender<bool>,
    },
    RecordExecution {
        relationship_key: String,
        success: bool,
        now: DateTime<Utc>,
    },
    RecordLatency {
        relationship_key: String,
        latency_ms: f64,
    },
    SetExpectedTicks {
        relationship_key: String,
        game_id: String,
        expected: u64,
    },
    SetCorrelation {
        relationship_key: String,
        correlation: f64,
    },
    ResetBreaker {
        relationship_key: String,
        response: oneshot::Sender<bool>,
    },
    ResetDailyLoss {
        response: oneshot::Sender<()>,
    },
    Cleanup {
        now: DateTime<Utc>,
        response: oneshot::Sender<usize>,
    },
    HealthCheck {
        response: oneshot::Sender<HealthReport>,
    },
    BreakerStatus {
        relationship_key: String,
        response: oneshot::Sender<Option<BreakerStatus>>,
    },
    Shutdown,
}

/// Owns the processor task
pub struct RiskControlService;

impl RiskControlService {
    /// Move the processor onto its own task
    ///
    /// The task ends after [`RiskControlHandle::shutdown`] or once every
    /// handle is dropped, returning the processor for inspection.
    pub fn spawn(
        processor: RiskControlProcessor,
    ) -> (RiskControlHandle, JoinHandle<RiskControlProcessor>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let task = tokio::spawn(run(processor, command_rx));
        (RiskControlHandle { command_tx }, task)
    }
}

async fn run(
    mut processor: RiskControlProcessor,
    mut command_rx: mpsc::Receiver<Command>,
) -> RiskControlProcessor {
    tracing::info!("Risk control service started");

    while let Some(command) = command_rx.recv().await {
        match command {
            Command::ProcessStream {
                primary,
                hedge,
                relationship_key,
                now,
                response,
            } => {
                let accepted = processor.process_cross_market_stream_at(
                    &primary,
                    &hedge,
                    &relationship_key,
                    now,
                );
                let _ = response.send(accepted);
            }
            Command::ProcessRaw {
                primary,
                hedge,
                relationship_key,
                now,
                response,
            } => {
                let accepted =
                    processor.process_raw_stream_at(&primary, &hedge, &relationship_key, now);
                let _ = response.send(accepted);
            }
            Command::Settlement {
                id,
                pnl,
                now,
                response,
            } => {
                let _ = response.send(processor.on_trade_settlement_at(&id, pnl, now));
            }
            Command::RecordExecution {
                relationship_key,
                success,
                now,
            } => {
                processor.record_execution_at(&relationship_key, success, now);
            }
            Command::RecordLatency {
                relationship_key,
                latency_ms,
            } => {
                processor.record_tick_latency(&relationship_key, latency_ms);
            }
            Command::SetExpectedTicks {
                relationship_key,
                game_id,
                expected,
            } => {
                processor.set_expected_ticks(&relationship_key, &game_id, expected);
            }
            Command::SetCorrelation {
                relationship_key,
                correlation,
            } => {
                processor.set_correlation(&relationship_key, correlation);
            }
            Command::ResetBreaker {
                relationship_key,
                response,
            } => {
                let _ = response.send(processor.reset_circuit_breaker(&relationship_key));
            }
            Command::ResetDailyLoss { response } => {
                processor.reset_daily_loss();
                let _ = response.send(());
            }
            Command::Cleanup { now, response } => {
                let _ = response.send(processor.cleanup_at(now));
            }
            Command::HealthCheck { response } => {
                let _ = response.send(processor.health_check());
            }
            Command::BreakerStatus {
                relationship_key,
                response,
            } => {
                let _ = response.send(processor.breaker_status(&relationship_key));
            }
            Command::Shutdown => break,
        }
    }

    tracing::info!("Risk control service stopped");
    processor
}

/// Cloneable handle to a running [`RiskControlService`]
#[derive(Clone)]
pub struct RiskControlHandle {
    command_tx: mpsc::Sender<Command>,
}

impl RiskControlHandle {
    /// Process a batch of typed ticks
    pub async fn process_cross_market_stream(
        &self,
        primary: Vec<Tick>,
        hedge: Vec<Tick>,
        relationship_key: impl Into<String>,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        self.process_cross_market_stream_at(primary, hedge, relationship_key, Utc::now())
            .await
    }

    /// Process a batch of typed ticks at a given time
    pub async fn process_cross_market_stream_at(
        &self,
        primary: Vec<Tick>,
        hedge: Vec<Tick>,
        relationship_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        self.request(|response| Command::ProcessStream {
            primary,
            hedge,
            relationship_key: relationship_key.into(),
            now,
            response,
        })
        .await
    }

    /// Process a batch of untyped records
    pub async fn process_raw_stream(
        &self,
        primary: Vec<serde_json::Value>,
        hedge: Vec<serde_json::Value>,
        relationship_key: impl Into<String>,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        self.process_raw_stream_at(primary, hedge, relationship_key, Utc::now())
            .await
    }

    /// Process a batch of untyped records at a given time
    pub async fn process_raw_stream_at(
        &self,
        primary: Vec<serde_json::Value>,
        hedge: Vec<serde_json::Value>,
        relationship_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Opportunity>, ServiceError> {
        self.request(|response| Command::ProcessRaw {
            primary,
            hedge,
            relationship_key: relationship_key.into(),
            now,
            response,
        })
        .await
    }

    /// Record realized P&L; false once the daily limit is breached
    pub async fn on_trade_settlement(
        &self,
        id: impl Into<String>,
        pnl: Decimal,
    ) -> Result<bool, ServiceError> {
        self.on_trade_settlement_at(id, pnl, Utc::now()).await
    }

    /// Record realized P&L at a given time
    pub async fn on_trade_settlement_at(
        &self,
        id: impl Into<String>,
        pnl: Decimal,
        now: DateTime<Utc>,
    ) -> Result<bool, ServiceError> {
        self.request(|response| Command::Settlement {
            id: id.into(),
            pnl,
            now,
            response,
        })
        .await
    }

    /// Record a fill outcome for a relationship
    pub async fn record_execution(
        &self,
        relationship_key: impl Into<String>,
        success: bool,
    ) -> Result<(), ServiceError> {
        self.record_execution_at(relationship_key, success, Utc::now())
            .await
    }

    /// Record a fill outcome at a given time
    pub async fn record_execution_at(
        &self,
        relationship_key: impl Into<String>,
        success: bool,
        now: DateTime<Utc>,
    ) -> Result<(), ServiceError> {
        self.send(Command::RecordExecution {
            relationship_key: relationship_key.into(),
            success,
            now,
        })
        .await
    }

    /// Record a tick latency sample for a relationship
    pub async fn record_tick_latency(
        &self,
        relationship_key: impl Into<String>,
        latency_ms: f64,
    ) -> Result<(), ServiceError> {
        self.send(Command::RecordLatency {
            relationship_key: relationship_key.into(),
            latency_ms,
        })
        .await
    }

    /// Set how many ticks a game is expected to produce for a relationship
    pub async fn set_expected_ticks(
        &self,
        relationship_key: impl Into<String>,
        game_id: impl Into<String>,
        expected: u64,
    ) -> Result<(), ServiceError> {
        self.send(Command::SetExpectedTicks {
            relationship_key: relationship_key.into(),
            game_id: game_id.into(),
            expected,
        })
        .await
    }

    /// Feed a correlation estimate for a relationship
    pub async fn set_correlation(
        &self,
        relationship_key: impl Into<String>,
        correlation: f64,
    ) -> Result<(), ServiceError> {
        self.send(Command::SetCorrelation {
            relationship_key: relationship_key.into(),
            correlation,
        })
        .await
    }

    /// Operator reset of one breaker
    pub async fn reset_circuit_breaker(
        &self,
        relationship_key: impl Into<String>,
    ) -> Result<bool, ServiceError> {
        self.request(|response| Command::ResetBreaker {
            relationship_key: relationship_key.into(),
            response,
        })
        .await
    }

    /// Operator reset of today's P&L
    pub async fn reset_daily_loss(&self) -> Result<(), ServiceError> {
        self.request(|response| Command::ResetDailyLoss { response })
            .await
    }

    /// Evict expired adverse-move trackers
    pub async fn cleanup(&self) -> Result<usize, ServiceError> {
        self.cleanup_at(Utc::now()).await
    }

    /// Evict trackers expired at a given time
    pub async fn cleanup_at(&self, now: DateTime<Utc>) -> Result<usize, ServiceError> {
        self.request(|response| Command::Cleanup { now, response })
            .await
    }

    /// Aggregate health report
    pub async fn health_check(&self) -> Result<HealthReport, ServiceError> {
        self.request(|response| Command::HealthCheck { response })
            .await
    }

    /// Snapshot of one breaker
    pub async fn breaker_status(
        &self,
        relationship_key: impl Into<String>,
    ) -> Result<Option<BreakerStatus>, ServiceError> {
        self.request(|response| Command::BreakerStatus {
            relationship_key: relationship_key.into(),
            response,
        })
        .await
    }

    /// Stop the service after queued commands are applied
    pub async fn shutdown(&self) {
        let _ = self.command_tx.send(Command::Shutdown).await;
    }

    async fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ServiceError::Stopped)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ServiceError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(command(response_tx)).await?;
        response_rx.await.map_err(|_| ServiceError::Stopped)
    }
}
