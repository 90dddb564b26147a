//! Replay command implementation

use crate::config::Config;
use crate::feed::{JsonFileSource, TickSource};
use crate::processor::{HealthReport, RiskControlProcessor, RiskControlService};
use crate::risk::DailyLossTracker;
use crate::signal::Opportunity;
use chrono::Utc;
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;

/// Output format for replay results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary
    Summary,
    /// Full JSON document
    Json,
}

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// JSON file with recorded batches
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value = "summary")]
    pub format: OutputFormat,
}

/// Outcome of a replay run
#[derive(Debug, Serialize)]
pub struct ReplayReport {
    /// Opportunities admitted across every batch
    pub accepted: Vec<Opportunity>,
    /// Per-batch admission counts, in file order
    pub accepted_per_batch: Vec<usize>,
    /// Health at the end of the replay
    pub health: HealthReport,
}

impl ReplayArgs {
    /// Run the recorded batches through the risk controls
    ///
    /// Each batch is processed at its latest tick timestamp, so sustained
    /// rules, cooldowns and day boundaries follow recorded time. A batch
    /// without a readable timestamp reuses the previous batch's time.
    pub async fn replay(&self, config: &Config) -> anyhow::Result<ReplayReport> {
        let batches = JsonFileSource::new(&self.input).load().await?;

        let mut clock = batches
            .iter()
            .find_map(|batch| batch.latest_timestamp())
            .unwrap_or_else(Utc::now);
        let processor = RiskControlProcessor::new(config)
            .with_daily_loss_tracker(DailyLossTracker::new_at(&config.daily_loss, clock));
        let (handle, task) = RiskControlService::spawn(processor);

        let mut accepted = Vec::new();
        let mut accepted_per_batch = Vec::with_capacity(batches.len());
        for batch in batches {
            if let Some(at) = batch.latest_timestamp() {
                clock = at;
            }
            if let Some(correlation) = batch.correlation {
                handle
                    .set_correlation(batch.relationship_key.clone(), correlation)
                    .await?;
            }

            let admitted = handle
                .process_raw_stream_at(
                    batch.primary,
                    batch.hedge,
                    batch.relationship_key.clone(),
                    clock,
                )
                .await?;
            tracing::info!(
                relationship = %batch.relationship_key,
                at = %clock,
                accepted = admitted.len(),
                "Replayed batch"
            );
            accepted_per_batch.push(admitted.len());
            accepted.extend(admitted);

            for settlement in batch.settlements {
                if !handle
                    .on_trade_settlement_at(settlement.id.clone(), settlement.pnl, clock)
                    .await?
                {
                    tracing::warn!(trade = %settlement.id, "Daily loss limit breached during replay");
                }
            }
        }

        let health = handle.health_check().await?;
        handle.shutdown().await;
        task.await?;

        Ok(ReplayReport {
            accepted,
            accepted_per_batch,
            health,
        })
    }

    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let report = self.replay(config).await?;
        let accepted = &report.accepted;
        let health = &report.health;

        match self.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            OutputFormat::Summary => {
                println!("Replay of {}", self.input.display());
                println!("  Accepted opportunities: {}", accepted.len());
                for opportunity in accepted {
                    println!(
                        "    {} {} z={:.2} confidence={:.2}",
                        opportunity.relationship_key,
                        opportunity.game_id,
                        opportunity.mispricing_z_score,
                        opportunity.confidence
                    );
                }
                println!(
                    "  Processed: {}  Rejected: {}  Trips: {}  Malformed: {}",
                    health.metrics.opportunities_processed,
                    health.metrics.opportunities_rejected,
                    health.metrics.circuit_breaker_trips,
                    health.metrics.malformed_ticks
                );
                println!(
                    "  Daily P&L: {} ({:.1}% of limit)",
                    health.pnl_status.accumulated_pnl, health.pnl_status.utilization_pct
                );
                println!("  Healthy: {}", health.is_healthy);
                for issue in &health.issues {
                    println!("    - {}", issue);
                }
            }
        }

        Ok(())
    }
}
