use arb_sentinel::cli::{Cli, Commands};
use arb_sentinel::config::Config;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
            eprintln!("Using default configuration");
            toml::from_str(include_str!("../config.toml.example"))?
        }
    };

    // Initialize telemetry
    let _telemetry = arb_sentinel::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Replay(args) => {
            tracing::info!(input = %args.input.display(), "Starting replay");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Breaker: cooldown={}ms, max_consecutive_rejects={}",
                config.breaker.cooldown_ms, config.breaker.max_consecutive_rejects
            );
            println!(
                "  Rules: correlation<{} for {}ms, |z|>{}, success_rate<{} over {}ms",
                config.breaker.correlation_drop.threshold,
                config.breaker.correlation_drop.duration_ms,
                config.breaker.residual_explosion.multiplier,
                config.breaker.execution_gap.min_success_rate,
                config.breaker.execution_gap.window_ms
            );
            println!("  Daily loss limit: {}", config.daily_loss.max_daily_loss);
            println!(
                "  Adverse move: {} sigma, window {} samples, {}ms",
                config.adverse_move.sigma_threshold,
                config.adverse_move.sample_size,
                config.adverse_move.observation_ms
            );
            println!(
                "  Detection: |z|>{}, residual std dev {}",
                config.processor.detection_z_threshold, config.processor.residual_std_dev
            );
            println!("  Bookmakers: {}", config.bookmakers.len());
        }
    }

    Ok(())
}
