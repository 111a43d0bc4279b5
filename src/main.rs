use clap::{Parser, Subcommand};
use parity_shadow_arb::{
    config::{ArbitrageConfig, TradingMode},
    connectors::{MarketDataProvider, PollingPriceFeed, ProviderFactory},
    trading::SessionSummary,
    utils::{logger, metrics},
    Result, ShadowTradingSystem,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info, warn};

const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9000";

#[derive(Parser)]
#[command(name = "parity-arb")]
#[command(about = "Put-call parity shadow arbitrage (simulated trades only)")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/parity.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log file path
    #[arg(long, default_value = "logs/parity-arb.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a shadow trading session
    Run {
        /// Override the configured mode (PAPER or SHADOW)
        #[arg(long)]
        mode: Option<TradingMode>,

        /// Stop after this many seconds instead of waiting for Ctrl-C
        #[arg(long)]
        duration_secs: Option<u64>,
    },
    /// Validate configuration
    Validate,
    /// Fetch one snapshot through the configured provider
    CheckFeed,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging; the guard flushes the file writer on exit
    let _guard = logger::init(&cli.log_level, &cli.log_file)?;

    info!("Starting Parity Shadow Arbitrage v{}", parity_shadow_arb::VERSION);

    // Load configuration
    let mut config = ArbitrageConfig::from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Run { mode, duration_secs } => {
            if let Some(mode) = mode {
                config.mode = mode;
            }
            run_session(config, duration_secs).await
        }
        Commands::Validate => validate_config(config).await,
        Commands::CheckFeed => check_feed(config).await,
    }
}

async fn run_session(config: ArbitrageConfig, duration_secs: Option<u64>) -> Result<()> {
    config.validate()?;
    info!(mode = %config.mode, "Starting session; no orders can be placed in any mode");

    if config.monitoring.enable_metrics {
        let addr = config
            .monitoring
            .metrics_listen_addr
            .clone()
            .unwrap_or_else(|| DEFAULT_METRICS_ADDR.to_string());
        metrics::install_prometheus_exporter(&addr)?;
        info!("Prometheus exporter listening on {}", addr);
    }

    let system = ShadowTradingSystem::new(config)?;

    let shutdown = async move {
        match duration_secs {
            Some(secs) => {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {
                        info!("Session duration of {}s elapsed", secs);
                    }
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
                }
            }
            None => {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    error!("Failed to listen for Ctrl-C: {}", e);
                }
            }
        }
    };

    let summary = system.run_until(shutdown).await?;
    print_summary(&summary);

    Ok(())
}

async fn validate_config(config: ArbitrageConfig) -> Result<()> {
    info!("Validating configuration...");

    match config.validate() {
        Ok(_) => {
            info!("✅ Configuration is valid");
            println!("Configuration validation passed!");
            println!("  Mode: {}", config.mode);
            println!("  Underlying: {} (lot size {})", config.contract.underlying, config.contract.lot_size);
            println!(
                "  Entry gap: {}  Exit gap: {}  Max hold: {}s",
                config.strategy.min_parity_gap, config.strategy.exit_threshold, config.strategy.max_hold_secs
            );
        }
        Err(e) => {
            error!("❌ Configuration validation failed: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

async fn check_feed(config: ArbitrageConfig) -> Result<()> {
    config.validate()?;
    let provider = ProviderFactory::create_provider(&config)?;
    info!(provider = %provider.name(), "Checking market data provider");

    provider.connect().await?;
    let feed = PollingPriceFeed::new(provider, &config);
    let snapshot = feed.poll_once().await?;

    println!("Snapshot ({}):", snapshot.source);
    println!("  Observed at: {}", snapshot.observed_at);
    println!("  Spot:        {}", snapshot.spot);
    println!("  Futures:     {}", snapshot.futures);
    println!("  ATM strike:  {}", snapshot.strike);
    println!("  Call:        {}", snapshot.call_price);
    println!("  Put:         {}", snapshot.put_price);
    println!(
        "  Parity gap:  {} (entry above {})",
        snapshot.parity_gap(),
        config.strategy.min_parity_gap
    );

    Ok(())
}

fn print_summary(summary: &SessionSummary) {
    let status = &summary.status;

    println!();
    println!("Session summary ({} to {})", summary.started_at, summary.ended_at);
    println!("  Mode:            {}", status.mode);
    println!(
        "  Closed trades:   {} ({} wins, {} losses, {} marginal)",
        status.closed_trades, status.wins, status.losses, status.marginal_closes
    );
    println!("  Total P&L/unit:  {}", status.total_pnl);
    println!("  Trading enabled: {}", status.trading_enabled);
    if let Some(reason) = &status.disabled_reason {
        println!("  Disabled:        {}", reason);
    }

    if summary.trades.is_empty() {
        println!("  No trades recorded");
        return;
    }

    println!();
    println!(
        "{:<16} {:<14} {:>10} {:>10} {:>10} {:>12}  {}",
        "ID", "STATUS", "ENTRY GAP", "EXIT GAP", "P&L/UNIT", "DURATION", "EXIT REASON"
    );
    for trade in &summary.trades {
        let dash = || "-".to_string();
        println!(
            "{:<16} {:<14} {:>10} {:>10} {:>10} {:>12}  {}",
            trade.id,
            trade.status.to_string(),
            trade.entry_gap,
            trade.exit_gap.map_or_else(dash, |g| g.to_string()),
            trade.realized_pnl.map_or_else(dash, |p| p.to_string()),
            trade.duration_ms.map_or_else(dash, |ms| format!("{}ms", ms)),
            trade.exit_reason.as_ref().map_or_else(dash, |r| r.to_string()),
        );
    }

    for trade in summary.open_trades() {
        warn!(trade_id = %trade.id, "Trade still open at shutdown");
    }
}
