//! Strikecore server - headless options-play orchestration loop.
//!
//! Runs the cycle-driven core against whatever market-data and brokerage
//! adapters are wired in (currently the in-memory mock pair, pending a real
//! vendor integration) on a fixed interval until interrupted or until
//! `--max-cycles` is reached.
//!
//! # Usage
//! ```sh
//! strikecored --config strikecore.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use strikecore::application::capital::CapitalManager;
use strikecore::application::executor::OrderExecutor;
use strikecore::application::lifecycle::LifecycleEngine;
use strikecore::application::market_data::MarketDataManager;
use strikecore::application::store::PlayStore;
use strikecore::application::strategies::cash_secured_put::CashSecuredPutStrategy;
use strikecore::application::strategies::long_option::LongOptionStrategy;
use strikecore::application::strategies::momentum::GapMomentumStrategy;
use strikecore::application::strategies::StrategyRegistry;
use strikecore::application::Orchestrator;
use strikecore::config::Config;
use strikecore::domain::quote::AccountSnapshot;
use strikecore::infrastructure::mock::{MockBroker, MockProvider};
use tracing::{info, Level};
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "strikecored", about = "Options-play orchestration core")]
struct Cli {
    /// Path to the TOML config file.
    #[arg(long, default_value = "strikecore.toml")]
    config: PathBuf,

    /// Run without ever submitting a live order (entries/exits are logged only).
    #[arg(long)]
    dry_run: bool,

    /// Stop after this many cycles instead of running until interrupted.
    #[arg(long)]
    max_cycles: Option<u64>,
}

fn build_registry(config: &Config, market_data: Arc<MarketDataManager>) -> StrategyRegistry {
    let mut registry = StrategyRegistry::new();
    let hours = &config.market_hours.regular_hours;
    for name in config.strategies.keys() {
        if name.contains("gap") || name.contains("momentum") {
            registry.register(Arc::new(GapMomentumStrategy::new(name.clone(), market_data.clone(), hours.start, hours.end)));
        } else if name.contains("put") {
            registry.register(Arc::new(CashSecuredPutStrategy::new(name.clone(), market_data.clone())));
        } else {
            registry.register(Arc::new(LongOptionStrategy::new(name.clone(), market_data.clone())));
        }
    }
    registry
}

#[tokio::main]
async fn main() -> Result<()> {
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(stdout_layer)
        .init();

    let cli = Cli::parse();
    info!("strikecore server {} starting", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load(&cli.config).context("loading configuration")?;
    if cli.dry_run {
        config.strategy_orchestration.dry_run = true;
    }
    if let Some(max_cycles) = cli.max_cycles {
        config.strategy_orchestration.max_cycles = Some(max_cycles);
    }
    info!(mode = ?config.strategy_orchestration.mode, dry_run = config.strategy_orchestration.dry_run, "configuration loaded");

    let store = Arc::new(PlayStore::new(&config.store_root).context("initializing play store")?);
    let provider = Arc::new(MockProvider::new(config.market_data_providers.primary_provider.clone()));
    let broker = Arc::new(MockBroker::new(AccountSnapshot {
        buying_power: rust_decimal_macros::dec!(100_000),
        options_buying_power: Some(rust_decimal_macros::dec!(100_000)),
        equity: rust_decimal_macros::dec!(100_000),
        portfolio_value: rust_decimal_macros::dec!(100_000),
        loaded_ok: true,
        snapshot_instant: None,
    }));
    let market_data = Arc::new(MarketDataManager::new(provider, Vec::new(), &config.market_data_providers));
    let capital = Arc::new(CapitalManager::new(store.clone(), broker.clone(), config.capital_management.clone()));
    let lifecycle = Arc::new(LifecycleEngine::new(store.clone(), broker.clone()));
    let executor = Arc::new(OrderExecutor::new(market_data.clone(), broker.clone(), lifecycle.clone()));
    let registry = build_registry(&config, market_data.clone());

    let orchestrator = Orchestrator::new(store, market_data, capital, lifecycle, executor, registry, config.clone());

    let mut interval = tokio::time::interval(Duration::from_secs(config.strategy_orchestration.cycle_interval_secs.max(1)));
    let mut cycles_run: u64 = 0;

    info!("orchestration loop starting, press Ctrl+C to stop");
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let now = chrono::Utc::now().time();
                let hours = &config.market_hours.regular_hours;
                if now < hours.start || now > hours.end {
                    info!("outside regular market hours, skipping cycle");
                    continue;
                }
                let report = orchestrator.run_cycle().await;
                cycles_run += 1;
                info!(
                    cycle = report.cycle_id,
                    entries = report.entries_submitted,
                    exits = report.exits_submitted,
                    failures = report.failures.len(),
                    "cycle finished"
                );
                for failure in &report.failures {
                    tracing::warn!(strategy = %failure.strategy, detail = %failure.detail, "strategy faulted this cycle");
                }
                if let Some(max) = config.strategy_orchestration.max_cycles {
                    if cycles_run >= max {
                        info!(cycles_run, "max_cycles reached, shutting down");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, exiting");
                break;
            }
        }
    }

    Ok(())
}
