//! Flashpath Arbitrage Bot - Main Entry Point
//!
//! Wires the chain gateways, risk gate, flash-loan engines and bridge
//! router together, then runs the per-chain monitoring loops until shutdown.

use flashpath_arb_bot::*;
use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, watch};
use tracing::{error, info, warn};

use bridge::{BridgeClient, BridgeRouter, EvmBridgeClient, default_bridges};
use errors::CircuitBreaker;
use events::EventBus;
use execution::{FlashLoanEngine, LeaseRegistry};
use gateway::{ChainGateway, EvmGateway, HttpPriceOracle, PriceOracle};
use monitor::{MonitorCtx, SessionStats};
use positions::PositionTracker;
use risk::RiskGate;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    let _logging_guard = utils::setup_logging()?;
    utils::setup_output_directories()?;

    // Load configuration
    let config = Arc::new(Config::load());

    info!("⚡ Flashpath Arbitrage Bot v0.5.0 - Flash Loans, Risk Gate & Bridges");
    info!("📋 Configuration:");
    info!("   Chains: {}", config.chains.iter().map(|c| c.name.as_str()).collect::<Vec<_>>().join(", "));
    info!("   Borrow Size: ${}", config.borrow_amount_usd);
    info!("   Min Profit: ${}", config.min_profit_usd);
    info!("   Min Spread: {}%", config.min_spread_pct);
    info!("   Execution: {}", config.enable_execution);
    info!("   Max Position: ${}", config.risk.max_position_size);
    info!("   Daily Loss Cap: ${}", config.risk.max_daily_loss);
    info!("   Max Drawdown: {}%", config.risk.max_drawdown_pct);
    info!("   Stop Loss: {}%", config.risk.stop_loss_pct);

    if !config.enable_execution {
        info!("   🔍 DETECTION-ONLY MODE - no transactions will be submitted");
    }

    // Validate configuration
    if config.borrow_amount_usd < config::MIN_BORROW_USD
        || config.borrow_amount_usd > config::MAX_BORROW_USD
    {
        return Err(anyhow::anyhow!(
            "Borrow amount out of bounds: ${}",
            config.borrow_amount_usd
        ));
    }

    // Shared components
    let events = EventBus::default();
    let gate = Arc::new(RiskGate::new(config.risk.clone(), events.clone()));
    let breaker = Arc::new(CircuitBreaker::new(
        config.breaker_window_secs,
        config.breaker_threshold,
        config.breaker_cooldown_secs,
    ));
    let oracle: Arc<dyn PriceOracle> =
        Arc::new(HttpPriceOracle::new(config.oracle_base_url.clone())?);
    let leases = LeaseRegistry::new();

    // Connect one gateway per configured chain; a chain that will not
    // connect is skipped, the rest keep running.
    let mut gateways: HashMap<u64, Arc<dyn ChainGateway>> = HashMap::new();
    let mut engines: HashMap<u64, Arc<FlashLoanEngine>> = HashMap::new();
    for chain in &config.chains {
        match EvmGateway::connect(chain, config.execution_timeout_secs).await {
            Ok(gateway) => {
                let gateway: Arc<dyn ChainGateway> = Arc::new(gateway);
                engines.insert(
                    chain.chain_id,
                    Arc::new(FlashLoanEngine::new(
                        Arc::clone(&gateway),
                        Arc::clone(&gate),
                        leases.clone(),
                        events.clone(),
                    )),
                );
                gateways.insert(chain.chain_id, gateway);
            }
            Err(e) => {
                warn!("⚠️ Skipping {}: {}", chain.name, e);
            }
        }
    }

    if gateways.is_empty() {
        return Err(anyhow::anyhow!("No chain gateways connected"));
    }
    info!("✅ Connected to {} chain(s)", gateways.len());

    // Bridge clients share the gateway pool
    let bridges = default_bridges();
    let mut clients: HashMap<String, Arc<dyn BridgeClient>> = HashMap::new();
    for bridge in &bridges {
        clients.insert(
            bridge.name.clone(),
            Arc::new(EvmBridgeClient::new(bridge, gateways.clone())),
        );
    }

    let router = Arc::new(BridgeRouter::new(
        bridges,
        clients,
        gateways.clone(),
        Arc::clone(&oracle),
        Arc::clone(&gate),
        leases.clone(),
        events.clone(),
        Duration::from_secs(config.bridge_poll_interval_secs),
        config.bridge_safety_factor,
        config.block_staleness_secs,
    ));

    let tracker = Arc::new(PositionTracker::new(
        Arc::clone(&gate),
        Arc::clone(&oracle),
    ));

    let ctx = Arc::new(MonitorCtx {
        config: Arc::clone(&config),
        gateways,
        engines,
        router,
        gate: Arc::clone(&gate),
        tracker: Arc::clone(&tracker),
        oracle,
        breaker,
        events: events.clone(),
        board: Mutex::new(HashMap::new()),
        stats: Mutex::new(SessionStats::default()),
    });

    // Shutdown fan-out
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        info!("\n📛 Received shutdown signal (Ctrl+C)...");
        let _ = shutdown_tx.send(true);
    });

    info!("\n🚀 Starting monitoring loops...\n");
    let start_time = Instant::now();

    let mut tasks = Vec::new();
    for chain in &config.chains {
        if !ctx.gateways.contains_key(&chain.chain_id) {
            continue;
        }
        tasks.push(tokio::spawn(monitor::run_chain_loop(
            Arc::clone(&ctx),
            chain.clone(),
            shutdown_rx.clone(),
        )));
    }
    tasks.push(tokio::spawn(monitor::run_risk_loop(
        Arc::clone(&gate),
        config.risk_tick_secs,
        shutdown_rx.clone(),
    )));
    tasks.push(tokio::spawn(monitor::run_position_loop(
        tracker,
        config.position_refresh_secs,
        shutdown_rx.clone(),
    )));
    tasks.push(tokio::spawn(monitor::run_health_loop(
        Arc::clone(&ctx),
        start_time,
        shutdown_rx.clone(),
    )));
    tasks.push(tokio::spawn(monitor::run_persistence_loop(
        events,
        shutdown_rx.clone(),
    )));

    for task in tasks {
        if let Err(e) = task.await {
            error!("Monitoring task panicked: {}", e);
        }
    }

    print_final_statistics(start_time, &ctx, &gate).await;

    Ok(())
}

/// Print final statistics on shutdown
async fn print_final_statistics(start_time: Instant, ctx: &Arc<MonitorCtx>, gate: &Arc<RiskGate>) {
    let stats = ctx.stats.lock().await;
    let metrics = gate.metrics().await;

    info!("\n🛑 Shutting down gracefully...");
    info!("Final statistics:");
    info!("   Total runtime: {:?}", start_time.elapsed());
    info!("   Opportunities detected: {}", stats.opportunities_detected);
    info!("   Executions attempted: {}", stats.executions);
    info!("   Executions settled: {}", stats.settled);
    info!("   Daily PnL: ${}", metrics.daily_pnl);
    info!("   Open positions at exit: {}", metrics.open_positions);
    info!("   Final risk state: {:?}", metrics.state);
    if !stats.skipped.is_empty() {
        info!("   Skip reasons: {:?}", stats.skipped);
    }
}
