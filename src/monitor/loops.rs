//! Long-running monitoring loops
//!
//! One detection task per chain, plus the risk tick, the position-refresh
//! tick and the event persistence task. Chains never block one another; the
//! only shared state is the quote board and the risk gate's ledger.

use alloy::primitives::Address;
use chrono::Utc;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tracing::{debug, error, info, warn};

use crate::{
    bridge::BridgeRouter,
    config::{ChainConfig, Config},
    errors::{BotError, BotResult, CircuitBreaker},
    events::{BotEvent, EventBus},
    execution::FlashLoanEngine,
    gateway::{ChainGateway, PriceOracle},
    monitor::detector::{VenueQuote, detect_spreads},
    positions::PositionTracker,
    profitability::{build_gas_model, estimate_net_profit},
    risk::RiskGate,
    storage,
    strategy::{classify_opportunity, select_flash_provider},
    types::{Opportunity, Venue, pools_for_chain, token_decimals},
    utils::pow10,
};

#[derive(Default)]
pub struct SessionStats {
    pub opportunities_detected: u64,
    pub executions: u64,
    pub settled: u64,
    pub skipped: HashMap<String, u32>,
}

/// Everything the loops share. Gateways and engines are per-chain; the
/// quote board and stats are the only cross-chain state besides the gate.
pub struct MonitorCtx {
    pub config: Arc<Config>,
    pub gateways: HashMap<u64, Arc<dyn ChainGateway>>,
    pub engines: HashMap<u64, Arc<FlashLoanEngine>>,
    pub router: Arc<BridgeRouter>,
    pub gate: Arc<RiskGate>,
    pub tracker: Arc<PositionTracker>,
    pub oracle: Arc<dyn PriceOracle>,
    pub breaker: Arc<CircuitBreaker>,
    pub events: EventBus,
    pub board: Mutex<HashMap<(u64, Address), VenueQuote>>,
    pub stats: Mutex<SessionStats>,
}

/// Detection loop for one chain. Polls at the chain's own cadence.
pub async fn run_chain_loop(
    ctx: Arc<MonitorCtx>,
    chain: ChainConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(chain.poll_interval_ms));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    info!(
        "👁  Monitoring {} every {}ms",
        chain.name, chain.poll_interval_ms
    );

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if !ctx.breaker.can_proceed().await {
                    debug!("⚡ Circuit breaker open, skipping {} cycle", chain.name);
                    continue;
                }
                if let Err(e) = run_detection_cycle(&ctx, &chain, shutdown.clone()).await {
                    warn!("{} cycle failed: {}", chain.name, e);
                    if ctx.breaker.record_error(e.code()).await {
                        breaker_tripped(&ctx, e.code()).await;
                    }
                }
            }
            _ = shutdown.changed() => {
                info!("Stopping {} monitor", chain.name);
                return;
            }
        }
    }
}

async fn run_detection_cycle(
    ctx: &Arc<MonitorCtx>,
    chain: &ChainConfig,
    cancel: watch::Receiver<bool>,
) -> BotResult<()> {
    let gateway = ctx
        .gateways
        .get(&chain.chain_id)
        .ok_or_else(|| BotError::Validation {
            reason: format!("no gateway for {}", chain.name),
        })?;

    // Refresh this chain's quotes on the shared board.
    for (name, pool) in pools_for_chain(chain.chain_id) {
        match read_venue_quote(gateway.as_ref(), &chain.name, name, *pool).await {
            Ok(quote) => {
                ctx.board
                    .lock()
                    .await
                    .insert((chain.chain_id, *pool), quote);
                ctx.breaker.record_success("network").await;
            }
            Err(e) => {
                warn!("Quote refresh failed for {} on {}: {}", name, chain.name, e);
                if ctx.breaker.record_error("network").await {
                    breaker_tripped(ctx, "network").await;
                }
            }
        }
    }

    // Detect over every fresh quote; other chains' quotes make the
    // cross-chain pairs.
    let now = Utc::now();
    let quotes: Vec<VenueQuote> = ctx.board.lock().await.values().cloned().collect();
    let opportunities = detect_spreads(
        &quotes,
        ctx.config.min_spread_pct,
        ctx.config.borrow_amount_usd,
        now,
    );

    // Only act on spreads anchored on this chain, so one opportunity is
    // not chased by every chain loop at once.
    for opportunity in opportunities
        .into_iter()
        .filter(|o| o.chain_ids[0] == chain.chain_id)
    {
        handle_opportunity(ctx, opportunity, cancel.clone()).await;
    }

    Ok(())
}

/// Read one pool's state and reduce it to a quote. The borrow side is the
/// stable leg when there is one, token0 otherwise.
async fn read_venue_quote(
    gateway: &dyn ChainGateway,
    network: &str,
    name: &str,
    pool: Address,
) -> BotResult<VenueQuote> {
    let (token0, token1) = gateway.pool_tokens(pool).await?;
    let (r0, r1) = gateway.pool_reserves(pool).await?;

    let (borrow_token, counter_token, borrow_raw, counter_raw) = if token_decimals(token0) == 6 {
        (token0, token1, r0, r1)
    } else {
        (token1, token0, r1, r0)
    };

    let borrow_scaled = rust_decimal::Decimal::from(
        u128::try_from(borrow_raw).map_err(|_| BotError::DataParsing {
            context: format!("borrow reserve of {name}"),
            source: anyhow::anyhow!("reserve exceeds u128"),
        })?,
    ) / pow10(token_decimals(borrow_token) as i32);
    let counter_scaled = rust_decimal::Decimal::from(
        u128::try_from(counter_raw).map_err(|_| BotError::DataParsing {
            context: format!("counter reserve of {name}"),
            source: anyhow::anyhow!("reserve exceeds u128"),
        })?,
    ) / pow10(token_decimals(counter_token) as i32);

    if borrow_scaled <= dec!(0) || counter_scaled <= dec!(0) {
        return Err(BotError::InsufficientLiquidity {
            venue: name.to_string(),
            required: dec!(0),
            available: dec!(0),
        });
    }

    Ok(VenueQuote {
        venue: Venue {
            name: name.to_string(),
            chain_id: gateway.chain_id(),
            pool,
        },
        network: network.to_string(),
        borrow_token,
        counter_token,
        price: borrow_scaled / counter_scaled,
        borrow_liquidity: borrow_scaled,
        observed_at: Utc::now(),
    })
}

/// Route one detected opportunity to the right execution path and digest
/// the outcome. Benign skips are business as usual; everything else feeds
/// the circuit breaker.
async fn handle_opportunity(
    ctx: &Arc<MonitorCtx>,
    opportunity: Opportunity,
    cancel: watch::Receiver<bool>,
) {
    {
        let mut stats = ctx.stats.lock().await;
        stats.opportunities_detected += 1;
    }

    let arb_type = classify_opportunity(&opportunity);
    info!(
        "💹 {} | {} | borrow ${} | gross ${}",
        opportunity.network,
        arb_type.as_str(),
        opportunity.borrow_amount,
        opportunity.expected_gross_output
    );

    if !ctx.config.enable_execution {
        debug!("Execution disabled, opportunity {} not taken", opportunity.id);
        return;
    }

    let outcome = if arb_type.is_cross_chain() {
        ctx.router.execute_cross_chain(&opportunity, cancel).await
    } else {
        execute_on_chain(ctx, &opportunity).await
    };

    match outcome {
        Ok(result) => {
            let mut stats = ctx.stats.lock().await;
            stats.executions += 1;
            if result.is_success() {
                stats.settled += 1;
            }
            drop(stats);
            ctx.breaker.record_success("execution").await;
            if let Err(e) = storage::save_execution_result(&result) {
                error!("Failed to save execution result: {}", e);
            }
        }
        Err(e) if e.is_benign() => {
            debug!("Skipping opportunity {}: {}", opportunity.id, e);
            let mut stats = ctx.stats.lock().await;
            *stats.skipped.entry(e.code().to_string()).or_insert(0) += 1;
            drop(stats);
            // Repeated pre-flight reverts are a signal even though each one
            // is individually harmless.
            if matches!(e, BotError::SimulationFailed { .. })
                && ctx.breaker.record_error(e.code()).await
            {
                breaker_tripped(ctx, e.code()).await;
            }
        }
        Err(e) => {
            warn!("Execution failed for {}: {}", opportunity.id, e);
            let mut stats = ctx.stats.lock().await;
            *stats.skipped.entry(e.code().to_string()).or_insert(0) += 1;
            drop(stats);
            if ctx.breaker.record_error(e.code()).await {
                breaker_tripped(ctx, e.code()).await;
            }
        }
    }
}

/// Single-chain flash-loan path: fresh gas quote, pre-filter on the
/// configured minimum profit, then the engine's full protocol.
async fn execute_on_chain(
    ctx: &Arc<MonitorCtx>,
    opportunity: &Opportunity,
) -> BotResult<crate::types::ExecutionResult> {
    let chain_id = opportunity.chain_ids[0];
    let gateway = ctx
        .gateways
        .get(&chain_id)
        .ok_or_else(|| BotError::Validation {
            reason: format!("no gateway for chain {chain_id}"),
        })?;
    let engine = ctx
        .engines
        .get(&chain_id)
        .ok_or_else(|| BotError::Validation {
            reason: format!("no engine for chain {chain_id}"),
        })?;

    let arb_type = classify_opportunity(opportunity);
    let native_price = ctx.oracle.spot_price("ETHUSDC").await?;
    let block = gateway.latest_block().await?;
    // A stale or missing gas quote skips the opportunity here.
    let gas_model = build_gas_model(
        &block,
        Utc::now(),
        ctx.config.block_staleness_secs,
        opportunity.gross_edge(),
        native_price,
        arb_type,
    )?;

    if gas_model.max_fee_per_gas_wei > crate::utils::gwei_to_wei(ctx.config.max_gas_price_gwei) {
        return Err(BotError::Validation {
            reason: format!(
                "gas price {} wei above the configured cap",
                gas_model.max_fee_per_gas_wei
            ),
        });
    }

    let provider =
        select_flash_provider(chain_id).ok_or_else(|| BotError::Validation {
            reason: format!("no flash-loan provider on chain {chain_id}"),
        })?;
    let estimate =
        estimate_net_profit(opportunity, gas_model.clone(), provider.fee_rate, dec!(0));
    if estimate.net_profit < ctx.config.min_profit_usd {
        return Err(BotError::NotProfitable {
            net_profit: estimate.net_profit,
        });
    }

    engine.execute(opportunity, gas_model).await
}

async fn breaker_tripped(ctx: &Arc<MonitorCtx>, kind: &str) {
    let reason = ctx
        .breaker
        .open_reason()
        .await
        .unwrap_or_else(|| format!("repeated `{kind}` failures"));
    ctx.gate
        .raise_alert(crate::types::RiskAlert::new(
            crate::types::AlertSeverity::Critical,
            "circuit_breaker",
            reason,
        ))
        .await;
}

/// Periodic health snapshot: gateway freshness per chain, oracle
/// reachability, breaker state and uptime.
pub async fn run_health_loop(
    ctx: Arc<MonitorCtx>,
    start_time: std::time::Instant,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let health = health_snapshot(&ctx, start_time).await;
                info!(
                    "🏥 Health Check: chains={:?}, oracle={}, uptime={}s, window_failures={}",
                    health.chain_connections,
                    if health.oracle_connection { "OK" } else { "FAIL" },
                    health.uptime_seconds,
                    health.window_failures
                );
                if health.circuit_breaker_active {
                    warn!("⚡ Circuit breaker is OPEN");
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}

async fn health_snapshot(
    ctx: &Arc<MonitorCtx>,
    start_time: std::time::Instant,
) -> crate::types::HealthStatus {
    let now = Utc::now();
    let board = ctx.board.lock().await;
    let mut chain_connections: HashMap<String, bool> = ctx
        .config
        .chains
        .iter()
        .map(|c| (c.name.clone(), false))
        .collect();
    for quote in board.values() {
        if now - quote.observed_at
            <= chrono::Duration::seconds(crate::monitor::detector::QUOTE_STALENESS_SECS)
        {
            chain_connections.insert(quote.network.clone(), true);
        }
    }
    drop(board);

    crate::types::HealthStatus {
        chain_connections,
        oracle_connection: ctx.oracle.spot_price("ETHUSDC").await.is_ok(),
        window_failures: ctx.breaker.failure_count().await,
        circuit_breaker_active: ctx.breaker.is_open().await,
        uptime_seconds: start_time.elapsed().as_secs(),
    }
}

/// Risk tick: the full rule table runs every few seconds, independent of
/// execution traffic.
pub async fn run_risk_loop(gate: Arc<RiskGate>, secs: u64, mut shutdown: watch::Receiver<bool>) {
    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                let metrics = gate.evaluate(Utc::now()).await;
                debug!(
                    score = %metrics.risk_score,
                    state = ?metrics.state,
                    exposure = %metrics.total_exposure,
                    "Risk tick"
                );
            }
            _ = shutdown.changed() => return,
        }
    }
}

/// Mark-to-market tick for open positions.
pub async fn run_position_loop(
    tracker: Arc<PositionTracker>,
    secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {
                match tracker.refresh(Utc::now()).await {
                    Ok(closed) if !closed.is_empty() => {
                        info!("Position refresh closed {} position(s)", closed.len());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Position refresh failed: {}", e),
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}

/// Persist alerts and transfer updates as they come off the bus.
/// Execution results are saved at the point of execution.
pub async fn run_persistence_loop(events: EventBus, mut shutdown: watch::Receiver<bool>) {
    let mut rx = events.subscribe();
    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(BotEvent::RiskAlert(alert)) => {
                        if let Err(e) = storage::save_risk_alert(&alert) {
                            error!("Failed to save alert: {}", e);
                        }
                    }
                    Ok(BotEvent::BridgeTransferUpdate(transfer)) if transfer.is_terminal() => {
                        if let Err(e) = storage::save_bridge_transfer(&transfer) {
                            error!("Failed to save bridge transfer: {}", e);
                        }
                    }
                    Ok(_) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Persistence loop lagged, dropped {} event(s)", n);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
            _ = shutdown.changed() => return,
        }
    }
}
