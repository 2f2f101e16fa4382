//! Bridge router
//!
//! Drives one cross-chain transfer through its lifecycle:
//! Quoted -> SourceSubmitted -> Bridging -> TargetExecuting -> Settled|Failed.
//! Bridging is a bounded wait with cancellation; any failure lands in the
//! recovery routine rather than leaving the transfer unresolved.

use alloy::primitives::{U256, keccak256};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    bridge::selection::{bridging_deadline_secs, select_route},
    errors::{BotError, BotResult},
    events::{BotEvent, EventBus},
    execution::builder::to_token_units,
    execution::lease::LeaseRegistry,
    gateway::{ChainGateway, PriceOracle, TxPlan},
    profitability::{build_gas_model, estimate_net_profit},
    risk::RiskGate,
    strategy::{classify_opportunity, select_flash_provider},
    types::{
        AlertSeverity, BridgeInfo, BridgeRoute, BridgeStatus, ExecutionResult, ExecutionStatus,
        GasModel, Opportunity, PendingBridgeTransfer, Position, RiskAlert, TransferState,
        oracle_symbol,
    },
    validation::validate_opportunity,
};

/// Fresh quote from a bridge contract for a prepared route.
#[derive(Debug, Clone)]
pub struct BridgeQuote {
    pub fee_usd: Decimal,
    pub eta_secs: u64,
}

/// Narrow interface to one bridge's contracts.
#[async_trait]
pub trait BridgeClient: Send + Sync {
    async fn quote(&self, route: &BridgeRoute) -> BotResult<BridgeQuote>;
    /// Submit the source-chain deposit; returns the source tx hash.
    async fn deposit(&self, route: &BridgeRoute, transfer_id: Uuid) -> BotResult<String>;
    async fn status(&self, transfer_id: Uuid) -> BotResult<BridgeStatus>;
}

pub struct BridgeRouter {
    bridges: Vec<BridgeInfo>,
    clients: HashMap<String, Arc<dyn BridgeClient>>,
    gateways: HashMap<u64, Arc<dyn ChainGateway>>,
    oracle: Arc<dyn PriceOracle>,
    gate: Arc<RiskGate>,
    leases: LeaseRegistry,
    events: EventBus,
    poll_interval: Duration,
    safety_factor: Decimal,
    block_staleness_secs: u64,
}

impl BridgeRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bridges: Vec<BridgeInfo>,
        clients: HashMap<String, Arc<dyn BridgeClient>>,
        gateways: HashMap<u64, Arc<dyn ChainGateway>>,
        oracle: Arc<dyn PriceOracle>,
        gate: Arc<RiskGate>,
        leases: LeaseRegistry,
        events: EventBus,
        poll_interval: Duration,
        safety_factor: Decimal,
        block_staleness_secs: u64,
    ) -> Self {
        Self {
            bridges,
            clients,
            gateways,
            oracle,
            gate,
            leases,
            events,
            poll_interval,
            safety_factor,
            block_staleness_secs,
        }
    }

    /// Execute a cross-chain opportunity end to end. The cancellation
    /// channel aborts the bridging wait; on cancellation the transfer is
    /// Failed and recovery runs, it is never left unresolved.
    pub async fn execute_cross_chain(
        &self,
        opportunity: &Opportunity,
        cancel: watch::Receiver<bool>,
    ) -> BotResult<ExecutionResult> {
        let started = Instant::now();
        let now = Utc::now();

        let _lease = self.leases.acquire(opportunity.id)?;

        let validation = validate_opportunity(opportunity, now);
        if !validation.all_passed {
            return Err(BotError::Validation {
                reason: validation.warnings.join("; "),
            });
        }
        if opportunity.chain_ids.len() < 2 {
            return Err(BotError::Validation {
                reason: "cross-chain execution needs two chains".to_string(),
            });
        }

        let arb_type = classify_opportunity(opportunity);
        let source_chain = opportunity.chain_ids[0];
        let target_chain = *opportunity.chain_ids.last().expect("checked above");

        let mut route = select_route(
            &self.bridges,
            source_chain,
            target_chain,
            opportunity.borrow_token,
            opportunity.borrow_amount,
        )
        .ok_or_else(|| BotError::Validation {
            reason: format!(
                "no bridge serves chain {source_chain} -> {target_chain} for the borrow token"
            ),
        })?;

        let client = self
            .clients
            .get(&route.bridge)
            .cloned()
            .ok_or_else(|| BotError::Validation {
                reason: format!("no client for bridge {}", route.bridge),
            })?;

        // Refresh fee and ETA from the bridge contract before pricing.
        let quote = client.quote(&route).await?;
        route.fee_usd = quote.fee_usd;
        route.eta_secs = quote.eta_secs;

        let source_gateway = self.gateway_for(source_chain)?;
        let target_gateway = self.gateway_for(target_chain)?;

        // Total cross-chain profit subtracts the bridge fee and both legs'
        // gas before the risk gate ever sees the request.
        let native_price = self.oracle.spot_price("ETHUSDC").await?;
        let source_block = source_gateway.latest_block().await?;
        let target_block = target_gateway.latest_block().await?;
        let source_gas = build_gas_model(
            &source_block,
            now,
            self.block_staleness_secs,
            opportunity.gross_edge(),
            native_price,
            arb_type,
        )?;
        let target_gas = build_gas_model(
            &target_block,
            now,
            self.block_staleness_secs,
            opportunity.gross_edge(),
            native_price,
            arb_type,
        )?;

        let provider = select_flash_provider(source_chain).ok_or_else(|| BotError::Validation {
            reason: format!("no flash-loan provider on chain {source_chain}"),
        })?;
        let estimate = estimate_net_profit(
            opportunity,
            source_gas,
            provider.fee_rate,
            route.fee_usd + target_gas.estimated_cost_usd,
        );
        if !estimate.is_profitable() {
            return Err(BotError::NotProfitable {
                net_profit: estimate.net_profit,
            });
        }

        let approval = self
            .gate
            .approve(opportunity, arb_type, opportunity.borrow_amount)
            .await?;

        let mut transfer = PendingBridgeTransfer {
            id: Uuid::new_v4(),
            opportunity_id: opportunity.id,
            route: route.clone(),
            state: TransferState::Quoted,
            source_tx_hash: None,
            target_tx_hash: None,
            submitted_at: None,
            expected_arrival: None,
            deadline: None,
            failure_reason: None,
            recovered_loss_usd: None,
        };
        self.publish_transfer(&transfer);

        // Source leg. A deposit failure costs nothing on-chain; the
        // opportunity is simply skipped.
        match client.deposit(&route, transfer.id).await {
            Ok(tx_hash) => {
                info!(
                    transfer_id = %transfer.id,
                    bridge = %route.bridge,
                    %tx_hash,
                    "🌉 Bridge deposit submitted"
                );
                transfer.source_tx_hash = Some(tx_hash);
                transfer.submitted_at = Some(Utc::now());
                transfer.state = TransferState::SourceSubmitted;
                self.publish_transfer(&transfer);
            }
            Err(e) => {
                self.gate.release(&approval).await;
                transfer.state = TransferState::Failed;
                transfer.failure_reason = Some(e.to_string());
                self.publish_transfer(&transfer);
                return Err(e);
            }
        }

        // Bridging: a bounded wait, never indefinite.
        let deadline_secs = bridging_deadline_secs(route.eta_secs, self.safety_factor);
        let submitted = transfer.submitted_at.expect("set above");
        transfer.expected_arrival =
            Some(submitted + ChronoDuration::seconds(route.eta_secs as i64));
        transfer.deadline = Some(submitted + ChronoDuration::seconds(deadline_secs as i64));
        transfer.state = TransferState::Bridging;
        self.publish_transfer(&transfer);

        let target_venue = opportunity
            .venues
            .iter()
            .find(|v| v.chain_id == target_chain)
            .map(|v| v.pool);

        if let Err(e) = self.monitor_bridging(&client, &transfer, cancel).await {
            self.gate.release(&approval).await;
            self.recover(&client, &mut transfer, &target_gateway, target_venue, &target_gas, &e)
                .await;
            return Err(e);
        }

        // Target leg: liquidate the bridged funds into the arbitrage exit.
        transfer.state = TransferState::TargetExecuting;
        self.publish_transfer(&transfer);

        let plan = match build_target_swap(opportunity, &route, &target_gas) {
            Ok(plan) => plan,
            Err(e) => {
                self.gate.release(&approval).await;
                let err = BotError::BridgeFailure {
                    transfer_id: transfer.id,
                    reason: format!("target leg could not be built: {e}"),
                };
                self.recover(&client, &mut transfer, &target_gateway, target_venue, &target_gas, &err)
                    .await;
                return Err(err);
            }
        };
        let receipt = match target_gateway.send_transaction(&plan).await {
            Ok(receipt) if receipt.success => receipt,
            Ok(receipt) => {
                self.gate.release(&approval).await;
                let err = BotError::BridgeFailure {
                    transfer_id: transfer.id,
                    reason: format!("target leg reverted: {}", receipt.tx_hash),
                };
                self.recover(&client, &mut transfer, &target_gateway, target_venue, &target_gas, &err)
                    .await;
                return Err(err);
            }
            Err(e) => {
                self.gate.release(&approval).await;
                let err = BotError::BridgeFailure {
                    transfer_id: transfer.id,
                    reason: e.to_string(),
                };
                self.recover(&client, &mut transfer, &target_gateway, target_venue, &target_gas, &err)
                    .await;
                return Err(err);
            }
        };

        transfer.target_tx_hash = Some(receipt.tx_hash.clone());
        transfer.state = TransferState::Settled;
        self.publish_transfer(&transfer);

        let params = self.gate.parameters().await;
        let position = Position {
            id: Uuid::new_v4(),
            opportunity_id: opportunity.id,
            network: target_gateway.name().to_string(),
            strategy: arb_type,
            symbol: oracle_symbol(opportunity.borrow_token).to_string(),
            entry_price: native_price,
            current_price: native_price,
            size: opportunity.borrow_amount,
            pnl: dec!(0),
            pnl_pct: dec!(0),
            stop_loss_price: native_price * (dec!(1) - params.stop_loss_pct / dec!(100)),
            opened_at: now,
            max_hold_secs: params.max_hold_secs,
            closed_at: None,
            exit_reason: None,
        };
        if let Err(e) = self.gate.commit(&approval, position).await {
            warn!("Position not opened after cross-chain settlement: {}", e);
        }

        let result = ExecutionResult {
            id: Uuid::new_v4(),
            opportunity_id: opportunity.id,
            timestamp: Utc::now(),
            network: target_gateway.name().to_string(),
            arb_type,
            status: ExecutionStatus::Settled,
            tx_hashes: transfer
                .source_tx_hash
                .iter()
                .cloned()
                .chain(std::iter::once(receipt.tx_hash))
                .collect(),
            gas_used: Some(receipt.gas_used),
            expected_profit_usd: estimate.net_profit,
            realized_profit_usd: Some(estimate.net_profit),
            error_code: None,
            execution_time_ms: started.elapsed().as_millis() as u64,
        };
        self.gate
            .record_result(&result, opportunity.borrow_amount)
            .await;
        info!(
            transfer_id = %transfer.id,
            net = %estimate.net_profit,
            "✅ Cross-chain arbitrage settled"
        );
        self.events
            .publish(BotEvent::ExecutionCompleted(result.clone()));
        Ok(result)
    }

    fn gateway_for(&self, chain_id: u64) -> BotResult<Arc<dyn ChainGateway>> {
        self.gateways
            .get(&chain_id)
            .cloned()
            .ok_or_else(|| BotError::Validation {
                reason: format!("no gateway for chain {chain_id}"),
            })
    }

    fn publish_transfer(&self, transfer: &PendingBridgeTransfer) {
        self.events
            .publish(BotEvent::BridgeTransferUpdate(transfer.clone()));
    }

    /// Poll the bridge until completion, the deadline, or cancellation.
    async fn monitor_bridging(
        &self,
        client: &Arc<dyn BridgeClient>,
        transfer: &PendingBridgeTransfer,
        mut cancel: watch::Receiver<bool>,
    ) -> BotResult<()> {
        let deadline = transfer.deadline.expect("deadline set before bridging");
        let submitted = transfer.submitted_at.expect("submitted before bridging");
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match client.status(transfer.id).await {
                        Ok(BridgeStatus::Completed) => return Ok(()),
                        Ok(BridgeStatus::Failed(reason)) => {
                            return Err(BotError::BridgeFailure {
                                transfer_id: transfer.id,
                                reason,
                            });
                        }
                        Ok(BridgeStatus::Pending) => {}
                        // Transient status errors do not fail the transfer;
                        // the deadline bounds how long they can go on.
                        Err(e) => warn!("Bridge status poll failed: {}", e),
                    }
                    let now = Utc::now();
                    if now > deadline {
                        return Err(BotError::BridgeTimeout {
                            transfer_id: transfer.id,
                            elapsed_secs: (now - submitted).num_seconds().max(0) as u64,
                        });
                    }
                }
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        return Err(BotError::BridgeFailure {
                            transfer_id: transfer.id,
                            reason: "bridging cancelled".to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Failure recovery: find where the asset landed, try to liquidate it
    /// there (hold if that also fails), raise a critical alert and realize
    /// the loss against the daily PnL.
    async fn recover(
        &self,
        client: &Arc<dyn BridgeClient>,
        transfer: &mut PendingBridgeTransfer,
        target_gateway: &Arc<dyn ChainGateway>,
        target_venue: Option<alloy::primitives::Address>,
        target_gas: &GasModel,
        cause: &BotError,
    ) {
        error!(
            transfer_id = %transfer.id,
            bridge = %transfer.route.bridge,
            "🚨 Bridge transfer failed, running recovery: {}", cause
        );
        transfer.state = TransferState::Failed;
        transfer.failure_reason = Some(cause.to_string());

        // One final status probe tells us which side holds the asset.
        let landed_on_target =
            matches!(client.status(transfer.id).await, Ok(BridgeStatus::Completed));

        let mut disposition = "held on source chain";
        if landed_on_target {
            disposition = "held on target chain";
            if let Some(venue) = target_venue {
                if let Ok(plan) = liquidation_plan(&transfer.route, venue, target_gas) {
                    if let Ok(receipt) = target_gateway.send_transaction(&plan).await {
                        if receipt.success {
                            transfer.target_tx_hash = Some(receipt.tx_hash);
                            disposition = "liquidated on target chain";
                        }
                    }
                }
            }
        }

        // The bridge fee is sunk either way.
        let loss = transfer.route.fee_usd;
        transfer.recovered_loss_usd = Some(loss);
        self.gate
            .record_loss(loss, &format!("bridge recovery ({disposition})"))
            .await;

        self.gate
            .raise_alert(RiskAlert::new(
                AlertSeverity::Critical,
                "bridge_failure",
                format!(
                    "transfer {} via {} failed ({cause}); asset {disposition}, ${loss} realized",
                    transfer.id, transfer.route.bridge
                ),
            ))
            .await;

        self.publish_transfer(transfer);
    }
}

/// Swap the bridged funds through the target venue,
/// `swapExactTokensForTokens` layout with a slippage-bounded minimum out.
fn build_target_swap(
    opportunity: &Opportunity,
    route: &BridgeRoute,
    gas_model: &GasModel,
) -> BotResult<TxPlan> {
    let venue = opportunity
        .venues
        .iter()
        .find(|v| v.chain_id == route.target_chain_id)
        .ok_or_else(|| BotError::Validation {
            reason: "no venue on the target chain".to_string(),
        })?;

    let amount_in = to_token_units(route.amount, route.token)?;
    let min_out = to_token_units(route.amount * dec!(0.995), route.token)?;
    let deadline = U256::from(Utc::now().timestamp() as u64 + 1200);

    let mut encoded =
        keccak256("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)")[..4]
            .to_vec();
    encoded.extend_from_slice(&amount_in.to_be_bytes::<32>());
    encoded.extend_from_slice(&min_out.to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(160).to_be_bytes::<32>());
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(venue.pool.as_slice());
    encoded.extend_from_slice(&deadline.to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(opportunity.tokens.len()).to_be_bytes::<32>());
    for token in &opportunity.tokens {
        encoded.extend_from_slice(&[0u8; 12]);
        encoded.extend_from_slice(token.as_slice());
    }

    Ok(TxPlan {
        to: venue.pool,
        data: encoded,
        value: U256::ZERO,
        gas_limit: gas_model.gas_limit,
        max_fee_per_gas_wei: gas_model.max_fee_per_gas_wei,
        max_priority_fee_per_gas_wei: gas_model.priority_fee_wei,
    })
}

/// Dump the stranded asset into the target venue at market. Recovery takes
/// whatever the pool gives; a 2% floor guards against outright sandwiching.
fn liquidation_plan(
    route: &BridgeRoute,
    venue_pool: alloy::primitives::Address,
    gas_model: &GasModel,
) -> BotResult<TxPlan> {
    let amount_in = to_token_units(route.amount, route.token)?;
    let min_out = to_token_units(route.amount * dec!(0.98), route.token)?;
    let deadline = U256::from(Utc::now().timestamp() as u64 + 1200);

    let mut encoded =
        keccak256("swapExactTokensForTokens(uint256,uint256,address[],address,uint256)")[..4]
            .to_vec();
    encoded.extend_from_slice(&amount_in.to_be_bytes::<32>());
    encoded.extend_from_slice(&min_out.to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(160).to_be_bytes::<32>());
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(venue_pool.as_slice());
    encoded.extend_from_slice(&deadline.to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(1u8).to_be_bytes::<32>());
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(route.token.as_slice());

    Ok(TxPlan {
        to: venue_pool,
        data: encoded,
        value: U256::ZERO,
        gas_limit: gas_model.gas_limit,
        max_fee_per_gas_wei: gas_model.max_fee_per_gas_wei,
        max_priority_fee_per_gas_wei: gas_model.priority_fee_wei,
    })
}
