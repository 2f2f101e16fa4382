//! Flash-loan execution engine
//!
//! Order of operations is load-bearing: liquidity, profitability and the
//! risk gate all pass before anything touches the wire, the simulation runs
//! before the submission, and the submission happens exactly once under the
//! opportunity's lease.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    errors::{BotError, BotResult},
    events::{BotEvent, EventBus},
    execution::builder::{build_flash_loan_call, from_token_units},
    execution::lease::LeaseRegistry,
    gateway::{ChainGateway, Receipt, SimulationOutcome},
    profitability::estimate_net_profit,
    risk::RiskGate,
    strategy::{classify_opportunity, select_flash_provider},
    types::{
        ExecutionResult, ExecutionStatus, GasModel, Opportunity, Position, oracle_symbol,
    },
    validation::validate_opportunity,
};

pub struct FlashLoanEngine {
    gateway: Arc<dyn ChainGateway>,
    gate: Arc<RiskGate>,
    leases: LeaseRegistry,
    events: EventBus,
}

impl FlashLoanEngine {
    pub fn new(
        gateway: Arc<dyn ChainGateway>,
        gate: Arc<RiskGate>,
        leases: LeaseRegistry,
        events: EventBus,
    ) -> Self {
        Self {
            gateway,
            gate,
            leases,
            events,
        }
    }

    /// Run the borrow -> swap path -> repay protocol for one opportunity.
    ///
    /// Pre-flight failures return benign errors and broadcast nothing. A
    /// post-submission revert comes back as a `Reverted` result: the flash
    /// loan unwound the transaction, so no principal was lost.
    pub async fn execute(
        &self,
        opportunity: &Opportunity,
        gas_model: GasModel,
    ) -> BotResult<ExecutionResult> {
        let started = Instant::now();
        let now = Utc::now();

        // One in-flight attempt per opportunity; a concurrent second
        // attempt is rejected, not queued.
        let _lease = self.leases.acquire(opportunity.id)?;

        let validation = validate_opportunity(opportunity, now);
        if !validation.all_passed {
            return Err(BotError::Validation {
                reason: validation.warnings.join("; "),
            });
        }

        let arb_type = classify_opportunity(opportunity);
        let provider = select_flash_provider(self.gateway.chain_id()).ok_or_else(|| {
            BotError::Validation {
                reason: format!(
                    "no flash-loan provider on chain {}",
                    self.gateway.chain_id()
                ),
            }
        })?;

        // Venue liquidity must cover the requested borrow.
        let venue = &opportunity.venues[0];
        let (token0, token1) = self.gateway.pool_tokens(venue.pool).await?;
        let (r0, r1) = self.gateway.pool_reserves(venue.pool).await?;
        let (borrow_reserve, counter_reserve, counter_token) =
            if token0 == opportunity.borrow_token {
                (r0, r1, token1)
            } else if token1 == opportunity.borrow_token {
                (r1, r0, token0)
            } else {
                return Err(BotError::Validation {
                    reason: format!("borrow token not held by venue {}", venue.name),
                });
            };

        let available = from_token_units(borrow_reserve, opportunity.borrow_token)?;
        if available < opportunity.borrow_amount {
            return Err(BotError::InsufficientLiquidity {
                venue: venue.name.clone(),
                required: opportunity.borrow_amount,
                available,
            });
        }

        // Recompute profitability under the fresh gas model. Nothing is
        // ever submitted at or below break-even.
        let estimate = estimate_net_profit(opportunity, gas_model, provider.fee_rate, dec!(0));
        if !estimate.is_profitable() {
            return Err(BotError::NotProfitable {
                net_profit: estimate.net_profit,
            });
        }

        // Entry mark derived from the same reserves the liquidity check
        // used: borrow units per counter unit.
        let counter_units = from_token_units(counter_reserve, counter_token)?;
        if counter_units <= dec!(0) {
            return Err(BotError::Validation {
                reason: format!("venue {} has zero counter reserves", venue.name),
            });
        }
        let entry_price = available / counter_units;

        // The single gate in front of submission.
        let approval = self
            .gate
            .approve(opportunity, arb_type, opportunity.borrow_amount)
            .await?;

        let min_return = opportunity.borrow_amount + estimate.flash_loan_fee;
        let plan =
            match build_flash_loan_call(opportunity, provider, &estimate.gas_model, min_return) {
                Ok(plan) => plan,
                Err(e) => {
                    self.gate.release(&approval).await;
                    return Err(e);
                }
            };

        // Dry run first; a simulated revert means nothing is broadcast.
        match self.gateway.simulate(&plan).await {
            Ok(SimulationOutcome::Ok(_)) => {}
            Ok(SimulationOutcome::Revert(reason)) => {
                self.gate.release(&approval).await;
                return Err(BotError::SimulationFailed { reason });
            }
            Err(e) => {
                self.gate.release(&approval).await;
                return Err(e);
            }
        }

        info!(
            opportunity_id = %opportunity.id,
            provider = provider.name,
            net = %estimate.net_profit,
            "🚀 Submitting flash-loan arbitrage"
        );

        let receipt = match self.gateway.send_transaction(&plan).await {
            Ok(receipt) => receipt,
            Err(e) => {
                self.gate.release(&approval).await;
                return Err(e);
            }
        };

        let execution_time_ms = started.elapsed().as_millis() as u64;

        if !receipt.success {
            // Atomic unwind: benign, the repay could not be met on-chain.
            self.gate.release(&approval).await;
            warn!(
                tx_hash = %receipt.tx_hash,
                "Flash loan reverted on-chain; transaction unwound, no funds lost"
            );
            let result = ExecutionResult {
                id: Uuid::new_v4(),
                opportunity_id: opportunity.id,
                timestamp: Utc::now(),
                network: opportunity.network.clone(),
                arb_type,
                status: ExecutionStatus::Reverted,
                tx_hashes: vec![receipt.tx_hash],
                gas_used: Some(receipt.gas_used),
                expected_profit_usd: estimate.net_profit,
                realized_profit_usd: None,
                error_code: Some("execution_reverted".to_string()),
                execution_time_ms,
            };
            self.events
                .publish(BotEvent::ExecutionCompleted(result.clone()));
            return Ok(result);
        }

        let realized = parse_realized_profit(&receipt, opportunity)
            .map(|gross| gross - estimate.gas_cost_usd)
            .unwrap_or(estimate.net_profit);

        let params = self.gate.parameters().await;
        let position = Position {
            id: Uuid::new_v4(),
            opportunity_id: opportunity.id,
            network: opportunity.network.clone(),
            strategy: arb_type,
            symbol: oracle_symbol(counter_token).to_string(),
            entry_price,
            current_price: entry_price,
            size: opportunity.borrow_amount,
            pnl: dec!(0),
            pnl_pct: dec!(0),
            stop_loss_price: entry_price * (dec!(1) - params.stop_loss_pct / dec!(100)),
            opened_at: now,
            max_hold_secs: params.max_hold_secs,
            closed_at: None,
            exit_reason: None,
        };

        if let Err(e) = self.gate.commit(&approval, position).await {
            // Emergency entered mid-flight: the trade settled but the book
            // will not carry the position.
            warn!("Position not opened after settlement: {}", e);
        }

        let result = ExecutionResult {
            id: Uuid::new_v4(),
            opportunity_id: opportunity.id,
            timestamp: Utc::now(),
            network: opportunity.network.clone(),
            arb_type,
            status: ExecutionStatus::Settled,
            tx_hashes: vec![receipt.tx_hash],
            gas_used: Some(receipt.gas_used),
            expected_profit_usd: estimate.net_profit,
            realized_profit_usd: Some(realized),
            error_code: None,
            execution_time_ms,
        };
        self.gate
            .record_result(&result, opportunity.borrow_amount)
            .await;
        info!(
            opportunity_id = %opportunity.id,
            realized = %realized,
            gas_used = receipt.gas_used,
            "✅ Flash-loan arbitrage settled"
        );
        self.events
            .publish(BotEvent::ExecutionCompleted(result.clone()));
        Ok(result)
    }
}

/// The executor emits the realized repay surplus (borrow-token units) as the
/// data of its final settlement log.
fn parse_realized_profit(receipt: &Receipt, opportunity: &Opportunity) -> Option<Decimal> {
    let log = receipt.logs.last()?;
    if log.data.len() != 32 {
        return None;
    }
    let units = alloy::primitives::U256::from_be_slice(&log.data);
    from_token_units(units, opportunity.borrow_token).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::mock::MockGateway;
    use crate::types::{
        ArbitrageType, CHAIN_BASE, RiskParameters, StrategyHints, UrgencyTier, USDC_BASE, Venue,
        WETH_BASE,
    };
    use alloy::primitives::{Address, U256};
    use chrono::Duration;

    fn opportunity(borrow: Decimal, gross: Decimal) -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            deadline: Utc::now() + Duration::seconds(30),
            tokens: vec![USDC_BASE, WETH_BASE],
            venues: vec![Venue {
                name: "weth-usdc".to_string(),
                chain_id: CHAIN_BASE,
                pool: Address::repeat_byte(7),
            }],
            chain_ids: vec![CHAIN_BASE],
            network: "base".to_string(),
            borrow_token: USDC_BASE,
            borrow_amount: borrow,
            expected_gross_output: gross,
            hints: StrategyHints::default(),
        }
    }

    fn gas_model(cost_usd: Decimal) -> GasModel {
        GasModel {
            block_number: 1,
            base_fee_wei: 10_000_000_000,
            priority_fee_wei: 20_000_000_000,
            max_fee_per_gas_wei: 40_000_000_000,
            gas_limit: 400_000,
            estimated_cost_wei: 12_000_000_000_000_000,
            estimated_cost_usd: cost_usd,
            urgency: UrgencyTier::High,
        }
    }

    fn mock_gateway() -> MockGateway {
        let mut gateway = MockGateway::new(CHAIN_BASE, "base");
        gateway.tokens = (USDC_BASE, WETH_BASE);
        // 1M USDC and ~333 WETH in reserves.
        gateway.reserves = (
            U256::from(1_000_000u64) * U256::from(1_000_000u64),
            U256::from(333u64) * U256::from(10u64).pow(U256::from(18)),
        );
        gateway
    }

    fn engine(gateway: Arc<MockGateway>) -> (FlashLoanEngine, Arc<RiskGate>) {
        let gate = Arc::new(RiskGate::new(
            RiskParameters {
                max_position_size: dec!(200000),
                max_network_exposure: dec!(500000),
                max_strategy_exposure: dec!(500000),
                ..RiskParameters::default()
            },
            EventBus::default(),
        ));
        let engine = FlashLoanEngine::new(
            gateway,
            Arc::clone(&gate),
            LeaseRegistry::new(),
            EventBus::default(),
        );
        (engine, gate)
    }

    #[tokio::test]
    async fn profitable_attempt_submits_once_and_opens_a_position() {
        let mut gw = mock_gateway();
        // 150 USDC surplus reported by the executor log.
        gw.realized_output = Some(U256::from(150_000_000u64));
        let gateway = Arc::new(gw);
        let (engine, gate) = engine(Arc::clone(&gateway));

        let opp = opportunity(dec!(100000), dec!(100500));
        let result = engine.execute(&opp, gas_model(dec!(2))).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Settled);
        assert_eq!(gateway.submission_count(), 1);
        // 150 gross surplus minus 2 gas.
        assert_eq!(result.realized_profit_usd, Some(dec!(148)));

        let positions = gate.open_positions().await;
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].size, dec!(100000));
        assert_eq!(positions[0].strategy, ArbitrageType::IntraVenueSimple);
    }

    #[tokio::test]
    async fn simulated_revert_broadcasts_nothing() {
        let mut gw = mock_gateway();
        gw.simulate_outcome = SimulationOutcome::Revert("SPL: insufficient output".to_string());
        let gateway = Arc::new(gw);
        let (engine, gate) = engine(Arc::clone(&gateway));

        let opp = opportunity(dec!(100000), dec!(100500));
        let result = engine.execute(&opp, gas_model(dec!(2))).await;

        assert!(matches!(result, Err(BotError::SimulationFailed { .. })));
        assert_eq!(gateway.submission_count(), 0);
        assert!(gate.open_positions().await.is_empty());

        // The reservation was released: the same book approves new work.
        let opp2 = opportunity(dec!(100000), dec!(100500));
        assert!(
            gate.approve(&opp2, ArbitrageType::IntraVenueSimple, dec!(100000))
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn unprofitable_attempt_is_rejected_before_broadcast() {
        // Same edge as the profitable case but gas eats it: 500 gross edge
        // against 600 of gas -> net < 0.
        let gateway = Arc::new(mock_gateway());
        let (engine, _gate) = engine(Arc::clone(&gateway));

        let opp = opportunity(dec!(100000), dec!(100500));
        let result = engine.execute(&opp, gas_model(dec!(600))).await;

        assert!(matches!(result, Err(BotError::NotProfitable { .. })));
        assert_eq!(gateway.submission_count(), 0);
    }

    #[tokio::test]
    async fn insufficient_liquidity_skips_the_opportunity() {
        let mut gw = mock_gateway();
        // Only 50k USDC in the pool against a 100k borrow.
        gw.reserves = (
            U256::from(50_000u64) * U256::from(1_000_000u64),
            U256::from(17u64) * U256::from(10u64).pow(U256::from(18)),
        );
        let gateway = Arc::new(gw);
        let (engine, _gate) = engine(Arc::clone(&gateway));

        let opp = opportunity(dec!(100000), dec!(100500));
        let result = engine.execute(&opp, gas_model(dec!(2))).await;

        assert!(matches!(result, Err(BotError::InsufficientLiquidity { .. })));
        assert_eq!(gateway.submission_count(), 0);
    }

    #[tokio::test]
    async fn on_chain_revert_is_a_benign_result() {
        let mut gw = mock_gateway();
        gw.send_success = false;
        let gateway = Arc::new(gw);
        let (engine, gate) = engine(Arc::clone(&gateway));

        let opp = opportunity(dec!(100000), dec!(100500));
        let result = engine.execute(&opp, gas_model(dec!(2))).await.unwrap();

        assert_eq!(result.status, ExecutionStatus::Reverted);
        assert_eq!(result.error_code.as_deref(), Some("execution_reverted"));
        assert!(result.realized_profit_usd.is_none());
        // Exactly one submission happened; no position was opened.
        assert_eq!(gateway.submission_count(), 1);
        assert!(gate.open_positions().await.is_empty());
    }

    #[tokio::test]
    async fn second_attempt_while_leased_is_rejected_not_queued() {
        let mut gw = mock_gateway();
        gw.realized_output = Some(U256::from(150_000_000u64));
        let gateway = Arc::new(gw);

        let gate = Arc::new(RiskGate::new(
            RiskParameters {
                max_position_size: dec!(200000),
                max_network_exposure: dec!(500000),
                max_strategy_exposure: dec!(500000),
                ..RiskParameters::default()
            },
            EventBus::default(),
        ));
        let leases = LeaseRegistry::new();
        let engine = FlashLoanEngine::new(
            Arc::clone(&gateway) as Arc<dyn ChainGateway>,
            gate,
            leases.clone(),
            EventBus::default(),
        );

        let opp = opportunity(dec!(100000), dec!(100500));

        // While an attempt holds the lease, every other attempt bounces.
        let held = leases.acquire(opp.id).unwrap();
        for _ in 0..3 {
            let result = engine.execute(&opp, gas_model(dec!(2))).await;
            assert!(matches!(result, Err(BotError::AttemptInFlight { .. })));
        }
        assert_eq!(gateway.submission_count(), 0);

        drop(held);
        let result = engine.execute(&opp, gas_model(dec!(2))).await.unwrap();
        assert_eq!(result.status, ExecutionStatus::Settled);
        assert_eq!(gateway.submission_count(), 1);
    }

    #[tokio::test]
    async fn expired_opportunity_never_reaches_the_wire() {
        let gateway = Arc::new(mock_gateway());
        let (engine, _gate) = engine(Arc::clone(&gateway));

        let mut opp = opportunity(dec!(100000), dec!(100500));
        opp.deadline = Utc::now() - Duration::seconds(1);
        let result = engine.execute(&opp, gas_model(dec!(2))).await;

        assert!(matches!(result, Err(BotError::Validation { .. })));
        assert_eq!(gateway.submission_count(), 0);
    }
}
