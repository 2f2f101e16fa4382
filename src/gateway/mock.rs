//! Deterministic test doubles for the gateway and oracle seams

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::errors::{BotError, BotResult};
use crate::gateway::{ChainGateway, PriceOracle, Receipt, ReceiptLog, SimulationOutcome, TxPlan};
use crate::types::BlockHeader;

/// Scripted gateway. Counts submissions so tests can assert that aborted
/// attempts broadcast nothing.
pub struct MockGateway {
    pub chain_id: u64,
    pub name: String,
    pub base_fee_wei: u128,
    pub block_age_secs: i64,
    pub block_available: bool,
    pub tokens: (Address, Address),
    pub reserves: (U256, U256),
    pub simulate_outcome: SimulationOutcome,
    pub send_success: bool,
    pub gas_used: u64,
    /// Realized output emitted as the executor's settlement log.
    pub realized_output: Option<U256>,
    pub executor: Address,
    pub submissions: AtomicU32,
}

impl MockGateway {
    pub fn new(chain_id: u64, name: &str) -> Self {
        Self {
            chain_id,
            name: name.to_string(),
            base_fee_wei: 10_000_000_000, // 10 gwei
            block_age_secs: 0,
            block_available: true,
            tokens: (Address::ZERO, Address::ZERO),
            reserves: (U256::from(10u128.pow(24)), U256::from(10u128.pow(12))),
            simulate_outcome: SimulationOutcome::Ok(Vec::new()),
            send_success: true,
            gas_used: 250_000,
            realized_output: None,
            executor: Address::ZERO,
            submissions: AtomicU32::new(0),
        }
    }

    pub fn submission_count(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChainGateway for MockGateway {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_block(&self) -> BotResult<BlockHeader> {
        if !self.block_available {
            return Err(BotError::Network {
                message: "no block available".to_string(),
                source: None,
                retry_count: 0,
            });
        }
        Ok(BlockHeader {
            number: 1_000,
            timestamp: Utc::now() - ChronoDuration::seconds(self.block_age_secs),
            base_fee_per_gas_wei: self.base_fee_wei,
        })
    }

    async fn pool_tokens(&self, _pool: Address) -> BotResult<(Address, Address)> {
        Ok(self.tokens)
    }

    async fn pool_reserves(&self, _pool: Address) -> BotResult<(U256, U256)> {
        Ok(self.reserves)
    }

    async fn estimate_gas(&self, plan: &TxPlan) -> BotResult<u64> {
        Ok(plan.gas_limit.min(self.gas_used))
    }

    async fn simulate(&self, _plan: &TxPlan) -> BotResult<SimulationOutcome> {
        Ok(self.simulate_outcome.clone())
    }

    async fn send_transaction(&self, plan: &TxPlan) -> BotResult<Receipt> {
        let n = self.submissions.fetch_add(1, Ordering::SeqCst) + 1;
        let logs = match self.realized_output {
            Some(output) if self.send_success => vec![ReceiptLog {
                address: self.executor,
                data: output.to_be_bytes::<32>().to_vec(),
            }],
            _ => Vec::new(),
        };
        Ok(Receipt {
            tx_hash: format!("0xmock{:04}{}", n, self.name),
            success: self.send_success,
            gas_used: self.gas_used.min(plan.gas_limit),
            effective_gas_price_wei: self.base_fee_wei + plan.max_priority_fee_per_gas_wei,
            logs,
        })
    }
}

/// Fixed-price oracle for tracker tests.
pub struct StaticOracle {
    prices: Mutex<HashMap<String, Decimal>>,
}

impl StaticOracle {
    pub fn new() -> Self {
        Self {
            prices: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices
            .lock()
            .expect("price map poisoned")
            .insert(symbol.to_string(), price);
    }
}

#[async_trait]
impl PriceOracle for StaticOracle {
    async fn spot_price(&self, symbol: &str) -> BotResult<Decimal> {
        self.prices
            .lock()
            .expect("price map poisoned")
            .get(symbol)
            .copied()
            .ok_or_else(|| BotError::InsufficientData {
                message: format!("no price for {symbol}"),
            })
    }
}
