//! Chain gateway trait and the alloy-backed implementation
//!
//! One gateway per chain supplies block/gas data and pool state, simulates
//! calls and submits signed transactions. Everything above this trait is
//! chain-agnostic.

use alloy::{
    primitives::{Address, U256, keccak256},
    providers::{Provider, ProviderBuilder},
    rpc::types::eth::{BlockNumberOrTag, TransactionRequest},
    sol_types::SolValue,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::{
    ConcreteProvider,
    config::ChainConfig,
    errors::{BotError, BotResult},
    gateway::retry::{RetryConfig, retry_with_backoff},
    types::BlockHeader,
};

/// A fully-priced transaction ready for simulation or submission.
#[derive(Debug, Clone)]
pub struct TxPlan {
    pub to: Address,
    pub data: Vec<u8>,
    pub value: U256,
    pub gas_limit: u64,
    pub max_fee_per_gas_wei: u128,
    pub max_priority_fee_per_gas_wei: u128,
}

#[derive(Debug, Clone)]
pub struct ReceiptLog {
    pub address: Address,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct Receipt {
    pub tx_hash: String,
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price_wei: u128,
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone)]
pub enum SimulationOutcome {
    Ok(Vec<u8>),
    Revert(String),
}

/// Narrow interface to one chain. Reads retry internally; submission is a
/// single blocking await and never retries.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    fn chain_id(&self) -> u64;
    fn name(&self) -> &str;

    async fn latest_block(&self) -> BotResult<BlockHeader>;
    async fn pool_tokens(&self, pool: Address) -> BotResult<(Address, Address)>;
    async fn pool_reserves(&self, pool: Address) -> BotResult<(U256, U256)>;
    async fn estimate_gas(&self, plan: &TxPlan) -> BotResult<u64>;
    async fn simulate(&self, plan: &TxPlan) -> BotResult<SimulationOutcome>;
    async fn send_transaction(&self, plan: &TxPlan) -> BotResult<Receipt>;
}

/// Alloy-backed gateway for EVM chains.
pub struct EvmGateway {
    name: String,
    chain_id: u64,
    provider: Arc<ConcreteProvider>,
    receipt_timeout: Duration,
}

impl EvmGateway {
    pub async fn connect(config: &ChainConfig, receipt_timeout_secs: u64) -> Result<Self> {
        let provider: Arc<ConcreteProvider> = Arc::new(
            ProviderBuilder::new()
                .on_http(config.rpc_url.parse()?)
                .boxed(),
        );

        info!("🔗 Testing connection to {}...", config.name);
        let block = retry_with_backoff(
            || async {
                provider
                    .get_block_number()
                    .await
                    .context("Failed to get block number")
            },
            &RetryConfig {
                max_attempts: 5,
                initial_delay_ms: 500,
                max_delay_ms: 10000,
                exponential_base: 2.0,
            },
            &format!("{} connection", config.name),
        )
        .await
        .map_err(|e| anyhow::anyhow!("Network connection failed: {}", e))?;

        info!("✅ Connected to {} at block {}", config.name, block);

        Ok(Self {
            name: config.name.clone(),
            chain_id: config.chain_id,
            provider,
            receipt_timeout: Duration::from_secs(receipt_timeout_secs),
        })
    }

    fn to_request(&self, plan: &TxPlan) -> TransactionRequest {
        TransactionRequest::default()
            .to(plan.to)
            .value(plan.value)
            .input(plan.data.clone().into())
            .gas_limit(plan.gas_limit)
            .max_fee_per_gas(plan.max_fee_per_gas_wei)
            .max_priority_fee_per_gas(plan.max_priority_fee_per_gas_wei)
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn latest_block(&self) -> BotResult<BlockHeader> {
        let provider = Arc::clone(&self.provider);
        let block = retry_with_backoff(
            || async {
                provider
                    .get_block_by_number(BlockNumberOrTag::Latest, false.into())
                    .await
                    .context("Failed to fetch latest block")?
                    .ok_or_else(|| anyhow::anyhow!("No latest block returned"))
            },
            &RetryConfig::default(),
            &format!("{} latest block", self.name),
        )
        .await?;

        let timestamp = Utc
            .timestamp_opt(block.header.timestamp as i64, 0)
            .single()
            .ok_or_else(|| BotError::InsufficientData {
                message: format!("Block {} has invalid timestamp", self.name),
            })?;

        Ok(BlockHeader {
            number: block.header.number,
            timestamp,
            base_fee_per_gas_wei: u128::from(block.header.base_fee_per_gas.unwrap_or_default()),
        })
    }

    async fn pool_tokens(&self, pool: Address) -> BotResult<(Address, Address)> {
        let token0_data = keccak256("token0()")[..4].to_vec();
        let token1_data = keccak256("token1()")[..4].to_vec();

        let tx0 = TransactionRequest::default().to(pool).input(token0_data.into());
        let tx1 = TransactionRequest::default().to(pool).input(token1_data.into());

        let raw0 = self.provider.call(&tx0).await.map_err(|e| BotError::Contract {
            contract: pool,
            message: "Failed to get token0".to_string(),
            source: anyhow::anyhow!("{}", e),
        })?;
        let raw1 = self.provider.call(&tx1).await.map_err(|e| BotError::Contract {
            contract: pool,
            message: "Failed to get token1".to_string(),
            source: anyhow::anyhow!("{}", e),
        })?;

        let token0 = Address::abi_decode(&raw0, true).map_err(|e| BotError::DataParsing {
            context: "token0 decode".to_string(),
            source: anyhow::anyhow!("{}", e),
        })?;
        let token1 = Address::abi_decode(&raw1, true).map_err(|e| BotError::DataParsing {
            context: "token1 decode".to_string(),
            source: anyhow::anyhow!("{}", e),
        })?;

        Ok((token0, token1))
    }

    async fn pool_reserves(&self, pool: Address) -> BotResult<(U256, U256)> {
        let provider = Arc::clone(&self.provider);
        let name = self.name.clone();
        retry_with_backoff(
            || async {
                let data = keccak256("getReserves()")[..4].to_vec();
                let tx = TransactionRequest::default().to(pool).input(data.into());

                let result = provider.call(&tx).await.context("Failed to call getReserves")?;
                let decoded = <(U256, U256, U256)>::abi_decode(&result, true)
                    .context("Failed to decode reserves")?;
                Ok((decoded.0, decoded.1))
            },
            &RetryConfig::default(),
            &format!("get reserves on {}", name),
        )
        .await
        .map_err(|e| match e {
            BotError::Network { .. } => e,
            _ => BotError::Contract {
                contract: pool,
                message: "Failed to get reserves".to_string(),
                source: anyhow::anyhow!("{}", e),
            },
        })
    }

    async fn estimate_gas(&self, plan: &TxPlan) -> BotResult<u64> {
        let tx = self.to_request(plan);
        let estimate = self.provider.estimate_gas(&tx).await.map_err(|e| BotError::Contract {
            contract: plan.to,
            message: "Gas estimation failed".to_string(),
            source: anyhow::anyhow!("{}", e),
        })?;
        Ok(estimate as u64)
    }

    async fn simulate(&self, plan: &TxPlan) -> BotResult<SimulationOutcome> {
        let tx = self.to_request(plan);
        match self.provider.call(&tx).await {
            Ok(output) => Ok(SimulationOutcome::Ok(output.to_vec())),
            // eth_call surfaces reverts as RPC errors carrying the reason
            Err(e) => Ok(SimulationOutcome::Revert(e.to_string())),
        }
    }

    async fn send_transaction(&self, plan: &TxPlan) -> BotResult<Receipt> {
        let tx = self.to_request(plan);

        let pending = self.provider.send_transaction(tx).await.map_err(|e| BotError::Network {
            message: format!("Failed to send transaction on {}", self.name),
            source: Some(anyhow::anyhow!("{}", e)),
            retry_count: 0,
        })?;

        let tx_hash = format!("{:?}", pending.tx_hash());
        info!("📡 Transaction sent on {}: {}", self.name, tx_hash);

        tokio::select! {
            result = pending.get_receipt() => {
                let receipt = result.map_err(|e| BotError::Network {
                    message: format!("Receipt fetch failed for {}", tx_hash),
                    source: Some(anyhow::anyhow!("{}", e)),
                    retry_count: 0,
                })?;

                Ok(Receipt {
                    tx_hash,
                    success: receipt.status(),
                    gas_used: receipt.gas_used as u64,
                    effective_gas_price_wei: receipt.effective_gas_price,
                    logs: receipt
                        .inner
                        .logs()
                        .iter()
                        .map(|log| ReceiptLog {
                            address: log.address(),
                            data: log.data().data.to_vec(),
                        })
                        .collect(),
                })
            }
            _ = tokio::time::sleep(self.receipt_timeout) => {
                Err(BotError::Network {
                    message: format!(
                        "Receipt timeout after {:?} for {}",
                        self.receipt_timeout, tx_hash
                    ),
                    source: None,
                    retry_count: 0,
                })
            }
        }
    }
}
