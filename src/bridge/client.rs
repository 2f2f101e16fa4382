//! EVM-backed bridge client
//!
//! Talks to a bridge's deposit/status contract through the chain gateways.
//! One client instance serves one bridge across every source chain it
//! supports.

use alloy::primitives::{Address, U256, keccak256};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    bridge::router::{BridgeClient, BridgeQuote},
    errors::{BotError, BotResult},
    execution::builder::to_token_units,
    gateway::{ChainGateway, SimulationOutcome, TxPlan},
    types::{BridgeInfo, BridgeRoute, BridgeStatus},
};

pub struct EvmBridgeClient {
    contract: Address,
    fee_usd: Decimal,
    eta_secs: u64,
    gateways: HashMap<u64, Arc<dyn ChainGateway>>,
}

impl EvmBridgeClient {
    pub fn new(info: &BridgeInfo, gateways: HashMap<u64, Arc<dyn ChainGateway>>) -> Self {
        Self {
            contract: info.contract,
            fee_usd: info.fee_usd,
            eta_secs: info.avg_transfer_secs,
            gateways,
        }
    }

    fn gateway_for(&self, chain_id: u64) -> BotResult<&Arc<dyn ChainGateway>> {
        self.gateways.get(&chain_id).ok_or_else(|| BotError::Validation {
            reason: format!("bridge client has no gateway for chain {chain_id}"),
        })
    }

    /// `deposit(address token, uint256 amount, uint64 targetChain, bytes32 transferId)`
    fn deposit_plan(&self, route: &BridgeRoute, transfer_id: Uuid) -> BotResult<TxPlan> {
        let amount = to_token_units(route.amount, route.token)?;

        let mut encoded =
            keccak256("deposit(address,uint256,uint64,bytes32)")[..4].to_vec();
        encoded.extend_from_slice(&[0u8; 12]);
        encoded.extend_from_slice(route.token.as_slice());
        encoded.extend_from_slice(&amount.to_be_bytes::<32>());
        encoded.extend_from_slice(&U256::from(route.target_chain_id).to_be_bytes::<32>());
        encoded.extend_from_slice(&transfer_word(transfer_id));

        Ok(TxPlan {
            to: self.contract,
            data: encoded,
            value: U256::ZERO,
            gas_limit: 250_000,
            max_fee_per_gas_wei: 0,
            max_priority_fee_per_gas_wei: 0,
        })
    }
}

/// Left-pad the transfer UUID into one ABI word.
fn transfer_word(transfer_id: Uuid) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(transfer_id.as_bytes());
    word
}

#[async_trait]
impl BridgeClient for EvmBridgeClient {
    async fn quote(&self, _route: &BridgeRoute) -> BotResult<BridgeQuote> {
        Ok(BridgeQuote {
            fee_usd: self.fee_usd,
            eta_secs: self.eta_secs,
        })
    }

    async fn deposit(&self, route: &BridgeRoute, transfer_id: Uuid) -> BotResult<String> {
        let gateway = self.gateway_for(route.source_chain_id)?;

        // Price the deposit off the current block.
        let block = gateway.latest_block().await?;
        let mut plan = self.deposit_plan(route, transfer_id)?;
        plan.max_fee_per_gas_wei = block.base_fee_per_gas_wei * 2;
        plan.max_priority_fee_per_gas_wei = block.base_fee_per_gas_wei;

        match gateway.simulate(&plan).await? {
            SimulationOutcome::Ok(_) => {}
            SimulationOutcome::Revert(reason) => {
                return Err(BotError::BridgeFailure {
                    transfer_id,
                    reason: format!("deposit would revert: {reason}"),
                });
            }
        }

        let receipt = gateway.send_transaction(&plan).await?;
        if !receipt.success {
            return Err(BotError::BridgeFailure {
                transfer_id,
                reason: format!("deposit reverted: {}", receipt.tx_hash),
            });
        }
        Ok(receipt.tx_hash)
    }

    /// `transferStatus(bytes32) -> uint8` (0 pending, 1 completed, 2 failed)
    async fn status(&self, transfer_id: Uuid) -> BotResult<BridgeStatus> {
        // Status lives on the source-side contract; any connected source
        // gateway serves.
        let gateway = self
            .gateways
            .values()
            .next()
            .ok_or_else(|| BotError::Validation {
                reason: "bridge client has no gateways".to_string(),
            })?;

        let mut encoded = keccak256("transferStatus(bytes32)")[..4].to_vec();
        encoded.extend_from_slice(&transfer_word(transfer_id));

        let plan = TxPlan {
            to: self.contract,
            data: encoded,
            value: U256::ZERO,
            gas_limit: 100_000,
            max_fee_per_gas_wei: 0,
            max_priority_fee_per_gas_wei: 0,
        };

        match gateway.simulate(&plan).await? {
            SimulationOutcome::Ok(output) => {
                let code = output.last().copied().unwrap_or(0);
                Ok(match code {
                    1 => BridgeStatus::Completed,
                    2 => BridgeStatus::Failed(format!(
                        "bridge reported failure at {}",
                        Utc::now()
                    )),
                    _ => BridgeStatus::Pending,
                })
            }
            SimulationOutcome::Revert(reason) => Err(BotError::Network {
                message: format!("transferStatus call reverted: {reason}"),
                source: None,
                retry_count: 0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn transfer_word_right_aligns_the_uuid() {
        let id = Uuid::new_v4();
        let word = transfer_word(id);
        assert_eq!(&word[..16], &[0u8; 16]);
        assert_eq!(&word[16..], id.as_bytes());
    }

    #[test]
    fn deposit_plan_encodes_the_route() {
        use crate::types::{CHAIN_ARBITRUM, CHAIN_BASE, USDC_BASE};
        let client = EvmBridgeClient {
            contract: Address::repeat_byte(0xbb),
            fee_usd: dec!(12),
            eta_secs: 120,
            gateways: HashMap::new(),
        };
        let route = BridgeRoute {
            bridge: "across".to_string(),
            source_chain_id: CHAIN_BASE,
            target_chain_id: CHAIN_ARBITRUM,
            token: USDC_BASE,
            amount: dec!(100000),
            fee_usd: dec!(12),
            eta_secs: 120,
            reliability: dec!(0.995),
            risk_score: dec!(0.1),
        };
        let id = Uuid::new_v4();
        let plan = client.deposit_plan(&route, id).unwrap();

        assert_eq!(plan.to, Address::repeat_byte(0xbb));
        // selector + token word + amount word + chain word + id word
        assert_eq!(plan.data.len(), 4 + 32 * 4);
        assert_eq!(&plan.data[16..36], USDC_BASE.as_slice());
        assert_eq!(&plan.data[4 + 32 * 3..], &transfer_word(id)[..]);
    }
}
