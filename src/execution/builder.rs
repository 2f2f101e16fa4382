//! Flash-loan transaction construction
//!
//! Builds the borrow -> swap path -> repay call against the provider's entry
//! point, ABI-encoded by hand with the selector and word layout of
//! `executeFlashArbitrage(address,uint256,uint256,address[])`.

use alloy::primitives::{Address, U256, keccak256};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use crate::{
    errors::{BotError, BotResult},
    gateway::TxPlan,
    strategy::FlashLoanProvider,
    types::{GasModel, Opportunity, token_decimals},
    utils::pow10,
};

/// Scale a USD-denominated amount into the borrow token's on-chain units.
pub fn to_token_units(amount: Decimal, token: Address) -> BotResult<U256> {
    let scaled = amount * pow10(token_decimals(token) as i32);
    let units = scaled.trunc().to_u128().ok_or_else(|| BotError::Validation {
        reason: format!("amount {amount} does not fit in token units"),
    })?;
    Ok(U256::from(units))
}

/// Scale on-chain units of a token back to a USD-denominated Decimal.
pub fn from_token_units(units: U256, token: Address) -> BotResult<Decimal> {
    let raw: u128 = units.try_into().map_err(|_| BotError::DataParsing {
        context: "token amount exceeds u128".to_string(),
        source: anyhow::anyhow!("{units}"),
    })?;
    Ok(Decimal::from(raw) / pow10(token_decimals(token) as i32))
}

pub fn build_flash_loan_call(
    opportunity: &Opportunity,
    provider: &FlashLoanProvider,
    gas_model: &GasModel,
    min_return: Decimal,
) -> BotResult<TxPlan> {
    let amount = to_token_units(opportunity.borrow_amount, opportunity.borrow_token)?;
    let min_return_units = to_token_units(min_return, opportunity.borrow_token)?;

    let mut encoded =
        keccak256("executeFlashArbitrage(address,uint256,uint256,address[])")[..4].to_vec();

    // Static words: asset, amount, minReturn, then the offset of the path.
    encoded.extend_from_slice(&[0u8; 12]);
    encoded.extend_from_slice(opportunity.borrow_token.as_slice());
    encoded.extend_from_slice(&amount.to_be_bytes::<32>());
    encoded.extend_from_slice(&min_return_units.to_be_bytes::<32>());
    encoded.extend_from_slice(&U256::from(128).to_be_bytes::<32>());

    // Dynamic tail: the swap path.
    encoded.extend_from_slice(&U256::from(opportunity.tokens.len()).to_be_bytes::<32>());
    for token in &opportunity.tokens {
        encoded.extend_from_slice(&[0u8; 12]);
        encoded.extend_from_slice(token.as_slice());
    }

    Ok(TxPlan {
        to: provider.entry_point,
        data: encoded,
        value: U256::ZERO,
        gas_limit: gas_model.gas_limit,
        max_fee_per_gas_wei: gas_model.max_fee_per_gas_wei,
        max_priority_fee_per_gas_wei: gas_model.priority_fee_wei,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::select_flash_provider;
    use crate::types::{
        CHAIN_BASE, StrategyHints, UrgencyTier, USDC_BASE, Venue, WETH_BASE,
    };
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn opportunity() -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            deadline: Utc::now() + Duration::seconds(30),
            tokens: vec![USDC_BASE, WETH_BASE],
            venues: vec![Venue {
                name: "weth-usdc".to_string(),
                chain_id: CHAIN_BASE,
                pool: alloy::primitives::Address::repeat_byte(7),
            }],
            chain_ids: vec![CHAIN_BASE],
            network: "base".to_string(),
            borrow_token: USDC_BASE,
            borrow_amount: dec!(100000),
            expected_gross_output: dec!(100500),
            hints: StrategyHints::default(),
        }
    }

    fn gas_model() -> GasModel {
        GasModel {
            block_number: 1,
            base_fee_wei: 10_000_000_000,
            priority_fee_wei: 20_000_000_000,
            max_fee_per_gas_wei: 40_000_000_000,
            gas_limit: 400_000,
            estimated_cost_wei: 0,
            estimated_cost_usd: dec!(2),
            urgency: UrgencyTier::High,
        }
    }

    #[test]
    fn token_unit_scaling_round_trips() {
        let units = to_token_units(dec!(1234.56), USDC_BASE).unwrap();
        assert_eq!(units, U256::from(1_234_560_000u64));
        assert_eq!(from_token_units(units, USDC_BASE).unwrap(), dec!(1234.56));
    }

    #[test]
    fn call_is_addressed_to_the_provider_with_preset_gas() {
        let opp = opportunity();
        let provider = select_flash_provider(CHAIN_BASE).unwrap();
        let plan = build_flash_loan_call(&opp, provider, &gas_model(), dec!(100090)).unwrap();

        assert_eq!(plan.to, provider.entry_point);
        assert_eq!(plan.gas_limit, 400_000);
        assert_eq!(plan.max_fee_per_gas_wei, 40_000_000_000);
        assert_eq!(plan.value, U256::ZERO);
    }

    #[test]
    fn encoding_layout_is_stable() {
        let opp = opportunity();
        let provider = select_flash_provider(CHAIN_BASE).unwrap();
        let plan = build_flash_loan_call(&opp, provider, &gas_model(), dec!(100090)).unwrap();

        // selector + 4 static words + length word + 2 path elements
        assert_eq!(plan.data.len(), 4 + 32 * 4 + 32 + 32 * 2);
        let selector =
            &keccak256("executeFlashArbitrage(address,uint256,uint256,address[])")[..4];
        assert_eq!(&plan.data[..4], selector);
        // The borrow token sits right-aligned in the first word.
        assert_eq!(&plan.data[16..36], USDC_BASE.as_slice());
    }
}
