//! Dynamic EIP-1559 gas model
//!
//! Priority fee scales with the profit tier of the opportunity: fat edges
//! pay up for inclusion, thin ones ride the base fee. The model is rebuilt
//! from the latest block for every attempt and never cached across blocks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    errors::{BotError, BotResult},
    types::{ArbitrageType, BlockHeader, GasModel, UrgencyTier},
    utils::wei_to_eth,
};

/// Profit tiers in gwei-equivalent units.
pub const AGGRESSIVE_PROFIT_GWEI: Decimal = dec!(1000);
pub const STANDARD_PROFIT_GWEI: Decimal = dec!(100);

/// Express a USD profit in gwei of the chain's native token.
pub fn profit_gwei_equivalent(profit_usd: Decimal, native_price_usd: Decimal) -> Decimal {
    if native_price_usd <= dec!(0) {
        return dec!(0);
    }
    (profit_usd / native_price_usd) * dec!(1_000_000_000)
}

/// Build the gas model for one attempt from the latest block header.
///
/// Fails with `InsufficientData` when the block is older than the staleness
/// bound: executing on a stale gas quote is never acceptable, the caller
/// must skip the opportunity.
pub fn build_gas_model(
    block: &BlockHeader,
    now: DateTime<Utc>,
    staleness_secs: u64,
    expected_profit_usd: Decimal,
    native_price_usd: Decimal,
    arb_type: ArbitrageType,
) -> BotResult<GasModel> {
    let age_secs = (now - block.timestamp).num_seconds();
    if age_secs < 0 || age_secs as u64 > staleness_secs {
        return Err(BotError::InsufficientData {
            message: format!(
                "block {} is {}s old, staleness bound is {}s",
                block.number, age_secs, staleness_secs
            ),
        });
    }

    let base = block.base_fee_per_gas_wei;
    if base == 0 {
        return Err(BotError::InsufficientData {
            message: format!("block {} carries no base fee", block.number),
        });
    }

    let profit_gwei = profit_gwei_equivalent(expected_profit_usd, native_price_usd);
    let priority_fee_wei = if profit_gwei >= AGGRESSIVE_PROFIT_GWEI {
        base * 3
    } else if profit_gwei >= STANDARD_PROFIT_GWEI {
        base * 2
    } else {
        base / 2
    };

    let max_fee_per_gas_wei = base * 2 + priority_fee_wei;
    let gas_limit = arb_type.gas_limit();
    let estimated_cost_wei = (base + priority_fee_wei) * gas_limit as u128;
    let estimated_cost_usd = wei_to_eth(estimated_cost_wei) * native_price_usd;

    Ok(GasModel {
        block_number: block.number,
        base_fee_wei: base,
        priority_fee_wei,
        max_fee_per_gas_wei,
        gas_limit,
        estimated_cost_wei,
        estimated_cost_usd,
        // Provisional; the calculator refines this once net margin is known.
        urgency: UrgencyTier::Urgent,
    })
}
