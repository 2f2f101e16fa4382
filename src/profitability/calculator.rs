//! Net-of-costs profit estimation

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

use crate::types::{GasModel, Opportunity, UrgencyTier};

/// Full cost decomposition of one opportunity under one gas model.
#[derive(Debug, Clone, Serialize)]
pub struct ProfitEstimate {
    pub opportunity_id: Uuid,
    pub gross_output: Decimal,
    pub borrowed: Decimal,
    pub flash_loan_fee: Decimal,
    pub bridge_fees: Decimal,
    pub gas_cost_usd: Decimal,
    pub net_profit: Decimal,
    /// net_profit / gross_output; zero when gross is zero.
    pub profit_margin: Decimal,
    pub gas_model: GasModel,
}

impl ProfitEstimate {
    pub fn is_profitable(&self) -> bool {
        self.net_profit > dec!(0)
    }
}

/// net = gross − borrowed − flash fee − bridge fees − gas. The urgency tier
/// on the returned gas model is finalized here, from the margin after costs.
pub fn estimate_net_profit(
    opportunity: &Opportunity,
    mut gas_model: GasModel,
    flash_fee_rate: Decimal,
    bridge_fees_usd: Decimal,
) -> ProfitEstimate {
    let gross = opportunity.expected_gross_output;
    let borrowed = opportunity.borrow_amount;
    let flash_loan_fee = borrowed * flash_fee_rate;
    let gas_cost_usd = gas_model.estimated_cost_usd;

    let net_profit = gross - borrowed - flash_loan_fee - bridge_fees_usd - gas_cost_usd;
    let profit_margin = if gross > dec!(0) {
        net_profit / gross
    } else {
        dec!(0)
    };

    gas_model.urgency = UrgencyTier::from_margin(profit_margin);

    ProfitEstimate {
        opportunity_id: opportunity.id,
        gross_output: gross,
        borrowed,
        flash_loan_fee,
        bridge_fees: bridge_fees_usd,
        gas_cost_usd,
        net_profit,
        profit_margin,
        gas_model,
    }
}
