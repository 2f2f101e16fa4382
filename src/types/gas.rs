//! EIP-1559 gas model types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Header fields of the block a gas quote was derived from.
#[derive(Debug, Clone, Serialize)]
pub struct BlockHeader {
    pub number: u64,
    pub timestamp: DateTime<Utc>,
    pub base_fee_per_gas_wei: u128,
}

/// How quickly an opportunity must land, derived from its profit margin
/// after costs. Thin margins decay fast and need aggressive inclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Low,
    Medium,
    High,
    Urgent,
}

impl UrgencyTier {
    /// margin > 0.5 low, > 0.2 medium, > 0.05 high, else urgent
    pub fn from_margin(margin: Decimal) -> Self {
        use rust_decimal_macros::dec;
        if margin > dec!(0.5) {
            Self::Low
        } else if margin > dec!(0.2) {
            Self::Medium
        } else if margin > dec!(0.05) {
            Self::High
        } else {
            Self::Urgent
        }
    }
}

/// Gas pricing for a single execution attempt. Recomputed from the latest
/// block on every attempt and never cached across blocks.
#[derive(Debug, Clone, Serialize)]
pub struct GasModel {
    pub block_number: u64,
    pub base_fee_wei: u128,
    pub priority_fee_wei: u128,
    pub max_fee_per_gas_wei: u128,
    pub gas_limit: u64,
    pub estimated_cost_wei: u128,
    pub estimated_cost_usd: Decimal,
    pub urgency: UrgencyTier,
}

impl GasModel {
    /// Effective per-gas price the attempt is expected to pay.
    pub fn effective_gas_price_wei(&self) -> u128 {
        self.base_fee_wei + self.priority_fee_wei
    }
}
