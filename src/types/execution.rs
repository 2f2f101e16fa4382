//! Execution outcome types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::ArbitrageType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Transaction landed and the repay surplus was realized.
    Settled,
    /// Transaction landed but reverted on-chain. The flash loan unwound the
    /// whole transaction, so no principal was lost.
    Reverted,
    /// Nothing was broadcast: pre-flight checks or the simulation said no.
    Skipped,
    /// Broadcast failed or the receipt never arrived.
    Failed,
}

/// Outcome of one execution attempt, flash-loan or cross-chain.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub network: String,
    pub arb_type: ArbitrageType,
    pub status: ExecutionStatus,
    pub tx_hashes: Vec<String>,
    pub gas_used: Option<u64>,
    pub expected_profit_usd: Decimal,
    pub realized_profit_usd: Option<Decimal>,
    pub error_code: Option<String>,
    pub execution_time_ms: u64,
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Settled
    }
}
