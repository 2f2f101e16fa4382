//! Custom error types for the bot

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Opportunity expired at {deadline}")]
    OpportunityExpired { deadline: DateTime<Utc> },

    #[error("Insufficient liquidity on {venue}: need {required}, available {available}")]
    InsufficientLiquidity {
        venue: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Not profitable: net {net_profit} after costs")]
    NotProfitable { net_profit: Decimal },

    #[error("Simulation reverted: {reason}")]
    SimulationFailed { reason: String },

    #[error("Transaction reverted on-chain: {tx_hash}")]
    ExecutionReverted { tx_hash: String },

    #[error("Execution already in flight for opportunity {opportunity_id}")]
    AttemptInFlight { opportunity_id: Uuid },

    #[error("Bridge transfer {transfer_id} timed out after {elapsed_secs}s")]
    BridgeTimeout { transfer_id: Uuid, elapsed_secs: u64 },

    #[error("Bridge transfer {transfer_id} failed: {reason}")]
    BridgeFailure { transfer_id: Uuid, reason: String },

    #[error("Risk limit exceeded: {rule} - {details}")]
    RiskLimitExceeded { rule: String, details: String },

    #[error("Emergency halt active: {reason}")]
    EmergencyHalt { reason: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
        retry_count: u32,
    },

    #[error("Contract interaction failed: {contract} - {message}")]
    Contract {
        contract: Address,
        message: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Price validation failed: ${price} - {reason}")]
    PriceValidation { price: Decimal, reason: String },

    #[error("Data parsing error: {context}")]
    DataParsing {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Circuit breaker active: {reason}")]
    CircuitBreakerOpen {
        reason: String,
        cooldown_remaining: Duration,
    },
}

pub type BotResult<T> = Result<T, BotError>;

impl BotError {
    /// Stable short code for persistence and per-kind failure counting.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "validation",
            Self::OpportunityExpired { .. } => "opportunity_expired",
            Self::InsufficientLiquidity { .. } => "insufficient_liquidity",
            Self::NotProfitable { .. } => "not_profitable",
            Self::SimulationFailed { .. } => "simulation_failed",
            Self::ExecutionReverted { .. } => "execution_reverted",
            Self::AttemptInFlight { .. } => "attempt_in_flight",
            Self::BridgeTimeout { .. } => "bridge_timeout",
            Self::BridgeFailure { .. } => "bridge_failure",
            Self::RiskLimitExceeded { .. } => "risk_limit_exceeded",
            Self::EmergencyHalt { .. } => "emergency_halt",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::Network { .. } => "network",
            Self::Contract { .. } => "contract",
            Self::PriceValidation { .. } => "price_validation",
            Self::DataParsing { .. } => "data_parsing",
            Self::CircuitBreakerOpen { .. } => "circuit_breaker_open",
        }
    }

    /// Failures that cost nothing and only mean "skip this opportunity".
    /// An on-chain revert is included: the flash loan unwinds the whole
    /// transaction, so no principal is at risk.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            Self::InsufficientLiquidity { .. }
                | Self::NotProfitable { .. }
                | Self::SimulationFailed { .. }
                | Self::ExecutionReverted { .. }
                | Self::OpportunityExpired { .. }
                | Self::AttemptInFlight { .. }
                | Self::Validation { .. }
        )
    }

    /// Failures that require the bridge recovery flow and a critical alert.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, Self::BridgeTimeout { .. } | Self::BridgeFailure { .. })
    }
}
