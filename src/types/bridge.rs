//! Cross-chain bridge routing types

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

/// Static description of a bridge this bot can route through.
#[derive(Debug, Clone)]
pub struct BridgeInfo {
    pub name: String,
    /// Deposit/status contract on the source chains.
    pub contract: Address,
    /// Flat fee charged per transfer, USD.
    pub fee_usd: Decimal,
    /// Typical source-to-target completion time.
    pub avg_transfer_secs: u64,
    /// Observed completion rate in [0, 1].
    pub reliability: Decimal,
    /// Largest single transfer the bridge accepts, USD notional.
    pub max_amount: Decimal,
    /// (source, target) chain-id pairs the bridge serves.
    pub chain_pairs: Vec<(u64, u64)>,
    /// Tokens the bridge carries.
    pub tokens: Vec<Address>,
}

impl BridgeInfo {
    pub fn supports(&self, source_chain: u64, target_chain: u64, token: Address) -> bool {
        self.chain_pairs.contains(&(source_chain, target_chain)) && self.tokens.contains(&token)
    }
}

/// A concrete routing decision for one transfer.
#[derive(Debug, Clone, Serialize)]
pub struct BridgeRoute {
    pub bridge: String,
    pub source_chain_id: u64,
    pub target_chain_id: u64,
    pub token: Address,
    pub amount: Decimal,
    pub fee_usd: Decimal,
    pub eta_secs: u64,
    pub reliability: Decimal,
    /// Weighted route risk in [0, 1]; higher is worse.
    pub risk_score: Decimal,
}

/// Lifecycle of one cross-chain transfer. Terminal states are Settled and
/// Failed; everything else is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferState {
    Quoted,
    SourceSubmitted,
    Bridging,
    TargetExecuting,
    Settled,
    Failed,
}

/// Exists only between source-leg submission and target-leg settlement.
#[derive(Debug, Clone, Serialize)]
pub struct PendingBridgeTransfer {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub route: BridgeRoute,
    pub state: TransferState,
    pub source_tx_hash: Option<String>,
    pub target_tx_hash: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub expected_arrival: Option<DateTime<Utc>>,
    /// Hard deadline: ETA scaled by the configured safety factor.
    pub deadline: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    /// Loss realized by the recovery routine, if any, USD.
    pub recovered_loss_usd: Option<Decimal>,
}

impl PendingBridgeTransfer {
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TransferState::Settled | TransferState::Failed)
    }
}

/// Completion status reported by a bridge contract for a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeStatus {
    Pending,
    Completed,
    Failed(String),
}
