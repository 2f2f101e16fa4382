//! Arbitrage opportunity types and the closed strategy taxonomy

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

/// Closed set of arbitrage topologies. Every opportunity is classified into
/// exactly one of these; the variant drives gas-limit sizing, flash-loan
/// provider choice and the risk multiplier applied by the risk gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArbitrageType {
    IntraVenueSimple,
    IntraVenueTriangular,
    InterVenueSimple,
    InterVenueTriangular,
    InterChainSimple,
    InterChainTriangular,
    LiquidityFragmentation,
    Governance,
    IntentBased,
    Yield,
    LiquidStaking,
    PerpBasis,
    MevBundle,
}

impl ArbitrageType {
    /// Gas limit budgeted for one execution of this topology.
    pub fn gas_limit(&self) -> u64 {
        match self {
            Self::IntraVenueSimple => 300_000,
            Self::IntraVenueTriangular => 450_000,
            Self::InterVenueSimple => 400_000,
            Self::InterVenueTriangular => 600_000,
            Self::InterChainSimple => 500_000,
            Self::InterChainTriangular => 750_000,
            Self::LiquidityFragmentation => 550_000,
            Self::Governance => 350_000,
            Self::IntentBased => 400_000,
            Self::Yield => 500_000,
            Self::LiquidStaking => 450_000,
            Self::PerpBasis => 650_000,
            Self::MevBundle => 900_000,
        }
    }

    /// Exposure multiplier applied when the risk gate sizes this strategy.
    pub fn risk_multiplier(&self) -> Decimal {
        match self {
            Self::IntraVenueSimple | Self::InterVenueSimple => dec!(1.0),
            Self::IntraVenueTriangular | Self::InterVenueTriangular => dec!(1.2),
            Self::InterChainSimple => dec!(1.5),
            Self::InterChainTriangular => dec!(1.8),
            Self::LiquidityFragmentation => dec!(1.4),
            Self::Governance => dec!(2.0),
            Self::IntentBased => dec!(1.3),
            Self::Yield => dec!(1.6),
            Self::LiquidStaking => dec!(1.5),
            Self::PerpBasis => dec!(1.7),
            Self::MevBundle => dec!(2.0),
        }
    }

    pub fn is_cross_chain(&self) -> bool {
        matches!(
            self,
            Self::InterChainSimple | Self::InterChainTriangular | Self::LiquidityFragmentation
        )
    }

    /// Stable key used for per-strategy exposure bookkeeping.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntraVenueSimple => "intra_venue_simple",
            Self::IntraVenueTriangular => "intra_venue_triangular",
            Self::InterVenueSimple => "inter_venue_simple",
            Self::InterVenueTriangular => "inter_venue_triangular",
            Self::InterChainSimple => "inter_chain_simple",
            Self::InterChainTriangular => "inter_chain_triangular",
            Self::LiquidityFragmentation => "liquidity_fragmentation",
            Self::Governance => "governance",
            Self::IntentBased => "intent_based",
            Self::Yield => "yield",
            Self::LiquidStaking => "liquid_staking",
            Self::PerpBasis => "perp_basis",
            Self::MevBundle => "mev_bundle",
        }
    }
}

/// A pool on a specific chain that one leg of the opportunity trades through.
#[derive(Debug, Clone, Serialize)]
pub struct Venue {
    pub name: String,
    pub chain_id: u64,
    pub pool: Address,
}

/// Structural hints attached at detection time that the classifier consults
/// before falling back to pure venue/chain/token counting.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StrategyHints {
    pub fragmented_liquidity: bool,
    pub governance_leg: bool,
    pub intent_settlement: bool,
    pub yield_leg: bool,
    pub staking_derivative_leg: bool,
    pub perp_leg: bool,
    pub bundle_candidate: bool,
}

/// A detected price discrepancy. Immutable once built: it is either consumed
/// by exactly one execution attempt or discarded after its deadline.
#[derive(Debug, Clone, Serialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub detected_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    pub tokens: Vec<Address>,
    pub venues: Vec<Venue>,
    pub chain_ids: Vec<u64>,
    pub network: String,
    pub borrow_token: Address,
    /// Candidate flash-loan size, denominated in USD notional.
    pub borrow_amount: Decimal,
    /// Expected output of the full swap path before any costs, USD.
    pub expected_gross_output: Decimal,
    pub hints: StrategyHints,
}

impl Opportunity {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }

    /// Gross edge before fees and gas.
    pub fn gross_edge(&self) -> Decimal {
        self.expected_gross_output - self.borrow_amount
    }
}
