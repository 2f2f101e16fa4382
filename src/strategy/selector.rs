//! Opportunity topology classification
//!
//! Pure function from an opportunity's shape to the closed ArbitrageType
//! taxonomy. Structural hints win over counting; counting covers the common
//! venue/chain/token cases.

use crate::types::{ArbitrageType, Opportunity, StrategyHints};

/// Classify by topology: hint-driven special cases first, then chain count,
/// then venue count, with token count deciding simple vs triangular.
pub fn classify(
    venue_count: usize,
    chain_count: usize,
    token_count: usize,
    hints: &StrategyHints,
) -> ArbitrageType {
    if hints.bundle_candidate {
        return ArbitrageType::MevBundle;
    }
    if hints.governance_leg {
        return ArbitrageType::Governance;
    }
    if hints.intent_settlement {
        return ArbitrageType::IntentBased;
    }
    if hints.perp_leg {
        return ArbitrageType::PerpBasis;
    }
    if hints.staking_derivative_leg {
        return ArbitrageType::LiquidStaking;
    }
    if hints.yield_leg {
        return ArbitrageType::Yield;
    }
    if hints.fragmented_liquidity {
        return ArbitrageType::LiquidityFragmentation;
    }

    let triangular = token_count >= 3;
    if chain_count > 1 {
        if triangular {
            ArbitrageType::InterChainTriangular
        } else {
            ArbitrageType::InterChainSimple
        }
    } else if venue_count > 1 {
        if triangular {
            ArbitrageType::InterVenueTriangular
        } else {
            ArbitrageType::InterVenueSimple
        }
    } else if triangular {
        ArbitrageType::IntraVenueTriangular
    } else {
        ArbitrageType::IntraVenueSimple
    }
}

pub fn classify_opportunity(opportunity: &Opportunity) -> ArbitrageType {
    classify(
        opportunity.venues.len(),
        opportunity.chain_ids.len(),
        opportunity.tokens.len(),
        &opportunity.hints,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_hints() -> StrategyHints {
        StrategyHints::default()
    }

    #[test]
    fn counting_covers_the_plain_topologies() {
        assert_eq!(
            classify(1, 1, 2, &no_hints()),
            ArbitrageType::IntraVenueSimple
        );
        assert_eq!(
            classify(1, 1, 3, &no_hints()),
            ArbitrageType::IntraVenueTriangular
        );
        assert_eq!(
            classify(2, 1, 2, &no_hints()),
            ArbitrageType::InterVenueSimple
        );
        assert_eq!(
            classify(3, 1, 3, &no_hints()),
            ArbitrageType::InterVenueTriangular
        );
        assert_eq!(
            classify(2, 2, 2, &no_hints()),
            ArbitrageType::InterChainSimple
        );
        assert_eq!(
            classify(2, 2, 4, &no_hints()),
            ArbitrageType::InterChainTriangular
        );
    }

    #[test]
    fn hints_override_counting() {
        let hints = StrategyHints {
            fragmented_liquidity: true,
            ..StrategyHints::default()
        };
        assert_eq!(
            classify(4, 2, 2, &hints),
            ArbitrageType::LiquidityFragmentation
        );

        let hints = StrategyHints {
            bundle_candidate: true,
            governance_leg: true,
            ..StrategyHints::default()
        };
        // Bundle wins over every other hint.
        assert_eq!(classify(1, 1, 2, &hints), ArbitrageType::MevBundle);
    }

    #[test]
    fn classification_is_deterministic() {
        let hints = StrategyHints {
            yield_leg: true,
            ..StrategyHints::default()
        };
        let first = classify(2, 1, 3, &hints);
        for _ in 0..10 {
            assert_eq!(classify(2, 1, 3, &hints), first);
        }
    }

    #[test]
    fn cross_chain_types_report_cross_chain() {
        assert!(classify(2, 2, 2, &no_hints()).is_cross_chain());
        assert!(!classify(2, 1, 2, &no_hints()).is_cross_chain());
    }
}
