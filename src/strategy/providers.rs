//! Flash-loan provider selection
//!
//! Zero-fee providers are always preferred on chains where they exist; the
//! 9bps provider is the universal fallback. Selection is a pure lookup so
//! the choice is trivially testable.

use alloy::primitives::{Address, address};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::types::{CHAIN_ARBITRUM, CHAIN_BASE, CHAIN_ETHEREUM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLoanProvider {
    pub name: &'static str,
    /// Fee as a fraction of the borrowed amount.
    pub fee_rate: Decimal,
    pub chains: &'static [u64],
    /// Entry-point contract the borrow call is addressed to.
    pub entry_point: Address,
}

/// Listed in preference order within each fee class.
pub const FLASH_LOAN_PROVIDERS: &[FlashLoanProvider] = &[
    FlashLoanProvider {
        name: "balancer-v2",
        fee_rate: dec!(0),
        chains: &[CHAIN_ETHEREUM, CHAIN_BASE, CHAIN_ARBITRUM],
        entry_point: address!("BA12222222228d8Ba445958a75a0704d566BF2C8"),
    },
    FlashLoanProvider {
        name: "dydx-solo",
        fee_rate: dec!(0),
        chains: &[CHAIN_ETHEREUM],
        entry_point: address!("1E0447b19BB6EcFdAe1e4AE1694b0C3659614e4e"),
    },
    FlashLoanProvider {
        name: "aave-v3",
        fee_rate: dec!(0.0009),
        chains: &[CHAIN_ETHEREUM, CHAIN_BASE, CHAIN_ARBITRUM],
        entry_point: address!("87870Bca3F3fD6335C3F4ce8392D69350B4fA4E2"),
    },
];

/// Pick the provider for a chain: first zero-fee provider serving it, else
/// the first fee-charging one. Deterministic and side-effect free.
pub fn select_flash_provider(chain_id: u64) -> Option<&'static FlashLoanProvider> {
    FLASH_LOAN_PROVIDERS
        .iter()
        .find(|p| p.chains.contains(&chain_id) && p.fee_rate == dec!(0))
        .or_else(|| {
            FLASH_LOAN_PROVIDERS
                .iter()
                .find(|p| p.chains.contains(&chain_id))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_fee_provider_is_preferred() {
        let provider = select_flash_provider(CHAIN_BASE).unwrap();
        assert_eq!(provider.fee_rate, dec!(0));
        assert_eq!(provider.name, "balancer-v2");
    }

    #[test]
    fn unknown_chain_has_no_provider() {
        assert!(select_flash_provider(999_999).is_none());
    }

    #[test]
    fn selection_is_deterministic() {
        for _ in 0..10 {
            assert_eq!(
                select_flash_provider(CHAIN_ETHEREUM),
                select_flash_provider(CHAIN_ETHEREUM)
            );
        }
    }

    #[test]
    fn fallback_provider_charges_nine_bps() {
        let aave = FLASH_LOAN_PROVIDERS
            .iter()
            .find(|p| p.fee_rate > dec!(0))
            .unwrap();
        assert_eq!(aave.fee_rate, dec!(0.0009));
    }
}
