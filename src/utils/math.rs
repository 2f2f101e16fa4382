//! Mathematical utility functions

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;

pub const WEI_PER_ETH: Decimal = dec!(1_000_000_000_000_000_000);
pub const WEI_PER_GWEI: Decimal = dec!(1_000_000_000);

pub fn pow10(n: i32) -> Decimal {
    match n {
        0 => dec!(1),
        6 => dec!(1_000_000),
        18 => dec!(1_000_000_000_000_000_000),
        _ => {
            let mut result = dec!(1);
            if n > 0 {
                for _ in 0..n {
                    result *= dec!(10);
                }
            } else {
                for _ in 0..(-n) {
                    result /= dec!(10);
                }
            }
            result
        }
    }
}

/// Convert a wei amount to whole native units (ETH).
pub fn wei_to_eth(wei: u128) -> Decimal {
    Decimal::from(wei) / WEI_PER_ETH
}

/// Convert a wei amount to gwei.
pub fn wei_to_gwei(wei: u128) -> Decimal {
    Decimal::from(wei) / WEI_PER_GWEI
}

pub fn gwei_to_wei(gwei: u64) -> u128 {
    gwei as u128 * 1_000_000_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pow10_matches_fast_paths() {
        assert_eq!(pow10(6), dec!(1_000_000));
        assert_eq!(pow10(3), dec!(1000));
        assert_eq!(pow10(-2), dec!(0.01));
    }

    #[test]
    fn wei_conversions_round_trip() {
        assert_eq!(wei_to_eth(1_000_000_000_000_000_000), dec!(1));
        assert_eq!(wei_to_gwei(2_500_000_000), dec!(2.5));
        assert_eq!(gwei_to_wei(3), 3_000_000_000);
    }
}
