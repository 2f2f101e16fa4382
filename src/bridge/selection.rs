//! Bridge selection
//!
//! Filter the bridges serving a (source, target, token) triple, rank by
//! reliability with fee as the tie-break, and score the chosen route.

use alloy::primitives::Address;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;

use crate::types::{
    BridgeInfo, BridgeRoute, CHAIN_ARBITRUM, CHAIN_BASE, CHAIN_ETHEREUM, USDC_ARBITRUM,
    USDC_BASE, USDC_ETHEREUM, WETH_ARBITRUM, WETH_BASE, WETH_ETHEREUM,
};

const WEIGHT_UNRELIABILITY: Decimal = dec!(0.5);
const WEIGHT_AMOUNT: Decimal = dec!(0.3);
const WEIGHT_TIME: Decimal = dec!(0.2);
/// Transfers at or above this duration score the full time weight.
const TIME_NORM_SECS: Decimal = dec!(1800);

/// Weighted route risk in [0, 1]: unreliability, size against the bridge
/// cap, and normalized transfer time.
pub fn route_risk_score(bridge: &BridgeInfo, amount: Decimal) -> Decimal {
    let unreliability = (dec!(1) - bridge.reliability).clamp(dec!(0), dec!(1));
    let amount_ratio = if bridge.max_amount > dec!(0) {
        (amount / bridge.max_amount).clamp(dec!(0), dec!(1))
    } else {
        dec!(1)
    };
    let time_ratio = (Decimal::from(bridge.avg_transfer_secs) / TIME_NORM_SECS)
        .clamp(dec!(0), dec!(1));

    (WEIGHT_UNRELIABILITY * unreliability
        + WEIGHT_AMOUNT * amount_ratio
        + WEIGHT_TIME * time_ratio)
        .clamp(dec!(0), dec!(1))
}

/// Highest reliability wins; ties break on the lowest fee.
pub fn select_route(
    bridges: &[BridgeInfo],
    source_chain: u64,
    target_chain: u64,
    token: Address,
    amount: Decimal,
) -> Option<BridgeRoute> {
    let mut candidates: Vec<&BridgeInfo> = bridges
        .iter()
        .filter(|b| b.supports(source_chain, target_chain, token) && amount <= b.max_amount)
        .collect();

    candidates.sort_by(|a, b| {
        b.reliability
            .cmp(&a.reliability)
            .then(a.fee_usd.cmp(&b.fee_usd))
            .then(a.name.cmp(&b.name))
    });

    let bridge = candidates.first()?;
    Some(BridgeRoute {
        bridge: bridge.name.clone(),
        source_chain_id: source_chain,
        target_chain_id: target_chain,
        token,
        amount,
        fee_usd: bridge.fee_usd,
        eta_secs: bridge.avg_transfer_secs,
        reliability: bridge.reliability,
        risk_score: route_risk_score(bridge, amount),
    })
}

/// Seconds the router will wait before declaring a transfer dead.
pub fn bridging_deadline_secs(eta_secs: u64, safety_factor: Decimal) -> u64 {
    (Decimal::from(eta_secs) * safety_factor)
        .to_u64()
        .unwrap_or(eta_secs)
        .max(1)
}

/// Bridges this bot routes through, with observed reliability figures.
pub fn default_bridges() -> Vec<BridgeInfo> {
    let all_pairs = vec![
        (CHAIN_ETHEREUM, CHAIN_BASE),
        (CHAIN_BASE, CHAIN_ETHEREUM),
        (CHAIN_ETHEREUM, CHAIN_ARBITRUM),
        (CHAIN_ARBITRUM, CHAIN_ETHEREUM),
        (CHAIN_BASE, CHAIN_ARBITRUM),
        (CHAIN_ARBITRUM, CHAIN_BASE),
    ];
    let all_tokens = vec![
        USDC_ETHEREUM,
        USDC_BASE,
        USDC_ARBITRUM,
        WETH_ETHEREUM,
        WETH_BASE,
        WETH_ARBITRUM,
    ];

    vec![
        BridgeInfo {
            name: "across".to_string(),
            contract: alloy::primitives::address!("5c7BCd6E7De5423a257D81B442095A1a6ced35C5"),
            fee_usd: dec!(12),
            avg_transfer_secs: 120,
            reliability: dec!(0.995),
            max_amount: dec!(500000),
            chain_pairs: all_pairs.clone(),
            tokens: all_tokens.clone(),
        },
        BridgeInfo {
            name: "stargate".to_string(),
            contract: alloy::primitives::address!("8731d54E9D02c286767d56ac03e8037C07e01e98"),
            fee_usd: dec!(9),
            avg_transfer_secs: 300,
            reliability: dec!(0.99),
            max_amount: dec!(1000000),
            chain_pairs: all_pairs.clone(),
            tokens: all_tokens.clone(),
        },
        BridgeInfo {
            name: "hop".to_string(),
            contract: alloy::primitives::address!("b8901acB165ed027E32754E0FFe830802919727f"),
            fee_usd: dec!(15),
            avg_transfer_secs: 600,
            reliability: dec!(0.98),
            max_amount: dec!(250000),
            chain_pairs: all_pairs,
            tokens: all_tokens,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(name: &str, reliability: Decimal, fee: Decimal) -> BridgeInfo {
        BridgeInfo {
            name: name.to_string(),
            contract: Address::repeat_byte(0xbb),
            fee_usd: fee,
            avg_transfer_secs: 300,
            reliability,
            max_amount: dec!(500000),
            chain_pairs: vec![(CHAIN_BASE, CHAIN_ARBITRUM)],
            tokens: vec![USDC_BASE],
        }
    }

    #[test]
    fn highest_reliability_wins() {
        let bridges = vec![
            bridge("a", dec!(0.97), dec!(1)),
            bridge("b", dec!(0.99), dec!(20)),
            bridge("c", dec!(0.95), dec!(0)),
        ];
        let route =
            select_route(&bridges, CHAIN_BASE, CHAIN_ARBITRUM, USDC_BASE, dec!(10000)).unwrap();
        assert_eq!(route.bridge, "b");
    }

    #[test]
    fn reliability_tie_breaks_on_lowest_fee() {
        let bridges = vec![
            bridge("pricey", dec!(0.99), dec!(30)),
            bridge("cheap", dec!(0.99), dec!(5)),
        ];
        let route =
            select_route(&bridges, CHAIN_BASE, CHAIN_ARBITRUM, USDC_BASE, dec!(10000)).unwrap();
        assert_eq!(route.bridge, "cheap");
    }

    #[test]
    fn unsupported_triple_yields_no_route() {
        let bridges = vec![bridge("a", dec!(0.99), dec!(5))];
        assert!(
            select_route(&bridges, CHAIN_ARBITRUM, CHAIN_BASE, USDC_BASE, dec!(10000)).is_none()
        );
        assert!(
            select_route(&bridges, CHAIN_BASE, CHAIN_ARBITRUM, WETH_BASE, dec!(10000)).is_none()
        );
    }

    #[test]
    fn over_cap_amount_is_filtered() {
        let bridges = vec![bridge("a", dec!(0.99), dec!(5))];
        assert!(
            select_route(&bridges, CHAIN_BASE, CHAIN_ARBITRUM, USDC_BASE, dec!(600000)).is_none()
        );
    }

    #[test]
    fn risk_score_grows_with_amount_and_unreliability() {
        let safe = bridge("safe", dec!(0.999), dec!(5));
        let shaky = bridge("shaky", dec!(0.9), dec!(5));
        assert!(route_risk_score(&shaky, dec!(10000)) > route_risk_score(&safe, dec!(10000)));
        assert!(route_risk_score(&safe, dec!(400000)) > route_risk_score(&safe, dec!(10000)));
        let score = route_risk_score(&shaky, dec!(500000));
        assert!(score >= dec!(0) && score <= dec!(1));
    }

    #[test]
    fn deadline_scales_eta_by_safety_factor() {
        assert_eq!(bridging_deadline_secs(120, dec!(2.0)), 240);
        assert_eq!(bridging_deadline_secs(0, dec!(2.0)), 1);
    }

    #[test]
    fn default_bridges_all_serve_usdc_base_to_arbitrum() {
        let route = select_route(
            &default_bridges(),
            CHAIN_BASE,
            CHAIN_ARBITRUM,
            USDC_BASE,
            dec!(100000),
        )
        .unwrap();
        // across has the best reliability of the defaults
        assert_eq!(route.bridge, "across");
    }
}
