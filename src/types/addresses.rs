//! Well-known token addresses and decimals per supported network

use alloy::primitives::{Address, address};

// Chain ids for the supported networks
pub const CHAIN_ETHEREUM: u64 = 1;
pub const CHAIN_BASE: u64 = 8453;
pub const CHAIN_ARBITRUM: u64 = 42161;

// Canonical WETH deployments
pub const WETH_ETHEREUM: Address = address!("C02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
pub const WETH_BASE: Address = address!("4200000000000000000000000000000000000006");
pub const WETH_ARBITRUM: Address = address!("82aF49447D8a07e3bd95BD0d56f35241523fBab1");

// Canonical USDC deployments
pub const USDC_ETHEREUM: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");
pub const USDC_BASE: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");
pub const USDC_ARBITRUM: Address = address!("af88d065e77c8cC2239327C5EDb3A432268e5831");

/// ERC-20 decimals for the tokens this bot trades. Stablecoins use 6,
/// everything else defaults to 18.
pub fn token_decimals(token: Address) -> u32 {
    match token {
        USDC_ETHEREUM | USDC_BASE | USDC_ARBITRUM => 6,
        _ => 18,
    }
}

/// Oracle symbol used to mark positions denominated in the given token pair.
pub fn oracle_symbol(token: Address) -> &'static str {
    match token {
        USDC_ETHEREUM | USDC_BASE | USDC_ARBITRUM => "USDCUSDT",
        _ => "ETHUSDC",
    }
}

// Monitored WETH/USDC pools per chain
pub const POOLS_ETHEREUM: &[(&str, Address)] = &[
    ("uniswap-weth-usdc", address!("B4e16d0168e52d35CaCD2c6185b44281Ec28C9Dc")),
    ("sushi-weth-usdc", address!("397FF1542f962076d0BFE58eA045FfA2d347ACa0")),
];

pub const POOLS_BASE: &[(&str, Address)] = &[
    ("aero-weth-usdc", address!("cDAC0d6c6C59727a65F871236188350531885C43")),
    ("uni-weth-usdbc", address!("B4885Bc63399BF5518b994c1d0C153334Ee579D0")),
];

pub const POOLS_ARBITRUM: &[(&str, Address)] = &[
    ("camelot-weth-usdc", address!("84652bb2539513BAf36e225c930Fdd8eaa63CE27")),
    ("sushi-weth-usdc", address!("905dfCD5649217c42684f23958568e533C711Aa3")),
];

pub fn pools_for_chain(chain_id: u64) -> &'static [(&'static str, Address)] {
    match chain_id {
        CHAIN_ETHEREUM => POOLS_ETHEREUM,
        CHAIN_BASE => POOLS_BASE,
        CHAIN_ARBITRUM => POOLS_ARBITRUM,
        _ => &[],
    }
}
