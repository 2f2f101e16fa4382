//! Bot configuration settings and environment variable handling

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;

use crate::types::{CHAIN_ARBITRUM, CHAIN_BASE, CHAIN_ETHEREUM, RiskParameters};

// Configuration bounds
pub const MIN_BORROW_USD: Decimal = dec!(1000);
pub const MAX_BORROW_USD: Decimal = dec!(1000000);
pub const MIN_PROFIT_USD: Decimal = dec!(1);
pub const MAX_GAS_PRICE_GWEI: u64 = 500;

// Gas quotes older than this must not be used for an attempt
pub const DEFAULT_BLOCK_STALENESS_SECS: u64 = 30;

// Risk evaluation cadence
pub const RISK_TICK_SECS: u64 = 5;
pub const POSITION_REFRESH_SECS: u64 = 15;

// Execution
pub const EXECUTION_TIMEOUT_SECS: u64 = 30;

// Bridge monitoring
pub const BRIDGE_POLL_INTERVAL_SECS: u64 = 10;
pub const DEFAULT_BRIDGE_SAFETY_FACTOR: Decimal = dec!(2.0);

/// One monitored chain. L2s poll fast, mainnet polls at block pace.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub name: String,
    pub chain_id: u64,
    pub rpc_url: String,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub chains: Vec<ChainConfig>,
    pub borrow_amount_usd: Decimal,
    pub min_profit_usd: Decimal,
    pub min_spread_pct: Decimal,
    pub block_staleness_secs: u64,
    pub enable_execution: bool,
    pub execution_timeout_secs: u64,
    pub max_gas_price_gwei: u64,
    // Risk control
    pub risk: RiskParameters,
    pub risk_tick_secs: u64,
    pub position_refresh_secs: u64,
    // Failure containment
    pub breaker_window_secs: u64,
    pub breaker_threshold: u32,
    pub breaker_cooldown_secs: u64,
    // Bridge routing
    pub bridge_safety_factor: Decimal,
    pub bridge_poll_interval_secs: u64,
    // Off-chain price oracle
    pub oracle_base_url: String,
    // RPC access
    pub alchemy_api_key: Option<String>,
}

fn env_decimal(key: &str, default: Decimal) -> Decimal {
    env::var(key)
        .ok()
        .and_then(|s| Decimal::from_str(&s).ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn load() -> Self {
        let alchemy_api_key = env::var("ALCHEMY_API_KEY").ok();
        let chains = default_chains(alchemy_api_key.as_deref());

        Self {
            chains,
            borrow_amount_usd: env_decimal("BORROW_AMOUNT_USD", dec!(100000))
                .max(MIN_BORROW_USD)
                .min(MAX_BORROW_USD),
            min_profit_usd: env_decimal("MIN_PROFIT_USD", dec!(25)).max(MIN_PROFIT_USD),
            min_spread_pct: env_decimal("MIN_SPREAD_PCT", dec!(0.05)),
            block_staleness_secs: env_u64("BLOCK_STALENESS_SECS", DEFAULT_BLOCK_STALENESS_SECS),
            enable_execution: env_bool("ENABLE_EXECUTION", false),
            execution_timeout_secs: env_u64("EXECUTION_TIMEOUT_SECS", EXECUTION_TIMEOUT_SECS),
            max_gas_price_gwei: env_u64("MAX_GAS_PRICE_GWEI", 200).min(MAX_GAS_PRICE_GWEI),
            risk: RiskParameters {
                max_position_size: env_decimal("MAX_POSITION_SIZE_USD", dec!(50000)),
                max_daily_loss: env_decimal("MAX_DAILY_LOSS_USD", dec!(10000)),
                max_drawdown_pct: env_decimal("MAX_DRAWDOWN_PCT", dec!(15)),
                stop_loss_pct: env_decimal("STOP_LOSS_PCT", dec!(2)),
                max_network_exposure: env_decimal("MAX_NETWORK_EXPOSURE_USD", dec!(100000)),
                max_strategy_exposure: env_decimal("MAX_STRATEGY_EXPOSURE_USD", dec!(75000)),
                max_tx_per_hour: env_u64("MAX_TX_PER_HOUR", 60) as u32,
                max_volatility_pct: env_decimal("MAX_VOLATILITY_PCT", dec!(8)),
                max_hold_secs: env_u64("MAX_HOLD_SECS", 3600),
            },
            risk_tick_secs: env_u64("RISK_TICK_SECS", RISK_TICK_SECS),
            position_refresh_secs: env_u64("POSITION_REFRESH_SECS", POSITION_REFRESH_SECS),
            breaker_window_secs: env_u64("BREAKER_WINDOW_SECS", 120),
            breaker_threshold: env_u64("BREAKER_THRESHOLD", 5) as u32,
            breaker_cooldown_secs: env_u64("BREAKER_COOLDOWN_SECS", 300),
            bridge_safety_factor: env_decimal("BRIDGE_SAFETY_FACTOR", DEFAULT_BRIDGE_SAFETY_FACTOR)
                .max(dec!(1)),
            bridge_poll_interval_secs: env_u64(
                "BRIDGE_POLL_INTERVAL_SECS",
                BRIDGE_POLL_INTERVAL_SECS,
            ),
            oracle_base_url: env::var("ORACLE_BASE_URL")
                .unwrap_or_else(|_| "https://api.binance.com".to_string()),
            alchemy_api_key,
        }
    }
}

/// Monitored chains with their polling cadence: L1 mainnet at block pace,
/// L2s considerably faster.
fn default_chains(alchemy_api_key: Option<&str>) -> Vec<ChainConfig> {
    let key = alchemy_api_key.unwrap_or("demo");
    vec![
        ChainConfig {
            name: "ethereum".to_string(),
            chain_id: CHAIN_ETHEREUM,
            rpc_url: format!("https://eth-mainnet.g.alchemy.com/v2/{key}"),
            poll_interval_ms: env_u64("ETHEREUM_POLL_MS", 12_000),
        },
        ChainConfig {
            name: "base".to_string(),
            chain_id: CHAIN_BASE,
            rpc_url: format!("https://base-mainnet.g.alchemy.com/v2/{key}"),
            poll_interval_ms: env_u64("BASE_POLL_MS", 2_000),
        },
        ChainConfig {
            name: "arbitrum".to_string(),
            chain_id: CHAIN_ARBITRUM,
            rpc_url: format!("https://arb-mainnet.g.alchemy.com/v2/{key}"),
            poll_interval_ms: env_u64("ARBITRUM_POLL_MS", 1_000),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn borrow_amount_is_clamped_to_bounds() {
        // No env overrides in the test environment for these keys.
        let cfg = Config::load();
        assert!(cfg.borrow_amount_usd >= MIN_BORROW_USD);
        assert!(cfg.borrow_amount_usd <= MAX_BORROW_USD);
        assert!(cfg.min_profit_usd >= MIN_PROFIT_USD);
    }

    #[test]
    fn l2s_poll_faster_than_mainnet() {
        let chains = default_chains(None);
        let mainnet = chains.iter().find(|c| c.chain_id == CHAIN_ETHEREUM).unwrap();
        for chain in chains.iter().filter(|c| c.chain_id != CHAIN_ETHEREUM) {
            assert!(chain.poll_interval_ms < mainnet.poll_interval_ms);
        }
    }
}
