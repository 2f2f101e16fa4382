//! Flashpath Arbitrage Bot - capital-free arbitrage across EVM networks
//!
//! Detects price spreads across DEX venues and chains, prices them under a
//! dynamic EIP-1559 gas model, gates every execution through a shared risk
//! ledger, and executes atomically via flash loans with pre-flight
//! simulation. Cross-chain topologies route through bridges with explicit
//! failure recovery.

pub mod config;
pub mod types;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod profitability;
pub mod strategy;
pub mod risk;
pub mod execution;
pub mod bridge;
pub mod positions;
pub mod monitor;
pub mod validation;
pub mod utils;
pub mod storage;

// Re-export commonly used items
pub use config::Config;
pub use errors::{BotError, BotResult};
pub use types::*;

// Type alias for our concrete provider
pub type ConcreteProvider = alloy::providers::RootProvider<alloy::transports::BoxTransport>;
