//! Health monitoring types

use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Per-network gateway freshness: does the quote board hold a recent
    /// quote from that chain.
    pub chain_connections: HashMap<String, bool>,
    pub oracle_connection: bool,
    /// Failures currently inside the circuit-breaker window.
    pub window_failures: u32,
    pub circuit_breaker_active: bool,
    pub uptime_seconds: u64,
}
