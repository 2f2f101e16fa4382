//! Risk control plane types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::HashMap;
use uuid::Uuid;

/// Risk control state machine. Emergency latches until an operator clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskState {
    Normal,
    Warning,
    Emergency,
}

/// Operator-set limits, mutable at runtime and read by every risk check.
#[derive(Debug, Clone, Serialize)]
pub struct RiskParameters {
    /// Largest notional a single position may carry, USD.
    pub max_position_size: Decimal,
    /// Daily realized loss that forces an emergency halt, USD (positive).
    pub max_daily_loss: Decimal,
    /// Peak-to-trough drawdown that forces an emergency halt, percent.
    pub max_drawdown_pct: Decimal,
    /// Per-trade loss that auto-closes a position, percent (positive).
    pub stop_loss_pct: Decimal,
    /// Cap on summed position notional per network, USD.
    pub max_network_exposure: Decimal,
    /// Cap on summed position notional per strategy, USD.
    pub max_strategy_exposure: Decimal,
    pub max_tx_per_hour: u32,
    /// Portfolio volatility above this raises an alert, percent.
    pub max_volatility_pct: Decimal,
    /// Positions open longer than this are force-closed, seconds.
    pub max_hold_secs: u64,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            max_position_size: dec!(50000),
            max_daily_loss: dec!(10000),
            max_drawdown_pct: dec!(15),
            stop_loss_pct: dec!(2),
            max_network_exposure: dec!(100000),
            max_strategy_exposure: dec!(75000),
            max_tx_per_hour: 60,
            max_volatility_pct: dec!(8),
            max_hold_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

/// Structured alert raised by the risk gate. The core only publishes these;
/// formatting and delivery belong to the notification collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct RiskAlert {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub rule: String,
    pub message: String,
}

impl RiskAlert {
    pub fn new(severity: AlertSeverity, rule: &str, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            severity,
            rule: rule.to_string(),
            message,
        }
    }
}

/// Derived risk picture, recomputed on every tick and on demand.
#[derive(Debug, Clone, Serialize)]
pub struct RiskMetrics {
    pub timestamp: DateTime<Utc>,
    pub state: RiskState,
    /// 0 (calm) to 100 (forced emergency).
    pub risk_score: Decimal,
    pub current_drawdown_pct: Decimal,
    pub daily_pnl: Decimal,
    pub total_exposure: Decimal,
    pub network_exposure: HashMap<String, Decimal>,
    pub strategy_exposure: HashMap<String, Decimal>,
    pub portfolio_volatility_pct: Decimal,
    pub active_alerts: usize,
    pub critical_alerts: usize,
    pub tx_last_hour: u32,
    pub open_positions: usize,
}
