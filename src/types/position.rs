//! Open position bookkeeping types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use uuid::Uuid;

use super::ArbitrageType;

/// Why a position was closed. Serialized snake_case so downstream stores see
/// stable reason strings like `"stop_loss"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    MaxHoldExceeded,
    Manual,
    EmergencyHalt,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StopLoss => "stop_loss",
            Self::MaxHoldExceeded => "max_hold_exceeded",
            Self::Manual => "manual",
            Self::EmergencyHalt => "emergency_halt",
        }
    }
}

/// Inventory held after a successful execution, marked to market on every
/// refresh tick until an exit rule closes it.
#[derive(Debug, Clone, Serialize)]
pub struct Position {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub network: String,
    pub strategy: ArbitrageType,
    /// Oracle symbol used to mark this position.
    pub symbol: String,
    pub entry_price: Decimal,
    pub current_price: Decimal,
    /// Notional carried, USD. Never exceeds RiskParameters::max_position_size.
    pub size: Decimal,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
    pub stop_loss_price: Decimal,
    pub opened_at: DateTime<Utc>,
    pub max_hold_secs: u64,
    pub closed_at: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.closed_at.is_none()
    }

    /// Refresh the mark price and recompute PnL against entry.
    pub fn mark(&mut self, price: Decimal) {
        self.current_price = price;
        if self.entry_price > dec!(0) {
            let move_pct = (price - self.entry_price) / self.entry_price;
            self.pnl_pct = move_pct * dec!(100);
            self.pnl = self.size * move_pct;
        }
    }

    /// True once the mark has crossed the stop-loss trigger.
    pub fn stop_loss_hit(&self, stop_loss_pct: Decimal) -> bool {
        self.pnl_pct <= -stop_loss_pct
    }

    pub fn held_for_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.opened_at).num_seconds().max(0) as u64
    }
}
