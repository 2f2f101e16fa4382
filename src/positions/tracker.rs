//! Position tracker
//!
//! Periodically marks every open position against the price oracle and lets
//! the risk gate enforce the exit rules. Prices are fetched outside the
//! ledger lock; only the marks themselves are applied under it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    errors::BotResult,
    gateway::PriceOracle,
    risk::RiskGate,
    types::{ExitReason, Position},
};

pub struct PositionTracker {
    gate: Arc<RiskGate>,
    oracle: Arc<dyn PriceOracle>,
}

impl PositionTracker {
    pub fn new(gate: Arc<RiskGate>, oracle: Arc<dyn PriceOracle>) -> Self {
        Self { gate, oracle }
    }

    /// One refresh tick: fetch each distinct symbol once, mark all open
    /// positions, return whatever the exit rules closed.
    pub async fn refresh(&self, now: DateTime<Utc>) -> BotResult<Vec<Position>> {
        let positions = self.gate.open_positions().await;
        if positions.is_empty() {
            return Ok(Vec::new());
        }

        let mut prices: HashMap<String, Decimal> = HashMap::new();
        for position in &positions {
            if prices.contains_key(&position.symbol) {
                continue;
            }
            match self.oracle.spot_price(&position.symbol).await {
                Ok(price) => {
                    prices.insert(position.symbol.clone(), price);
                }
                Err(e) => {
                    // A missing mark leaves the position at its last price;
                    // exit rules still run against that.
                    warn!("Price refresh failed for {}: {}", position.symbol, e);
                }
            }
        }

        let marks: Vec<(Uuid, Decimal)> = positions
            .iter()
            .filter_map(|p| prices.get(&p.symbol).map(|price| (p.id, *price)))
            .collect();

        debug!("Marking {} position(s) with {} price(s)", positions.len(), prices.len());
        Ok(self.gate.apply_marks(&marks, now).await)
    }

    pub async fn close_manual(&self, id: Uuid) -> Option<Position> {
        self.gate.close_position(id, ExitReason::Manual).await
    }

    pub async fn open_positions(&self) -> Vec<Position> {
        self.gate.open_positions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventBus;
    use crate::gateway::mock::StaticOracle;
    use crate::types::{
        ArbitrageType, Opportunity, RiskParameters, StrategyHints, USDC_BASE, Venue, WETH_BASE,
    };
    use alloy::primitives::Address;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn opportunity() -> Opportunity {
        Opportunity {
            id: Uuid::new_v4(),
            detected_at: Utc::now(),
            deadline: Utc::now() + Duration::seconds(30),
            tokens: vec![USDC_BASE, WETH_BASE],
            venues: vec![Venue {
                name: "weth-usdc".to_string(),
                chain_id: 8453,
                pool: Address::repeat_byte(7),
            }],
            chain_ids: vec![8453],
            network: "base".to_string(),
            borrow_token: USDC_BASE,
            borrow_amount: dec!(10000),
            expected_gross_output: dec!(10100),
            hints: StrategyHints::default(),
        }
    }

    async fn tracker_with_position(
        symbol: &str,
        entry: Decimal,
    ) -> (PositionTracker, Arc<StaticOracle>, Uuid) {
        let gate = Arc::new(RiskGate::new(RiskParameters::default(), EventBus::default()));
        let opp = opportunity();
        let approval = gate
            .approve(&opp, ArbitrageType::InterVenueSimple, dec!(10000))
            .await
            .unwrap();
        let position = Position {
            id: Uuid::new_v4(),
            opportunity_id: opp.id,
            network: "base".to_string(),
            strategy: ArbitrageType::InterVenueSimple,
            symbol: symbol.to_string(),
            entry_price: entry,
            current_price: entry,
            size: dec!(10000),
            pnl: dec!(0),
            pnl_pct: dec!(0),
            stop_loss_price: entry * dec!(0.98),
            opened_at: Utc::now(),
            max_hold_secs: 3600,
            closed_at: None,
            exit_reason: None,
        };
        let id = position.id;
        gate.commit(&approval, position).await.unwrap();

        let oracle = Arc::new(StaticOracle::new());
        let tracker = PositionTracker::new(gate, Arc::clone(&oracle) as Arc<dyn PriceOracle>);
        (tracker, oracle, id)
    }

    #[tokio::test]
    async fn stop_loss_cross_closes_through_refresh() {
        // entry=100, oracle says 97.9 (-2.1% vs a 2% stop)
        let (tracker, oracle, _id) = tracker_with_position("ETHUSDC", dec!(100)).await;
        oracle.set_price("ETHUSDC", dec!(97.9));

        let closed = tracker.refresh(Utc::now()).await.unwrap();
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].exit_reason, Some(ExitReason::StopLoss));

        // Second tick: nothing left to close.
        let closed = tracker.refresh(Utc::now()).await.unwrap();
        assert!(closed.is_empty());
        assert!(tracker.open_positions().await.is_empty());
    }

    #[tokio::test]
    async fn healthy_mark_keeps_the_position_open() {
        let (tracker, oracle, id) = tracker_with_position("ETHUSDC", dec!(100)).await;
        oracle.set_price("ETHUSDC", dec!(101.5));

        let closed = tracker.refresh(Utc::now()).await.unwrap();
        assert!(closed.is_empty());

        let open = tracker.open_positions().await;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, id);
        assert_eq!(open[0].current_price, dec!(101.5));
        assert_eq!(open[0].pnl_pct, dec!(1.5));
    }

    #[tokio::test]
    async fn missing_price_leaves_position_unmarked() {
        let (tracker, _oracle, id) = tracker_with_position("ETHUSDC", dec!(100)).await;
        // Oracle has no price for the symbol.
        let closed = tracker.refresh(Utc::now()).await.unwrap();
        assert!(closed.is_empty());
        let open = tracker.open_positions().await;
        assert_eq!(open[0].id, id);
        assert_eq!(open[0].current_price, dec!(100));
    }

    #[tokio::test]
    async fn manual_close_records_the_reason() {
        let (tracker, _oracle, id) = tracker_with_position("ETHUSDC", dec!(100)).await;
        let closed = tracker.close_manual(id).await.unwrap();
        assert_eq!(closed.exit_reason, Some(ExitReason::Manual));
        assert!(tracker.close_manual(id).await.is_none());
    }
}
