//! The risk gate
//!
//! Single approval gate and state machine for every execution path. The
//! ledger sits behind one mutex so an approval check and the exposure
//! reservation it implies are atomic with respect to every other check:
//! two concurrent executions can never jointly slip past a cap.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    errors::{BotError, BotResult},
    events::{BotEvent, EventBus},
    risk::ledger::{Reservation, RiskLedger},
    risk::score::{EMERGENCY_SCORE, RiskScoreInputs, WARNING_SCORE, compute_risk_score},
    types::{
        AlertSeverity, ArbitrageType, ExecutionResult, ExitReason, Opportunity, Position,
        RiskAlert, RiskMetrics, RiskParameters, RiskState,
    },
};

/// Exposure reserved by a granted approval. Must be either committed into a
/// position or released; the engine does one or the other on every path.
#[derive(Debug, Clone)]
pub struct Approval {
    pub opportunity_id: Uuid,
    pub network: String,
    pub strategy: ArbitrageType,
    pub size: Decimal,
}

pub struct RiskGate {
    ledger: Mutex<RiskLedger>,
    events: EventBus,
}

impl RiskGate {
    pub fn new(params: RiskParameters, events: EventBus) -> Self {
        Self {
            ledger: Mutex::new(RiskLedger::new(params, Utc::now())),
            events,
        }
    }

    /// The single gate in front of submission. Checks run and the exposure
    /// reservation lands under one lock acquisition.
    pub async fn approve(
        &self,
        opportunity: &Opportunity,
        strategy: ArbitrageType,
        size: Decimal,
    ) -> BotResult<Approval> {
        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;

        if ledger.state == RiskState::Emergency {
            return Err(BotError::EmergencyHalt {
                reason: ledger
                    .emergency_reason
                    .clone()
                    .unwrap_or_else(|| "emergency halt active".to_string()),
            });
        }

        if opportunity.is_expired(now) {
            return Err(BotError::OpportunityExpired {
                deadline: opportunity.deadline,
            });
        }

        if ledger.reservations.contains_key(&opportunity.id) {
            return Err(BotError::AttemptInFlight {
                opportunity_id: opportunity.id,
            });
        }

        let params = ledger.params.clone();
        if size > params.max_position_size {
            return Err(BotError::RiskLimitExceeded {
                rule: "position_size".to_string(),
                details: format!("{size} > {}", params.max_position_size),
            });
        }

        let network = opportunity.network.clone();
        if ledger.halted_networks.contains(&network) {
            return Err(BotError::RiskLimitExceeded {
                rule: "network_halted".to_string(),
                details: format!("strategy halted on {network}"),
            });
        }

        let adjusted = size * strategy.risk_multiplier();
        let network_exposure = ledger.reserved_network_exposure(&network);
        if network_exposure + adjusted > params.max_network_exposure {
            return Err(BotError::RiskLimitExceeded {
                rule: "network_exposure".to_string(),
                details: format!(
                    "{network}: {} + {adjusted} > {}",
                    network_exposure, params.max_network_exposure
                ),
            });
        }

        let strategy_exposure = ledger.reserved_strategy_exposure(strategy);
        if strategy_exposure + adjusted > params.max_strategy_exposure {
            return Err(BotError::RiskLimitExceeded {
                rule: "strategy_exposure".to_string(),
                details: format!(
                    "{}: {} + {adjusted} > {}",
                    strategy.as_str(),
                    strategy_exposure,
                    params.max_strategy_exposure
                ),
            });
        }

        // Velocity is an alert-only rule: it never blocks an execution.
        if ledger.tx_last_hour(now) >= params.max_tx_per_hour {
            let alert = RiskAlert::new(
                AlertSeverity::Warning,
                "tx_velocity",
                format!("transaction velocity at cap ({}/h)", params.max_tx_per_hour),
            );
            ledger.push_alert(alert.clone());
            self.events.publish(BotEvent::RiskAlert(alert));
        }

        ledger.reservations.insert(
            opportunity.id,
            Reservation {
                opportunity_id: opportunity.id,
                network: network.clone(),
                strategy,
                adjusted_size: adjusted,
            },
        );

        Ok(Approval {
            opportunity_id: opportunity.id,
            network,
            strategy,
            size,
        })
    }

    /// Drop a reservation without opening a position (attempt aborted).
    pub async fn release(&self, approval: &Approval) {
        let mut ledger = self.ledger.lock().await;
        ledger.reservations.remove(&approval.opportunity_id);
    }

    /// Convert a reservation into an open position.
    pub async fn commit(&self, approval: &Approval, position: Position) -> BotResult<()> {
        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;
        ledger.reservations.remove(&approval.opportunity_id);

        if ledger.state == RiskState::Emergency {
            return Err(BotError::EmergencyHalt {
                reason: "emergency entered while executing".to_string(),
            });
        }
        if position.size > ledger.params.max_position_size {
            return Err(BotError::RiskLimitExceeded {
                rule: "position_size".to_string(),
                details: format!(
                    "{} > {}",
                    position.size, ledger.params.max_position_size
                ),
            });
        }

        ledger.record_tx(now);
        ledger.positions.insert(position.id, position.clone());
        self.events.publish(BotEvent::PositionOpened(position));
        Ok(())
    }

    /// Fold a finished execution into the PnL history.
    pub async fn record_result(&self, result: &ExecutionResult, notional: Decimal) {
        let mut ledger = self.ledger.lock().await;
        if let Some(profit) = result.realized_profit_usd {
            ledger.record_trade(profit, notional, Utc::now());
        }
    }

    /// Put an alert on the book and publish it. Critical alerts feed the
    /// risk score until they age out.
    pub async fn raise_alert(&self, alert: RiskAlert) {
        let mut ledger = self.ledger.lock().await;
        ledger.push_alert(alert.clone());
        self.events.publish(BotEvent::RiskAlert(alert));
    }

    /// Record a realized loss from outside normal settlement (bridge
    /// recovery). Counts against the daily loss cap immediately.
    pub async fn record_loss(&self, amount: Decimal, context: &str) {
        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;
        ledger.record_trade(-amount.abs(), amount.abs(), now);
        warn!("📉 Realized loss of ${} recorded: {}", amount.abs(), context);
    }

    /// Refresh marks and enforce the per-position exit rules. Each position
    /// closes at most once regardless of how often ticks repeat.
    pub async fn apply_marks(
        &self,
        marks: &[(Uuid, Decimal)],
        now: DateTime<Utc>,
    ) -> Vec<Position> {
        let mut ledger = self.ledger.lock().await;
        for (id, price) in marks {
            if let Some(position) = ledger.positions.get_mut(id) {
                position.mark(*price);
            }
        }

        let stop_loss_pct = ledger.params.stop_loss_pct;
        let max_hold_secs = ledger.params.max_hold_secs;
        let mut to_close: Vec<(Uuid, ExitReason)> = Vec::new();
        for p in ledger.positions.values().filter(|p| p.is_open()) {
            if p.stop_loss_hit(stop_loss_pct) {
                to_close.push((p.id, ExitReason::StopLoss));
            } else if p.held_for_secs(now) > max_hold_secs {
                to_close.push((p.id, ExitReason::MaxHoldExceeded));
            }
        }

        let mut closed = Vec::new();
        for (id, reason) in to_close {
            if let Some(position) = ledger.close_position(id, reason, now) {
                info!(
                    position_id = %position.id,
                    reason = reason.as_str(),
                    pnl = %position.pnl,
                    "Position closed"
                );
                self.events.publish(BotEvent::PositionClosed(position.clone()));
                closed.push(position);
            }
        }
        closed
    }

    /// Run the full ordered rule table, recompute the score and settle the
    /// state machine. Called on the periodic risk tick.
    pub async fn evaluate(&self, now: DateTime<Utc>) -> RiskMetrics {
        let mut ledger = self.ledger.lock().await;
        ledger.prune_alerts(now);
        let params = ledger.params.clone();
        let mut warning_rule_hit = false;

        // 1. Position size: a runtime tightening of the cap can leave open
        //    positions oversized. They are flagged, not force-closed.
        let oversized: Vec<Uuid> = ledger
            .positions
            .values()
            .filter(|p| p.is_open() && p.size > params.max_position_size)
            .map(|p| p.id)
            .collect();
        if !oversized.is_empty() {
            warning_rule_hit = true;
            let alert = RiskAlert::new(
                AlertSeverity::Warning,
                "position_size",
                format!("{} open position(s) above the size cap", oversized.len()),
            );
            ledger.push_alert(alert.clone());
            self.events.publish(BotEvent::RiskAlert(alert));
        }

        // 2. Daily loss cap.
        if ledger.daily_pnl < -params.max_daily_loss && ledger.state != RiskState::Emergency {
            let reason = format!(
                "daily loss {} breached cap {}",
                ledger.daily_pnl, params.max_daily_loss
            );
            enter_emergency(&mut ledger, &self.events, reason, now);
        }

        // 3. Drawdown cap.
        if ledger.drawdown_pct() > params.max_drawdown_pct && ledger.state != RiskState::Emergency
        {
            let reason = format!(
                "drawdown {:.2}% breached cap {}%",
                ledger.drawdown_pct(),
                params.max_drawdown_pct
            );
            enter_emergency(&mut ledger, &self.events, reason, now);
        }

        // 4. Per-trade stop loss and hold timeout.
        let mut to_close: Vec<(Uuid, ExitReason)> = Vec::new();
        for p in ledger.positions.values().filter(|p| p.is_open()) {
            if p.stop_loss_hit(params.stop_loss_pct) {
                to_close.push((p.id, ExitReason::StopLoss));
            } else if p.held_for_secs(now) > params.max_hold_secs {
                to_close.push((p.id, ExitReason::MaxHoldExceeded));
            }
        }
        for (id, reason) in to_close {
            if let Some(position) = ledger.close_position(id, reason, now) {
                self.events.publish(BotEvent::PositionClosed(position));
            }
        }

        // 5. Network exposure: breaching halts the strategy on that network
        //    until exposure decays back under the cap.
        let network_exposure = ledger.network_exposure_map();
        for (network, exposure) in &network_exposure {
            if *exposure > params.max_network_exposure {
                if ledger.halted_networks.insert(network.clone()) {
                    warning_rule_hit = true;
                    let alert = RiskAlert::new(
                        AlertSeverity::Warning,
                        "network_exposure",
                        format!("{network} exposure {exposure} above cap, halting strategy"),
                    );
                    ledger.push_alert(alert.clone());
                    self.events.publish(BotEvent::RiskAlert(alert));
                }
            }
        }
        ledger
            .halted_networks
            .retain(|n| network_exposure.get(n).copied().unwrap_or(dec!(0))
                > params.max_network_exposure);

        // 6. Volatility, alert only.
        let volatility = ledger.volatility_pct();
        if volatility > params.max_volatility_pct {
            warning_rule_hit = true;
            let alert = RiskAlert::new(
                AlertSeverity::Warning,
                "volatility",
                format!("portfolio volatility {volatility:.2}% above cap"),
            );
            ledger.push_alert(alert.clone());
            self.events.publish(BotEvent::RiskAlert(alert));
        }

        // 7. Velocity, alert only.
        let tx_last_hour = ledger.tx_last_hour(now);
        if tx_last_hour > params.max_tx_per_hour {
            warning_rule_hit = true;
            let alert = RiskAlert::new(
                AlertSeverity::Warning,
                "tx_velocity",
                format!("{tx_last_hour} transactions in the last hour"),
            );
            ledger.push_alert(alert.clone());
            self.events.publish(BotEvent::RiskAlert(alert));
        }

        // Weighted score; above the hard threshold it forces an emergency.
        let inputs = RiskScoreInputs {
            drawdown_pct: ledger.drawdown_pct(),
            daily_pnl: ledger.daily_pnl,
            volatility_pct: volatility,
            max_network_exposure: network_exposure.values().copied().max().unwrap_or(dec!(0)),
            critical_alerts: ledger.critical_alert_count(),
        };
        let score = compute_risk_score(&inputs, &params);
        if score > EMERGENCY_SCORE && ledger.state != RiskState::Emergency {
            enter_emergency(
                &mut ledger,
                &self.events,
                format!("risk score {score} above {EMERGENCY_SCORE}"),
                now,
            );
        }

        // Any live critical alert (bridge failure, circuit breaker) holds
        // the state at Warning or worse until it ages out.
        if ledger.state != RiskState::Emergency {
            ledger.state = if score > WARNING_SCORE
                || warning_rule_hit
                || ledger.critical_alert_count() > 0
            {
                RiskState::Warning
            } else {
                RiskState::Normal
            };
        }

        let metrics = build_metrics(&mut ledger, score, now);
        self.events.publish(BotEvent::MetricsUpdated(metrics.clone()));
        metrics
    }

    /// Operator action; the only way out of Emergency.
    pub async fn clear_emergency(&self) {
        let mut ledger = self.ledger.lock().await;
        if ledger.state == RiskState::Emergency {
            info!("🟢 Emergency halt cleared by operator");
            ledger.state = RiskState::Normal;
            ledger.emergency_reason = None;
        }
    }

    pub async fn update_parameters(&self, params: RiskParameters) {
        let mut ledger = self.ledger.lock().await;
        info!("Risk parameters updated");
        ledger.params = params;
    }

    pub async fn close_position(&self, id: Uuid, reason: ExitReason) -> Option<Position> {
        let mut ledger = self.ledger.lock().await;
        let closed = ledger.close_position(id, reason, Utc::now());
        if let Some(position) = &closed {
            self.events.publish(BotEvent::PositionClosed(position.clone()));
        }
        closed
    }

    pub async fn open_positions(&self) -> Vec<Position> {
        self.ledger.lock().await.open_positions()
    }

    pub async fn state(&self) -> RiskState {
        self.ledger.lock().await.state
    }

    pub async fn parameters(&self) -> RiskParameters {
        self.ledger.lock().await.params.clone()
    }

    /// Metrics snapshot without running the rule table.
    pub async fn metrics(&self) -> RiskMetrics {
        let now = Utc::now();
        let mut ledger = self.ledger.lock().await;
        let inputs = RiskScoreInputs {
            drawdown_pct: ledger.drawdown_pct(),
            daily_pnl: ledger.daily_pnl,
            volatility_pct: ledger.volatility_pct(),
            max_network_exposure: ledger
                .network_exposure_map()
                .values()
                .copied()
                .max()
                .unwrap_or(dec!(0)),
            critical_alerts: ledger.critical_alert_count(),
        };
        let score = compute_risk_score(&inputs, &ledger.params.clone());
        build_metrics(&mut ledger, score, now)
    }
}

/// Emergency entry: latch the state, close every open position and raise a
/// critical alert, all inside the caller's lock.
fn enter_emergency(
    ledger: &mut RiskLedger,
    events: &EventBus,
    reason: String,
    now: DateTime<Utc>,
) {
    error!("🛑 EMERGENCY HALT: {}", reason);
    ledger.state = RiskState::Emergency;
    ledger.emergency_reason = Some(reason.clone());

    let open: Vec<Uuid> = ledger.open_positions().iter().map(|p| p.id).collect();
    for id in open {
        if let Some(position) = ledger.close_position(id, ExitReason::EmergencyHalt, now) {
            events.publish(BotEvent::PositionClosed(position));
        }
    }

    let alert = RiskAlert::new(AlertSeverity::Critical, "emergency_halt", reason);
    ledger.push_alert(alert.clone());
    events.publish(BotEvent::RiskAlert(alert));
}

fn build_metrics(ledger: &mut RiskLedger, score: Decimal, now: DateTime<Utc>) -> RiskMetrics {
    RiskMetrics {
        timestamp: now,
        state: ledger.state,
        risk_score: score,
        current_drawdown_pct: ledger.drawdown_pct(),
        daily_pnl: ledger.daily_pnl,
        total_exposure: ledger.total_exposure(),
        network_exposure: ledger.network_exposure_map(),
        strategy_exposure: ledger.strategy_exposure_map(),
        portfolio_volatility_pct: ledger.volatility_pct(),
        active_alerts: ledger.alerts.len(),
        critical_alerts: ledger.critical_alert_count(),
        tx_last_hour: ledger.tx_last_hour(now),
        open_positions: ledger.open_positions().len(),
    }
}
