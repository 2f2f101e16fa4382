//! Typed event bus
//!
//! The core never formats or delivers notifications. It publishes structured
//! events on a broadcast channel; notification and reporting collaborators
//! subscribe and do their own delivery.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{
    ExecutionResult, PendingBridgeTransfer, Position, RiskAlert, RiskMetrics,
};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum BotEvent {
    RiskAlert(RiskAlert),
    ExecutionCompleted(ExecutionResult),
    PositionOpened(Position),
    PositionClosed(Position),
    MetricsUpdated(RiskMetrics),
    BridgeTransferUpdate(PendingBridgeTransfer),
}

/// Broadcast fan-out for BotEvents. Publishing never blocks and never fails:
/// with no subscribers the event is simply dropped.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BotEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, event: BotEvent) {
        if self.tx.send(event).is_err() {
            debug!("No event subscribers, dropping event");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
