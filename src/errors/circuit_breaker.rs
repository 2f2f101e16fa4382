//! Circuit breaker implementation
//!
//! Trips when failures of the same kind repeat within a sliding window, and
//! stays open for a cooldown. The risk gate escalates its state when a trip
//! is reported.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{error, info};

struct BreakerInner {
    /// Recent failure instants, per failure kind.
    failures: HashMap<String, VecDeque<Instant>>,
    opened_at: Option<Instant>,
    open_reason: Option<String>,
}

pub struct CircuitBreaker {
    inner: RwLock<BreakerInner>,
    pub window: Duration,
    pub threshold: u32,
    pub cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(window_secs: u64, threshold: u32, cooldown_secs: u64) -> Self {
        Self {
            inner: RwLock::new(BreakerInner {
                failures: HashMap::new(),
                opened_at: None,
                open_reason: None,
            }),
            window: Duration::from_secs(window_secs),
            threshold,
            cooldown: Duration::from_secs(cooldown_secs),
        }
    }

    /// Record a failure of the given kind. Returns true if this failure
    /// tripped the breaker open.
    pub async fn record_error(&self, kind: &str) -> bool {
        let now = Instant::now();
        let mut inner = self.inner.write().await;

        let entry = inner.failures.entry(kind.to_string()).or_default();
        entry.push_back(now);
        while let Some(front) = entry.front() {
            if now.duration_since(*front) > self.window {
                entry.pop_front();
            } else {
                break;
            }
        }

        let count = entry.len();
        if count as u32 >= self.threshold && inner.opened_at.is_none() {
            inner.opened_at = Some(now);
            inner.open_reason = Some(format!("{count} `{kind}` failures within window"));
            error!(
                "Circuit breaker OPEN: {} `{}` failures within {:?}",
                count, kind, self.window
            );
            return true;
        }
        false
    }

    /// A success clears the failure history for that kind.
    pub async fn record_success(&self, kind: &str) {
        let mut inner = self.inner.write().await;
        inner.failures.remove(kind);
    }

    /// True when execution may proceed. An open breaker resets itself once
    /// the cooldown has elapsed.
    pub async fn can_proceed(&self) -> bool {
        {
            let inner = self.inner.read().await;
            match inner.opened_at {
                None => return true,
                Some(opened) if opened.elapsed() <= self.cooldown => return false,
                Some(_) => {}
            }
        }

        let mut inner = self.inner.write().await;
        if matches!(inner.opened_at, Some(opened) if opened.elapsed() > self.cooldown) {
            info!("Circuit breaker cooldown complete, resetting");
            inner.opened_at = None;
            inner.open_reason = None;
            inner.failures.clear();
        }
        inner.opened_at.is_none()
    }

    pub async fn is_open(&self) -> bool {
        self.inner.read().await.opened_at.is_some()
    }

    pub async fn open_reason(&self) -> Option<String> {
        self.inner.read().await.open_reason.clone()
    }

    /// Total failures currently inside the window, across kinds.
    pub async fn failure_count(&self) -> u32 {
        let inner = self.inner.read().await;
        inner.failures.values().map(|v| v.len() as u32).sum()
    }
}
