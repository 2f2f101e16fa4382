//! Per-opportunity execution leases
//!
//! At most one in-flight execution attempt may exist per opportunity. A
//! second concurrent attempt is rejected, never queued. The lease releases
//! itself on drop so every exit path frees the slot.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::errors::{BotError, BotResult};

#[derive(Clone, Default)]
pub struct LeaseRegistry {
    in_flight: Arc<Mutex<HashSet<Uuid>>>,
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, opportunity_id: Uuid) -> BotResult<ExecutionLease> {
        let mut in_flight = self.in_flight.lock().expect("lease registry poisoned");
        if !in_flight.insert(opportunity_id) {
            return Err(BotError::AttemptInFlight { opportunity_id });
        }
        Ok(ExecutionLease {
            opportunity_id,
            registry: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_leased(&self, opportunity_id: Uuid) -> bool {
        self.in_flight
            .lock()
            .expect("lease registry poisoned")
            .contains(&opportunity_id)
    }
}

pub struct ExecutionLease {
    opportunity_id: Uuid,
    registry: Arc<Mutex<HashSet<Uuid>>>,
}

impl Drop for ExecutionLease {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.registry.lock() {
            in_flight.remove(&self.opportunity_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_rejected_not_queued() {
        let registry = LeaseRegistry::new();
        let id = Uuid::new_v4();

        let lease = registry.acquire(id).expect("first acquire");
        assert!(matches!(
            registry.acquire(id),
            Err(BotError::AttemptInFlight { .. })
        ));

        drop(lease);
        assert!(registry.acquire(id).is_ok());
    }

    #[test]
    fn distinct_opportunities_do_not_contend() {
        let registry = LeaseRegistry::new();
        let _a = registry.acquire(Uuid::new_v4()).unwrap();
        let _b = registry.acquire(Uuid::new_v4()).unwrap();
    }

    #[test]
    fn lease_releases_on_drop_even_mid_scope() {
        let registry = LeaseRegistry::new();
        let id = Uuid::new_v4();
        {
            let _lease = registry.acquire(id).unwrap();
            assert!(registry.is_leased(id));
        }
        assert!(!registry.is_leased(id));
    }
}
