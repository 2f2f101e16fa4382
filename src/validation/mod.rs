//! Structural opportunity validation

use chrono::{DateTime, Utc};
use rust_decimal_macros::dec;

use crate::types::{Opportunity, ValidationResult};

/// Cheap structural checks run before any pricing work. A failed result
/// rejects the opportunity with `ValidationError`; nothing downstream runs.
pub fn validate_opportunity(opportunity: &Opportunity, now: DateTime<Utc>) -> ValidationResult {
    let mut result = ValidationResult::default();
    let mut all_good = true;

    result.amounts_positive = opportunity.borrow_amount > dec!(0)
        && opportunity.expected_gross_output > dec!(0);
    if !result.amounts_positive {
        result.warnings.push(format!(
            "non-positive amounts: borrow {}, gross {}",
            opportunity.borrow_amount, opportunity.expected_gross_output
        ));
        all_good = false;
    }

    result.deadline_valid = !opportunity.is_expired(now);
    if !result.deadline_valid {
        result
            .warnings
            .push(format!("deadline {} already passed", opportunity.deadline));
        all_good = false;
    }

    // Every venue must sit on one of the opportunity's chains, and the
    // borrow token must be part of the swap path.
    result.topology_consistent = !opportunity.venues.is_empty()
        && opportunity
            .venues
            .iter()
            .all(|v| opportunity.chain_ids.contains(&v.chain_id))
        && opportunity.tokens.contains(&opportunity.borrow_token);
    if !result.topology_consistent {
        result
            .warnings
            .push("venues, chains and tokens are inconsistent".to_string());
        all_good = false;
    }

    result.tokens_distinct = {
        let mut seen = opportunity.tokens.clone();
        seen.sort();
        seen.dedup();
        seen.len() == opportunity.tokens.len() && opportunity.tokens.len() >= 2
    };
    if !result.tokens_distinct {
        result
            .warnings
            .push("swap path must hold at least two distinct tokens".to_string());
        all_good = false;
    }

    result.all_passed = all_good;
    result
}
