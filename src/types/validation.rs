//! Opportunity validation result types

use serde::Serialize;

/// Structural checks run on an opportunity before any pricing work.
#[derive(Debug, Clone, Serialize, Default)]
pub struct ValidationResult {
    pub amounts_positive: bool,
    pub deadline_valid: bool,
    pub topology_consistent: bool,
    pub tokens_distinct: bool,
    pub all_passed: bool,
    pub warnings: Vec<String>,
}
