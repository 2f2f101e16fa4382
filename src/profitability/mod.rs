//! Profitability modeling under dynamic gas pricing

pub mod gas_model;
pub mod calculator;

pub use gas_model::*;
pub use calculator::*;
