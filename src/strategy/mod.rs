//! Opportunity classification and flash-loan provider selection

pub mod selector;
pub mod providers;

pub use selector::*;
pub use providers::*;
