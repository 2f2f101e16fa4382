//! Risk management control plane

pub mod score;
pub mod ledger;
pub mod gate;

pub use score::*;
pub use ledger::*;
pub use gate::*;
