//! Chain gateways, price oracle and connection management

pub mod chain;
pub mod oracle;
pub mod retry;

#[cfg(test)]
pub mod mock;

pub use chain::*;
pub use oracle::*;
pub use retry::*;
