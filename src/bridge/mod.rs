//! Cross-chain bridge routing and recovery

pub mod selection;
pub mod router;
pub mod client;

pub use selection::*;
pub use router::*;
pub use client::*;
