//! Flash-loan execution engine

pub mod lease;
pub mod builder;
pub mod engine;

pub use lease::*;
pub use builder::*;
pub use engine::*;
