//! Position tracking and mark-to-market

pub mod tracker;

pub use tracker::*;
