//! Configuration management for the bot

pub mod settings;

pub use settings::*;
