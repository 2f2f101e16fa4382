//! Data persistence and file operations

pub mod executions;
pub mod transfers;
pub mod alerts;

pub use executions::*;
pub use transfers::*;
pub use alerts::*;
