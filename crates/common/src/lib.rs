//! Splice Common Utilities
//!
//! Shared infrastructure for all Splice crates:
//! - Error kinds, the shared error type and result alias
//! - Native media time arithmetic (milliseconds to ticks and back)
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod time;

pub use config::*;
pub use error::*;
pub use time::*;
