//! Splice composition: planning edits without touching media.
//!
//! - **Catalog:** one planning function per edit operation
//! - **Builder:** parameter validation plus the invariant checks an export
//!   engine relies on
//!
//! This crate is pure computation. Sources arrive already probed; plans
//! leave as data.

pub mod builder;
pub mod catalog;

pub use builder::{build, check_plan};
