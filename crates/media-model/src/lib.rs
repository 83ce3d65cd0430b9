//! Splice Media Model
//!
//! Defines the core data contracts for Splice operations:
//! - **Geometry:** frame sizes, crop rectangles, quarter turns and affine transforms
//! - **Timeline:** ordered video/audio track segments in native time
//! - **Sources:** probe reports, resolved source descriptors, metadata records
//! - **Operations:** operation kinds, typed parameters and named-parameter invocations
//! - **Plans:** transform plans and the composition handed to an export engine
//!
//! Time is carried as [`splice_common::time::NativeTime`] ticks; geometry is in
//! pixels with a top-left origin.

pub mod geometry;
pub mod operation;
pub mod plan;
pub mod source;
pub mod timeline;

pub use geometry::*;
pub use operation::*;
pub use plan::*;
pub use source::*;
pub use timeline::*;
