//! Splice export engine
//!
//! Runs composition plans through an export engine and reports results.
//!
//! # Pipeline Architecture
//!
//! ```text
//! Invocation ──► Editor ──► resolve_source (MetadataProbe)
//!                   │              │
//!                   │              ▼
//!                   │       splice_composition::build
//!                   │              │
//!                   ▼              ▼
//!           OperationRegistry  ExportCoordinator ──► ExportEngine
//!                                  │                    │
//!                                  │◄── poll / cancel ──┘
//!                                  ▼
//!                           OperationResult
//! ```

pub mod coordinator;
pub mod editor;
pub mod engine;
pub mod ffmpeg;
pub mod metadata;
pub mod output;
pub mod probe;
pub mod registry;
pub mod thumbnail;

pub use coordinator::{CancelHandle, ExportCoordinator, ExportHandle, JobState, OperationResult};
pub use editor::{Editor, InvocationOutput, OperationHandle};
pub use engine::{EngineSession, EngineStatus, ExportEngine, ExportJob, FrameRequest, MetadataProbe};
pub use ffmpeg::FfmpegEngine;
pub use probe::FfprobeProbe;
pub use registry::{OperationId, OperationRegistry};
