//! Capability interfaces implemented by platform export engines.
//!
//! The coordinator never talks to an encoder directly. It asks an
//! [`ExportEngine`] to begin a job and then polls the returned
//! [`EngineSession`] until it settles. Metadata comes through a separate
//! [`MetadataProbe`] so sources can be read without an engine.

use std::path::{Path, PathBuf};

use splice_common::error::SpliceResult;
use splice_media_model::geometry::Size;
use splice_media_model::operation::OperationKind;
use splice_media_model::plan::CompositionPlan;
use splice_media_model::source::{ProbeReport, SourceDescriptor};

use crate::coordinator::CancelHandle;

/// Everything an engine needs to render one composition.
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub kind: OperationKind,
    /// Sources referenced by index from the timeline segments.
    pub sources: Vec<SourceDescriptor>,
    pub plan: CompositionPlan,
    /// File the engine writes. Owned by the coordinator.
    pub output_path: PathBuf,
}

/// A still frame to extract from a source.
#[derive(Debug, Clone)]
pub struct FrameRequest {
    pub source: PathBuf,
    pub position_ms: i64,
    /// Output size; `None` keeps the upright source size.
    pub size: Option<Size>,
    /// 0 (smallest) to 100 (best).
    pub quality: u8,
    pub output_path: PathBuf,
}

/// Progress of a running engine session.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineStatus {
    /// Still working. Progress is in [0.0, 1.0] when known.
    Running { progress: Option<f64> },
    Completed,
    Failed(String),
}

/// A running export owned by the coordinator.
pub trait EngineSession: Send {
    /// Non-blocking status check.
    fn poll(&mut self) -> EngineStatus;

    /// Stop the export. Safe to call more than once.
    fn cancel(&mut self);
}

/// Trait for export engines (ffmpeg, platform media frameworks, test doubles).
pub trait ExportEngine: Send + Sync {
    /// Engine name.
    fn name(&self) -> &str;

    /// Check if this engine can run on the system.
    fn is_available(&self) -> bool;

    /// Start rendering `job`. May block briefly while the encoder spins up.
    fn begin(&self, job: &ExportJob) -> SpliceResult<Box<dyn EngineSession>>;

    /// Extract one frame to `request.output_path`. Blocking.
    ///
    /// Implementations watch `cancel` while the frame is produced and
    /// return `SpliceError::Cancelled` once they have stopped.
    fn sample_frame(&self, request: &FrameRequest, cancel: &CancelHandle) -> SpliceResult<()>;
}

/// Trait for metadata sources.
pub trait MetadataProbe: Send + Sync {
    /// Read what can be learned about `path`. Errors mean the file could not
    /// be read as media at all.
    fn probe(&self, path: &Path) -> SpliceResult<ProbeReport>;
}
