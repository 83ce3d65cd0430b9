//! Editor facade: the entry point host applications call.
//!
//! Synchronous work (parameter checks, source resolution, planning) happens
//! inside `submit*` so invalid requests fail before any engine call. Only
//! the export itself runs on a background task.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use splice_common::config::AppConfig;
use splice_common::error::{SpliceError, SpliceResult};
use splice_media_model::operation::{
    Call, EditParams, Invocation, OperationKind, OperationRequest, ThumbnailParams,
};
use splice_media_model::plan::OutputFormat;
use splice_media_model::source::VideoMetadata;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::coordinator::{CancelHandle, ExportCoordinator, OperationResult};
use crate::engine::{ExportEngine, MetadataProbe};
use crate::ffmpeg::FfmpegEngine;
use crate::metadata::{read_metadata, resolve_source, resolve_sources};
use crate::output::allocate_output_path;
use crate::probe::FfprobeProbe;
use crate::registry::{OperationId, OperationRegistry};
use crate::thumbnail::{prepare_frame_request, sample_frame};

/// A submitted operation.
pub struct OperationHandle {
    id: OperationId,
    kind: OperationKind,
    output_path: PathBuf,
    progress: watch::Receiver<f64>,
    task: JoinHandle<OperationResult>,
}

impl OperationHandle {
    pub fn id(&self) -> OperationId {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Path the result will have on success.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Latest-value progress in [0.0, 1.0].
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    pub async fn wait(self) -> OperationResult {
        match self.task.await {
            Ok(result) => result,
            Err(err) => OperationResult::failed(format!("operation task ended abnormally: {err}")),
        }
    }
}

/// What a completed invocation produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InvocationOutput {
    File { path: PathBuf },
    Metadata(VideoMetadata),
}

/// Runs edit operations against one engine and probe.
pub struct Editor {
    config: AppConfig,
    probe: Arc<dyn MetadataProbe>,
    coordinator: ExportCoordinator,
    registry: Arc<OperationRegistry>,
}

impl Editor {
    pub fn new(
        config: AppConfig,
        engine: Arc<dyn ExportEngine>,
        probe: Arc<dyn MetadataProbe>,
    ) -> Self {
        let coordinator = ExportCoordinator::from_config(engine, &config);
        Self {
            config,
            probe,
            coordinator,
            registry: Arc::new(OperationRegistry::new()),
        }
    }

    /// Editor backed by the ffmpeg and ffprobe command-line tools.
    pub fn with_ffmpeg(config: AppConfig) -> Self {
        let engine = Arc::new(FfmpegEngine::from_config(&config.export));
        let probe = Arc::new(FfprobeProbe::new(config.export.ffprobe_path.clone()));
        Self::new(config, engine, probe)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn ExportEngine> {
        self.coordinator.engine()
    }

    pub fn registry(&self) -> &Arc<OperationRegistry> {
        &self.registry
    }

    /// Validate and start an invocation. Metadata invocations are direct
    /// queries; use [`Editor::metadata`] or [`Editor::invoke`] for them.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit(&self, invocation: Invocation) -> SpliceResult<OperationHandle> {
        match invocation.into_call(self.config.thumbnail.default_quality)? {
            Call::Edit { inputs, params } => self.submit_edit(&inputs, params),
            Call::Thumbnail { input, params } => self.submit_thumbnail(&input, params),
            Call::Metadata { .. } => Err(SpliceError::invalid_parameter(
                "metadata is a direct query and cannot be submitted",
            )),
        }
    }

    /// Start an edit on `inputs`.
    pub fn submit_edit(
        &self,
        inputs: &[PathBuf],
        params: EditParams,
    ) -> SpliceResult<OperationHandle> {
        params.validate()?;
        let sources = resolve_sources(self.probe.as_ref(), inputs, &self.config.export)?;
        let request = OperationRequest::new(params, sources);
        let plan = splice_composition::build(&request)?;

        let kind = request.kind();
        let export = self.coordinator.start(kind, request.sources, plan)?;
        let output_path = export.output_path().to_path_buf();
        let progress = export.progress();
        let cancel = export.cancel_handle();
        Ok(self.track(kind, output_path, progress, cancel, export.wait()))
    }

    /// Start extracting one still frame from `input`.
    pub fn submit_thumbnail(
        &self,
        input: &Path,
        params: ThumbnailParams,
    ) -> SpliceResult<OperationHandle> {
        let source = resolve_source(self.probe.as_ref(), input, &self.config.export)?;
        let output_path =
            allocate_output_path(&self.config.scratch_dir, "thumbnail", OutputFormat::Jpeg)?;
        let request = prepare_frame_request(&source, &params, output_path.clone())?;

        let cancel = CancelHandle::new();
        let (progress_tx, progress_rx) = watch::channel(0.0);
        let engine = Arc::clone(self.coordinator.engine());
        let job_cancel = cancel.clone();
        let work = async move {
            let result = sample_frame(engine, request, job_cancel).await;
            if matches!(result, OperationResult::Completed { .. }) {
                progress_tx.send_replace(1.0);
            }
            result
        };
        Ok(self.track(
            OperationKind::Thumbnail,
            output_path,
            progress_rx,
            cancel,
            work,
        ))
    }

    fn track<F>(
        &self,
        kind: OperationKind,
        output_path: PathBuf,
        progress: watch::Receiver<f64>,
        cancel: CancelHandle,
        work: F,
    ) -> OperationHandle
    where
        F: Future<Output = OperationResult> + Send + 'static,
    {
        let id = self.registry.register(cancel);
        let registry = Arc::clone(&self.registry);
        tracing::info!(
            %id,
            operation = %kind,
            output = %output_path.display(),
            "Operation submitted"
        );

        let task = tokio::spawn(async move {
            let result = work.await;
            registry.remove(id);
            result
        });

        OperationHandle {
            id,
            kind,
            output_path,
            progress,
            task,
        }
    }

    /// Cancel a live operation. Unknown or settled ids return `false`.
    pub fn cancel(&self, id: OperationId) -> bool {
        self.registry.cancel(id)
    }

    /// Read metadata for `path` without building a timeline.
    pub fn metadata(&self, path: &Path) -> SpliceResult<VideoMetadata> {
        read_metadata(self.probe.as_ref(), path)
    }

    /// Extract a thumbnail and wait for it.
    pub async fn thumbnail(&self, path: &Path, params: ThumbnailParams) -> SpliceResult<PathBuf> {
        self.submit_thumbnail(path, params)?
            .wait()
            .await
            .into_result()
    }

    /// Run any invocation to completion.
    pub async fn invoke(&self, invocation: Invocation) -> SpliceResult<InvocationOutput> {
        match invocation.into_call(self.config.thumbnail.default_quality)? {
            Call::Metadata { input } => self.metadata(&input).map(InvocationOutput::Metadata),
            Call::Edit { inputs, params } => {
                let handle = self.submit_edit(&inputs, params)?;
                let path = handle.wait().await.into_result()?;
                Ok(InvocationOutput::File { path })
            }
            Call::Thumbnail { input, params } => {
                let path = self.thumbnail(&input, params).await?;
                Ok(InvocationOutput::File { path })
            }
        }
    }
}
