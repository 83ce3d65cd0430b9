//! Export coordinator: drives one engine session per job.
//!
//! A job moves `Idle → Running → {Completed, Failed, Cancelled}` exactly
//! once. The drive loop polls the engine at a fixed interval, forwards
//! progress to a latest-value channel and checks the cancel flag on every
//! tick. Whatever ends the job, only a completed job leaves a file behind.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use splice_common::config::AppConfig;
use splice_common::error::{ErrorKind, SpliceError, SpliceResult};
use splice_media_model::operation::OperationKind;
use splice_media_model::plan::CompositionPlan;
use splice_media_model::source::SourceDescriptor;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::{EngineSession, EngineStatus, ExportEngine, ExportJob};
use crate::output::{
    allocate_output_path, discard_partial, is_non_empty_file, remove_if_present,
};

/// Terminal outcome of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OperationResult {
    Completed { path: PathBuf },
    Failed { kind: ErrorKind, message: String },
    Cancelled,
}

impl OperationResult {
    pub fn from_error(err: &SpliceError) -> Self {
        match err {
            SpliceError::Cancelled => Self::Cancelled,
            other => Self::Failed {
                kind: other.kind(),
                message: other.to_string(),
            },
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            kind: ErrorKind::ExportFailed,
            message: message.into(),
        }
    }

    pub fn state(&self) -> JobState {
        match self {
            Self::Completed { .. } => JobState::Completed,
            Self::Failed { .. } => JobState::Failed,
            Self::Cancelled => JobState::Cancelled,
        }
    }

    /// Convert into a `Result`, rebuilding a typed error for failures.
    pub fn into_result(self) -> SpliceResult<PathBuf> {
        match self {
            Self::Completed { path } => Ok(path),
            Self::Cancelled => Err(SpliceError::Cancelled),
            Self::Failed { kind, message } => Err(match kind {
                ErrorKind::NotFound => SpliceError::not_found(message),
                ErrorKind::InvalidParameter => SpliceError::invalid_parameter(message),
                ErrorKind::InvalidAsset => SpliceError::invalid_asset(message),
                ErrorKind::InvalidTimeRange => SpliceError::invalid_time_range(message),
                ErrorKind::Cancelled => SpliceError::Cancelled,
                ErrorKind::ExportFailed => SpliceError::export_failed(message),
            }),
        }
    }
}

/// Lifecycle of an export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Shared cancel flag for one job.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Returns `true` the first time only.
    pub fn cancel(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Caller's view of a running export.
pub struct ExportHandle {
    output_path: PathBuf,
    cancel: CancelHandle,
    progress: watch::Receiver<f64>,
    state: watch::Receiver<JobState>,
    task: JoinHandle<OperationResult>,
}

impl ExportHandle {
    /// Where the output will be written on success.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request cancellation. A no-op once the job has settled.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Latest-value progress channel in [0.0, 1.0].
    pub fn progress(&self) -> watch::Receiver<f64> {
        self.progress.clone()
    }

    pub fn state(&self) -> JobState {
        *self.state.borrow()
    }

    /// Wait for the job to settle.
    pub async fn wait(self) -> OperationResult {
        match self.task.await {
            Ok(result) => result,
            Err(err) => {
                discard_partial(&self.output_path);
                OperationResult::failed(format!("export task ended abnormally: {err}"))
            }
        }
    }
}

/// Starts export jobs against one engine.
#[derive(Clone)]
pub struct ExportCoordinator {
    engine: Arc<dyn ExportEngine>,
    scratch_dir: PathBuf,
    poll_interval: Duration,
}

impl ExportCoordinator {
    pub fn new(
        engine: Arc<dyn ExportEngine>,
        scratch_dir: PathBuf,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            scratch_dir,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    pub fn from_config(engine: Arc<dyn ExportEngine>, config: &AppConfig) -> Self {
        Self::new(
            engine,
            config.scratch_dir.clone(),
            Duration::from_millis(config.export.poll_interval_ms),
        )
    }

    pub fn engine(&self) -> &Arc<dyn ExportEngine> {
        &self.engine
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Start exporting `plan` to a freshly named file in the scratch
    /// directory. Must be called from within a tokio runtime.
    pub fn start(
        &self,
        kind: OperationKind,
        sources: Vec<SourceDescriptor>,
        plan: CompositionPlan,
    ) -> SpliceResult<ExportHandle> {
        let output_path = allocate_output_path(&self.scratch_dir, kind.as_str(), plan.format)?;
        let job = ExportJob {
            kind,
            sources,
            plan,
            output_path: output_path.clone(),
        };
        Ok(self.start_job(job, CancelHandle::new()))
    }

    /// Start an already prepared job, observing `cancel`.
    pub fn start_job(&self, job: ExportJob, cancel: CancelHandle) -> ExportHandle {
        let (progress_tx, progress_rx) = watch::channel(0.0);
        let (state_tx, state_rx) = watch::channel(JobState::Idle);
        let output_path = job.output_path.clone();

        let drive = Drive {
            engine: Arc::clone(&self.engine),
            cancel: cancel.clone(),
            progress: progress_tx,
            poll_interval: self.poll_interval,
        };
        let task = tokio::spawn(async move {
            let _ = state_tx.send(JobState::Running);
            let result = drive.run(job).await;
            state_tx.send_replace(result.state());
            result
        });

        ExportHandle {
            output_path,
            cancel,
            progress: progress_rx,
            state: state_rx,
            task,
        }
    }
}

struct Drive {
    engine: Arc<dyn ExportEngine>,
    cancel: CancelHandle,
    progress: watch::Sender<f64>,
    poll_interval: Duration,
}

impl Drive {
    async fn run(self, job: ExportJob) -> OperationResult {
        let kind = job.kind;
        let output = job.output_path.clone();
        tracing::info!(
            operation = %kind,
            engine = self.engine.name(),
            output = %output.display(),
            duration = %job.plan.timeline.duration(),
            "Starting export"
        );

        let result = self.drive(job, &output).await;
        match &result {
            OperationResult::Completed { path } => {
                tracing::info!(operation = %kind, output = %path.display(), "Export completed")
            }
            OperationResult::Failed { kind: error_kind, message } => {
                discard_partial(&output);
                tracing::error!(operation = %kind, kind = %error_kind, %message, "Export failed")
            }
            OperationResult::Cancelled => {
                discard_partial(&output);
                tracing::info!(operation = %kind, "Export cancelled")
            }
        }
        result
    }

    async fn drive(&self, job: ExportJob, output: &Path) -> OperationResult {
        if self.cancel.is_cancelled() {
            return OperationResult::Cancelled;
        }
        if let Err(err) = remove_if_present(output) {
            return OperationResult::failed(format!(
                "could not clear existing file at {}: {err}",
                output.display()
            ));
        }

        let engine = Arc::clone(&self.engine);
        let mut session = match tokio::task::spawn_blocking(move || engine.begin(&job)).await {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => return OperationResult::from_error(&err),
            Err(err) => return OperationResult::failed(format!("engine failed to start: {err}")),
        };

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;

            if self.cancel.is_cancelled() {
                if let Err(err) = with_session(session, |session| session.cancel()).await {
                    tracing::warn!(error = %err, "Engine cancel ended abnormally");
                }
                return OperationResult::Cancelled;
            }

            let status = match with_session(session, |session| session.poll()).await {
                Ok((returned, status)) => {
                    session = returned;
                    status
                }
                Err(err) => return OperationResult::failed(format!("engine poll failed: {err}")),
            };

            match status {
                EngineStatus::Running { progress } => {
                    if let Some(progress) = progress {
                        self.publish(progress);
                    }
                }
                EngineStatus::Completed => {
                    // a cancel that landed before completion was observed wins
                    if self.cancel.is_cancelled() {
                        return OperationResult::Cancelled;
                    }
                    if !is_non_empty_file(output) {
                        return OperationResult::failed(format!(
                            "engine reported success but {} is missing or empty",
                            output.display()
                        ));
                    }
                    self.publish(1.0);
                    return OperationResult::Completed {
                        path: output.to_path_buf(),
                    };
                }
                EngineStatus::Failed(message) => return OperationResult::failed(message),
            }
        }
    }

    fn publish(&self, progress: f64) {
        let progress = if progress.is_finite() {
            progress.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.progress.send_if_modified(|current| {
            if (*current - progress).abs() > f64::EPSILON {
                *current = progress;
                true
            } else {
                false
            }
        });
    }
}

/// Run one session call on the blocking pool and hand the session back.
///
/// Settling a session may wait on the encoder process and its reader
/// threads, which must not stall the runtime.
async fn with_session<T, F>(
    mut session: Box<dyn EngineSession>,
    call: F,
) -> Result<(Box<dyn EngineSession>, T), tokio::task::JoinError>
where
    F: FnOnce(&mut dyn EngineSession) -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let out = call(session.as_mut());
        (session, out)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_handle_is_idempotent() {
        let handle = CancelHandle::new();
        let other = handle.clone();
        assert!(!other.is_cancelled());
        assert!(handle.cancel());
        assert!(!other.cancel());
        assert!(other.is_cancelled());
    }

    #[test]
    fn test_result_round_trips_error_kind() {
        let result = OperationResult::from_error(&SpliceError::invalid_asset("no audio"));
        assert_eq!(result.state(), JobState::Failed);
        let err = result.into_result().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAsset);

        assert_eq!(
            OperationResult::from_error(&SpliceError::Cancelled),
            OperationResult::Cancelled
        );
    }

    #[test]
    fn test_result_serializes_with_status_tag() {
        let json = serde_json::to_value(OperationResult::Completed {
            path: PathBuf::from("/tmp/out.mp4"),
        })
        .unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["path"], "/tmp/out.mp4");

        let json = serde_json::to_value(OperationResult::failed("boom")).unwrap();
        assert_eq!(json["kind"], "export_failed");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Idle.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }
}
