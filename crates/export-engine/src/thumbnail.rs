//! Still-frame extraction.

use std::path::PathBuf;
use std::sync::Arc;

use splice_common::error::{SpliceError, SpliceResult};
use splice_media_model::geometry::Size;
use splice_media_model::operation::ThumbnailParams;
use splice_media_model::source::SourceDescriptor;

use crate::coordinator::{CancelHandle, OperationResult};
use crate::engine::{ExportEngine, FrameRequest};
use crate::output::{discard_partial, is_non_empty_file};

/// Check `params` against the source and build the engine request.
///
/// A position equal to the duration selects the last frame; anything past
/// it is `InvalidTimeRange`.
pub fn prepare_frame_request(
    source: &SourceDescriptor,
    params: &ThumbnailParams,
    output_path: PathBuf,
) -> SpliceResult<FrameRequest> {
    if !source.has_video {
        return Err(SpliceError::invalid_asset(format!(
            "{} has no video track to sample",
            source.path.display()
        )));
    }
    let duration_ms = source.duration.to_millis();
    if params.position_ms > duration_ms {
        return Err(SpliceError::invalid_time_range(format!(
            "position_ms {} is past the source duration of {duration_ms} ms",
            params.position_ms
        )));
    }

    let frame_ms = (1000.0 / source.frame_rate).ceil() as i64;
    let last_frame_ms = (duration_ms - frame_ms).max(0);

    Ok(FrameRequest {
        source: source.path.clone(),
        position_ms: params.position_ms.min(last_frame_ms),
        size: params.size.map(|(w, h)| Size::new(w, h)),
        quality: params.quality,
        output_path,
    })
}

/// Run a prepared frame request on a blocking thread.
///
/// Cancelling stops the engine mid-frame. The output is kept only when the
/// engine succeeded, the job was not cancelled and the file is non-empty.
pub async fn sample_frame(
    engine: Arc<dyn ExportEngine>,
    request: FrameRequest,
    cancel: CancelHandle,
) -> OperationResult {
    if cancel.is_cancelled() {
        return OperationResult::Cancelled;
    }

    let output = request.output_path.clone();
    tracing::info!(
        source = %request.source.display(),
        position_ms = request.position_ms,
        quality = request.quality,
        output = %output.display(),
        "Extracting thumbnail"
    );

    let flag = cancel.clone();
    let sampled = tokio::task::spawn_blocking(move || engine.sample_frame(&request, &flag)).await;
    let result = match sampled {
        Ok(Ok(())) if cancel.is_cancelled() => OperationResult::Cancelled,
        Ok(Ok(())) if is_non_empty_file(&output) => OperationResult::Completed {
            path: output.clone(),
        },
        Ok(Ok(())) => OperationResult::failed(format!(
            "frame sampling produced no image at {}",
            output.display()
        )),
        Ok(Err(err)) => OperationResult::from_error(&err),
        Err(err) => OperationResult::failed(format!("frame sampling ended abnormally: {err}")),
    };

    match &result {
        OperationResult::Completed { path } => {
            tracing::info!(output = %path.display(), "Thumbnail written")
        }
        OperationResult::Failed { message, .. } => {
            discard_partial(&output);
            tracing::error!(%message, "Thumbnail extraction failed")
        }
        OperationResult::Cancelled => {
            discard_partial(&output);
            tracing::info!("Thumbnail extraction cancelled")
        }
    }
    result
}
