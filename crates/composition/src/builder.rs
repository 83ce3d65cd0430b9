//! Composition builder: turns a validated request into a checked plan.

use splice_common::error::{SpliceError, SpliceResult};
use splice_media_model::operation::OperationRequest;
use splice_media_model::plan::CompositionPlan;
use splice_media_model::timeline::{MediaKind, SegmentSource, Timeline};
use splice_media_model::source::SourceDescriptor;

use crate::catalog;

/// Build the composition plan for `request`.
///
/// Parameters are validated first, then the catalog entry plans the edit,
/// then the result is checked against the plan invariants an export engine
/// relies on. Nothing here reads from disk.
pub fn build(request: &OperationRequest) -> SpliceResult<CompositionPlan> {
    request.params.validate()?;
    let plan = catalog::plan(request)?;
    check_plan(&plan, &request.sources)?;

    tracing::debug!(
        operation = %request.kind(),
        video_segments = plan.timeline.video.len(),
        audio_segments = plan.timeline.audio.len(),
        duration = %plan.timeline.duration(),
        render_size = %plan.transform.render_size,
        "Composition planned"
    );
    Ok(plan)
}

/// Check the invariants every plan must hold before it is exported.
pub fn check_plan(plan: &CompositionPlan, sources: &[SourceDescriptor]) -> SpliceResult<()> {
    let timeline = &plan.timeline;
    timeline.validate()?;

    if !timeline.has_track(MediaKind::Video) && !timeline.has_track(MediaKind::Audio) {
        return Err(SpliceError::invalid_asset("the composition has no media"));
    }

    check_source_ranges(timeline, sources)?;

    if timeline.has_track(MediaKind::Video) && timeline.has_track(MediaKind::Audio) {
        let video = timeline.track_duration(MediaKind::Video);
        let audio = timeline.track_duration(MediaKind::Audio);
        if video != audio {
            return Err(SpliceError::invalid_parameter(format!(
                "video track ends at {video} but audio ends at {audio}"
            )));
        }
    }

    if timeline.has_track(MediaKind::Video) {
        let transform = &plan.transform;
        if transform.render_size.is_empty() {
            return Err(SpliceError::invalid_parameter(format!(
                "render size {} is empty",
                transform.render_size
            )));
        }
        if transform.transforms.len() != timeline.video.len() {
            return Err(SpliceError::invalid_parameter(format!(
                "{} transforms for {} video segments",
                transform.transforms.len(),
                timeline.video.len()
            )));
        }
        if !(transform.frame_rate.is_finite() && transform.frame_rate > 0.0) {
            return Err(SpliceError::invalid_parameter(format!(
                "frame rate {} is not positive",
                transform.frame_rate
            )));
        }
    }

    Ok(())
}

fn check_source_ranges(timeline: &Timeline, sources: &[SourceDescriptor]) -> SpliceResult<()> {
    for kind in [MediaKind::Video, MediaKind::Audio] {
        for segment in timeline.track(kind) {
            let SegmentSource::Media { source } = segment.source else {
                continue;
            };
            let descriptor = sources.get(source).ok_or_else(|| {
                SpliceError::invalid_parameter(format!("segment refers to missing source {source}"))
            })?;
            let carries = match kind {
                MediaKind::Video => descriptor.has_video,
                MediaKind::Audio => descriptor.has_audio,
            };
            if !carries {
                return Err(SpliceError::invalid_asset(format!(
                    "{} has no {kind:?} track",
                    descriptor.path.display()
                )));
            }
            if segment.source_range.end() > descriptor.duration {
                return Err(SpliceError::invalid_time_range(format!(
                    "segment reads to {} but {} ends at {}",
                    segment.source_range.end(),
                    descriptor.path.display(),
                    descriptor.duration
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use splice_common::error::ErrorKind;
    use splice_common::time::{NativeTime, TimeRange, DEFAULT_TIMESCALE};
    use splice_media_model::operation::EditParams;
    use splice_media_model::source::ProbeReport;

    fn source(duration_ms: i64) -> SourceDescriptor {
        SourceDescriptor::from_probe(
            PathBuf::from("/media/clip.mp4"),
            &ProbeReport {
                duration_ms: Some(duration_ms),
                width: Some(1280),
                height: Some(720),
                has_video: true,
                has_audio: true,
                ..Default::default()
            },
            DEFAULT_TIMESCALE,
            30.0,
        )
        .unwrap()
    }

    #[test]
    fn test_build_validates_params_first() {
        let request = OperationRequest::new(
            EditParams::Trim {
                start_ms: 500,
                end_ms: 500,
            },
            vec![source(1_000)],
        );
        assert_eq!(
            build(&request).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn test_build_rejects_wrong_input_count() {
        let request = OperationRequest::new(EditParams::RemoveAudio, vec![source(1), source(1)]);
        assert_eq!(
            build(&request).unwrap_err().kind(),
            ErrorKind::InvalidParameter
        );
    }

    #[test]
    fn test_check_plan_catches_overrun_source_range() {
        let sources = vec![source(1_000)];
        let mut plan = build(&OperationRequest::new(EditParams::RemoveAudio, sources.clone()))
            .unwrap();
        plan.timeline.video[0].source_range = TimeRange::new(
            NativeTime::from_millis(500, DEFAULT_TIMESCALE),
            NativeTime::from_millis(1_000, DEFAULT_TIMESCALE),
        );
        assert_eq!(
            check_plan(&plan, &sources).unwrap_err().kind(),
            ErrorKind::InvalidTimeRange
        );
    }

    #[test]
    fn test_check_plan_catches_transform_mismatch() {
        let sources = vec![source(1_000)];
        let mut plan = build(&OperationRequest::new(EditParams::RemoveAudio, sources.clone()))
            .unwrap();
        plan.transform.transforms.clear();
        assert!(check_plan(&plan, &sources).is_err());
    }
}
