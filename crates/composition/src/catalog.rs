//! Operation catalog: one pure planning function per edit operation.
//!
//! Every function maps already-resolved sources and typed parameters to a
//! [`CompositionPlan`]. None of them touch the filesystem; source facts come
//! from the [`SourceDescriptor`]s read beforehand.

use splice_common::error::{SpliceError, SpliceResult};
use splice_common::time::{NativeTime, TimeRange};
use splice_media_model::geometry::{
    centered_crop_rect, compose_affine, Affine, AspectRatio, QuarterTurn, Size,
};
use splice_media_model::operation::{EditParams, OperationRequest};
use splice_media_model::plan::{CompositionPlan, OutputFormat, TransformPlan};
use splice_media_model::source::SourceDescriptor;
use splice_media_model::timeline::{MediaKind, Timeline};

/// Plan the request with the catalog entry matching its parameters.
pub fn plan(request: &OperationRequest) -> SpliceResult<CompositionPlan> {
    match &request.params {
        EditParams::Trim { start_ms, end_ms } => {
            trim(single_source(request)?, *start_ms, *end_ms)
        }
        EditParams::Merge => merge(&request.sources),
        EditParams::ExtractAudio => extract_audio(single_source(request)?),
        EditParams::RemoveAudio => remove_audio(single_source(request)?),
        EditParams::AdjustSpeed { multiplier } => {
            adjust_speed(single_source(request)?, *multiplier)
        }
        EditParams::Crop { aspect } => crop(single_source(request)?, *aspect),
        EditParams::Rotate { turn } => rotate(single_source(request)?, *turn),
        EditParams::Compress { target_height } => {
            compress(single_source(request)?, *target_height)
        }
    }
}

fn single_source(request: &OperationRequest) -> SpliceResult<&SourceDescriptor> {
    match request.sources.as_slice() {
        [source] => Ok(source),
        sources => Err(SpliceError::invalid_parameter(format!(
            "{} expects exactly one input, got {}",
            request.kind(),
            sources.len()
        ))),
    }
}

fn require_video(source: &SourceDescriptor, operation: &str) -> SpliceResult<()> {
    if source.has_video {
        Ok(())
    } else {
        Err(SpliceError::invalid_asset(format!(
            "{operation} requires a video track but {} has none",
            source.path.display()
        )))
    }
}

fn format_for(timeline: &Timeline) -> OutputFormat {
    if timeline.has_track(MediaKind::Video) {
        OutputFormat::Mp4
    } else {
        OutputFormat::M4a
    }
}

/// Place `range` of source 0 on every track the source carries.
fn single_range_timeline(
    source: &SourceDescriptor,
    range: TimeRange,
    insert_duration: NativeTime,
) -> Timeline {
    let mut timeline = Timeline::new(source.duration.timescale);
    if source.has_video {
        timeline.append(MediaKind::Video, 0, range, insert_duration);
    }
    if source.has_audio {
        timeline.append(MediaKind::Audio, 0, range, insert_duration);
    }
    timeline
}

/// Transform plan that shows the source upright at its display size.
fn upright_plan(source: &SourceDescriptor, timeline: &Timeline) -> TransformPlan {
    if !timeline.has_track(MediaKind::Video) {
        return TransformPlan::audio_only();
    }
    TransformPlan {
        render_size: source.display_size(),
        frame_rate: source.frame_rate,
        transforms: vec![source.preferred_transform; timeline.video.len()],
    }
}

/// Keep `[start_ms, end_ms)` of the source.
pub fn trim(
    source: &SourceDescriptor,
    start_ms: i64,
    end_ms: i64,
) -> SpliceResult<CompositionPlan> {
    let duration_ms = source.duration.to_millis();
    if end_ms > duration_ms {
        return Err(SpliceError::invalid_time_range(format!(
            "end_ms {end_ms} is past the source duration of {duration_ms} ms"
        )));
    }

    let timescale = source.duration.timescale;
    let range = TimeRange::from_bounds(
        NativeTime::from_millis(start_ms, timescale),
        NativeTime::from_millis(end_ms, timescale),
    );
    let timeline = single_range_timeline(source, range, range.duration);
    let transform = upright_plan(source, &timeline);

    Ok(CompositionPlan {
        format: format_for(&timeline),
        timeline,
        transform,
    })
}

/// Concatenate every source, in order, at full length.
///
/// Video is rendered at the first video source's display size; other
/// sources are scaled uniformly to fit and centered. A source missing a
/// track kind the output carries contributes a gap of its duration so both
/// tracks stay aligned.
pub fn merge(sources: &[SourceDescriptor]) -> SpliceResult<CompositionPlan> {
    let first = sources
        .first()
        .ok_or_else(|| SpliceError::invalid_parameter("merge needs at least one input"))?;

    let any_video = sources.iter().any(|s| s.has_video);
    let any_audio = sources.iter().any(|s| s.has_audio);
    let render_size = sources
        .iter()
        .find(|s| s.has_video)
        .map(|s| s.display_size())
        .unwrap_or_default();
    let frame_rate = sources
        .iter()
        .filter(|s| s.has_video)
        .map(|s| s.frame_rate)
        .fold(0.0, f64::max);

    let mut timeline = Timeline::new(first.duration.timescale);
    let mut transforms = Vec::new();

    for (index, source) in sources.iter().enumerate() {
        let range = source.full_range();
        if any_video {
            if source.has_video {
                timeline.append_range(MediaKind::Video, index, range);
                transforms.push(fit_transform(source, render_size)?);
            } else {
                timeline.append_gap(MediaKind::Video, range.duration);
                transforms.push(Affine::IDENTITY);
            }
        }
        if any_audio {
            if source.has_audio {
                timeline.append_range(MediaKind::Audio, index, range);
            } else {
                timeline.append_gap(MediaKind::Audio, range.duration);
            }
        }
    }

    let transform = if any_video {
        TransformPlan {
            render_size,
            frame_rate,
            transforms,
        }
    } else {
        TransformPlan::audio_only()
    };

    Ok(CompositionPlan {
        format: format_for(&timeline),
        timeline,
        transform,
    })
}

/// Upright transform scaling a source to fit inside `canvas`, centered.
fn fit_transform(source: &SourceDescriptor, canvas: Size) -> SpliceResult<Affine> {
    let display = source.display_size();
    if display == canvas {
        return Ok(source.preferred_transform);
    }
    let scale = (canvas.width as f64 / display.width as f64)
        .min(canvas.height as f64 / display.height as f64);
    let tx = (canvas.width as f64 - display.width as f64 * scale) / 2.0;
    let ty = (canvas.height as f64 - display.height as f64 * scale) / 2.0;
    compose_affine(
        source.preferred_transform,
        None,
        Some((scale, scale)),
        Some((tx, ty)),
    )
}

/// Keep only the audio track.
pub fn extract_audio(source: &SourceDescriptor) -> SpliceResult<CompositionPlan> {
    if !source.has_audio {
        return Err(SpliceError::invalid_asset(format!(
            "{} has no audio track to extract",
            source.path.display()
        )));
    }
    let mut timeline = Timeline::new(source.duration.timescale);
    timeline.append_range(MediaKind::Audio, 0, source.full_range());

    Ok(CompositionPlan {
        timeline,
        transform: TransformPlan::audio_only(),
        format: OutputFormat::M4a,
    })
}

/// Keep only the video track.
pub fn remove_audio(source: &SourceDescriptor) -> SpliceResult<CompositionPlan> {
    require_video(source, "remove audio")?;
    let mut timeline = Timeline::new(source.duration.timescale);
    timeline.append_range(MediaKind::Video, 0, source.full_range());
    let transform = upright_plan(source, &timeline);

    Ok(CompositionPlan {
        timeline,
        transform,
        format: OutputFormat::Mp4,
    })
}

/// Play the whole source `multiplier` times faster, audio and video alike.
pub fn adjust_speed(source: &SourceDescriptor, multiplier: f64) -> SpliceResult<CompositionPlan> {
    if !(multiplier.is_finite() && multiplier > 0.0) {
        return Err(SpliceError::invalid_parameter(format!(
            "multiplier must be a positive number, got {multiplier}"
        )));
    }
    let range = source.full_range();
    let scaled = range.duration.div_rate(multiplier);
    if scaled.value <= 0 {
        return Err(SpliceError::invalid_parameter(format!(
            "multiplier {multiplier} leaves nothing of a {} source",
            range.duration
        )));
    }

    let timeline = single_range_timeline(source, range, scaled);
    let transform = upright_plan(source, &timeline);

    Ok(CompositionPlan {
        format: format_for(&timeline),
        timeline,
        transform,
    })
}

/// Crop the upright frame to the largest centered `aspect` rectangle.
pub fn crop(source: &SourceDescriptor, aspect: AspectRatio) -> SpliceResult<CompositionPlan> {
    require_video(source, "crop")?;
    let display = source.display_size();
    let rect = centered_crop_rect(display.width, display.height, aspect.value());
    if rect.size().is_empty() {
        return Err(SpliceError::invalid_parameter(format!(
            "cropping {display} to {aspect} leaves an empty frame"
        )));
    }

    let timeline = single_range_timeline(source, source.full_range(), source.duration);
    let transform = compose_affine(
        source.preferred_transform,
        None,
        None,
        Some((-(rect.x as f64), -(rect.y as f64))),
    )?;

    Ok(CompositionPlan {
        transform: TransformPlan {
            render_size: rect.size(),
            frame_rate: source.frame_rate,
            transforms: vec![transform; timeline.video.len()],
        },
        format: format_for(&timeline),
        timeline,
    })
}

/// Rotate the upright frame clockwise by a quarter-turn multiple.
pub fn rotate(source: &SourceDescriptor, turn: QuarterTurn) -> SpliceResult<CompositionPlan> {
    require_video(source, "rotate")?;
    let transform = compose_affine(
        source.preferred_transform,
        Some(turn.degrees() as i32),
        None,
        None,
    )?
    .anchored(source.natural_size);
    let render_size = transform.transformed_size(source.natural_size);

    let timeline = single_range_timeline(source, source.full_range(), source.duration);

    Ok(CompositionPlan {
        transform: TransformPlan {
            render_size,
            frame_rate: source.frame_rate,
            transforms: vec![transform; timeline.video.len()],
        },
        format: format_for(&timeline),
        timeline,
    })
}

/// Scale the upright frame uniformly to `target_height` rows.
pub fn compress(source: &SourceDescriptor, target_height: u32) -> SpliceResult<CompositionPlan> {
    require_video(source, "compress")?;
    if target_height == 0 {
        return Err(SpliceError::invalid_parameter(
            "target_height must be greater than 0",
        ));
    }
    let display = source.display_size();
    let width = (target_height as f64 * display.aspect()).round() as u32;
    let render_size = Size::new(width, target_height);
    if render_size.is_empty() {
        return Err(SpliceError::invalid_parameter(format!(
            "compressing {display} to height {target_height} leaves an empty frame"
        )));
    }

    let scale = target_height as f64 / display.height as f64;
    let transform = compose_affine(source.preferred_transform, None, Some((scale, scale)), None)?;
    let timeline = single_range_timeline(source, source.full_range(), source.duration);

    Ok(CompositionPlan {
        transform: TransformPlan {
            render_size,
            frame_rate: source.frame_rate,
            transforms: vec![transform; timeline.video.len()],
        },
        format: format_for(&timeline),
        timeline,
    })
}
