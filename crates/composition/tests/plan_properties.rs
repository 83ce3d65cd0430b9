use std::path::PathBuf;

use proptest::prelude::*;
use splice_common::error::ErrorKind;
use splice_common::time::DEFAULT_TIMESCALE;
use splice_composition::build;
use splice_media_model::geometry::{QuarterTurn, Size};
use splice_media_model::operation::{EditParams, OperationRequest};
use splice_media_model::source::{ProbeReport, SourceDescriptor};
use splice_media_model::timeline::MediaKind;

fn clip(
    name: &str,
    width: u32,
    height: u32,
    duration_ms: i64,
    has_audio: bool,
) -> SourceDescriptor {
    SourceDescriptor::from_probe(
        PathBuf::from(format!("/fixtures/{name}.mp4")),
        &ProbeReport {
            duration_ms: Some(duration_ms),
            width: Some(width),
            height: Some(height),
            frame_rate: Some(30.0),
            has_video: true,
            has_audio,
            ..Default::default()
        },
        DEFAULT_TIMESCALE,
        30.0,
    )
    .expect("fixture source should resolve")
}

#[test]
fn crop_landscape_to_square_keeps_center() {
    let request = OperationRequest::new(
        EditParams::Crop {
            aspect: "1:1".parse().unwrap(),
        },
        vec![clip("landscape", 1920, 1080, 5_000, true)],
    );
    let plan = build(&request).unwrap();
    assert_eq!(plan.transform.render_size, Size::new(1080, 1080));
    assert_eq!(plan.timeline.duration().to_millis(), 5_000);
}

#[test]
fn compress_1080p_to_720p() {
    let request = OperationRequest::new(
        EditParams::Compress { target_height: 720 },
        vec![clip("landscape", 1920, 1080, 5_000, true)],
    );
    let plan = build(&request).unwrap();
    assert_eq!(plan.transform.render_size, Size::new(1280, 720));
}

#[test]
fn rotate_portrait_render_size() {
    let request = OperationRequest::new(
        EditParams::Rotate {
            turn: QuarterTurn::Cw270,
        },
        vec![clip("landscape", 1920, 1080, 5_000, false)],
    );
    let plan = build(&request).unwrap();
    assert_eq!(plan.transform.render_size, Size::new(1080, 1920));
    assert!(plan.timeline.audio.is_empty());
}

#[test]
fn merge_of_one_is_full_copy() {
    let source = clip("only", 640, 480, 2_500, true);
    let plan = build(&OperationRequest::new(EditParams::Merge, vec![source.clone()])).unwrap();
    assert_eq!(plan.timeline.video.len(), 1);
    assert_eq!(plan.timeline.video[0].source_range, source.full_range());
    assert_eq!(plan.transform.render_size, Size::new(640, 480));
}

#[test]
fn merge_without_inputs_is_rejected() {
    let err = build(&OperationRequest::new(EditParams::Merge, Vec::new())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidParameter);
}

#[test]
fn extract_audio_from_silent_clip_is_invalid_asset() {
    let err = build(&OperationRequest::new(
        EditParams::ExtractAudio,
        vec![clip("silent", 640, 480, 1_000, false)],
    ))
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidAsset);
}

proptest! {
    #[test]
    fn prop_trim_duration_is_end_minus_start(
        duration_ms in 1i64..600_000,
        a in 0.0f64..1.0,
        b in 0.0f64..1.0,
    ) {
        let x = (a * duration_ms as f64) as i64;
        let y = (b * duration_ms as f64) as i64;
        let (start_ms, end_ms) = (x.min(y), x.max(y).max(x.min(y) + 1).min(duration_ms));
        prop_assume!(start_ms < end_ms);

        let request = OperationRequest::new(
            EditParams::Trim { start_ms, end_ms },
            vec![clip("trim", 1280, 720, duration_ms, true)],
        );
        let plan = build(&request).unwrap();
        prop_assert_eq!(plan.timeline.duration().to_millis(), end_ms - start_ms);
        prop_assert_eq!(plan.timeline.video.len(), 1);
        prop_assert_eq!(plan.timeline.audio.len(), 1);
    }

    #[test]
    fn prop_trim_past_duration_is_time_range_error(
        duration_ms in 1i64..600_000,
        overshoot in 1i64..10_000,
    ) {
        let request = OperationRequest::new(
            EditParams::Trim { start_ms: 0, end_ms: duration_ms + overshoot },
            vec![clip("trim", 1280, 720, duration_ms, true)],
        );
        prop_assert_eq!(build(&request).unwrap_err().kind(), ErrorKind::InvalidTimeRange);
    }

    #[test]
    fn prop_merge_duration_is_sum(durations in prop::collection::vec(1i64..120_000, 1..6)) {
        let sources = durations
            .iter()
            .enumerate()
            .map(|(i, ms)| clip(&format!("part{i}"), 1280, 720, *ms, i % 2 == 0))
            .collect::<Vec<_>>();
        let plan = build(&OperationRequest::new(EditParams::Merge, sources)).unwrap();

        let total: i64 = durations.iter().sum();
        prop_assert_eq!(plan.timeline.track_duration(MediaKind::Video).to_millis(), total);
        prop_assert_eq!(plan.timeline.track_duration(MediaKind::Audio).to_millis(), total);
        prop_assert_eq!(plan.timeline.video.len(), durations.len());
    }

    #[test]
    fn prop_speed_divides_duration(duration_ms in 1_000i64..600_000, multiplier in 0.25f64..4.0) {
        let request = OperationRequest::new(
            EditParams::AdjustSpeed { multiplier },
            vec![clip("speed", 1280, 720, duration_ms, true)],
        );
        let plan = build(&request).unwrap();
        let expected = duration_ms as f64 / multiplier;
        let actual = plan.timeline.duration().to_millis() as f64;
        prop_assert!((actual - expected).abs() <= 1.0, "expected {expected}, got {actual}");
        prop_assert_eq!(
            plan.timeline.video[0].insert_range.duration,
            plan.timeline.audio[0].insert_range.duration
        );
    }
}
