//! Source media records: probe results, resolved sources and the metadata
//! payload returned to callers.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use splice_common::error::{SpliceError, SpliceResult};
use splice_common::time::{NativeTime, TimeRange};

use crate::geometry::{compose_affine, Affine, Size};

/// Everything a metadata probe could learn about a file.
///
/// Fields the probe could not determine are `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProbeReport {
    pub duration_ms: Option<i64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Clockwise display rotation in degrees (0, 90, 180 or 270).
    pub rotation: u32,
    pub frame_rate: Option<f64>,
    pub has_video: bool,
    pub has_audio: bool,
    pub title: Option<String>,
    pub author: Option<String>,
    pub creation_time: Option<DateTime<Utc>>,
}

/// Flat metadata record returned by a metadata query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub duration_ms: i64,
    /// Coded width, before rotation.
    pub width: u32,
    /// Coded height, before rotation.
    pub height: u32,
    pub title: Option<String>,
    pub author: Option<String>,
    pub rotation: u32,
    pub filesize: u64,
    pub creation_time: Option<DateTime<Utc>>,
}

impl VideoMetadata {
    /// Build from a probe report, zeroing whatever the probe did not find.
    pub fn from_probe(report: ProbeReport, filesize: u64) -> Self {
        Self {
            duration_ms: report.duration_ms.unwrap_or(0).max(0),
            width: report.width.unwrap_or(0),
            height: report.height.unwrap_or(0),
            title: report.title.filter(|s| !s.trim().is_empty()),
            author: report.author.filter(|s| !s.trim().is_empty()),
            rotation: report.rotation,
            filesize,
            creation_time: report.creation_time,
        }
    }
}

/// A validated input file with the facts composition needs.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDescriptor {
    /// Absolute path.
    pub path: PathBuf,
    pub duration: NativeTime,
    /// Coded frame size (zero for audio-only sources).
    pub natural_size: Size,
    /// Transform that presents the coded frame upright.
    pub preferred_transform: Affine,
    pub frame_rate: f64,
    pub has_video: bool,
    pub has_audio: bool,
}

impl SourceDescriptor {
    /// Resolve a probe report into a descriptor.
    ///
    /// Unlike a standalone metadata query this refuses to guess: a missing
    /// duration or a video track without dimensions is an invalid asset.
    pub fn from_probe(
        path: PathBuf,
        report: &ProbeReport,
        timescale: u32,
        default_frame_rate: f64,
    ) -> SpliceResult<Self> {
        let duration = match report.duration_ms {
            Some(ms) if ms > 0 => NativeTime::checked_from_millis(ms, timescale)
                .filter(|duration| duration.value > 0)
                .ok_or_else(|| {
                    SpliceError::invalid_asset(format!(
                        "duration of {ms} ms in {} is out of range",
                        path.display()
                    ))
                })?,
            _ => {
                return Err(SpliceError::invalid_asset(format!(
                    "could not determine the duration of {}",
                    path.display()
                )))
            }
        };
        if !report.has_video && !report.has_audio {
            return Err(SpliceError::invalid_asset(format!(
                "{} contains no audio or video track",
                path.display()
            )));
        }

        let natural_size = if report.has_video {
            match (report.width, report.height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => Size::new(w, h),
                _ => {
                    return Err(SpliceError::invalid_asset(format!(
                        "could not determine the frame size of {}",
                        path.display()
                    )))
                }
            }
        } else {
            Size::default()
        };

        let preferred_transform = if report.has_video {
            compose_affine(
                Affine::IDENTITY,
                Some(report.rotation as i32),
                None,
                None,
            )
            .map_err(|_| {
                SpliceError::invalid_asset(format!(
                    "unsupported display rotation {} in {}",
                    report.rotation,
                    path.display()
                ))
            })?
            .anchored(natural_size)
        } else {
            Affine::IDENTITY
        };

        let frame_rate = report
            .frame_rate
            .filter(|fps| fps.is_finite() && *fps > 0.0)
            .unwrap_or(default_frame_rate);

        Ok(Self {
            path,
            duration,
            natural_size,
            preferred_transform,
            frame_rate,
            has_video: report.has_video,
            has_audio: report.has_audio,
        })
    }

    /// Upright frame size, after the preferred transform.
    pub fn display_size(&self) -> Size {
        self.preferred_transform.transformed_size(self.natural_size)
    }

    /// The whole source, from zero to its duration.
    pub fn full_range(&self) -> TimeRange {
        TimeRange::new(NativeTime::zero(self.duration.timescale), self.duration)
    }
}
