//! `ffprobe`-backed metadata probe.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use splice_common::error::{SpliceError, SpliceResult};
use splice_media_model::source::ProbeReport;

use crate::engine::MetadataProbe;

/// Reads container and stream metadata by running `ffprobe`.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
}

impl FfprobeProbe {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Check that the ffprobe binary runs.
    pub fn is_available(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for FfprobeProbe {
    fn default() -> Self {
        Self::new("ffprobe")
    }
}

impl MetadataProbe for FfprobeProbe {
    fn probe(&self, path: &Path) -> SpliceResult<ProbeReport> {
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| {
                SpliceError::export_failed(format!(
                    "Failed to start {}: {e}",
                    self.binary.display()
                ))
            })?;

        if !output.status.success() {
            return Err(SpliceError::invalid_asset(format!(
                "ffprobe could not read {} (status {}): {}",
                path.display(),
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&raw)
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<SideData>,
    #[serde(default)]
    disposition: HashMap<String, i64>,
}

#[derive(Debug, Deserialize)]
struct SideData {
    rotation: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
}

/// Parse `ffprobe -print_format json -show_format -show_streams` output.
pub fn parse_probe_output(json: &str) -> SpliceResult<ProbeReport> {
    let parsed: ProbeOutput = serde_json::from_str(json)
        .map_err(|e| SpliceError::invalid_asset(format!("unreadable ffprobe output: {e}")))?;

    // cover art is reported as a video stream; skip it
    let video = parsed.streams.iter().find(|s| {
        s.codec_type.as_deref() == Some("video")
            && s.disposition.get("attached_pic").copied().unwrap_or(0) == 0
    });
    let has_audio = parsed
        .streams
        .iter()
        .any(|s| s.codec_type.as_deref() == Some("audio"));

    let format_tags = parsed.format.as_ref().map(|f| &f.tags);
    let duration_ms = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(parse_seconds_ms)
        .or_else(|| {
            parsed
                .streams
                .iter()
                .filter_map(|s| s.duration.as_deref().and_then(parse_seconds_ms))
                .max()
        });

    Ok(ProbeReport {
        duration_ms,
        width: video.and_then(|s| s.width),
        height: video.and_then(|s| s.height),
        rotation: video.map(stream_rotation).unwrap_or(0),
        frame_rate: video.and_then(|s| {
            s.avg_frame_rate
                .as_deref()
                .and_then(parse_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_rate))
        }),
        has_video: video.is_some(),
        has_audio,
        title: format_tags.and_then(|tags| tag(tags, &["title"])),
        author: format_tags.and_then(|tags| tag(tags, &["artist", "author", "album_artist"])),
        creation_time: format_tags
            .and_then(|tags| tag(tags, &["creation_time"]))
            .and_then(|raw| parse_creation_time(&raw)),
    })
}

/// Clockwise display rotation, snapped to a quarter turn.
fn stream_rotation(stream: &ProbeStream) -> u32 {
    let from_tag = stream
        .tags
        .get("rotate")
        .and_then(|value| value.trim().parse::<f64>().ok());
    // display matrix rotation is counter-clockwise
    let from_side_data = stream
        .side_data_list
        .iter()
        .find_map(|side| side.rotation)
        .map(|degrees| -degrees);

    let degrees = from_tag.or(from_side_data).unwrap_or(0.0);
    let quarter_turns = (degrees / 90.0).round() as i64;
    (quarter_turns * 90).rem_euclid(360) as u32
}

fn tag(tags: &HashMap<String, String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        tags.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.trim().to_string())
            .filter(|value| !value.is_empty())
    })
}

fn parse_seconds_ms(raw: &str) -> Option<i64> {
    let secs = raw.trim().parse::<f64>().ok()?;
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    let ms = (secs * 1000.0).round();
    (ms < i64::MAX as f64).then_some(ms as i64)
}

fn parse_rate(raw: &str) -> Option<f64> {
    let (num, den) = raw.split_once('/')?;
    let num = num.trim().parse::<f64>().ok()?;
    let den = den.trim().parse::<f64>().ok()?;
    let rate = num / den;
    (rate.is_finite() && rate > 0.0).then_some(rate)
}

fn parse_creation_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}
