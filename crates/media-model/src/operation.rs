//! Operation kinds, typed parameters and the named-parameter invocation
//! format callers use to request them.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use splice_common::error::{SpliceError, SpliceResult};

use crate::geometry::{AspectRatio, QuarterTurn};
use crate::source::SourceDescriptor;

/// The supported edit operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Trim,
    Merge,
    ExtractAudio,
    RemoveAudio,
    AdjustSpeed,
    Crop,
    Rotate,
    Compress,
    Thumbnail,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trim => "trim",
            Self::Merge => "merge",
            Self::ExtractAudio => "extract_audio",
            Self::RemoveAudio => "remove_audio",
            Self::AdjustSpeed => "adjust_speed",
            Self::Crop => "crop",
            Self::Rotate => "rotate",
            Self::Compress => "compress",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of the timeline-producing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EditParams {
    Trim { start_ms: i64, end_ms: i64 },
    Merge,
    ExtractAudio,
    RemoveAudio,
    AdjustSpeed { multiplier: f64 },
    Crop { aspect: AspectRatio },
    Rotate { turn: QuarterTurn },
    Compress { target_height: u32 },
}

impl EditParams {
    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Trim { .. } => OperationKind::Trim,
            Self::Merge => OperationKind::Merge,
            Self::ExtractAudio => OperationKind::ExtractAudio,
            Self::RemoveAudio => OperationKind::RemoveAudio,
            Self::AdjustSpeed { .. } => OperationKind::AdjustSpeed,
            Self::Crop { .. } => OperationKind::Crop,
            Self::Rotate { .. } => OperationKind::Rotate,
            Self::Compress { .. } => OperationKind::Compress,
        }
    }

    /// Constraints that can be checked without opening any file.
    pub fn validate(&self) -> SpliceResult<()> {
        match self {
            Self::Trim { start_ms, end_ms } => {
                if *start_ms < 0 {
                    return Err(SpliceError::invalid_parameter(format!(
                        "start_ms must be >= 0, got {start_ms}"
                    )));
                }
                if start_ms >= end_ms {
                    return Err(SpliceError::invalid_parameter(format!(
                        "start_ms ({start_ms}) must be less than end_ms ({end_ms})"
                    )));
                }
            }
            Self::AdjustSpeed { multiplier } => {
                if !(multiplier.is_finite() && *multiplier > 0.0) {
                    return Err(SpliceError::invalid_parameter(format!(
                        "multiplier must be a positive number, got {multiplier}"
                    )));
                }
            }
            Self::Compress { target_height } => {
                if *target_height == 0 {
                    return Err(SpliceError::invalid_parameter(
                        "target_height must be greater than 0",
                    ));
                }
            }
            Self::Merge
            | Self::ExtractAudio
            | Self::RemoveAudio
            | Self::Crop { .. }
            | Self::Rotate { .. } => {}
        }
        Ok(())
    }
}

/// Parameters of a still-frame extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailParams {
    pub position_ms: i64,
    /// Encoder quality, 0 (smallest) to 100 (best).
    pub quality: u8,
    /// Output size; `None` keeps the source's display size.
    pub size: Option<(u32, u32)>,
}

impl ThumbnailParams {
    /// Validate raw caller input into typed parameters.
    pub fn new(
        position_ms: i64,
        quality: i64,
        width: Option<i64>,
        height: Option<i64>,
    ) -> SpliceResult<Self> {
        if position_ms < 0 {
            return Err(SpliceError::invalid_parameter(format!(
                "position_ms must be >= 0, got {position_ms}"
            )));
        }
        if !(0..=100).contains(&quality) {
            return Err(SpliceError::invalid_parameter(format!(
                "quality must be within [0, 100], got {quality}"
            )));
        }
        let size = match (width, height) {
            (None, None) => None,
            (Some(w), Some(h))
                if w > 0 && h > 0 && w <= u32::MAX as i64 && h <= u32::MAX as i64 =>
            {
                Some((w as u32, h as u32))
            }
            (Some(_), Some(_)) => {
                return Err(SpliceError::invalid_parameter(
                    "width and height must both be positive",
                ))
            }
            _ => {
                return Err(SpliceError::invalid_parameter(
                    "width and height must be given together or not at all",
                ))
            }
        };
        Ok(Self {
            position_ms,
            quality: quality as u8,
            size,
        })
    }
}

/// A validated edit bound to its resolved sources.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub params: EditParams,
    pub sources: Vec<SourceDescriptor>,
}

impl OperationRequest {
    pub fn new(params: EditParams, sources: Vec<SourceDescriptor>) -> Self {
        Self { params, sources }
    }

    pub fn kind(&self) -> OperationKind {
        self.params.kind()
    }
}

/// A named-parameter operation request, as a host application sends it.
///
/// ```json
/// { "operation": "trim", "path": "/videos/in.mp4", "start_ms": 1000, "end_ms": 4000 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum Invocation {
    Trim {
        path: PathBuf,
        start_ms: i64,
        end_ms: i64,
    },
    Merge {
        paths: Vec<PathBuf>,
    },
    ExtractAudio {
        path: PathBuf,
    },
    RemoveAudio {
        path: PathBuf,
    },
    AdjustSpeed {
        path: PathBuf,
        multiplier: f64,
    },
    Crop {
        path: PathBuf,
        aspect_ratio: String,
    },
    Rotate {
        path: PathBuf,
        degrees: i32,
    },
    Compress {
        path: PathBuf,
        target_height: i64,
    },
    Thumbnail {
        path: PathBuf,
        position_ms: i64,
        /// Omitted means "use the configured default".
        #[serde(default)]
        quality: Option<i64>,
        #[serde(default)]
        width: Option<i64>,
        #[serde(default)]
        height: Option<i64>,
    },
    Metadata {
        path: PathBuf,
    },
}

/// An invocation after parameter validation.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Edit {
        inputs: Vec<PathBuf>,
        params: EditParams,
    },
    Thumbnail {
        input: PathBuf,
        params: ThumbnailParams,
    },
    Metadata {
        input: PathBuf,
    },
}

impl Invocation {
    /// Parse an invocation from JSON.
    pub fn from_json(json: &str) -> SpliceResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            SpliceError::invalid_parameter(format!("malformed operation request: {e}"))
        })
    }

    /// Validate every parameter constraint that does not need the source
    /// files. `default_quality` applies when a thumbnail omits `quality`.
    pub fn into_call(self, default_quality: u8) -> SpliceResult<Call> {
        let edit = |inputs: Vec<PathBuf>, params: EditParams| -> SpliceResult<Call> {
            params.validate()?;
            Ok(Call::Edit { inputs, params })
        };

        match self {
            Self::Trim {
                path,
                start_ms,
                end_ms,
            } => edit(vec![path], EditParams::Trim { start_ms, end_ms }),
            Self::Merge { paths } => {
                if paths.is_empty() {
                    return Err(SpliceError::invalid_parameter(
                        "merge needs at least one input path",
                    ));
                }
                edit(paths, EditParams::Merge)
            }
            Self::ExtractAudio { path } => edit(vec![path], EditParams::ExtractAudio),
            Self::RemoveAudio { path } => edit(vec![path], EditParams::RemoveAudio),
            Self::AdjustSpeed { path, multiplier } => {
                edit(vec![path], EditParams::AdjustSpeed { multiplier })
            }
            Self::Crop { path, aspect_ratio } => {
                let aspect = aspect_ratio.parse::<AspectRatio>()?;
                edit(vec![path], EditParams::Crop { aspect })
            }
            Self::Rotate { path, degrees } => {
                let turn = QuarterTurn::from_degrees(degrees)?;
                edit(vec![path], EditParams::Rotate { turn })
            }
            Self::Compress {
                path,
                target_height,
            } => {
                if target_height <= 0 || target_height > u32::MAX as i64 {
                    return Err(SpliceError::invalid_parameter(format!(
                        "target_height must be greater than 0, got {target_height}"
                    )));
                }
                edit(
                    vec![path],
                    EditParams::Compress {
                        target_height: target_height as u32,
                    },
                )
            }
            Self::Thumbnail {
                path,
                position_ms,
                quality,
                width,
                height,
            } => {
                let quality = quality.unwrap_or(default_quality as i64);
                Ok(Call::Thumbnail {
                    input: path,
                    params: ThumbnailParams::new(position_ms, quality, width, height)?,
                })
            }
            Self::Metadata { path } => Ok(Call::Metadata { input: path }),
        }
    }
}
