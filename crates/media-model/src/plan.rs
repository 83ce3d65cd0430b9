//! Transform plans and the complete composition handed to an export engine.

use serde::{Deserialize, Serialize};

use crate::geometry::{Affine, Size};
use crate::timeline::Timeline;

/// Kind of file an operation produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// MP4 container with video (and audio when present).
    Mp4,
    /// MPEG-4 audio-only container.
    M4a,
    /// Still image.
    Jpeg,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::M4a => "m4a",
            Self::Jpeg => "jpg",
        }
    }
}

/// How video frames are placed on the output canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformPlan {
    /// Output canvas size. Positive in both dimensions for video output.
    pub render_size: Size,
    /// Output frame rate.
    pub frame_rate: f64,
    /// One transform per video segment, in segment order. Each maps the
    /// source's coded frame onto the canvas.
    pub transforms: Vec<Affine>,
}

impl TransformPlan {
    /// Plan for outputs without video.
    pub fn audio_only() -> Self {
        Self {
            render_size: Size::default(),
            frame_rate: 0.0,
            transforms: Vec::new(),
        }
    }
}

/// The resolved output of the composition builder for one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionPlan {
    pub timeline: Timeline,
    pub transform: TransformPlan,
    pub format: OutputFormat,
}
