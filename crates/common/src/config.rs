//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Directory where output files are written.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Export engine settings.
    #[serde(default)]
    pub export: ExportDefaults,

    /// Thumbnail settings.
    #[serde(default)]
    pub thumbnail: ThumbnailDefaults,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Export engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDefaults {
    /// How often a running export is polled for progress and cancellation.
    pub poll_interval_ms: u64,

    /// Native time ticks per second used when building timelines.
    pub timescale: u32,

    /// Frame rate used when a source does not report one.
    pub default_frame_rate: f64,

    /// Video encoder.
    pub video_codec: String,

    /// Audio encoder.
    pub audio_codec: String,

    /// Constant rate factor for regular exports.
    pub crf: u32,

    /// Constant rate factor for the compress operation.
    pub compress_crf: u32,

    /// Audio bitrate in kbps.
    pub audio_bitrate_kbps: u32,

    /// ffmpeg binary.
    pub ffmpeg_path: PathBuf,

    /// ffprobe binary.
    pub ffprobe_path: PathBuf,
}

/// Thumbnail parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailDefaults {
    /// JPEG quality used when the caller does not specify one.
    pub default_quality: u8,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "splice_export=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scratch_dir: default_scratch_dir(),
            export: ExportDefaults::default(),
            thumbnail: ThumbnailDefaults::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ExportDefaults {
    fn default() -> Self {
        Self {
            poll_interval_ms: 50,
            timescale: crate::time::DEFAULT_TIMESCALE,
            default_frame_rate: 30.0,
            video_codec: "libx264".to_string(),
            audio_codec: "aac".to_string(),
            crf: 23,
            compress_crf: 28,
            audio_bitrate_kbps: 128,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for ThumbnailDefaults {
    fn default() -> Self {
        Self {
            default_quality: 80,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("splice").join("config.json")
}

/// Default scratch directory for produced files.
fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("splice")
}
