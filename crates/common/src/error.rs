//! Error types shared across Splice crates.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Coarse classification of every failure an operation can report.
///
/// `Cancelled` is not strictly an error: it is the terminal outcome of a
/// caller-requested cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidParameter,
    InvalidAsset,
    InvalidTimeRange,
    ExportFailed,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidParameter => "invalid_parameter",
            Self::InvalidAsset => "invalid_asset",
            Self::InvalidTimeRange => "invalid_time_range",
            Self::ExportFailed => "export_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for Splice operations.
#[derive(Debug, thiserror::Error)]
pub enum SpliceError {
    #[error("File not found: {path}")]
    NotFound { path: PathBuf },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    #[error("Invalid asset: {message}")]
    InvalidAsset { message: String },

    #[error("Invalid time range: {message}")]
    InvalidTimeRange { message: String },

    #[error("Export failed: {message}")]
    ExportFailed { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using SpliceError.
pub type SpliceResult<T> = Result<T, SpliceError>;

impl SpliceError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: msg.into(),
        }
    }

    pub fn invalid_asset(msg: impl Into<String>) -> Self {
        Self::InvalidAsset {
            message: msg.into(),
        }
    }

    pub fn invalid_time_range(msg: impl Into<String>) -> Self {
        Self::InvalidTimeRange {
            message: msg.into(),
        }
    }

    pub fn export_failed(msg: impl Into<String>) -> Self {
        Self::ExportFailed {
            message: msg.into(),
        }
    }

    /// The error kind reported to callers.
    ///
    /// I/O, JSON and opaque errors can only arise once work is under way,
    /// so they are reported as export failures.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            Self::InvalidAsset { .. } => ErrorKind::InvalidAsset,
            Self::InvalidTimeRange { .. } => ErrorKind::InvalidTimeRange,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::ExportFailed { .. } | Self::Io(_) | Self::Json(_) | Self::Other(_) => {
                ErrorKind::ExportFailed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SpliceError::not_found("/nope.mp4").kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            SpliceError::invalid_parameter("bad").kind(),
            ErrorKind::InvalidParameter
        );
        assert_eq!(SpliceError::Cancelled.kind(), ErrorKind::Cancelled);

        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        assert_eq!(SpliceError::from(io).kind(), ErrorKind::ExportFailed);
    }

    #[test]
    fn test_display_includes_message() {
        let err = SpliceError::invalid_time_range("end_ms 5000 exceeds duration 4000");
        assert_eq!(
            err.to_string(),
            "Invalid time range: end_ms 5000 exceeds duration 4000"
        );
        assert_eq!(ErrorKind::InvalidTimeRange.to_string(), "invalid_time_range");
    }
}
