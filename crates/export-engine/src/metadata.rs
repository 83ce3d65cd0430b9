//! Metadata reader: standalone queries and source resolution.

use std::path::{Path, PathBuf};

use splice_common::config::ExportDefaults;
use splice_common::error::{SpliceError, SpliceResult};
use splice_media_model::source::{ProbeReport, SourceDescriptor, VideoMetadata};

use crate::engine::MetadataProbe;

/// Read metadata for a standalone query.
///
/// A missing path is `NotFound`. A file the probe cannot read still yields
/// a record, with numeric fields zeroed and optional fields absent.
pub fn read_metadata(probe: &dyn MetadataProbe, path: &Path) -> SpliceResult<VideoMetadata> {
    let file = std::fs::metadata(path).map_err(|_| SpliceError::not_found(path))?;
    if !file.is_file() {
        return Err(SpliceError::not_found(path));
    }

    let report = match probe.probe(path) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(
                path = %path.display(),
                error = %err,
                "Probe failed, returning default metadata"
            );
            ProbeReport::default()
        }
    };
    Ok(VideoMetadata::from_probe(report, file.len()))
}

/// Resolve an input path into a [`SourceDescriptor`] for an operation.
///
/// Unlike [`read_metadata`] nothing is defaulted: an unreadable file or one
/// without a usable duration is an invalid asset.
pub fn resolve_source(
    probe: &dyn MetadataProbe,
    path: &Path,
    defaults: &ExportDefaults,
) -> SpliceResult<SourceDescriptor> {
    let absolute = canonical_input(path)?;
    let report = probe.probe(&absolute).map_err(|err| {
        SpliceError::invalid_asset(format!("could not read {}: {err}", absolute.display()))
    })?;
    let source = SourceDescriptor::from_probe(
        absolute,
        &report,
        defaults.timescale,
        defaults.default_frame_rate,
    )?;

    tracing::debug!(
        path = %source.path.display(),
        duration = %source.duration,
        size = %source.natural_size,
        has_video = source.has_video,
        has_audio = source.has_audio,
        "Resolved source"
    );
    Ok(source)
}

/// Resolve every input, failing on the first bad one.
pub fn resolve_sources(
    probe: &dyn MetadataProbe,
    paths: &[PathBuf],
    defaults: &ExportDefaults,
) -> SpliceResult<Vec<SourceDescriptor>> {
    paths
        .iter()
        .map(|path| resolve_source(probe, path, defaults))
        .collect()
}

fn canonical_input(path: &Path) -> SpliceResult<PathBuf> {
    match std::fs::canonicalize(path) {
        Ok(absolute) if absolute.is_file() => Ok(absolute),
        _ => Err(SpliceError::not_found(path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use splice_common::error::ErrorKind;

    struct FixedProbe(Option<ProbeReport>);

    impl MetadataProbe for FixedProbe {
        fn probe(&self, _path: &Path) -> SpliceResult<ProbeReport> {
            self.0
                .clone()
                .ok_or_else(|| SpliceError::export_failed("unreadable"))
        }
    }

    fn video_report() -> ProbeReport {
        ProbeReport {
            duration_ms: Some(2_000),
            width: Some(640),
            height: Some(480),
            rotation: 90,
            has_video: true,
            has_audio: false,
            title: Some("Holiday".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_path_is_not_found() {
        let probe = FixedProbe(Some(video_report()));
        let err = read_metadata(&probe, Path::new("/definitely/not/here.mp4")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = resolve_source(
            &probe,
            Path::new("/definitely/not/here.mp4"),
            &ExportDefaults::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_standalone_read_defaults_on_probe_failure() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a video").unwrap();

        let meta = read_metadata(&FixedProbe(None), file.path()).unwrap();
        assert_eq!(meta.duration_ms, 0);
        assert_eq!(meta.width, 0);
        assert_eq!(meta.title, None);
        assert_eq!(meta.filesize, 11);
    }

    #[test]
    fn test_standalone_read_reports_probe_fields() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"data").unwrap();

        let meta = read_metadata(&FixedProbe(Some(video_report())), file.path()).unwrap();
        assert_eq!(meta.duration_ms, 2_000);
        assert_eq!((meta.width, meta.height), (640, 480));
        assert_eq!(meta.rotation, 90);
        assert_eq!(meta.title.as_deref(), Some("Holiday"));
    }

    #[test]
    fn test_prerequisite_read_rejects_unreadable_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err =
            resolve_source(&FixedProbe(None), file.path(), &ExportDefaults::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAsset);

        let mut report = video_report();
        report.duration_ms = None;
        let err = resolve_source(&FixedProbe(Some(report)), file.path(), &ExportDefaults::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidAsset);
    }

    #[test]
    fn test_resolve_source_is_absolute() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let source = resolve_source(
            &FixedProbe(Some(video_report())),
            file.path(),
            &ExportDefaults::default(),
        )
        .unwrap();
        assert!(source.path.is_absolute());
        assert_eq!(source.display_size().width, 480);
    }
}
