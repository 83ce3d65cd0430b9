//! Timeline: the ordered track segments an export renders.
//!
//! A timeline holds one sequence per media kind. Each sequence starts at
//! zero and its segments butt against each other with no gaps or overlaps
//! in insertion time. A segment's source range and insertion range may have
//! different durations; the ratio between them is the playback rate.

use serde::{Deserialize, Serialize};
use splice_common::error::{SpliceError, SpliceResult};
use splice_common::time::{NativeTime, TimeRange};

/// Kind of media carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

/// Where a segment's media comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentSource {
    /// Index into the operation's source list.
    Media { source: usize },
    /// Empty media: silence for audio, nothing for video.
    Gap,
}

/// One contiguous piece of a track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackSegment {
    pub source: SegmentSource,
    /// Range read from the source.
    pub source_range: TimeRange,
    /// Range occupied in the output.
    pub insert_range: TimeRange,
}

impl TrackSegment {
    /// Source duration over output duration (2.0 plays twice as fast).
    pub fn playback_rate(&self) -> f64 {
        self.source_range.duration.ratio(self.insert_range.duration)
    }

    pub fn source_index(&self) -> Option<usize> {
        match self.source {
            SegmentSource::Media { source } => Some(source),
            SegmentSource::Gap => None,
        }
    }
}

/// Video and audio segment sequences for one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub timescale: u32,
    pub video: Vec<TrackSegment>,
    pub audio: Vec<TrackSegment>,
}

impl Timeline {
    pub fn new(timescale: u32) -> Self {
        Self {
            timescale,
            video: Vec::new(),
            audio: Vec::new(),
        }
    }

    pub fn track(&self, kind: MediaKind) -> &[TrackSegment] {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    fn track_mut(&mut self, kind: MediaKind) -> &mut Vec<TrackSegment> {
        match kind {
            MediaKind::Video => &mut self.video,
            MediaKind::Audio => &mut self.audio,
        }
    }

    pub fn has_track(&self, kind: MediaKind) -> bool {
        !self.track(kind).is_empty()
    }

    /// End of the last segment of a track (zero for an empty track).
    pub fn track_duration(&self, kind: MediaKind) -> NativeTime {
        self.track(kind)
            .last()
            .map(|segment| segment.insert_range.end())
            .unwrap_or(NativeTime::zero(self.timescale))
    }

    /// Output duration: the longer of the two tracks.
    pub fn duration(&self) -> NativeTime {
        self.track_duration(MediaKind::Video)
            .max(self.track_duration(MediaKind::Audio))
    }

    /// Append `source_range` of a source at the end of a track, stretched or
    /// compressed to `insert_duration`.
    pub fn append(
        &mut self,
        kind: MediaKind,
        source: usize,
        source_range: TimeRange,
        insert_duration: NativeTime,
    ) {
        let cursor = self.track_duration(kind);
        self.track_mut(kind).push(TrackSegment {
            source: SegmentSource::Media { source },
            source_range,
            insert_range: TimeRange::new(cursor, insert_duration),
        });
    }

    /// Append `source_range` at its natural speed.
    pub fn append_range(&mut self, kind: MediaKind, source: usize, source_range: TimeRange) {
        self.append(kind, source, source_range, source_range.duration);
    }

    /// Append empty media of the given duration.
    pub fn append_gap(&mut self, kind: MediaKind, duration: NativeTime) {
        let cursor = self.track_duration(kind);
        let zero = NativeTime::zero(self.timescale);
        self.track_mut(kind).push(TrackSegment {
            source: SegmentSource::Gap,
            source_range: TimeRange::new(zero, duration),
            insert_range: TimeRange::new(cursor, duration),
        });
    }

    /// Check that every track starts at zero, is contiguous, and contains
    /// only positive-length segments.
    pub fn validate(&self) -> SpliceResult<()> {
        for kind in [MediaKind::Video, MediaKind::Audio] {
            let mut cursor = NativeTime::zero(self.timescale);
            for (index, segment) in self.track(kind).iter().enumerate() {
                if segment.insert_range.start != cursor {
                    return Err(SpliceError::invalid_parameter(format!(
                        "{kind:?} segment {index} starts at {} but the track ends at {cursor}",
                        segment.insert_range.start
                    )));
                }
                if segment.insert_range.duration.value <= 0
                    || segment.source_range.duration.value <= 0
                {
                    return Err(SpliceError::invalid_parameter(format!(
                        "{kind:?} segment {index} has an empty range"
                    )));
                }
                if segment.source_range.start.is_negative() {
                    return Err(SpliceError::invalid_time_range(format!(
                        "{kind:?} segment {index} starts before its source"
                    )));
                }
                cursor = segment.insert_range.end();
            }
        }
        Ok(())
    }
}
