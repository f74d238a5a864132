//! A movie stand-in whose tracks produce color-bar frames.

use std::sync::Arc;
use vidoverlay_compositor::{FrameSource, TrackId};
use vidoverlay_core::{PixelBuffer, RationalTime, SharedPixelBuffer, TimeRange};

/// One video track of a [`SyntheticMovie`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoTrack {
    pub id: TrackId,
    /// Frame size in pixels.
    pub natural_size: (u32, u32),
    /// Where the track has frames on the movie timeline.
    pub time_range: TimeRange,
}

impl VideoTrack {
    pub fn new(id: TrackId, natural_size: (u32, u32), time_range: TimeRange) -> Self {
        Self {
            id,
            natural_size,
            time_range,
        }
    }
}

/// Movie made of video tracks that decode to test patterns.
#[derive(Debug, Clone, Default)]
pub struct SyntheticMovie {
    tracks: Vec<VideoTrack>,
}

impl SyntheticMovie {
    pub fn new() -> Self {
        Self::default()
    }

    /// One track (`track#1`) of `width`x`height` starting at zero.
    pub fn single_track(width: u32, height: u32, duration: RationalTime) -> Self {
        Self::new().with_track(VideoTrack::new(
            TrackId(1),
            (width, height),
            TimeRange::new(RationalTime::ZERO, duration),
        ))
    }

    pub fn with_track(mut self, track: VideoTrack) -> Self {
        self.tracks.push(track);
        self
    }

    pub fn tracks(&self) -> &[VideoTrack] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&VideoTrack> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Component-wise maximum of the track sizes.
    pub fn natural_size(&self) -> (u32, u32) {
        self.tracks.iter().fold((0, 0), |(w, h), t| {
            (w.max(t.natural_size.0), h.max(t.natural_size.1))
        })
    }

    /// End of the last track.
    pub fn duration(&self) -> RationalTime {
        self.tracks
            .iter()
            .map(|t| t.time_range.end())
            .max()
            .unwrap_or(RationalTime::ZERO)
    }
}

impl FrameSource for SyntheticMovie {
    fn source_frame(&self, track: TrackId, time: RationalTime) -> Option<SharedPixelBuffer> {
        let track = self.track(track)?;
        if !track.time_range.contains(time) {
            return None;
        }
        let (width, height) = track.natural_size;
        Some(Arc::new(PixelBuffer::test_pattern(width, height)))
    }
}
