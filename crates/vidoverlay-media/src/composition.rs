//! Video composition: what the export asks the compositor to produce.

use std::sync::Arc;
use vidoverlay_compositor::{
    BasicRenderContext, CompositionInstruction, InstructionSet, OverlayInstruction,
};
use vidoverlay_core::{Color, FrameRate, OverlayError, RationalTime, Result, TimeRange};

use crate::movie::SyntheticMovie;

/// Output frame rate and size plus the instructions covering the timeline.
#[derive(Debug, Clone)]
pub struct VideoComposition {
    pub frame_rate: FrameRate,
    pub render_size: (u32, u32),
    pub instructions: InstructionSet,
    /// Fill for frames no instruction covers.
    pub gap_color: Color,
}

impl VideoComposition {
    pub fn new(frame_rate: FrameRate, render_size: (u32, u32), instructions: InstructionSet) -> Self {
        Self {
            frame_rate,
            render_size,
            instructions,
            gap_color: Color::BLACK,
        }
    }

    /// One overlay instruction on the movie's first track spanning the whole
    /// movie, rendered at the movie's natural size.
    pub fn overlay(movie: &SyntheticMovie, frame_rate: FrameRate) -> Result<Self> {
        let track = movie
            .tracks()
            .first()
            .ok_or_else(|| OverlayError::Export("movie has no video track".into()))?;
        let range = TimeRange::new(RationalTime::ZERO, movie.duration());
        let instruction: Arc<dyn CompositionInstruction> =
            Arc::new(OverlayInstruction::new(track.id, range)?);
        Ok(Self::new(
            frame_rate,
            movie.natural_size(),
            InstructionSet::single(instruction)?,
        ))
    }

    pub fn with_gap_color(mut self, color: Color) -> Self {
        self.gap_color = color;
        self
    }

    pub fn frame_duration(&self) -> RationalTime {
        self.frame_rate.frame_duration()
    }

    /// End of the last instruction.
    pub fn duration(&self) -> RationalTime {
        self.instructions
            .span()
            .map(|span| span.end())
            .unwrap_or(RationalTime::ZERO)
    }

    /// Presentation time of every frame starting inside `range`.
    pub fn frame_times(&self, range: TimeRange) -> impl Iterator<Item = RationalTime> {
        let step = self.frame_duration();
        let start = range.start;
        let end = range.end();
        (0i64..)
            .map(move |i| start + step * i)
            .take_while(move |t| *t < end)
    }

    /// Render context allocating BGRA buffers of the render size.
    pub fn render_context(&self) -> Arc<BasicRenderContext> {
        BasicRenderContext::bgra(self.render_size.0, self.render_size.1)
    }
}
