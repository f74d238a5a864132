//! Composition instructions: which source track feeds which time range.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use vidoverlay_core::{Color, OverlayError, RationalTime, Result, TimeRange};

/// Identifier of a source track in the movie being composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrackId(pub u32);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

/// A time-scoped description of how frames in a range are composed.
///
/// The host pipeline hands instructions back to the compositor inside each
/// request; an engine only understands the concrete types it produced, and
/// recognizes them through [`CompositionInstruction::as_any`].
pub trait CompositionInstruction: Any + Send + Sync + fmt::Debug {
    /// Range during which the instruction is in effect.
    fn time_range(&self) -> TimeRange;

    /// If false, post-processing is skipped for this range.
    fn enable_post_processing(&self) -> bool {
        true
    }

    /// If false, two frames from the same sources render identically, so
    /// the pipeline may reuse output.
    fn contains_tweening(&self) -> bool {
        false
    }

    /// Fill used where no source frame covers the output.
    fn background_color(&self) -> Color {
        Color::WHITE.with_alpha(0.0)
    }

    /// Tracks needed to compose frames; `None` means all tracks.
    fn required_source_track_ids(&self) -> Option<&[TrackId]> {
        None
    }

    /// Track whose frames are used unmodified for the whole range.
    fn passthrough_track_id(&self) -> Option<TrackId> {
        None
    }

    /// Concrete type name, for error messages.
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn as_any(&self) -> &dyn Any;
}

/// Instruction understood by the overlay compositor.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayInstruction {
    time_range: TimeRange,
    source_track: TrackId,
    required_tracks: [TrackId; 1],
    background_color: Color,
    passthrough_track: Option<TrackId>,
    enable_post_processing: bool,
}

impl OverlayInstruction {
    /// Overlay frames of `track` for `time_range`.
    pub fn new(track: TrackId, time_range: TimeRange) -> Result<Self> {
        Ok(Self {
            time_range: time_range.validated()?,
            source_track: track,
            required_tracks: [track],
            background_color: Color::WHITE.with_alpha(0.0),
            passthrough_track: None,
            enable_post_processing: true,
        })
    }

    pub fn with_background_color(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    /// Skip drawing and hand `track`'s frames straight through.
    pub fn with_passthrough(mut self, track: TrackId) -> Self {
        self.passthrough_track = Some(track);
        self
    }

    pub fn with_post_processing(mut self, enabled: bool) -> Self {
        self.enable_post_processing = enabled;
        self
    }

    /// Track the overlay is drawn onto.
    #[inline]
    pub fn source_track(&self) -> TrackId {
        self.source_track
    }
}

impl CompositionInstruction for OverlayInstruction {
    fn time_range(&self) -> TimeRange {
        self.time_range
    }

    fn enable_post_processing(&self) -> bool {
        self.enable_post_processing
    }

    // The timestamp changes on every frame.
    fn contains_tweening(&self) -> bool {
        true
    }

    fn background_color(&self) -> Color {
        self.background_color
    }

    fn required_source_track_ids(&self) -> Option<&[TrackId]> {
        Some(&self.required_tracks)
    }

    fn passthrough_track_id(&self) -> Option<TrackId> {
        self.passthrough_track
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Instructions for a whole composition, ordered by start time.
///
/// Ranges never overlap. Gaps are allowed; a time inside a gap has no
/// active instruction and renders as background only.
#[derive(Debug, Clone, Default)]
pub struct InstructionSet {
    instructions: Vec<Arc<dyn CompositionInstruction>>,
}

impl InstructionSet {
    pub fn new(mut instructions: Vec<Arc<dyn CompositionInstruction>>) -> Result<Self> {
        for instruction in &instructions {
            instruction.time_range().validated()?;
        }
        instructions.sort_by_key(|i| i.time_range().start);
        for pair in instructions.windows(2) {
            let (a, b) = (pair[0].time_range(), pair[1].time_range());
            if a.overlaps(b) {
                return Err(OverlayError::OverlappingInstructions(format!("{a} and {b}")));
            }
        }
        Ok(Self { instructions })
    }

    pub fn single(instruction: Arc<dyn CompositionInstruction>) -> Result<Self> {
        Self::new(vec![instruction])
    }

    /// The instruction whose range contains `time`, if any.
    pub fn active_at(&self, time: RationalTime) -> Option<&Arc<dyn CompositionInstruction>> {
        let idx = self
            .instructions
            .partition_point(|i| i.time_range().start <= time);
        let candidate = self.instructions.get(idx.checked_sub(1)?)?;
        candidate.time_range().contains(time).then_some(candidate)
    }

    /// Span from the first start to the last end.
    pub fn span(&self) -> Option<TimeRange> {
        let first = self.instructions.first()?.time_range();
        let last = self.instructions.last()?.time_range();
        Some(TimeRange::from_start_end(first.start, last.end()))
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn CompositionInstruction>> {
        self.instructions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: i64) -> RationalTime {
        RationalTime::from_secs(s)
    }

    fn overlay(start: i64, len: i64) -> Arc<dyn CompositionInstruction> {
        Arc::new(OverlayInstruction::new(TrackId(1), TimeRange::new(secs(start), secs(len))).unwrap())
    }

    #[test]
    fn test_overlay_instruction_defaults() {
        let instruction =
            OverlayInstruction::new(TrackId(7), TimeRange::new(secs(0), secs(5))).unwrap();
        assert_eq!(instruction.source_track(), TrackId(7));
        assert_eq!(instruction.required_source_track_ids(), Some(&[TrackId(7)][..]));
        assert_eq!(instruction.passthrough_track_id(), None);
        assert!(instruction.enable_post_processing());
        assert_eq!(instruction.background_color().a, 0.0);
    }

    #[test]
    fn test_rejects_degenerate_range() {
        let err = OverlayInstruction::new(TrackId(1), TimeRange::new(secs(2), secs(0)));
        assert!(matches!(err, Err(OverlayError::InvalidTimeRange(_))));
    }

    #[test]
    fn test_single_instruction_end_is_exclusive() {
        let set = InstructionSet::single(overlay(0, 5)).unwrap();
        assert!(set.active_at(secs(3)).is_some());
        assert!(set.active_at(secs(0)).is_some());
        assert!(set.active_at(secs(5)).is_none());
    }

    #[test]
    fn test_multiple_instructions_resolve_by_time() {
        let set = InstructionSet::new(vec![overlay(10, 5), overlay(0, 5), overlay(5, 5)]).unwrap();
        assert_eq!(set.len(), 3);
        let at = |s| set.active_at(secs(s)).unwrap().time_range().start;
        assert_eq!(at(0), secs(0));
        assert_eq!(at(5), secs(5));
        assert_eq!(at(14), secs(10));
        assert!(set.active_at(secs(15)).is_none());
        assert_eq!(set.span(), Some(TimeRange::new(secs(0), secs(15))));
    }

    #[test]
    fn test_gap_has_no_instruction() {
        let set = InstructionSet::new(vec![overlay(0, 2), overlay(4, 2)]).unwrap();
        assert!(set.active_at(secs(3)).is_none());
        assert!(set.active_at(RationalTime::new(-1, 2)).is_none());
    }

    #[test]
    fn test_rejects_overlap() {
        let err = InstructionSet::new(vec![overlay(0, 5), overlay(4, 5)]);
        assert!(matches!(err, Err(OverlayError::OverlappingInstructions(_))));
    }

    #[test]
    fn test_type_name_is_concrete() {
        let instruction = overlay(0, 1);
        assert!(instruction.type_name().ends_with("OverlayInstruction"));
        assert!(instruction.as_any().is::<OverlayInstruction>());
    }
}
