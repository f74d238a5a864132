//! Frame requests: one unit of "compose the output for time T".
//!
//! A request is resolved by consuming it, so it cannot be answered twice.
//! A request dropped without an answer resolves itself with
//! [`OverlayError::RequestDropped`], so the host never waits forever.

use crossbeam_channel::Receiver;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;
use vidoverlay_core::{OverlayError, RationalTime, Result, SharedPixelBuffer};

use crate::instruction::{CompositionInstruction, TrackId};

static NEXT_REQUEST_ID: AtomicU64 = AtomicU64::new(1);

/// Result delivered to the host for one request.
pub type FrameOutcome = Result<SharedPixelBuffer>;

type Completion = Box<dyn FnOnce(FrameOutcome) + Send>;

/// Supplies source frames by track and time.
pub trait FrameSource: Send + Sync {
    /// The frame of `track` at `time`, or `None` when the track has no
    /// frame there (e.g. past a clip boundary).
    fn source_frame(&self, track: TrackId, time: RationalTime) -> Option<SharedPixelBuffer>;
}

/// Identifier used to correlate a request across log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req#{}", self.0)
    }
}

/// A pending request for one composed output frame.
pub struct FrameRequest {
    id: RequestId,
    composition_time: RationalTime,
    instruction: Arc<dyn CompositionInstruction>,
    source: Arc<dyn FrameSource>,
    completion: Option<Completion>,
}

impl FrameRequest {
    /// Create a request whose outcome is passed to `on_finish`.
    pub fn new(
        composition_time: RationalTime,
        instruction: Arc<dyn CompositionInstruction>,
        source: Arc<dyn FrameSource>,
        on_finish: impl FnOnce(FrameOutcome) + Send + 'static,
    ) -> Self {
        Self {
            id: RequestId(NEXT_REQUEST_ID.fetch_add(1, Ordering::Relaxed)),
            composition_time,
            instruction,
            source,
            completion: Some(Box::new(on_finish)),
        }
    }

    /// Create a request whose outcome arrives on the returned channel.
    pub fn with_channel(
        composition_time: RationalTime,
        instruction: Arc<dyn CompositionInstruction>,
        source: Arc<dyn FrameSource>,
    ) -> (Self, Receiver<FrameOutcome>) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let request = Self::new(composition_time, instruction, source, move |outcome| {
            // The host may have stopped listening; that is not our failure.
            let _ = tx.send(outcome);
        });
        (request, rx)
    }

    #[inline]
    pub fn id(&self) -> RequestId {
        self.id
    }

    #[inline]
    pub fn composition_time(&self) -> RationalTime {
        self.composition_time
    }

    #[inline]
    pub fn instruction(&self) -> &Arc<dyn CompositionInstruction> {
        &self.instruction
    }

    /// Source frame of `track` at this request's composition time.
    pub fn source_frame(&self, track: TrackId) -> Option<SharedPixelBuffer> {
        self.source.source_frame(track, self.composition_time)
    }

    /// Answer with a composed frame.
    pub fn finish_with_frame(self, buffer: SharedPixelBuffer) {
        self.finish(Ok(buffer));
    }

    /// Answer with a failure.
    pub fn finish_with_error(self, error: OverlayError) {
        self.finish(Err(error));
    }

    /// Answer with either outcome.
    pub fn finish(mut self, outcome: FrameOutcome) {
        self.resolve(outcome);
    }

    fn resolve(&mut self, outcome: FrameOutcome) {
        if let Some(completion) = self.completion.take() {
            completion(outcome);
        }
    }
}

impl Drop for FrameRequest {
    fn drop(&mut self) {
        if self.completion.is_some() {
            warn!(request = %self.id, time = %self.composition_time, "frame request dropped unanswered");
            let id = self.id.0;
            self.resolve(Err(OverlayError::RequestDropped(id)));
        }
    }
}

impl fmt::Debug for FrameRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameRequest")
            .field("id", &self.id)
            .field("composition_time", &self.composition_time)
            .field("instruction", &self.instruction)
            .field("resolved", &self.completion.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::OverlayInstruction;
    use std::sync::atomic::AtomicUsize;
    use vidoverlay_core::{PixelBuffer, PixelFormat, TimeRange};

    struct NoFrames;

    impl FrameSource for NoFrames {
        fn source_frame(&self, _: TrackId, _: RationalTime) -> Option<SharedPixelBuffer> {
            None
        }
    }

    fn instruction() -> Arc<dyn CompositionInstruction> {
        Arc::new(
            OverlayInstruction::new(
                TrackId(1),
                TimeRange::new(RationalTime::ZERO, RationalTime::from_secs(1)),
            )
            .unwrap(),
        )
    }

    #[test]
    fn test_finish_delivers_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let request = FrameRequest::new(RationalTime::ZERO, instruction(), Arc::new(NoFrames), move |outcome| {
            assert!(outcome.is_ok());
            counter.fetch_add(1, Ordering::SeqCst);
        });
        request.finish_with_frame(Arc::new(PixelBuffer::new(2, 2, PixelFormat::Bgra8)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_resolves_with_error() {
        let (request, rx) =
            FrameRequest::with_channel(RationalTime::ZERO, instruction(), Arc::new(NoFrames));
        let id = request.id().0;
        drop(request);
        match rx.try_recv().unwrap() {
            Err(OverlayError::RequestDropped(dropped)) => assert_eq!(dropped, id),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_ids_increase() {
        let (a, _ra) = FrameRequest::with_channel(RationalTime::ZERO, instruction(), Arc::new(NoFrames));
        let (b, _rb) = FrameRequest::with_channel(RationalTime::ZERO, instruction(), Arc::new(NoFrames));
        assert!(b.id() > a.id());
        a.finish_with_error(OverlayError::Cancelled);
        b.finish_with_error(OverlayError::Cancelled);
    }
}
