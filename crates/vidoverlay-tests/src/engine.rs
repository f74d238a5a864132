//! Integration tests for the compositing engine.
//!
//! Drives the engine through its host-facing calls only: start, cancel and
//! render-context changes.

use crossbeam_channel::{Receiver, Sender};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use vidoverlay_compositor::{
    BasicRenderContext, CompositingEngine, CompositionInstruction, FrameOutcome, FrameRequest,
    FrameSource, InstructionSet, OverlayInstruction, TextWidget, TrackId,
};
use vidoverlay_core::{
    OverlayError, PixelBuffer, RationalTime, SharedPixelBuffer, TextStyle, TimeRange,
};

const TRACK: TrackId = TrackId(1);
const CONTEXT_SIZE: (u32, u32) = (64, 48);
const SOURCE_SIZE: (u32, u32) = (320, 200);

// ── Helpers ────────────────────────────────────────────────────

/// Fresh color bars for `TRACK`, nothing for other tracks.
struct Bars;

impl FrameSource for Bars {
    fn source_frame(&self, track: TrackId, _: RationalTime) -> Option<SharedPixelBuffer> {
        (track == TRACK).then(|| Arc::new(PixelBuffer::test_pattern(SOURCE_SIZE.0, SOURCE_SIZE.1)))
    }
}

/// Announces entry, then blocks until released.
struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

impl FrameSource for Gate {
    fn source_frame(&self, track: TrackId, time: RationalTime) -> Option<SharedPixelBuffer> {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        Bars.source_frame(track, time)
    }
}

struct Slow(Duration);

impl FrameSource for Slow {
    fn source_frame(&self, track: TrackId, time: RationalTime) -> Option<SharedPixelBuffer> {
        std::thread::sleep(self.0);
        Bars.source_frame(track, time)
    }
}

#[derive(Debug)]
struct ForeignInstruction;

impl CompositionInstruction for ForeignInstruction {
    fn time_range(&self) -> TimeRange {
        TimeRange::new(RationalTime::ZERO, RationalTime::from_secs(5))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn engine(threads: usize) -> Arc<CompositingEngine> {
    let engine = CompositingEngine::builder()
        .worker_threads(threads)
        .widget(Arc::new(TextWidget::new(TextStyle::default()).unwrap()))
        .build()
        .unwrap();
    engine.render_context_changed(BasicRenderContext::bgra(CONTEXT_SIZE.0, CONTEXT_SIZE.1));
    Arc::new(engine)
}

fn overlay(track: TrackId) -> Arc<dyn CompositionInstruction> {
    Arc::new(
        OverlayInstruction::new(track, TimeRange::new(RationalTime::ZERO, RationalTime::from_secs(5)))
            .unwrap(),
    )
}

fn submit(
    engine: &CompositingEngine,
    instruction: Arc<dyn CompositionInstruction>,
    source: Arc<dyn FrameSource>,
) -> Receiver<FrameOutcome> {
    let (request, outcome) = FrameRequest::with_channel(RationalTime::new(3, 2), instruction, source);
    engine.start_request(request);
    outcome
}

fn is_overlay_frame(frame: &PixelBuffer) -> bool {
    let lock = frame.lock().unwrap();
    // widget border and diagonal stroke
    lock.pixel(50, 70) == [255, 255, 255, 255] && lock.pixel(160, 100) == [0, 255, 0, 255]
}

// ── Resolution outcomes ────────────────────────────────────────

#[test]
fn drawn_frame_keeps_source_dimensions_and_is_unlocked() {
    let engine = engine(2);
    let frame = submit(&engine, overlay(TRACK), Arc::new(Bars)).recv().unwrap().unwrap();
    assert_eq!(frame.size(), SOURCE_SIZE);
    assert!(!frame.is_locked());
    assert!(is_overlay_frame(&frame));
}

#[test]
fn missing_source_resolves_with_context_sized_empty_frame() {
    let engine = engine(2);
    let frame = submit(&engine, overlay(TrackId(7)), Arc::new(Bars)).recv().unwrap().unwrap();
    assert_eq!(frame.size(), CONTEXT_SIZE);
    assert!(frame.lock().unwrap().packed_pixels().iter().all(|&b| b == 0));
}

#[test]
fn foreign_instruction_resolves_with_error() {
    let engine = engine(2);
    let outcome = submit(&engine, Arc::new(ForeignInstruction), Arc::new(Bars)).recv().unwrap();
    assert!(matches!(outcome, Err(OverlayError::InvalidInstructionType { .. })));
}

#[test]
fn allocation_failure_resolves_with_error() {
    let engine = engine(1);
    engine.render_context_changed(Arc::new(
        BasicRenderContext::new(8, 8, vidoverlay_core::PixelFormat::Bgra8).with_allocation_limit(0),
    ));
    let outcome = submit(&engine, overlay(TrackId(7)), Arc::new(Bars)).recv().unwrap();
    assert!(matches!(outcome, Err(OverlayError::FrameBufferAllocationFailed(_))));
}

#[test]
fn context_change_applies_to_later_requests() {
    let engine = engine(1);
    engine.render_context_changed(BasicRenderContext::bgra(10, 20));
    let frame = submit(&engine, overlay(TrackId(7)), Arc::new(Bars)).recv().unwrap().unwrap();
    assert_eq!(frame.size(), (10, 20));
}

#[test]
fn instruction_boundary_is_end_exclusive() {
    let set = InstructionSet::single(overlay(TRACK)).unwrap();
    assert!(set.active_at(RationalTime::from_secs(3)).is_some());
    assert!(set.active_at(RationalTime::from_secs(5)).is_none());
}

// ── Cancellation ───────────────────────────────────────────────

#[test]
fn cancel_drains_queued_requests_with_empty_frames() {
    let engine = engine(1);
    let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded(1);

    // Occupy the only worker so the next ten stay queued.
    let blocker = submit(
        &engine,
        overlay(TRACK),
        Arc::new(Gate {
            entered: entered_tx,
            release: release_rx,
        }),
    );
    entered_rx.recv().unwrap();
    let queued: Vec<_> = (0..10)
        .map(|_| submit(&engine, overlay(TRACK), Arc::new(Bars)))
        .collect();
    assert_eq!(engine.in_flight(), 11);

    let canceller = {
        let engine = Arc::clone(&engine);
        std::thread::spawn(move || engine.cancel_all_pending_requests())
    };
    while engine.is_enabled() {
        std::thread::sleep(Duration::from_millis(1));
    }
    release_tx.send(()).unwrap();
    canceller.join().unwrap();

    assert!(engine.is_enabled());
    assert_eq!(engine.in_flight(), 0);

    // Already past the enabled check, so it drew normally.
    let first = blocker.try_recv().unwrap().unwrap();
    assert_eq!(first.size(), SOURCE_SIZE);
    for outcome in queued {
        let frame = outcome.try_recv().unwrap().unwrap();
        assert_eq!(frame.size(), CONTEXT_SIZE);
    }

    let after = submit(&engine, overlay(TRACK), Arc::new(Bars)).recv().unwrap().unwrap();
    assert_eq!(after.size(), SOURCE_SIZE);
    assert!(is_overlay_frame(&after));
}

#[test]
fn cancel_returns_only_after_every_request_resolved() {
    let engine = engine(4);
    let resolved = Arc::new(AtomicUsize::new(0));
    let source: Arc<dyn FrameSource> = Arc::new(Slow(Duration::from_millis(2)));
    for _ in 0..32 {
        let resolved = Arc::clone(&resolved);
        engine.start_request(FrameRequest::new(
            RationalTime::ZERO,
            overlay(TRACK),
            Arc::clone(&source),
            move |_| {
                resolved.fetch_add(1, Ordering::SeqCst);
            },
        ));
    }
    engine.cancel_all_pending_requests();
    assert_eq!(resolved.load(Ordering::SeqCst), 32);
    assert!(engine.is_enabled());
}

#[test]
fn concurrent_cancels_reenable_once_both_finish() {
    let engine = engine(2);
    for _ in 0..16 {
        submit(&engine, overlay(TRACK), Arc::new(Slow(Duration::from_millis(1))));
    }
    let cancellers: Vec<_> = (0..2)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || engine.cancel_all_pending_requests())
        })
        .collect();
    for canceller in cancellers {
        canceller.join().unwrap();
    }
    assert!(engine.is_enabled());
    assert_eq!(engine.in_flight(), 0);
}

#[test]
fn releasing_last_engine_in_callback_does_not_hang_worker() {
    let engine = engine(1);
    let (entered_tx, entered_rx) = crossbeam_channel::bounded(1);
    let (release_tx, release_rx) = crossbeam_channel::bounded(1);
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);

    let owner = Arc::clone(&engine);
    engine.start_request(FrameRequest::new(
        RationalTime::ZERO,
        overlay(TRACK),
        Arc::new(Gate {
            entered: entered_tx,
            release: release_rx,
        }),
        move |outcome| {
            drop(owner);
            let _ = done_tx.send(outcome.map(|frame| frame.size()));
        },
    ));
    entered_rx.recv().unwrap();
    // Queued behind the gated request on the only worker.
    let queued = submit(&engine, overlay(TRACK), Arc::new(Bars));
    drop(engine);
    release_tx.send(()).unwrap();

    let first = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first.unwrap(), SOURCE_SIZE);
    let second = queued.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
    assert_eq!(second.size(), CONTEXT_SIZE);
}

#[test]
fn cancel_from_callback_returns_without_draining() {
    let engine = engine(1);
    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    let inner = Arc::clone(&engine);
    engine.start_request(FrameRequest::new(
        RationalTime::ZERO,
        overlay(TRACK),
        Arc::new(Bars),
        move |_| {
            inner.cancel_all_pending_requests();
            let _ = done_tx.send(inner.is_enabled());
        },
    ));
    assert!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap());
    engine.cancel_all_pending_requests();
    assert_eq!(engine.in_flight(), 0);
}

// ── Concurrency ────────────────────────────────────────────────

#[test]
fn concurrent_requests_never_share_buffers() {
    let engine = engine(4);
    let outcomes: Vec<_> = (0..64)
        .map(|_| submit(&engine, overlay(TRACK), Arc::new(Bars)))
        .collect();
    let mut ids = std::collections::HashSet::new();
    for outcome in outcomes {
        let frame = outcome.recv().unwrap().unwrap();
        assert!(!frame.is_locked());
        assert!(ids.insert(frame.id()));
    }
}

#[test]
fn submitting_from_many_threads() {
    let engine = engine(4);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let engine = Arc::clone(&engine);
            std::thread::spawn(move || {
                (0..8)
                    .map(|_| submit(&engine, overlay(TRACK), Arc::new(Bars)))
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    for handle in handles {
        for outcome in handle.join().unwrap() {
            assert!(outcome.recv().unwrap().is_ok());
        }
    }
}
