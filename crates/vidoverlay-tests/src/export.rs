//! Integration tests for the export pipeline.
//!
//! Runs whole exports of a synthetic movie through the compositor into
//! in-memory and on-disk sinks.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use vidoverlay_compositor::{
    CompositingEngine, CompositionInstruction, InstructionSet, OverlayInstruction, TextWidget,
    TrackId,
};
use vidoverlay_core::{
    ExportConfig, FrameRate, OverlayError, PixelBuffer, RationalTime, Result, TextStyle, TimeRange,
};
use vidoverlay_media::{
    ExportCancel, ExportJob, ExportProgressReporter, ExportSession, ExportStatus, FrameSink,
    MemorySink, RawVideoSink, StreamFormat, SyntheticMovie, VideoComposition, VideoTrack,
};

// ── Helpers ────────────────────────────────────────────────────

fn engine() -> Arc<CompositingEngine> {
    Arc::new(
        CompositingEngine::builder()
            .worker_threads(4)
            .widget(Arc::new(TextWidget::new(TextStyle::default()).unwrap()))
            .build()
            .unwrap(),
    )
}

fn movie(secs: i64) -> Arc<SyntheticMovie> {
    Arc::new(SyntheticMovie::single_track(320, 200, RationalTime::from_secs(secs)))
}

/// Cancels its export once `after` frames were written.
struct CancellingSink {
    inner: MemorySink,
    cancel: ExportCancel,
    after: usize,
}

impl FrameSink for CancellingSink {
    fn begin(&mut self, format: &StreamFormat) -> Result<()> {
        self.inner.begin(format)
    }

    fn write_frame(&mut self, frame: &PixelBuffer) -> Result<()> {
        self.inner.write_frame(frame)?;
        if self.inner.frames().len() >= self.after {
            self.cancel.cancel();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }

    fn abort(&mut self) {
        self.inner.abort();
    }
}

// ── Full exports ───────────────────────────────────────────────

#[test]
fn configured_export_is_capped_and_drawn() {
    let movie = movie(10);
    let composition = VideoComposition::overlay(&movie, FrameRate::FPS_30).unwrap();
    let session = ExportSession::new(movie, composition, ExportJob::from_config(&ExportConfig::default()));
    assert_eq!(session.progress().total_frames, 75);

    let mut sink = MemorySink::new();
    session.run(&engine(), &mut sink).unwrap();

    assert_eq!(session.status(), ExportStatus::Completed);
    assert_eq!(sink.frames().len(), 75);
    assert_eq!(
        sink.format(),
        Some(StreamFormat {
            width: 320,
            height: 200,
            frame_rate: FrameRate::FPS_30
        })
    );
    for index in [0, 37, 74] {
        assert_eq!(sink.pixel(index, 50, 70), Some([255, 255, 255, 255]));
        assert_eq!(sink.pixel(index, 160, 100), Some([0, 255, 0, 255]));
    }
}

#[test]
fn timestamps_differ_between_frames() {
    let movie = movie(1);
    let composition = VideoComposition::overlay(&movie, FrameRate::FPS_24).unwrap();
    let session = ExportSession::new(movie, composition, ExportJob::new("/tmp/unused.bgra"));
    let mut sink = MemorySink::new();
    session.run(&engine(), &mut sink).unwrap();
    assert_ne!(sink.frames()[1], sink.frames()[2]);
}

#[test]
fn frames_outside_source_track_are_empty() {
    // Track covers [0, 1s) but the instruction spans [0, 2s).
    let movie = Arc::new(SyntheticMovie::new().with_track(VideoTrack::new(
        TrackId(1),
        (32, 32),
        TimeRange::new(RationalTime::ZERO, RationalTime::from_secs(1)),
    )));
    let instruction = OverlayInstruction::new(
        TrackId(1),
        TimeRange::new(RationalTime::ZERO, RationalTime::from_secs(2)),
    )
    .unwrap();
    let composition = VideoComposition::new(
        FrameRate::new(2, 1),
        (32, 32),
        InstructionSet::single(Arc::new(instruction)).unwrap(),
    );
    let session = ExportSession::new(movie, composition, ExportJob::new("/tmp/unused.bgra"));
    let mut sink = MemorySink::new();
    session.run(&engine(), &mut sink).unwrap();

    assert_eq!(sink.frames().len(), 4);
    assert!(sink.frames()[1].iter().any(|&b| b != 0));
    assert!(sink.frames()[2].iter().all(|&b| b == 0));
    assert!(sink.frames()[3].iter().all(|&b| b == 0));
}

#[test]
fn raw_sink_file_holds_every_frame() {
    let path = std::env::temp_dir()
        .join(format!("vidoverlay-it-{}", std::process::id()))
        .join("out.bgra");
    let movie = Arc::new(SyntheticMovie::single_track(16, 8, RationalTime::from_secs(1)));
    let composition = VideoComposition::overlay(&movie, FrameRate::FPS_25).unwrap();
    let session = ExportSession::new(movie, composition, ExportJob::new(&path));
    let mut sink = RawVideoSink::new(&path);
    session.run(&engine(), &mut sink).unwrap();

    assert_eq!(std::fs::metadata(&path).unwrap().len(), 25 * 16 * 8 * 4);
    if let Some(dir) = path.parent() {
        std::fs::remove_dir_all(dir).unwrap();
    }
}

// ── Failure and cancellation ───────────────────────────────────

#[derive(Debug)]
struct ForeignInstruction;

impl CompositionInstruction for ForeignInstruction {
    fn time_range(&self) -> TimeRange {
        TimeRange::new(RationalTime::ZERO, RationalTime::from_secs(1))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[test]
fn failed_frame_fails_the_export() {
    let movie = movie(1);
    let composition = VideoComposition::new(
        FrameRate::FPS_30,
        (320, 200),
        InstructionSet::single(Arc::new(ForeignInstruction)).unwrap(),
    );
    let session = ExportSession::new(movie, composition, ExportJob::new("/tmp/unused.bgra"));
    let handle = session.handle();
    let engine = engine();
    let mut sink = MemorySink::new();

    let err = session.run(&engine, &mut sink).unwrap_err();
    assert!(matches!(err, OverlayError::InvalidInstructionType { .. }));
    assert_eq!(handle.status(), ExportStatus::Failed);
    assert!(handle.error().is_some());
    assert!(sink.is_aborted());
    assert!(!sink.is_finished());
    assert_eq!(engine.in_flight(), 0);
    assert!(engine.is_enabled());
}

#[test]
fn cancelling_mid_export_drains_engine() {
    let movie = movie(10);
    let composition = VideoComposition::overlay(&movie, FrameRate::FPS_30).unwrap();
    let session = ExportSession::new(movie, composition, ExportJob::new("/tmp/unused.bgra"));
    let engine = engine();
    let mut sink = CancellingSink {
        inner: MemorySink::new(),
        cancel: session.handle().cancel_token(),
        after: 5,
    };

    assert!(matches!(session.run(&engine, &mut sink), Err(OverlayError::Cancelled)));
    assert_eq!(session.status(), ExportStatus::Cancelled);
    assert_eq!(sink.inner.frames().len(), 5);
    assert!(sink.inner.is_aborted());
    assert_eq!(engine.in_flight(), 0);
    assert!(engine.is_enabled());
}

// ── Asynchronous export with progress ──────────────────────────

#[test]
fn async_export_with_reporter() {
    let movie = movie(2);
    let composition = VideoComposition::overlay(&movie, FrameRate::FPS_30).unwrap();
    let session = ExportSession::new(movie, composition, ExportJob::new("/tmp/unused.bgra"));
    let lines = Arc::new(Mutex::new(Vec::<String>::new()));
    let collected = Arc::clone(&lines);
    let reporter = ExportProgressReporter::new(session.handle(), Duration::from_millis(1))
        .with_callback(move |line| collected.lock().push(line.to_string()));

    let (done_tx, done_rx) = crossbeam_channel::bounded(1);
    reporter.start();
    let thread = session
        .export_asynchronously(engine(), Box::new(MemorySink::new()), move |status| {
            let _ = done_tx.send(status);
        })
        .unwrap();
    assert!(thread.join().unwrap().is_ok());
    reporter.stop();

    assert_eq!(done_rx.recv().unwrap(), ExportStatus::Completed);
    assert_eq!(reporter.report(), "done");
    let lines = lines.lock();
    assert!(lines
        .iter()
        .all(|l| l == "pending" || l == "done" || l.starts_with("exporting: ")));
}
