//! Export pipeline: feeds a composition through the compositor into a sink.
//!
//! Frame requests are submitted ahead of the writer up to the job's
//! in-flight limit. Outcomes are consumed in presentation order, so the
//! sink always sees frames in timeline order even though the compositor
//! finishes them in any order.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use tracing::{error, info};
use uuid::Uuid;
use vidoverlay_compositor::{
    CompositingEngine, DrawSurface, FrameOutcome, FrameRequest, FrameSource, RenderContext,
};
use vidoverlay_core::{
    budget, Color, ExportConfig, OverlayError, RationalTime, Result, SharedPixelBuffer, TimeRange,
};

use crate::composition::VideoComposition;
use crate::movie::SyntheticMovie;
use crate::sink::{FrameSink, StreamFormat};

// ── Status and progress ──────────────────────────────────────────

/// Lifecycle of an [`ExportSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ExportStatus {
    Waiting = 0,
    Exporting = 1,
    Completed = 2,
    Cancelled = 3,
    Failed = 4,
    Unknown = 5,
}

impl ExportStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Waiting,
            1 => Self::Exporting,
            2 => Self::Completed,
            3 => Self::Cancelled,
            4 => Self::Failed,
            _ => Self::Unknown,
        }
    }

    /// Whether the session has stopped for good.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// Export progress information.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportProgress {
    /// Frames written to the sink so far.
    pub current_frame: u64,
    /// Total frames to write.
    pub total_frames: u64,
    /// Estimated time remaining in seconds.
    pub eta_seconds: f64,
    /// Frames per second written.
    pub fps: f64,
}

impl ExportProgress {
    /// Completion fraction (0.0 to 1.0).
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        self.current_frame as f64 / self.total_frames as f64
    }
}

/// Handle for cancelling an in-progress export.
#[derive(Debug, Clone)]
pub struct ExportCancel(Arc<AtomicBool>);

impl ExportCancel {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Signal cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Default for ExportCancel {
    fn default() -> Self {
        Self::new()
    }
}

// ── Export job ───────────────────────────────────────────────────

/// What to export and how far ahead to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportJob {
    /// Output file path.
    pub output_path: PathBuf,
    /// Time range to export (None = entire composition).
    pub range: Option<TimeRange>,
    /// Frame requests kept in flight at once.
    pub max_in_flight: usize,
}

impl ExportJob {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
            range: None,
            max_in_flight: budget::LOOKAHEAD_FRAMES,
        }
    }

    /// Job for the configured output, duration cap and lookahead.
    pub fn from_config(config: &ExportConfig) -> Self {
        Self::new(&config.output)
            .with_max_duration(RationalTime::from_seconds_f64(config.max_duration_secs))
            .with_max_in_flight(config.max_in_flight)
    }

    /// Set the export range.
    pub fn with_range(mut self, start: RationalTime, end: RationalTime) -> Self {
        self.range = Some(TimeRange::from_start_end(start, end));
        self
    }

    /// Export at most `duration` from the start.
    pub fn with_max_duration(self, duration: RationalTime) -> Self {
        self.with_range(RationalTime::ZERO, duration)
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// The part of `[0, duration)` this job covers, if any.
    pub fn export_range(&self, duration: RationalTime) -> Option<TimeRange> {
        let full = TimeRange::new(RationalTime::ZERO, duration);
        match self.range {
            Some(range) => range.intersection(full),
            None => full.is_valid().then_some(full),
        }
    }

    /// Frames this job writes for `composition`.
    pub fn total_frames(&self, composition: &VideoComposition) -> u64 {
        self.export_range(composition.duration())
            .map(|range| composition.frame_times(range).count() as u64)
            .unwrap_or(0)
    }
}

// ── Session ──────────────────────────────────────────────────────

#[derive(Debug)]
struct SessionState {
    status: AtomicU8,
    frames_done: AtomicU64,
    total_frames: AtomicU64,
    started: Mutex<Option<Instant>>,
    error: Mutex<Option<String>>,
    cancel: ExportCancel,
}

impl SessionState {
    fn status(&self) -> ExportStatus {
        ExportStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    fn set_status(&self, status: ExportStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}

/// Cheap, cloneable view of a session for observers on other threads.
#[derive(Debug, Clone)]
pub struct ExportHandle {
    id: Uuid,
    state: Arc<SessionState>,
}

impl ExportHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> ExportStatus {
        self.state.status()
    }

    pub fn progress(&self) -> ExportProgress {
        let current_frame = self.state.frames_done.load(Ordering::Relaxed);
        let total_frames = self.state.total_frames.load(Ordering::Relaxed);
        let started = *self.state.started.lock();
        let elapsed = started.map(|t| t.elapsed().as_secs_f64()).unwrap_or(0.0);
        let fps = if elapsed > 0.0 {
            current_frame as f64 / elapsed
        } else {
            0.0
        };
        let eta_seconds = if fps > 0.0 {
            total_frames.saturating_sub(current_frame) as f64 / fps
        } else {
            0.0
        };
        ExportProgress {
            current_frame,
            total_frames,
            eta_seconds,
            fps,
        }
    }

    /// Message of the error that failed the export.
    pub fn error(&self) -> Option<String> {
        self.state.error.lock().clone()
    }

    /// Ask the export to stop; takes effect before the next frame.
    pub fn cancel(&self) {
        self.state.cancel.cancel();
    }

    pub fn cancel_token(&self) -> ExportCancel {
        self.state.cancel.clone()
    }
}

enum Pending {
    Request(Receiver<FrameOutcome>),
    Ready(SharedPixelBuffer),
}

/// One export of a composition over a movie.
pub struct ExportSession {
    movie: Arc<SyntheticMovie>,
    composition: VideoComposition,
    job: ExportJob,
    handle: ExportHandle,
}

impl ExportSession {
    pub fn new(movie: Arc<SyntheticMovie>, composition: VideoComposition, job: ExportJob) -> Self {
        let state = SessionState {
            status: AtomicU8::new(ExportStatus::Waiting as u8),
            frames_done: AtomicU64::new(0),
            total_frames: AtomicU64::new(job.total_frames(&composition)),
            started: Mutex::new(None),
            error: Mutex::new(None),
            cancel: ExportCancel::new(),
        };
        Self {
            movie,
            composition,
            job,
            handle: ExportHandle {
                id: Uuid::new_v4(),
                state: Arc::new(state),
            },
        }
    }

    pub fn id(&self) -> Uuid {
        self.handle.id
    }

    pub fn job(&self) -> &ExportJob {
        &self.job
    }

    pub fn composition(&self) -> &VideoComposition {
        &self.composition
    }

    pub fn handle(&self) -> ExportHandle {
        self.handle.clone()
    }

    pub fn status(&self) -> ExportStatus {
        self.handle.status()
    }

    pub fn progress(&self) -> ExportProgress {
        self.handle.progress()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    /// Render every frame of the job through `engine` into `sink`.
    ///
    /// A session runs once. On failure or cancellation the engine is
    /// drained and the sink aborted before returning.
    pub fn run(&self, engine: &CompositingEngine, sink: &mut dyn FrameSink) -> Result<()> {
        let state = &self.handle.state;
        state
            .status
            .compare_exchange(
                ExportStatus::Waiting as u8,
                ExportStatus::Exporting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .map_err(|_| OverlayError::Export(format!("export session {} already ran", self.id())))?;
        *state.started.lock() = Some(Instant::now());

        let range = self.job.export_range(self.composition.duration());
        info!(
            session = %self.id(),
            frames = state.total_frames.load(Ordering::Relaxed),
            output = %self.job.output_path.display(),
            "export started"
        );

        match self.render_all(engine, sink, range) {
            Ok(()) => {
                state.set_status(ExportStatus::Completed);
                info!(session = %self.id(), frames = state.frames_done.load(Ordering::Relaxed), "export completed");
                Ok(())
            }
            Err(e) => {
                engine.cancel_all_pending_requests();
                sink.abort();
                if matches!(e, OverlayError::Cancelled) {
                    state.set_status(ExportStatus::Cancelled);
                    info!(session = %self.id(), "export cancelled");
                } else {
                    *state.error.lock() = Some(e.to_string());
                    state.set_status(ExportStatus::Failed);
                    error!(session = %self.id(), error = %e, "export failed");
                }
                Err(e)
            }
        }
    }

    /// Run on a dedicated thread, calling `on_complete` with the final
    /// status before the thread exits.
    pub fn export_asynchronously(
        self,
        engine: Arc<CompositingEngine>,
        mut sink: Box<dyn FrameSink>,
        on_complete: impl FnOnce(ExportStatus) + Send + 'static,
    ) -> Result<JoinHandle<Result<()>>> {
        let handle = std::thread::Builder::new()
            .name("vidoverlay-export".into())
            .spawn(move || {
                let result = self.run(&engine, sink.as_mut());
                on_complete(self.status());
                result
            })?;
        Ok(handle)
    }

    fn render_all(
        &self,
        engine: &CompositingEngine,
        sink: &mut dyn FrameSink,
        range: Option<TimeRange>,
    ) -> Result<()> {
        let (width, height) = self.composition.render_size;
        let context = self.composition.render_context();
        engine.render_context_changed(context.clone());
        sink.begin(&StreamFormat {
            width,
            height,
            frame_rate: self.composition.frame_rate,
        })?;

        if let Some(range) = range {
            let cancel = &self.handle.state.cancel;
            let source: Arc<dyn FrameSource> = self.movie.clone();
            let window_size = self.job.max_in_flight.max(1);
            let mut window = VecDeque::with_capacity(window_size);

            for time in self.composition.frame_times(range) {
                if cancel.is_cancelled() {
                    return Err(OverlayError::Cancelled);
                }
                let pending = match self.composition.instructions.active_at(time) {
                    Some(instruction) => {
                        let (request, outcome) =
                            FrameRequest::with_channel(time, Arc::clone(instruction), Arc::clone(&source));
                        engine.start_request(request);
                        Pending::Request(outcome)
                    }
                    None => Pending::Ready(gap_frame(context.as_ref(), self.composition.gap_color)?),
                };
                window.push_back(pending);
                if window.len() >= window_size {
                    self.write_next(&mut window, sink)?;
                }
            }

            while !window.is_empty() {
                if cancel.is_cancelled() {
                    return Err(OverlayError::Cancelled);
                }
                self.write_next(&mut window, sink)?;
            }
        }

        sink.finish()
    }

    fn write_next(&self, window: &mut VecDeque<Pending>, sink: &mut dyn FrameSink) -> Result<()> {
        let Some(next) = window.pop_front() else {
            return Ok(());
        };
        let frame = match next {
            Pending::Ready(frame) => frame,
            Pending::Request(outcome) => outcome
                .recv()
                .map_err(|_| OverlayError::Internal("frame request vanished unanswered".into()))??,
        };
        sink.write_frame(&frame)?;
        self.handle.state.frames_done.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Frame for a time no instruction covers.
fn gap_frame(context: &dyn RenderContext, color: Color) -> Result<SharedPixelBuffer> {
    let frame = context.new_pixel_buffer()?;
    {
        let mut lock = frame.lock()?;
        DrawSurface::new(&mut lock)?.clear(color);
    }
    Ok(frame)
}
