//! The compositing engine: answers frame requests on a worker pool.
//!
//! Every submitted request is counted in a [`WorkGroup`] before
//! [`CompositingEngine::start_request`] returns, and resolved before its
//! count is released. [`CompositingEngine::cancel_all_pending_requests`]
//! clears the enabled flag and waits for the group to drain; tasks that
//! observe the cleared flag skip drawing and answer with an empty buffer
//! from the current render context.
//!
//! Concurrent cancels nest: the engine is re-enabled only when the last
//! of them has finished draining.

use parking_lot::{Mutex, RwLock};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use vidoverlay_core::{Color, CompositorConfig, OverlayError, Result, SharedPixelBuffer};

use crate::context::{PixelBufferAttributes, RenderContext};
use crate::instruction::{CompositionInstruction, OverlayInstruction};
use crate::overlay::{draw_overlay, DrawParams};
use crate::request::FrameRequest;
use crate::surface::DrawSurface;
use crate::widget::{OverlayWidget, TextWidget};
use crate::workgroup::WorkGroup;

/// Snapshot of the engine's externally visible state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineState {
    pub enabled: bool,
    pub in_flight: usize,
}

/// Configures and builds a [`CompositingEngine`].
pub struct EngineBuilder {
    worker_threads: usize,
    params: DrawParams,
    widgets: Vec<Arc<dyn OverlayWidget>>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            worker_threads: 0,
            params: DrawParams::default(),
            widgets: Vec::new(),
        }
    }

    /// Render threads; 0 means one per CPU.
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn draw_params(mut self, params: DrawParams) -> Self {
        self.params = params;
        self
    }

    pub fn widget(mut self, widget: Arc<dyn OverlayWidget>) -> Self {
        self.widgets.push(widget);
        self
    }

    pub fn build(self) -> Result<CompositingEngine> {
        let threads = if self.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.worker_threads
        };
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("vidoverlay-render-{i}"))
            .panic_handler(|_| error!("frame render task panicked"))
            .build()
            .map_err(|e| OverlayError::Internal(format!("failed to start render pool: {e}")))?;

        debug!(threads, widgets = self.widgets.len(), "compositing engine started");

        Ok(CompositingEngine {
            shared: Arc::new(EngineShared {
                enabled: AtomicBool::new(true),
                cancel_depth: Mutex::new(0),
                render_context: RwLock::new(None),
                work: WorkGroup::new(),
                widgets: self.widgets,
                params: self.params,
            }),
            pool,
        })
    }
}

/// Custom frame compositor drawing a timestamp overlay onto source frames.
pub struct CompositingEngine {
    shared: Arc<EngineShared>,
    pool: ThreadPool,
}

struct EngineShared {
    enabled: AtomicBool,
    cancel_depth: Mutex<usize>,
    render_context: RwLock<Option<Arc<dyn RenderContext>>>,
    work: Arc<WorkGroup>,
    widgets: Vec<Arc<dyn OverlayWidget>>,
    params: DrawParams,
}

impl CompositingEngine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine with one text widget, styled and placed per `config`.
    pub fn from_config(config: &CompositorConfig) -> Result<Self> {
        let text = TextWidget::new(config.text.clone())?;
        EngineBuilder::new()
            .worker_threads(config.worker_threads)
            .draw_params(DrawParams::from(config))
            .widget(Arc::new(text))
            .build()
    }

    /// Requirements on source frames handed to this engine.
    pub fn source_pixel_buffer_attributes(&self) -> PixelBufferAttributes {
        PixelBufferAttributes::BGRA_CPU
    }

    /// Requirements on buffers allocated by the render context.
    pub fn required_pixel_buffer_attributes_for_render_context(&self) -> PixelBufferAttributes {
        PixelBufferAttributes::BGRA_CPU
    }

    /// Switch to a new render context for all later empty-buffer
    /// allocations.
    pub fn render_context_changed(&self, context: Arc<dyn RenderContext>) {
        let (width, height) = context.size();
        let required = self.required_pixel_buffer_attributes_for_render_context();
        if context.pixel_format() != required.pixel_format {
            warn!(
                format = ?context.pixel_format(),
                required = ?required.pixel_format,
                "render context does not produce the required pixel format"
            );
        }
        info!(width, height, "render context changed");
        *self.shared.render_context.write() = Some(context);
    }

    /// The render context currently in use.
    pub fn render_context(&self) -> Option<Arc<dyn RenderContext>> {
        self.shared.render_context.read().clone()
    }

    /// Queue `request` for rendering and return immediately.
    ///
    /// The request is answered exactly once from a worker thread.
    pub fn start_request(&self, request: FrameRequest) {
        let work = self.shared.work.enter();
        let shared = Arc::clone(&self.shared);
        trace!(request = %request.id(), time = %request.composition_time(), "frame request queued");

        self.pool.spawn(move || {
            // Declared first so it is released last, after the request has
            // been answered (also when unwinding).
            let _work = work;
            let request = request;
            let outcome = shared.render_frame(&request);
            if let Err(e) = &outcome {
                warn!(request = %request.id(), time = %request.composition_time(), error = %e, "frame request failed");
            }
            request.finish(outcome);
        });
    }

    /// Block until every request submitted so far has been answered.
    ///
    /// Requests still queued answer with empty buffers instead of drawing.
    /// Called from a completion callback it cannot wait for its own
    /// request, so it logs and returns without draining.
    pub fn cancel_all_pending_requests(&self) {
        if self.on_render_thread() {
            error!(
                pending = self.shared.work.pending(),
                "cancel_all_pending_requests called from a render thread, not draining"
            );
            return;
        }
        let _scope = CancelScope::enter(&self.shared);
        debug!(pending = self.shared.work.pending(), "draining frame requests");
        self.shared.work.wait();
        debug!("frame requests drained");
    }

    /// Render `request` on the calling thread without answering it.
    pub fn render_frame(&self, request: &FrameRequest) -> Result<SharedPixelBuffer> {
        self.shared.render_frame(request)
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Acquire)
    }

    /// Requests submitted and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.shared.work.pending()
    }

    pub fn state(&self) -> EngineState {
        EngineState {
            enabled: self.is_enabled(),
            in_flight: self.in_flight(),
        }
    }

    pub fn draw_params(&self) -> &DrawParams {
        &self.shared.params
    }

    fn on_render_thread(&self) -> bool {
        self.pool.current_thread_index().is_some()
    }
}

impl Drop for CompositingEngine {
    fn drop(&mut self) {
        if self.shared.work.pending() == 0 {
            return;
        }
        if self.on_render_thread() {
            // Released from a completion callback: the running task is still
            // counted, so queued requests are answered empty without waiting.
            debug!(pending = self.shared.work.pending(), "engine dropped on a render thread");
            self.shared.enabled.store(false, Ordering::Release);
            return;
        }
        self.cancel_all_pending_requests();
    }
}

impl EngineShared {
    fn render_frame(&self, request: &FrameRequest) -> Result<SharedPixelBuffer> {
        if !self.enabled.load(Ordering::Acquire) {
            trace!(request = %request.id(), "engine disabled, answering with empty frame");
            return self.new_empty_buffer();
        }

        let instruction = request
            .instruction()
            .as_any()
            .downcast_ref::<OverlayInstruction>()
            .ok_or_else(|| OverlayError::InvalidInstructionType {
                found: request.instruction().type_name().to_string(),
            })?;

        if let Some(track) = instruction.passthrough_track_id() {
            if let Some(frame) = request.source_frame(track) {
                return Ok(frame);
            }
        }

        let Some(frame) = request.source_frame(instruction.source_track()) else {
            debug!(
                request = %request.id(),
                track = %instruction.source_track(),
                time = %request.composition_time(),
                "no source frame, answering with background"
            );
            return self.new_background_buffer(instruction.background_color());
        };

        if !PixelBufferAttributes::BGRA_CPU.accepts(&frame) {
            warn!(format = ?frame.pixel_format(), "source frame is not drawable, passing it through");
            return Ok(frame);
        }

        let text = self.params.timestamp.format(request.composition_time());
        {
            let mut lock = frame.lock()?;
            let mut surface = DrawSurface::new(&mut lock)?;
            draw_overlay(&mut surface, &self.params, &self.widgets, &text)?;
        }
        Ok(frame)
    }

    fn new_empty_buffer(&self) -> Result<SharedPixelBuffer> {
        let context = self.render_context.read().clone().ok_or_else(|| {
            OverlayError::FrameBufferAllocationFailed("no render context has been set".into())
        })?;
        context.new_pixel_buffer()
    }

    fn new_background_buffer(&self, color: Color) -> Result<SharedPixelBuffer> {
        let buffer = self.new_empty_buffer()?;
        if color.a > 0.0 {
            let mut lock = buffer.lock()?;
            DrawSurface::new(&mut lock)?.clear(color);
        }
        Ok(buffer)
    }
}

/// Disables the engine for the lifetime of one cancel call.
struct CancelScope<'a> {
    shared: &'a EngineShared,
}

impl<'a> CancelScope<'a> {
    fn enter(shared: &'a EngineShared) -> Self {
        let mut depth = shared.cancel_depth.lock();
        *depth += 1;
        shared.enabled.store(false, Ordering::Release);
        Self { shared }
    }
}

impl Drop for CancelScope<'_> {
    fn drop(&mut self) {
        let mut depth = self.shared.cancel_depth.lock();
        *depth -= 1;
        if *depth == 0 {
            self.shared.enabled.store(true, Ordering::Release);
        }
    }
}
