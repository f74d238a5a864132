//! VideoOverlay Compositor - draws a timestamp overlay onto every frame
//!
//! The host pipeline drives a [`CompositingEngine`] through three calls:
//! - [`CompositingEngine::start_request`] for each output frame
//! - [`CompositingEngine::cancel_all_pending_requests`] to drain in-flight work
//! - [`CompositingEngine::render_context_changed`] when output parameters change
//!
//! Each [`FrameRequest`] is answered exactly once with either a composed
//! pixel buffer or an error.

pub mod context;
pub mod engine;
pub mod glyphs;
pub mod instruction;
pub mod overlay;
pub mod request;
pub mod surface;
pub mod widget;
pub mod workgroup;

pub use context::{BasicRenderContext, PixelBufferAttributes, RenderContext};
pub use engine::{CompositingEngine, EngineBuilder, EngineState};
pub use instruction::{CompositionInstruction, InstructionSet, OverlayInstruction, TrackId};
pub use overlay::{draw_overlay, DrawParams, TimestampFormat};
pub use request::{FrameOutcome, FrameRequest, FrameSource, RequestId};
pub use surface::DrawSurface;
pub use widget::{GlyphSource, OverlayWidget, TextWidget};
pub use workgroup::{WorkGroup, WorkGuard};
