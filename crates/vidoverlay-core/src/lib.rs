//! VideoOverlay Core - Foundation types for the overlay compositor
//!
//! This crate provides the fundamental types shared by the compositor,
//! the export pipeline and the application:
//! - Time representation (RationalTime, FrameRate, TimeRange)
//! - BGRA colors and rectangles
//! - Lockable pixel buffers
//! - Error types and configuration

pub mod color;
pub mod config;
pub mod error;
pub mod frame;
pub mod geometry;
pub mod time;

pub use color::Color;
pub use config::{AppConfig, CompositorConfig, ExportConfig, LoggingConfig, SinkKind, TextStyle};
pub use error::{OverlayError, Result};
pub use frame::{FrameId, PixelBuffer, PixelBufferLock, PixelFormat, SharedPixelBuffer};
pub use geometry::{PixelBounds, Rect, Vec2};
pub use time::{FrameRate, RationalTime, TimeRange};

/// Budget constants for the export pipeline.
pub mod budget {
    /// Number of frame requests kept in flight ahead of the writer.
    pub const LOOKAHEAD_FRAMES: usize = 8;

    /// Row alignment of pixel buffers in bytes.
    pub const ROW_ALIGNMENT: usize = 64;
}
