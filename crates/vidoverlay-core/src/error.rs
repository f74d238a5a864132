//! Error types for VideoOverlay.

use thiserror::Error;

use crate::frame::FrameId;

/// Main error type for VideoOverlay operations.
#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid composition instruction: expected an overlay instruction, found {found}")]
    InvalidInstructionType { found: String },

    #[error("Render context could not allocate a frame buffer: {0}")]
    FrameBufferAllocationFailed(String),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Composition instructions overlap at {0}")]
    OverlappingInstructions(String),

    #[error("Pixel buffer {0:?} is already locked")]
    BufferLocked(FrameId),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Frame request {0} was dropped without being finished")]
    RequestDropped(u64),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Font error: {0}")]
    Font(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Encoder error: {0}")]
    Encoder(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for VideoOverlay operations.
pub type Result<T> = std::result::Result<T, OverlayError>;
