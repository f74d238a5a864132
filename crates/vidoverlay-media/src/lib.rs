//! VideoOverlay Media - drives the compositor over a movie and writes frames
//!
//! This crate handles:
//! - A synthetic movie standing in for decoded source tracks
//! - The video composition (frame rate, render size, instructions)
//! - The export session, its progress reporting and cancellation
//! - Frame sinks (raw file, FFmpeg pipe, memory)

pub mod composition;
pub mod export;
pub mod movie;
pub mod progress;
pub mod sink;

pub use composition::VideoComposition;
pub use export::{ExportCancel, ExportHandle, ExportJob, ExportProgress, ExportSession, ExportStatus};
pub use movie::{SyntheticMovie, VideoTrack};
pub use progress::ExportProgressReporter;
pub use sink::{sink_for, FfmpegSink, FrameSink, MemorySink, RawVideoSink, StreamFormat, VideoCodec};
