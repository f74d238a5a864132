//! Render contexts: where output buffers come from.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use vidoverlay_core::{OverlayError, PixelBuffer, PixelFormat, Result, SharedPixelBuffer};

/// Buffer requirements a compositor places on source frames and on the
/// render context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBufferAttributes {
    pub pixel_format: PixelFormat,
    /// Pixels must be reachable from the CPU after locking.
    pub cpu_addressable: bool,
}

impl PixelBufferAttributes {
    /// 32-bit BGRA, CPU addressable.
    pub const BGRA_CPU: Self = Self {
        pixel_format: PixelFormat::Bgra8,
        cpu_addressable: true,
    };

    pub fn accepts(&self, buffer: &PixelBuffer) -> bool {
        buffer.pixel_format() == self.pixel_format
    }
}

/// Allocation parameters for output buffers.
///
/// Contexts are immutable; when output parameters change the host hands the
/// compositor a new one.
pub trait RenderContext: Send + Sync + fmt::Debug {
    /// Output dimensions in pixels.
    fn size(&self) -> (u32, u32);

    fn pixel_format(&self) -> PixelFormat;

    /// Allocate an empty output buffer. Ownership passes to the caller.
    fn new_pixel_buffer(&self) -> Result<SharedPixelBuffer>;
}

/// Render context allocating zeroed buffers on the heap.
#[derive(Debug)]
pub struct BasicRenderContext {
    width: u32,
    height: u32,
    format: PixelFormat,
    allocation_limit: Option<usize>,
    allocated: AtomicUsize,
}

impl BasicRenderContext {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            format,
            allocation_limit: None,
            allocated: AtomicUsize::new(0),
        }
    }

    /// BGRA context of the given size.
    pub fn bgra(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self::new(width, height, PixelFormat::Bgra8))
    }

    /// Fail every allocation after the first `limit`.
    pub fn with_allocation_limit(mut self, limit: usize) -> Self {
        self.allocation_limit = Some(limit);
        self
    }

    /// Buffers handed out so far.
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::Relaxed)
    }
}

impl RenderContext for BasicRenderContext {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    fn new_pixel_buffer(&self) -> Result<SharedPixelBuffer> {
        if self.width == 0 || self.height == 0 {
            return Err(OverlayError::FrameBufferAllocationFailed(format!(
                "empty render size {}x{}",
                self.width, self.height
            )));
        }
        let n = self.allocated.fetch_add(1, Ordering::Relaxed);
        if let Some(limit) = self.allocation_limit {
            if n >= limit {
                return Err(OverlayError::FrameBufferAllocationFailed(format!(
                    "allocation limit of {limit} buffers reached"
                )));
            }
        }
        Ok(Arc::new(PixelBuffer::new(self.width, self.height, self.format)))
    }
}
