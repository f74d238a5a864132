//! Pixel buffers handed between the host pipeline and the compositor.
//!
//! A buffer's bytes are only reachable through an explicit lock, mirroring
//! the lock-base-address discipline of platform pixel buffers. The lock is
//! an RAII guard, so every exit path (including `?` and panics) unlocks.

use parking_lot::{Mutex, MutexGuard};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::budget::ROW_ALIGNMENT;
use crate::error::{OverlayError, Result};

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub u64);

impl FrameId {
    fn next() -> Self {
        Self(NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit BGRA, premultiplied alpha (32-bit little-endian, alpha first)
    #[default]
    Bgra8,
    /// 8-bit RGBA, straight alpha
    Rgba8,
    /// 8-bit grayscale
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Bgra8 | Self::Rgba8 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Row stride for `width` pixels, aligned for SIMD-friendly access.
    pub fn aligned_stride(self, width: u32) -> usize {
        let min_stride = width as usize * self.bytes_per_pixel();
        (min_stride + ROW_ALIGNMENT - 1) & !(ROW_ALIGNMENT - 1)
    }
}

/// A 2D pixel buffer whose contents require an explicit lock.
#[derive(Debug)]
pub struct PixelBuffer {
    id: FrameId,
    format: PixelFormat,
    width: u32,
    height: u32,
    bytes_per_row: usize,
    data: Mutex<Vec<u8>>,
}

/// Arc-wrapped pixel buffer for shared ownership.
pub type SharedPixelBuffer = Arc<PixelBuffer>;

impl PixelBuffer {
    /// Create a zeroed buffer with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        let bytes_per_row = format.aligned_stride(width);
        Self {
            id: FrameId::next(),
            format,
            width,
            height,
            bytes_per_row,
            data: Mutex::new(vec![0u8; bytes_per_row * height as usize]),
        }
    }

    /// Create a BGRA color-bars buffer (eight vertical bars).
    pub fn test_pattern(width: u32, height: u32) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [0, 255, 255, 255],   // Yellow
            [255, 255, 0, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [0, 0, 255, 255],     // Red
            [255, 0, 0, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];

        let buffer = Self::new(width, height, PixelFormat::Bgra8);
        {
            let mut data = buffer.data.lock();
            for y in 0..height as usize {
                let start = y * buffer.bytes_per_row;
                let row = &mut data[start..start + width as usize * 4];
                for (x, px) in row.chunks_exact_mut(4).enumerate() {
                    let bar = x * 8 / width as usize;
                    px.copy_from_slice(&BARS[bar]);
                }
            }
        }
        buffer
    }

    #[inline]
    pub fn id(&self) -> FrameId {
        self.id
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.bytes_per_row
    }

    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.format
    }

    /// Total memory usage in bytes.
    pub fn memory_size(&self) -> usize {
        self.bytes_per_row * self.height as usize
    }

    /// Whether some caller currently holds the base-address lock.
    pub fn is_locked(&self) -> bool {
        self.data.is_locked()
    }

    /// Lock the base address for pixel access.
    ///
    /// Never blocks: a buffer already locked elsewhere is reported as
    /// [`OverlayError::BufferLocked`], since two owners touching one buffer
    /// is a protocol violation rather than contention to wait out.
    pub fn lock(&self) -> Result<PixelBufferLock<'_>> {
        let data = self
            .data
            .try_lock()
            .ok_or(OverlayError::BufferLocked(self.id))?;
        Ok(PixelBufferLock { buffer: self, data })
    }
}

/// Exclusive access to a locked [`PixelBuffer`]; unlocks on drop.
pub struct PixelBufferLock<'a> {
    buffer: &'a PixelBuffer,
    data: MutexGuard<'a, Vec<u8>>,
}

impl<'a> PixelBufferLock<'a> {
    #[inline]
    pub fn width(&self) -> u32 {
        self.buffer.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.buffer.height
    }

    #[inline]
    pub fn bytes_per_row(&self) -> usize {
        self.buffer.bytes_per_row
    }

    #[inline]
    pub fn pixel_format(&self) -> PixelFormat {
        self.buffer.format
    }

    /// The whole backing store, including row padding.
    #[inline]
    pub fn base_address(&self) -> &[u8] {
        &self.data
    }

    /// Mutable view of the whole backing store, including row padding.
    #[inline]
    pub fn base_address_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Visible bytes of row `y` (padding excluded).
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let (start, end) = self.row_span(y);
        &self.data[start..end]
    }

    /// Mutable visible bytes of row `y` (padding excluded).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let (start, end) = self.row_span(y);
        &mut self.data[start..end]
    }

    /// Read one 4-byte pixel. Panics on out-of-range coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = x as usize * 4;
        let row = self.row(y);
        [row[i], row[i + 1], row[i + 2], row[i + 3]]
    }

    /// Copy the visible pixels into a tightly packed vector.
    pub fn packed_pixels(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            self.buffer.width as usize
                * self.buffer.height as usize
                * self.buffer.format.bytes_per_pixel(),
        );
        for y in 0..self.buffer.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }

    fn row_span(&self, y: u32) -> (usize, usize) {
        let start = y as usize * self.buffer.bytes_per_row;
        let end = start + self.buffer.width as usize * self.buffer.format.bytes_per_pixel();
        (start, end)
    }
}
