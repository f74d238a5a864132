//! CPU drawing surface over a locked BGRA pixel buffer.
//!
//! Pixels are premultiplied BGRA; all drawing is source-over with
//! fractional coverage for anti-aliased edges.

use vidoverlay_core::{Color, OverlayError, PixelBufferLock, PixelFormat, Rect, Result, Vec2};

/// Drawing target borrowed from a [`PixelBufferLock`].
///
/// Lives strictly inside the lock scope, so nothing can draw into an
/// unlocked buffer.
pub struct DrawSurface<'a> {
    data: &'a mut [u8],
    width: u32,
    height: u32,
    stride: usize,
}

impl<'a> DrawSurface<'a> {
    pub fn new(lock: &'a mut PixelBufferLock<'_>) -> Result<Self> {
        if lock.pixel_format() != PixelFormat::Bgra8 {
            return Err(OverlayError::UnsupportedFormat(format!(
                "{:?} surfaces cannot be drawn into, expected Bgra8",
                lock.pixel_format()
            )));
        }
        let (width, height, stride) = (lock.width(), lock.height(), lock.bytes_per_row());
        Ok(Self {
            data: lock.base_address_mut(),
            width,
            height,
            stride,
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whole surface as a rectangle.
    #[inline]
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }

    /// Overwrite every pixel with `color`.
    pub fn clear(&mut self, color: Color) {
        let packed = color.to_bgra8();
        for y in 0..self.height {
            for px in self.row_pixels(y) {
                *px = packed;
            }
        }
    }

    /// Source-over `color` at (`x`, `y`) scaled by `coverage` in [0, 1].
    #[inline]
    pub fn blend_pixel(&mut self, x: u32, y: u32, color: Color, coverage: f32) {
        if x >= self.width || y >= self.height || coverage <= 0.0 {
            return;
        }
        let i = y as usize * self.stride + x as usize * 4;
        let px: &mut [u8; 4] = bytemuck::from_bytes_mut(&mut self.data[i..i + 4]);
        blend(px, color, coverage);
    }

    /// Fill `rect` (clipped to the surface).
    pub fn fill_rect(&mut self, rect: Rect, color: Color) {
        let Some(bounds) = rect.to_pixel_bounds(self.width, self.height) else {
            return;
        };
        for y in bounds.y0..bounds.y1 {
            let row = self.row_pixels(y);
            for px in &mut row[bounds.x0 as usize..bounds.x1 as usize] {
                blend(px, color, 1.0);
            }
        }
    }

    /// Outline `rect` with a border `width` pixels wide, drawn inside it.
    pub fn stroke_rect(&mut self, rect: Rect, width: f32, color: Color) {
        if width <= 0.0 {
            return;
        }
        let w = width.min(rect.width * 0.5).min(rect.height * 0.5);
        let inner_height = rect.height - 2.0 * w;
        self.fill_rect(Rect::new(rect.x, rect.y, rect.width, w), color);
        self.fill_rect(
            Rect::new(rect.x, rect.y + rect.height - w, rect.width, w),
            color,
        );
        self.fill_rect(Rect::new(rect.x, rect.y + w, w, inner_height), color);
        self.fill_rect(
            Rect::new(rect.x + rect.width - w, rect.y + w, w, inner_height),
            color,
        );
    }

    /// Stroke the segment `from`-`to` with butt caps.
    pub fn stroke_line(&mut self, from: Vec2, to: Vec2, width: f32, color: Color) {
        if width <= 0.0 {
            return;
        }
        let half = width * 0.5;
        let min = from.min(to) - Vec2::splat(half + 1.0);
        let max = from.max(to) + Vec2::splat(half + 1.0);
        let Some(bounds) = Rect::new(min.x, min.y, max.x - min.x, max.y - min.y)
            .to_pixel_bounds(self.width, self.height)
        else {
            return;
        };

        let dir = to - from;
        let len = dir.length();
        if len <= f32::EPSILON {
            return;
        }
        let unit = dir / len;

        for y in bounds.y0..bounds.y1 {
            for x in bounds.x0..bounds.x1 {
                let p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5) - from;
                let along = p.dot(unit);
                let across = p.perp_dot(unit).abs();
                let side = (half + 0.5 - across).clamp(0.0, 1.0);
                let cap = (0.5 + along.min(len - along)).clamp(0.0, 1.0);
                let coverage = side * cap;
                if coverage > 0.0 {
                    self.blend_pixel(x, y, color, coverage);
                }
            }
        }
    }

    /// Blend an 8-bit coverage mask (`mask_width` wide) at (`x`, `y`),
    /// clipped to `clip` and the surface.
    pub fn blit_coverage(
        &mut self,
        x: i32,
        y: i32,
        mask_width: usize,
        mask: &[u8],
        color: Color,
        clip: Rect,
    ) {
        if mask_width == 0 {
            return;
        }
        let Some(clip) = clip.to_pixel_bounds(self.width, self.height) else {
            return;
        };
        for (row, line) in mask.chunks_exact(mask_width).enumerate() {
            let py = y + row as i32;
            if py < clip.y0 as i32 || py >= clip.y1 as i32 {
                continue;
            }
            for (col, &alpha) in line.iter().enumerate() {
                let px = x + col as i32;
                if alpha == 0 || px < clip.x0 as i32 || px >= clip.x1 as i32 {
                    continue;
                }
                self.blend_pixel(px as u32, py as u32, color, alpha as f32 / 255.0);
            }
        }
    }

    fn row_pixels(&mut self, y: u32) -> &mut [[u8; 4]] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * 4;
        bytemuck::cast_slice_mut(&mut self.data[start..end])
    }
}

#[inline]
fn blend(px: &mut [u8; 4], color: Color, coverage: f32) {
    let src = color.with_alpha(color.a * coverage.clamp(0.0, 1.0)).to_bgra8();
    let inv = 255 - src[3] as u16;
    for c in 0..4 {
        px[c] = (src[c] as u16 + (px[c] as u16 * inv + 127) / 255).min(255) as u8;
    }
}
