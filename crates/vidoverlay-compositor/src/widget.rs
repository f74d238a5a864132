//! Overlay widgets: small drawing units placed on each frame.
//!
//! Widgets hold only immutable style. Placement and text arrive as call
//! arguments, so one instance can serve every worker thread at once.

use fontdue::{Font, FontSettings};
use std::fmt;
use std::path::Path;
use tracing::debug;
use vidoverlay_core::{OverlayError, Rect, Result, TextStyle};

use crate::glyphs;
use crate::surface::DrawSurface;

/// Something that draws itself into a frame.
pub trait OverlayWidget: Send + Sync {
    /// Draw into `surface` within `frame`, showing `text`.
    fn draw(&self, surface: &mut DrawSurface<'_>, frame: Rect, text: &str) -> Result<()>;
}

/// Where text glyphs come from.
pub enum GlyphSource {
    /// The built-in 5x7 bitmap glyphs.
    Builtin,
    /// A TrueType/OpenType font rasterized with fontdue.
    Font(Box<Font>),
}

impl GlyphSource {
    pub fn from_font_bytes(bytes: &[u8]) -> Result<Self> {
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|e| OverlayError::Font(e.to_string()))?;
        Ok(Self::Font(Box::new(font)))
    }

    pub fn from_font_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let source = Self::from_font_bytes(&bytes)?;
        debug!(path = %path.display(), "loaded overlay font");
        Ok(source)
    }
}

impl fmt::Debug for GlyphSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("Builtin"),
            Self::Font(_) => f.write_str("Font"),
        }
    }
}

/// A boxed text label: translucent background, border, then text.
#[derive(Debug)]
pub struct TextWidget {
    style: TextStyle,
    glyphs: GlyphSource,
}

const TEXT_PADDING: f32 = 4.0;

impl TextWidget {
    /// Build from a style, loading its font file if one is set.
    pub fn new(style: TextStyle) -> Result<Self> {
        let glyphs = match &style.font_path {
            Some(path) => GlyphSource::from_font_file(path)?,
            None => GlyphSource::Builtin,
        };
        Ok(Self { style, glyphs })
    }

    pub fn with_glyphs(style: TextStyle, glyphs: GlyphSource) -> Self {
        Self { style, glyphs }
    }

    pub fn style(&self) -> &TextStyle {
        &self.style
    }

    fn draw_builtin(&self, surface: &mut DrawSurface<'_>, clip: Rect, text: &str) {
        let scale = glyphs::scale_for(self.style.font_size);
        let glyph_height = (glyphs::GLYPH_HEIGHT * scale) as f32;
        let mask_width = glyphs::GLYPH_WIDTH * scale;
        let y = (clip.y + (clip.height - glyph_height) * 0.5).round() as i32;
        let mut pen_x = (clip.x + TEXT_PADDING).round() as i32;

        for ch in text.chars() {
            if pen_x as f32 >= clip.x + clip.width {
                break;
            }
            let mask = glyphs::rasterize(ch, scale);
            surface.blit_coverage(pen_x, y, mask_width, &mask, self.style.foreground, clip);
            pen_x += (glyphs::GLYPH_ADVANCE * scale) as i32;
        }
    }

    fn draw_font(&self, font: &Font, surface: &mut DrawSurface<'_>, clip: Rect, text: &str) {
        let px = self.style.font_size;
        let (ascent, descent) = font
            .horizontal_line_metrics(px)
            .map(|m| (m.ascent, m.descent))
            .unwrap_or((px * 0.8, -px * 0.2));
        let baseline = clip.y + (clip.height - (ascent - descent)) * 0.5 + ascent;
        let mut pen_x = clip.x + TEXT_PADDING;

        for ch in text.chars() {
            if pen_x >= clip.x + clip.width {
                break;
            }
            let (metrics, bitmap) = font.rasterize(ch, px);
            let gx = (pen_x + metrics.xmin as f32).round() as i32;
            let gy = (baseline - metrics.height as f32 - metrics.ymin as f32).round() as i32;
            surface.blit_coverage(gx, gy, metrics.width, &bitmap, self.style.foreground, clip);
            pen_x += metrics.advance_width;
        }
    }
}

impl OverlayWidget for TextWidget {
    fn draw(&self, surface: &mut DrawSurface<'_>, frame: Rect, text: &str) -> Result<()> {
        if frame.width <= 0.0 || frame.height <= 0.0 {
            return Err(OverlayError::InvalidParameter(format!(
                "widget frame {frame:?} is empty"
            )));
        }
        surface.fill_rect(frame, self.style.background);
        surface.stroke_rect(frame, self.style.border_width, self.style.border);

        let clip = frame.inset(self.style.border_width.max(0.0));
        match &self.glyphs {
            GlyphSource::Builtin => self.draw_builtin(surface, clip, text),
            GlyphSource::Font(font) => self.draw_font(font, surface, clip, text),
        }
        Ok(())
    }
}
