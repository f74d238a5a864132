//! The per-frame overlay pass: a diagnostic stroke, then every widget.

use std::sync::Arc;
use vidoverlay_core::{Color, CompositorConfig, FrameRate, RationalTime, Rect, Result, Vec2};

use crate::surface::DrawSurface;
use crate::widget::OverlayWidget;

/// How the composition time is written into the overlay text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampFormat {
    /// Seconds with millisecond precision, e.g. `1.500s`.
    #[default]
    Seconds,
    /// `HH:MM:SS:FF` at the given rate.
    Timecode(FrameRate),
    /// Timecode followed by seconds, e.g. `00:00:01:15 (1.500s)`.
    TimecodeWithSeconds(FrameRate),
}

impl TimestampFormat {
    pub fn format(self, time: RationalTime) -> String {
        match self {
            Self::Seconds => time.to_string(),
            Self::Timecode(rate) => time.to_timecode(rate),
            Self::TimecodeWithSeconds(rate) => format!("{} ({time})", time.to_timecode(rate)),
        }
    }
}

/// Geometry and colors of the overlay pass.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawParams {
    /// Width of the diagnostic stroke; 0 disables it.
    pub stroke_width: f32,
    pub stroke_color: Color,
    /// Stroke endpoints; `None` strokes the full buffer diagonal.
    pub stroke: Option<(Vec2, Vec2)>,
    /// Rectangle every widget is drawn in.
    pub widget_frame: Rect,
    pub timestamp: TimestampFormat,
}

impl Default for DrawParams {
    fn default() -> Self {
        Self::from(&CompositorConfig::default())
    }
}

impl From<&CompositorConfig> for DrawParams {
    fn from(config: &CompositorConfig) -> Self {
        Self {
            stroke_width: config.stroke_width,
            stroke_color: config.stroke_color,
            stroke: None,
            widget_frame: config.widget_frame,
            timestamp: TimestampFormat::Seconds,
        }
    }
}

/// Draw the stroke and then each widget with `text`.
///
/// Runs entirely against the caller's surface, so it can only happen while
/// the buffer is locked.
pub fn draw_overlay(
    surface: &mut DrawSurface<'_>,
    params: &DrawParams,
    widgets: &[Arc<dyn OverlayWidget>],
    text: &str,
) -> Result<()> {
    if params.stroke_width > 0.0 {
        let (from, to) = params.stroke.unwrap_or((
            Vec2::ZERO,
            Vec2::new(surface.width() as f32, surface.height() as f32),
        ));
        surface.stroke_line(from, to, params.stroke_width, params.stroke_color);
    }

    for widget in widgets {
        widget.draw(surface, params.widget_frame, text)?;
    }
    Ok(())
}
