//! Application configuration.
//!
//! Everything has a `Default`, so a missing or partial config file still
//! yields a complete configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::color::Color;
use crate::error::{OverlayError, Result};
use crate::geometry::Rect;
use crate::time::FrameRate;

/// Global application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Frame compositor settings.
    pub compositor: CompositorConfig,

    /// Export session settings.
    pub export: ExportConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Configuration for the frame compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Worker threads rendering frames; 0 means one per CPU.
    pub worker_threads: usize,

    /// Width of the diagnostic diagonal stroke in pixels.
    pub stroke_width: f32,

    /// Color of the diagnostic diagonal stroke.
    pub stroke_color: Color,

    /// Where the text widget is drawn.
    pub widget_frame: Rect,

    /// Look of the text widget.
    pub text: TextStyle,
}

/// Style of the timestamp text widget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextStyle {
    /// Font size in pixels.
    pub font_size: f32,

    /// Text color.
    pub foreground: Color,

    /// Fill behind the text.
    pub background: Color,

    /// Border color.
    pub border: Color,

    /// Border width in pixels.
    pub border_width: f32,

    /// TrueType font to rasterize with; the built-in glyphs are used when unset.
    pub font_path: Option<PathBuf>,
}

/// Output sink used by an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Packed BGRA frames written back to back.
    #[default]
    Raw,
    /// Frames piped into an `ffmpeg` process.
    Ffmpeg,
}

/// Export session parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output file path.
    pub output: PathBuf,

    /// Output frame rate.
    pub frame_rate: FrameRate,

    /// Cap on the exported duration in seconds.
    pub max_duration_secs: f64,

    /// Frame requests kept in flight at once.
    pub max_in_flight: usize,

    /// How often progress is reported, in milliseconds.
    pub report_interval_ms: u64,

    /// Where frames go.
    pub sink: SinkKind,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "vidoverlay_compositor=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            stroke_width: 100.0,
            stroke_color: Color::GREEN,
            widget_frame: Rect::new(50.0, 50.0, 100.0, 50.0),
            text: TextStyle::default(),
        }
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_size: 25.0,
            foreground: Color::WHITE,
            background: Color::BLACK.with_alpha(0.4),
            border: Color::WHITE,
            border_width: 2.0,
            font_path: None,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("out.bgra"),
            frame_rate: FrameRate::FPS_30,
            max_duration_secs: 2.5,
            max_in_flight: crate::budget::LOOKAHEAD_FRAMES,
            report_interval_ms: 250,
            sink: SinkKind::Raw,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` (or the standard location), falling back to defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_path() {
                Some(p) if p.exists() => p,
                _ => return Self::default(),
            },
        };
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config at {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Save config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.compositor.stroke_width < 0.0 {
            return Err(OverlayError::Config("stroke_width must not be negative".into()));
        }
        if self.compositor.text.font_size <= 0.0 {
            return Err(OverlayError::Config("font_size must be positive".into()));
        }
        if self.export.frame_rate.numerator == 0 || self.export.frame_rate.denominator == 0 {
            return Err(OverlayError::Config(format!(
                "invalid frame rate {}/{}",
                self.export.frame_rate.numerator, self.export.frame_rate.denominator
            )));
        }
        if self.export.max_in_flight == 0 {
            return Err(OverlayError::Config("max_in_flight must be at least 1".into()));
        }
        if self.export.max_duration_secs <= 0.0 {
            return Err(OverlayError::Config("max_duration_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Standard config file location.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("vidoverlay").join("config.json"))
}
