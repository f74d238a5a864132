//! Overlay colors.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Linear RGBA in `0.0..=1.0`, straight (not premultiplied) alpha.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Channels scaled by alpha.
    #[inline]
    pub fn premultiply(self) -> Self {
        let Self { r, g, b, a } = self;
        Self::new(r * a, g * a, b * a, a)
    }

    /// Premultiplied bytes in memory order of a little-endian 32-bit
    /// alpha-first pixel: blue, green, red, alpha.
    #[inline]
    pub fn to_bgra8(self) -> [u8; 4] {
        let Self { r, g, b, a } = self.premultiply();
        [b, g, r, a].map(quantize)
    }
}

fn quantize(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_stored_blue_first() {
        assert_eq!(Color::RED.to_bgra8(), [0, 0, 255, 255]);
        assert_eq!(Color::GREEN.to_bgra8(), [0, 255, 0, 255]);
        assert_eq!(Color::BLUE.to_bgra8(), [255, 0, 0, 255]);
    }

    #[test]
    fn test_alpha_scales_channels() {
        assert_eq!(Color::WHITE.with_alpha(0.5).to_bgra8(), [128, 128, 128, 128]);
        assert_eq!(Color::BLACK.with_alpha(0.4).to_bgra8(), [0, 0, 0, 102]);
        assert_eq!(Color::TRANSPARENT.to_bgra8(), [0; 4]);
    }

    #[test]
    fn test_out_of_range_channels_clamp() {
        assert_eq!(Color::new(2.0, -1.0, 0.5, 1.0).to_bgra8(), [128, 0, 255, 255]);
    }
}
