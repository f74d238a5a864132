//! Placement geometry for overlay drawing.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

pub use glam::Vec2;

/// Rectangle in frame pixels, y pointing down from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    fn from_corners(min: Vec2, max: Vec2) -> Self {
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    fn corners(self) -> (Vec2, Vec2) {
        let min = Vec2::new(self.x, self.y);
        (min, min + Vec2::new(self.width, self.height))
    }

    /// Half-open: the right and bottom edges are outside.
    pub fn contains(self, point: Vec2) -> bool {
        let (min, max) = self.corners();
        point.cmpge(min).all() && point.cmplt(max).all()
    }

    pub fn intersection(self, other: Self) -> Option<Self> {
        let (a_min, a_max) = self.corners();
        let (b_min, b_max) = other.corners();
        let min = a_min.max(b_min);
        let max = a_max.min(b_max);
        min.cmplt(max).all().then(|| Self::from_corners(min, max))
    }

    /// Pulled in by `amount` on each edge; collapses to zero size rather
    /// than inverting.
    pub fn inset(self, amount: f32) -> Self {
        let (min, max) = self.corners();
        let min = min + Vec2::splat(amount);
        Self::from_corners(min, (max - Vec2::splat(amount)).max(min))
    }

    /// Whole pixels touched by this rectangle on a `width` x `height`
    /// surface, or `None` if it lies entirely off the surface.
    pub fn to_pixel_bounds(self, width: u32, height: u32) -> Option<PixelBounds> {
        let surface = Rect::new(0.0, 0.0, width as f32, height as f32);
        let (min, max) = self.intersection(surface)?.corners();
        let (min, max) = (min.floor(), max.ceil());
        let bounds = PixelBounds {
            x0: min.x as u32,
            y0: min.y as u32,
            x1: (max.x as u32).min(width),
            y1: (max.y as u32).min(height),
        };
        (!bounds.is_empty()).then_some(bounds)
    }
}

/// Pixel columns `x0..x1` by rows `y0..y1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelBounds {
    pub fn width(self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn is_empty(self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_excludes_far_edges() {
        let r = Rect::new(10.0, 10.0, 100.0, 50.0);
        assert!(r.contains(Vec2::new(10.0, 10.0)));
        assert!(r.contains(Vec2::new(109.5, 59.5)));
        assert!(!r.contains(Vec2::new(110.0, 30.0)));
        assert!(!r.contains(Vec2::new(50.0, 60.0)));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(
            a.intersection(Rect::new(50.0, 50.0, 100.0, 100.0)),
            Some(Rect::new(50.0, 50.0, 50.0, 50.0))
        );
        assert_eq!(a.intersection(Rect::new(100.0, 0.0, 10.0, 10.0)), None);
    }

    #[test]
    fn test_inset() {
        assert_eq!(
            Rect::new(50.0, 50.0, 100.0, 50.0).inset(2.0),
            Rect::new(52.0, 52.0, 96.0, 46.0)
        );
        let collapsed = Rect::new(0.0, 0.0, 2.0, 2.0).inset(5.0);
        assert_eq!((collapsed.width, collapsed.height), (0.0, 0.0));
    }

    #[test]
    fn test_pixel_bounds() {
        let clipped = Rect::new(50.0, 50.0, 100.0, 50.0).to_pixel_bounds(120, 80);
        assert_eq!(clipped, Some(PixelBounds { x0: 50, y0: 50, x1: 120, y1: 80 }));

        let partial = Rect::new(0.5, 1.25, 2.0, 1.0).to_pixel_bounds(10, 10);
        assert_eq!(partial, Some(PixelBounds { x0: 0, y0: 1, x1: 3, y1: 3 }));

        assert_eq!(Rect::new(200.0, 200.0, 10.0, 10.0).to_pixel_bounds(120, 80), None);
    }
}
