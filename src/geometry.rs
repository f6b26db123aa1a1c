use serde::{Deserialize, Serialize};

/// A point in image or display coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Scale both coordinates by a uniform factor.
    pub fn scaled(self, factor: f32) -> Self {
        Self {
            x: self.x * factor,
            y: self.y * factor,
        }
    }
}

/// An axis-aligned rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> u32 {
        self.left + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.top + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Clamp this rectangle to fit inside a `bound_width` x `bound_height`
    /// area anchored at the origin. Returns an empty rect at the origin when
    /// there is no overlap.
    pub fn clamped_to(&self, bound_width: u32, bound_height: u32) -> Rect {
        let left = self.left.min(bound_width);
        let top = self.top.min(bound_height);
        let width = self.width.min(bound_width - left);
        let height = self.height.min(bound_height - top);
        Rect {
            left,
            top,
            width,
            height,
        }
    }

    /// A rectangle of the given size centred inside `bound_width` x
    /// `bound_height`.
    pub fn centered_in(width: u32, height: u32, bound_width: u32, bound_height: u32) -> Rect {
        let width = width.min(bound_width);
        let height = height.min(bound_height);
        Rect {
            left: (bound_width - width) / 2,
            top: (bound_height - height) / 2,
            width,
            height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_scaling() {
        let p = Point::new(10.0, 20.0).scaled(0.5);
        assert_eq!(p, Point::new(5.0, 10.0));
    }

    #[test]
    fn test_rect_clamping() {
        let r = Rect::new(100, 100, 500, 500).clamped_to(400, 300);
        assert_eq!(r, Rect::new(100, 100, 300, 200));

        let outside = Rect::new(500, 500, 10, 10).clamped_to(400, 300);
        assert!(outside.is_empty());
    }

    #[test]
    fn test_rect_centering() {
        let r = Rect::centered_in(200, 100, 640, 480);
        assert_eq!(r, Rect::new(220, 190, 200, 100));

        // Oversized requests shrink to the bound.
        let r = Rect::centered_in(1000, 1000, 640, 480);
        assert_eq!(r, Rect::new(0, 0, 640, 480));
    }
}
