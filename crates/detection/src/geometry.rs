//! Bounding-box geometry

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in model-input pixel space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

impl BoundingBox {
    pub fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> u32 {
        self.width as u32 * self.height as u32
    }

    /// Intersection-over-union with `other`.
    ///
    /// 0 for disjoint rectangles; otherwise intersection area over union
    /// area, where the union counts the overlap once. Symmetric in its
    /// arguments.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x.max(other.x) as u32;
        let y1 = self.y.max(other.y) as u32;
        let x2 = (self.x as u32 + self.width as u32).min(other.x as u32 + other.width as u32);
        let y2 = (self.y as u32 + self.height as u32).min(other.y as u32 + other.height as u32);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;
        if union == 0 {
            return 0.0;
        }

        intersection as f32 / union as f32
    }
}
