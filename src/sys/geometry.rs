//! Platform-neutral geometry in the window server's (top-left origin)
//! coordinate space.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self { Point { x, y } }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self { Size { width, height } }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Default for Rect {
    fn default() -> Self { Rect::NULL }
}

impl Rect {
    /// The identity for [`Rect::union`]. Mirrors the CoreGraphics null rect.
    pub const NULL: Rect = Rect {
        origin: Point { x: f64::INFINITY, y: f64::INFINITY },
        size: Size { width: 0.0, height: 0.0 },
    };

    pub const fn new(origin: Point, size: Size) -> Self { Rect { origin, size } }

    pub const fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Rect::new(Point::new(x, y), Size::new(width, height))
    }

    pub fn is_null(&self) -> bool { self.origin.x.is_infinite() || self.origin.y.is_infinite() }

    pub fn is_empty(&self) -> bool {
        self.is_null() || self.size.width <= 0.0 || self.size.height <= 0.0
    }

    pub fn min_x(&self) -> f64 { self.origin.x }

    pub fn min_y(&self) -> f64 { self.origin.y }

    pub fn max_x(&self) -> f64 { self.origin.x + self.size.width }

    pub fn max_y(&self) -> f64 { self.origin.y + self.size.height }

    pub fn width(&self) -> f64 { self.size.width }

    pub fn height(&self) -> f64 { self.size.height }

    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_null() {
            return *other;
        }
        if other.is_null() {
            return *self;
        }
        let min_x = self.min_x().min(other.min_x());
        let min_y = self.min_y().min(other.min_y());
        let max_x = self.max_x().max(other.max_x());
        let max_y = self.max_y().max(other.max_y());
        Rect::from_xywh(min_x, min_y, max_x - min_x, max_y - min_y)
    }

    /// Edges that merely touch do not count as intersecting.
    pub fn intersects(&self, other: &Rect) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min_x() < other.max_x()
            && other.min_x() < self.max_x()
            && self.min_y() < other.max_y()
            && other.min_y() < self.max_y()
    }

    pub fn scaled(&self, factor: f64) -> Rect {
        Rect::from_xywh(
            self.origin.x * factor,
            self.origin.y * factor,
            self.size.width * factor,
            self.size.height * factor,
        )
    }
}
