//! Document space and view space.
//!
//! Document space is points on the unrotated page at zoom 1. View space is
//! pixels of the rasterized preview. The two differ only by the zoom
//! factor; rotation is baked into the page raster by the engine and never
//! applied to annotation geometry.

use serde::{Deserialize, Serialize};

pub const MIN_ZOOM: f32 = 0.25;
pub const MAX_ZOOM: f32 = 5.0;

/// A point in document space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PageCoordinate {
    pub x: f32,
    pub y: f32,
}

impl PageCoordinate {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &PageCoordinate) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn translated(self, dx: f32, dy: f32) -> Self {
        Self { x: self.x + dx, y: self.y + dy }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// A point in view space, relative to the page raster's top-left pixel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ViewPoint {
    pub x: f32,
    pub y: f32,
}

impl ViewPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// How far the viewport has scrolled into the page raster, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollOffset {
    pub x: f32,
    pub y: f32,
}

impl ScrollOffset {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A zoom factor that is always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Zoom(f32);

impl Default for Zoom {
    fn default() -> Self {
        Self(1.0)
    }
}

impl Zoom {
    /// Clamps `factor` into `[MIN_ZOOM, MAX_ZOOM]`. Non-finite input
    /// yields 1.0.
    pub fn new(factor: f32) -> Self {
        Self::clamped(factor, MIN_ZOOM, MAX_ZOOM)
    }

    /// Clamps into `[min, max]`, which is itself kept inside
    /// `[MIN_ZOOM, MAX_ZOOM]`.
    pub fn clamped(factor: f32, min: f32, max: f32) -> Self {
        let min = min.clamp(MIN_ZOOM, MAX_ZOOM);
        let max = max.clamp(min, MAX_ZOOM);
        if !factor.is_finite() {
            return Self(1.0_f32.clamp(min, max));
        }
        Self(factor.clamp(min, max))
    }

    pub fn factor(self) -> f32 {
        self.0
    }
}

/// Axis-aligned rectangle in view space, corners in any order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl ViewRect {
    pub fn from_corners(ax: f32, ay: f32, bx: f32, by: f32) -> Self {
        Self { x0: ax.min(bx), y0: ay.min(by), x1: ax.max(bx), y1: ay.max(by) }
    }

    pub fn expanded(self, margin: f32) -> Self {
        Self {
            x0: self.x0 - margin,
            y0: self.y0 - margin,
            x1: self.x1 + margin,
            y1: self.y1 + margin,
        }
    }

    /// Inclusive on every edge.
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 && x <= self.x1 && y >= self.y0 && y <= self.y1
    }
}

pub fn to_view(point: PageCoordinate, zoom: Zoom) -> ViewPoint {
    ViewPoint { x: point.x * zoom.factor(), y: point.y * zoom.factor() }
}

pub fn to_doc(point: ViewPoint, zoom: Zoom, scroll: ScrollOffset) -> PageCoordinate {
    PageCoordinate {
        x: (point.x + scroll.x) / zoom.factor(),
        y: (point.y + scroll.y) / zoom.factor(),
    }
}
