//! The drawing surface annotations render onto.
//!
//! A `Surface` borrows the page bitmap for one composite pass. All
//! coordinates are view-space pixels; shapes are drawn without
//! anti-aliasing except for outline-font glyphs.

use crate::annotation::AnnotationId;
use crate::fonts::{blend, Fonts};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use std::collections::HashMap;

pub const SELECTION_COLOR: Rgba<u8> = Rgba([0, 0, 255, 255]);
pub const SELECTION_WIDTH: f32 = 2.0;

/// Decoded signature bitmaps, keyed by annotation, plus the visible slice
/// of the last scaled size.
#[derive(Debug, Default)]
pub struct ImageCache {
    decoded: HashMap<AnnotationId, RgbaImage>,
    scaled: HashMap<AnnotationId, (ScaledKey, RgbaImage)>,
}

/// Target box size and the visible window `[x0, x1) x [y0, y1)` within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScaledKey {
    width: u32,
    height: u32,
    window: (u32, u32, u32, u32),
}

impl ImageCache {
    fn scaled(&mut self, id: AnnotationId, bytes: &[u8], key: ScaledKey) -> Result<&RgbaImage, image::ImageError> {
        if !self.decoded.contains_key(&id) {
            let decoded = image::load_from_memory(bytes)?.to_rgba8();
            self.decoded.insert(id, decoded);
        }
        let stale = self.scaled.get(&id).map_or(true, |(cached, _)| *cached != key);
        if stale {
            if let Some(source) = self.decoded.get(&id) {
                self.scaled.insert(id, (key, scale_window(source, key)));
            }
        }
        self.scaled.get(&id).map(|(_, image)| image).ok_or_else(|| {
            image::ImageError::Parameter(image::error::ParameterError::from_kind(
                image::error::ParameterErrorKind::DimensionMismatch,
            ))
        })
    }

    /// Drops entries for annotations `keep` rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(&AnnotationId) -> bool) {
        self.decoded.retain(|id, _| keep(id));
        self.scaled.retain(|id, _| self.decoded.contains_key(id));
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }
}

pub struct Surface<'a> {
    image: &'a mut RgbaImage,
    fonts: &'a Fonts,
    images: &'a mut ImageCache,
    highlight_alpha: u8,
}

impl<'a> Surface<'a> {
    pub fn new(
        image: &'a mut RgbaImage,
        fonts: &'a Fonts,
        images: &'a mut ImageCache,
        highlight_alpha: u8,
    ) -> Self {
        Self { image, fonts, images, highlight_alpha }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn highlight_alpha(&self) -> u8 {
        self.highlight_alpha
    }

    /// Pixel columns covering `[from, to]`, clipped to the bitmap.
    fn columns(&self, from: f32, to: f32) -> (i64, i64) {
        clip(pixel_span(from, to), self.image.width())
    }

    /// Pixel rows covering `[from, to]`, clipped to the bitmap.
    fn rows(&self, from: f32, to: f32) -> (i64, i64) {
        clip(pixel_span(from, to), self.image.height())
    }

    pub fn fill_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
        let (left, right) = self.columns(x0.min(x1), x0.max(x1));
        let (top, bottom) = self.rows(y0.min(y1), y0.max(y1));
        for y in top..bottom {
            for x in left..right {
                blend(self.image, x, y, color);
            }
        }
    }

    /// Outline drawn inward from the rectangle's edges.
    pub fn stroke_rect(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, width: f32, color: Rgba<u8>) {
        let (left, right) = (x0.min(x1), x0.max(x1));
        let (top, bottom) = (y0.min(y1), y0.max(y1));
        let w = width.max(1.0).min((right - left) / 2.0).min((bottom - top) / 2.0).max(1.0);

        self.fill_rect(left, top, right, top + w, color);
        self.fill_rect(left, bottom - w, right, bottom, color);
        self.fill_rect(left, top + w, left + w, bottom - w, color);
        self.fill_rect(right - w, top + w, right, bottom - w, color);
    }

    pub fn draw_line(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, width: f32, color: Rgba<u8>) {
        let half = width.max(1.0) / 2.0;
        let (left, right) = self.columns(x0.min(x1) - half, x0.max(x1) + half);
        let (top, bottom) = self.rows(y0.min(y1) - half, y0.max(y1) + half);

        for y in top..bottom {
            for x in left..right {
                let (cx, cy) = (x as f32 + 0.5, y as f32 + 0.5);
                if distance_to_segment(cx, cy, x0, y0, x1, y1) <= half {
                    blend(self.image, x, y, color);
                }
            }
        }
    }

    /// Even-odd scanline fill sampled at pixel centres.
    pub fn fill_polygon(&mut self, points: &[(f32, f32)], color: Rgba<u8>) {
        if points.len() < 3 {
            return;
        }
        let min_y = points.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_y = points.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
        let (top, bottom) = self.rows(min_y, max_y);
        let last_column = i64::from(self.image.width()) - 1;

        let mut crossings = Vec::with_capacity(points.len());
        for y in top..bottom {
            let cy = y as f32 + 0.5;
            crossings.clear();
            for (i, &(ax, ay)) in points.iter().enumerate() {
                let (bx, by) = points[(i + 1) % points.len()];
                if (ay <= cy && by > cy) || (by <= cy && ay > cy) {
                    crossings.push(ax + (cy - ay) / (by - ay) * (bx - ax));
                }
            }
            crossings.sort_by(f32::total_cmp);
            for pair in crossings.chunks_exact(2) {
                let left = ((pair[0] - 0.5).ceil() as i64).max(0);
                let right = ((pair[1] - 0.5).floor() as i64).min(last_column);
                for x in left..=right {
                    blend(self.image, x, y, color);
                }
            }
        }
    }

    pub fn fill_ellipse(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, color: Rgba<u8>) {
        let outer = Ellipse::new(x0, y0, x1, y1);
        self.paint_where(x0, y0, x1, y1, color, |x, y| outer.contains(x, y));
    }

    pub fn stroke_ellipse(&mut self, x0: f32, y0: f32, x1: f32, y1: f32, width: f32, color: Rgba<u8>) {
        let outer = Ellipse::new(x0, y0, x1, y1);
        let inner = outer.inset(width.max(1.0));
        self.paint_where(x0, y0, x1, y1, color, |x, y| {
            outer.contains(x, y) && !inner.is_some_and(|inner| inner.contains(x, y))
        });
    }

    /// Rounded outline drawn inward, like `stroke_rect`.
    pub fn stroke_rounded_rect(
        &mut self,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        radius: f32,
        width: f32,
        color: Rgba<u8>,
    ) {
        let outer = RoundedRect::new(x0, y0, x1, y1, radius);
        let inner = outer.inset(width.max(1.0));
        self.paint_where(x0, y0, x1, y1, color, |x, y| {
            outer.contains(x, y) && !inner.contains(x, y)
        });
    }

    /// Alpha-composites `overlay` with its top-left at (`x`, `y`).
    pub fn draw_image(&mut self, overlay: &RgbaImage, x: i64, y: i64) {
        let (left, right) = clip((x, x + i64::from(overlay.width())), self.image.width());
        let (top, bottom) = clip((y, y + i64::from(overlay.height())), self.image.height());
        for py in top..bottom {
            for px in left..right {
                let pixel = *overlay.get_pixel((px - x) as u32, (py - y) as u32);
                blend(self.image, px, py, pixel);
            }
        }
    }

    /// Decodes and scales a signature bitmap through the cache, then
    /// composites it. Only the part of the box inside the bitmap is scaled;
    /// a box entirely off the bitmap is not decoded at all.
    pub fn draw_signature(
        &mut self,
        id: AnnotationId,
        bytes: &[u8],
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), image::ImageError> {
        let width = width.round().max(1.0) as u32;
        let height = height.round().max(1.0) as u32;
        let (x, y) = (x.round() as i64, y.round() as i64);

        let (left, right) = clip((x, x.saturating_add(i64::from(width))), self.image.width());
        let (top, bottom) = clip((y, y.saturating_add(i64::from(height))), self.image.height());
        if left >= right || top >= bottom {
            return Ok(());
        }

        let window = ((left - x) as u32, (top - y) as u32, (right - x) as u32, (bottom - y) as u32);
        let scaled = self.images.scaled(id, bytes, ScaledKey { width, height, window })?;
        for (ox, oy, pixel) in scaled.enumerate_pixels() {
            blend(self.image, left + i64::from(ox), top + i64::from(oy), *pixel);
        }
        Ok(())
    }

    pub fn measure_text(&self, text: &str, size: f32) -> f32 {
        self.fonts.measure(text, size)
    }

    /// Draws `text` with its top edge at `top`.
    pub fn draw_text(&mut self, left: f32, top: f32, text: &str, size: f32, color: Rgba<u8>) {
        self.fonts.draw(self.image, left, top, text, size, color);
    }

    fn paint_where(
        &mut self,
        x0: f32,
        y0: f32,
        x1: f32,
        y1: f32,
        color: Rgba<u8>,
        inside: impl Fn(f32, f32) -> bool,
    ) {
        let (left, right) = self.columns(x0.min(x1), x0.max(x1));
        let (top, bottom) = self.rows(y0.min(y1), y0.max(y1));
        for y in top..bottom {
            for x in left..right {
                if inside(x as f32 + 0.5, y as f32 + 0.5) {
                    blend(self.image, x, y, color);
                }
            }
        }
    }
}

/// Integer pixel range `[start, end)` covering `[from, to]`.
fn pixel_span(from: f32, to: f32) -> (i64, i64) {
    let start = from.round() as i64;
    let end = (to.round() as i64).max(start.saturating_add(1));
    (start, end)
}

fn clip((start, end): (i64, i64), limit: u32) -> (i64, i64) {
    (start.max(0), end.min(i64::from(limit)))
}

/// Scales `source` to `key.width x key.height` and keeps only `key.window`.
///
/// The matching region of the source is cropped first, so the work is
/// bounded by the visible window rather than the full target size.
fn scale_window(source: &RgbaImage, key: ScaledKey) -> RgbaImage {
    let (x0, y0, x1, y1) = key.window;
    if (x0, y0, x1, y1) == (0, 0, key.width, key.height) {
        return imageops::resize(source, key.width, key.height, FilterType::Lanczos3);
    }

    let sx = f64::from(source.width()) / f64::from(key.width);
    let sy = f64::from(source.height()) / f64::from(key.height);
    let src_x0 = ((f64::from(x0) * sx).floor() as u32).min(source.width().saturating_sub(1));
    let src_y0 = ((f64::from(y0) * sy).floor() as u32).min(source.height().saturating_sub(1));
    let src_x1 = ((f64::from(x1) * sx).ceil() as u32).clamp(src_x0 + 1, source.width());
    let src_y1 = ((f64::from(y1) * sy).ceil() as u32).clamp(src_y0 + 1, source.height());

    let region = imageops::crop_imm(source, src_x0, src_y0, src_x1 - src_x0, src_y1 - src_y0).to_image();
    imageops::resize(&region, x1 - x0, y1 - y0, FilterType::Lanczos3)
}

fn distance_to_segment(px: f32, py: f32, x0: f32, y0: f32, x1: f32, y1: f32) -> f32 {
    let dx = x1 - x0;
    let dy = y1 - y0;
    let length_sq = dx * dx + dy * dy;
    if length_sq < 1e-6 {
        return ((px - x0).powi(2) + (py - y0).powi(2)).sqrt();
    }
    let t = (((px - x0) * dx + (py - y0) * dy) / length_sq).clamp(0.0, 1.0);
    let (cx, cy) = (x0 + t * dx, y0 + t * dy);
    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

#[derive(Debug, Clone, Copy)]
struct Ellipse {
    cx: f32,
    cy: f32,
    rx: f32,
    ry: f32,
}

impl Ellipse {
    fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            cx: (x0 + x1) / 2.0,
            cy: (y0 + y1) / 2.0,
            rx: ((x1 - x0) / 2.0).abs(),
            ry: ((y1 - y0) / 2.0).abs(),
        }
    }

    fn inset(self, by: f32) -> Option<Self> {
        (self.rx > by && self.ry > by).then_some(Self { rx: self.rx - by, ry: self.ry - by, ..self })
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        if self.rx <= 0.0 || self.ry <= 0.0 {
            return false;
        }
        let nx = (x - self.cx) / self.rx;
        let ny = (y - self.cy) / self.ry;
        nx * nx + ny * ny <= 1.0
    }
}

#[derive(Debug, Clone, Copy)]
struct RoundedRect {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
    radius: f32,
}

impl RoundedRect {
    fn new(x0: f32, y0: f32, x1: f32, y1: f32, radius: f32) -> Self {
        let (x0, x1) = (x0.min(x1), x0.max(x1));
        let (y0, y1) = (y0.min(y1), y0.max(y1));
        let radius = radius.max(0.0).min((x1 - x0) / 2.0).min((y1 - y0) / 2.0);
        Self { x0, y0, x1, y1, radius }
    }

    fn inset(self, by: f32) -> Self {
        Self {
            x0: self.x0 + by,
            y0: self.y0 + by,
            x1: self.x1 - by,
            y1: self.y1 - by,
            radius: (self.radius - by).max(0.0),
        }
    }

    fn contains(&self, x: f32, y: f32) -> bool {
        if x < self.x0 || x > self.x1 || y < self.y0 || y > self.y1 {
            return false;
        }
        let r = self.radius;
        let cx = x.clamp(self.x0 + r, self.x1 - r);
        let cy = y.clamp(self.y0 + r, self.y1 - r);
        (x - cx).powi(2) + (y - cy).powi(2) <= r * r
    }
}
