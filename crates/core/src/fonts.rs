//! Glyph rasterization for the preview.
//!
//! A configured TrueType/OpenType font is used when it loads; otherwise
//! text falls back to an 8x8 bitmap font stretched to the requested size.
//! Neither path can fail at draw time.

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};
use image::{Pixel, Rgba, RgbaImage};
use std::path::Path;

/// Bitmap glyph advance as a fraction of the font size.
pub const BITMAP_ADVANCE: f32 = 0.6;

pub struct Fonts {
    outline: Option<FontVec>,
}

impl std::fmt::Debug for Fonts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fonts").field("outline", &self.outline.is_some()).finish()
    }
}

impl Default for Fonts {
    fn default() -> Self {
        Self::bitmap_only()
    }
}

impl Fonts {
    pub fn bitmap_only() -> Self {
        Self { outline: None }
    }

    /// Loads the font at `path`. Unreadable or invalid fonts are logged and
    /// replaced by the bitmap fallback.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::bitmap_only();
        };

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "font unreadable, using bitmap font");
                return Self::bitmap_only();
            }
        };

        match FontVec::try_from_vec(bytes) {
            Ok(font) => Self { outline: Some(font) },
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "font invalid, using bitmap font");
                Self::bitmap_only()
            }
        }
    }

    pub fn has_outline_font(&self) -> bool {
        self.outline.is_some()
    }

    /// Horizontal extent of `text` at `size` pixels.
    pub fn measure(&self, text: &str, size: f32) -> f32 {
        match &self.outline {
            Some(font) => {
                let scaled = font.as_scaled(PxScale::from(size));
                let mut width = 0.0;
                let mut previous = None;
                for ch in text.chars() {
                    let id = scaled.glyph_id(ch);
                    if let Some(prev) = previous {
                        width += scaled.kern(prev, id);
                    }
                    width += scaled.h_advance(id);
                    previous = Some(id);
                }
                width
            }
            None => text.chars().count() as f32 * size * BITMAP_ADVANCE,
        }
    }

    /// Draws `text` with its top edge at `top`.
    pub(crate) fn draw(
        &self,
        image: &mut RgbaImage,
        left: f32,
        top: f32,
        text: &str,
        size: f32,
        color: Rgba<u8>,
    ) {
        if size <= 0.0 || text.is_empty() {
            return;
        }
        match &self.outline {
            Some(font) => draw_outline(font, image, left, top, text, size, color),
            None => draw_bitmap(image, left, top, text, size, color),
        }
    }
}

fn draw_outline(
    font: &FontVec,
    image: &mut RgbaImage,
    left: f32,
    top: f32,
    text: &str,
    size: f32,
    color: Rgba<u8>,
) {
    let scale = PxScale::from(size);
    let scaled = font.as_scaled(scale);
    let baseline = top + scaled.ascent();
    let mut caret = left;
    let mut previous = None;

    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        let glyph = id.with_scale_and_position(scale, ab_glyph::point(caret, baseline));
        caret += scaled.h_advance(id);
        previous = Some(id);

        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        if bounds.max.x < 0.0
            || bounds.max.y < 0.0
            || bounds.min.x >= image.width() as f32
            || bounds.min.y >= image.height() as f32
        {
            continue;
        }
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i64 + gx as i64;
            let y = bounds.min.y as i64 + gy as i64;
            let alpha = (color[3] as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
            blend(image, x, y, Rgba([color[0], color[1], color[2], alpha]));
        });
    }
}

fn draw_bitmap(image: &mut RgbaImage, left: f32, top: f32, text: &str, size: f32, color: Rgba<u8>) {
    let cell_width = size * BITMAP_ADVANCE;
    let cell_height = size;
    let columns = cell_width.ceil().max(1.0) as i64;
    let rows = cell_height.ceil().max(1.0) as i64;

    // Only the rows and columns of each cell that land on the bitmap.
    let top_px = top.floor() as i64;
    let visible_rows = (-top_px).max(0)..(i64::from(image.height()) - top_px).min(rows);

    for (index, ch) in text.chars().enumerate() {
        let origin_x = left + index as f32 * cell_width;
        if origin_x >= image.width() as f32 {
            break;
        }
        let first_column = (-(origin_x.floor() as i64)).max(0);
        let last_column = (i64::from(image.width()) - origin_x.floor() as i64).min(columns);
        if first_column >= last_column {
            continue;
        }

        let glyph = BASIC_FONTS
            .get(ch)
            .or_else(|| LATIN_FONTS.get(ch))
            .or_else(|| BASIC_FONTS.get('?'))
            .unwrap_or([0; 8]);

        for row in visible_rows.clone() {
            let glyph_row = ((row as f32 / cell_height) * 8.0) as usize;
            let bits = glyph[glyph_row.min(7)];
            if bits == 0 {
                continue;
            }
            for column in first_column..last_column {
                let glyph_column = ((column as f32 / cell_width) * 8.0) as usize;
                if bits & (1 << glyph_column.min(7)) != 0 {
                    let x = (origin_x + column as f32).floor() as i64;
                    let y = (top + row as f32).floor() as i64;
                    blend(image, x, y, color);
                }
            }
        }
    }
}

pub(crate) fn blend(image: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    image.get_pixel_mut(x as u32, y as u32).blend(&color);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_font_path_falls_back_to_bitmap() {
        let fonts = Fonts::load(Some(Path::new("/definitely/not/a/font.ttf")));
        assert!(!fonts.has_outline_font());
    }

    #[test]
    fn invalid_font_bytes_fall_back_to_bitmap() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.ttf");
        std::fs::write(&path, b"not a font").expect("write");

        assert!(!Fonts::load(Some(&path)).has_outline_font());
    }

    #[test]
    fn bitmap_measure_uses_fixed_advance() {
        let fonts = Fonts::bitmap_only();
        assert!((fonts.measure("Hi", 10.0) - 12.0).abs() < f32::EPSILON);
    }

    #[test]
    fn bitmap_text_paints_inside_its_cell() {
        let fonts = Fonts::bitmap_only();
        let mut image = RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]));
        fonts.draw(&mut image, 2.0, 2.0, "H", 16.0, Rgba([0, 0, 0, 255]));

        let painted: Vec<(u32, u32)> = image
            .enumerate_pixels()
            .filter(|(_, _, p)| p[0] == 0)
            .map(|(x, y, _)| (x, y))
            .collect();
        assert!(!painted.is_empty());
        assert!(painted.iter().all(|(x, y)| *x >= 2 && *x < 12 && *y >= 2 && *y < 18));
    }

    #[test]
    fn drawing_off_canvas_is_clipped() {
        let fonts = Fonts::bitmap_only();
        let mut image = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));
        fonts.draw(&mut image, -50.0, -50.0, "XYZ", 12.0, Rgba([0, 0, 0, 255]));
        assert!(image.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn enormous_bitmap_text_paints_only_visible_cells() {
        let fonts = Fonts::bitmap_only();
        let mut image = RgbaImage::from_pixel(16, 16, Rgba([255, 255, 255, 255]));
        // The bitmap lands on a solid part of the first glyph.
        fonts.draw(&mut image, 0.0, -4.0e5, "HHHH", 1.0e6, Rgba([0, 0, 0, 255]));
        assert!(image.pixels().all(|p| p[0] == 0));
    }
}
