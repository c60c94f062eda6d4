//! Freehand signature drawing.
//!
//! Pointer strokes are kept as polylines in pad pixels and drawn in black
//! onto a transparent canvas, ready to place or to store in the vault.

use crate::fonts::Fonts;
use crate::signature_image::encode_png;
use crate::surface::{ImageCache, Surface};
use image::{Rgba, RgbaImage};

pub const PAD_WIDTH: u32 = 480;
pub const PAD_HEIGHT: u32 = 200;
pub const PAD_STROKE_WIDTH: f32 = 3.0;
pub const PAD_INK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// A drawing pad. Strokes are point sequences; only the segments between
/// consecutive points of a stroke leave ink.
#[derive(Debug, Clone, PartialEq)]
pub struct SignaturePad {
    width: u32,
    height: u32,
    strokes: Vec<Vec<(f32, f32)>>,
    pen_down: bool,
}

impl Default for SignaturePad {
    fn default() -> Self {
        Self::new(PAD_WIDTH, PAD_HEIGHT)
    }
}

impl SignaturePad {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width: width.max(1), height: height.max(1), strokes: Vec::new(), pen_down: false }
    }

    /// Builds a pad from finished strokes, as read from a file.
    pub fn from_strokes(strokes: Vec<Vec<(f32, f32)>>) -> Self {
        Self { strokes, ..Self::default() }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn strokes(&self) -> &[Vec<(f32, f32)>] {
        &self.strokes
    }

    /// Continues the current stroke to `(x, y)`, starting one if the pen
    /// was up.
    pub fn stroke_to(&mut self, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }
        match self.strokes.last_mut() {
            Some(stroke) if self.pen_down => stroke.push((x, y)),
            _ => {
                self.strokes.push(vec![(x, y)]);
                self.pen_down = true;
            }
        }
    }

    /// Ends the current stroke; the next point starts a new one.
    pub fn lift(&mut self) {
        self.pen_down = false;
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.pen_down = false;
    }

    /// True while nothing drawn would leave ink.
    pub fn is_blank(&self) -> bool {
        self.strokes.iter().all(|stroke| stroke.len() < 2)
    }

    pub fn render(&self) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, Rgba([255, 255, 255, 0]));
        let fonts = Fonts::bitmap_only();
        let mut images = ImageCache::default();
        let mut surface = Surface::new(&mut canvas, &fonts, &mut images, 0);
        for stroke in &self.strokes {
            for segment in stroke.windows(2) {
                let ((x0, y0), (x1, y1)) = (segment[0], segment[1]);
                surface.draw_line(x0, y0, x1, y1, PAD_STROKE_WIDTH, PAD_INK);
            }
        }
        canvas
    }

    /// The drawing as PNG bytes.
    pub fn to_png(&self) -> Result<Vec<u8>, image::ImageError> {
        encode_png(&self.render())
    }
}
