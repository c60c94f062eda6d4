//! Clean-up for uploaded signature images.
//!
//! An upload is decoded, its paper background made transparent, its
//! strokes sharpened, then shrunk into the placement box and centred on a
//! transparent canvas of exactly that size.

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;

/// Channels at or above this on all of R, G and B count as paper.
pub const WHITE_THRESHOLD: u8 = 240;

const UNSHARP_SIGMA: f32 = 2.0;
/// Share of the difference from the blurred image added back (150%).
const UNSHARP_AMOUNT: f32 = 1.5;
/// Channel differences below this are left alone.
const UNSHARP_THRESHOLD: i32 = 3;
/// Contrast factor around the mean grey level; 1.2 is 20% more contrast.
const CONTRAST_FACTOR: f32 = 1.2;

/// Makes near-white pixels fully transparent. Colour values are kept.
pub fn remove_background(image: &RgbaImage) -> RgbaImage {
    let mut out = image.clone();
    for pixel in out.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if r >= WHITE_THRESHOLD && g >= WHITE_THRESHOLD && b >= WHITE_THRESHOLD {
            pixel.0[3] = 0;
        }
    }
    out
}

/// Unsharp mask followed by a contrast boost on the colour channels. Alpha
/// is carried over untouched.
pub fn sharpen(image: &RgbaImage) -> RgbaImage {
    let mut out = unsharp_mask(image);
    enhance_contrast(&mut out, CONTRAST_FACTOR);
    out
}

fn unsharp_mask(image: &RgbaImage) -> RgbaImage {
    let blurred = imageops::blur(image, UNSHARP_SIGMA);
    let mut out = image.clone();
    for (pixel, soft) in out.pixels_mut().zip(blurred.pixels()) {
        for channel in 0..3 {
            let value = i32::from(pixel.0[channel]);
            let diff = value - i32::from(soft.0[channel]);
            if diff.abs() >= UNSHARP_THRESHOLD {
                pixel.0[channel] = to_channel(value as f32 + diff as f32 * UNSHARP_AMOUNT);
            }
        }
    }
    out
}

/// Scales each colour channel's distance from the image's mean grey level
/// by `factor`.
fn enhance_contrast(image: &mut RgbaImage, factor: f32) {
    let count = u64::from(image.width()) * u64::from(image.height());
    if count == 0 {
        return;
    }
    let total: u64 = image.pixels().map(|pixel| u64::from(luma(pixel))).sum();
    let mean = (total as f64 / count as f64).round() as f32;

    for pixel in image.pixels_mut() {
        for channel in 0..3 {
            let value = f32::from(pixel.0[channel]);
            pixel.0[channel] = to_channel(mean + (value - mean) * factor);
        }
    }
}

/// ITU-R 601 luma in 16-bit fixed point.
fn luma(pixel: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    ((u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16) as u8
}

fn to_channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Shrinks `image` to fit `width` x `height` keeping its aspect ratio and
/// centres it on a transparent canvas of that size. Images already small
/// enough are not enlarged.
pub fn fit_to_box(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let width = width.max(1);
    let height = height.max(1);
    let (iw, ih) = image.dimensions();

    let scale = (width as f32 / iw.max(1) as f32)
        .min(height as f32 / ih.max(1) as f32)
        .min(1.0);
    let fit_w = ((iw as f32 * scale).round() as u32).clamp(1, width);
    let fit_h = ((ih as f32 * scale).round() as u32).clamp(1, height);

    let resized = if (fit_w, fit_h) == (iw, ih) {
        image.clone()
    } else {
        imageops::resize(image, fit_w, fit_h, FilterType::Lanczos3)
    };

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 0]));
    let x = (width - fit_w) / 2;
    let y = (height - fit_h) / 2;
    imageops::overlay(&mut canvas, &resized, x as i64, y as i64);
    canvas
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Full upload pipeline. `target` is the placement box in pixels.
pub fn prepare_upload(bytes: &[u8], target: (u32, u32)) -> Result<Vec<u8>, image::ImageError> {
    let decoded = image::load_from_memory(bytes)?.to_rgba8();
    let cleaned = sharpen(&remove_background(&decoded));
    let fitted = fit_to_box(&cleaned, target.0, target.1);
    tracing::debug!(
        source_width = decoded.width(),
        source_height = decoded.height(),
        width = fitted.width(),
        height = fitted.height(),
        "signature image prepared"
    );
    encode_png(&fitted)
}
