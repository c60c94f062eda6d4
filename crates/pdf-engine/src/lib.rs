//! PDF engine contract used by the annotation core.
//!
//! Mutation methods take page-space coordinates: points on the unrotated
//! page with the origin at its top-left corner and y growing downward,
//! the frame a rasterized page has at zoom 1. Backends map them into PDF
//! user space. Page indices are zero-based.

mod content;
mod lopdf_backend;
pub mod recording;

pub use lopdf_backend::{blank_pdf, LopdfDocument, LopdfEngine};
pub use recording::{Primitive, RecordingDocument, RecordingEngine};

use image::{ImageBuffer, Rgba};
use std::path::{Path, PathBuf};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// US Letter, used when a page carries no readable MediaBox.
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

impl PdfPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl PdfRect {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Same rectangle with `x0 <= x1` and `y0 <= y1`.
    pub fn normalized(self) -> Self {
        Self {
            x0: self.x0.min(self.x1),
            y0: self.y0.min(self.y1),
            x1: self.x0.max(self.x1),
            y1: self.y0.max(self.y1),
        }
    }

    pub fn width(&self) -> f32 {
        (self.x1 - self.x0).abs()
    }

    pub fn height(&self) -> f32 {
        (self.y1 - self.y0).abs()
    }
}

/// Page rotation in quarter turns, clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalizes any multiple of 90 (negative included) into a rotation.
    pub fn from_degrees(degrees: i64) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        match degrees.rem_euclid(360) {
            0 => Some(Self::Deg0),
            90 => Some(Self::Deg90),
            180 => Some(Self::Deg180),
            270 => Some(Self::Deg270),
            _ => None,
        }
    }

    pub fn degrees(self) -> i64 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn rotate_by(self, other: Rotation) -> Self {
        Self::from_degrees(self.degrees() + other.degrees()).unwrap_or_default()
    }

    pub fn clockwise(self) -> Self {
        self.rotate_by(Self::Deg90)
    }

    pub fn counter_clockwise(self) -> Self {
        self.rotate_by(Self::Deg270)
    }

    /// True when width and height trade places.
    pub fn is_sideways(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub zoom: f32,
    /// Applied on top of the rotation stored in the document.
    pub rotation: Rotation,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, zoom: 1.0, rotation: Rotation::Deg0 }
    }
}

/// The Base-14 families text is written with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StandardFont {
    #[default]
    Helvetica,
    TimesRoman,
    Courier,
}

impl StandardFont {
    /// Maps a free-form family name onto a Base-14 family. Unknown names
    /// fall back to Helvetica.
    pub fn from_family(family: &str) -> Self {
        let lower = family.to_ascii_lowercase();
        if lower.contains("times") || (lower.contains("serif") && !lower.contains("sans")) {
            Self::TimesRoman
        } else if lower.contains("courier") || lower.contains("mono") {
            Self::Courier
        } else {
            Self::Helvetica
        }
    }

    pub fn base_font_name(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica",
            Self::TimesRoman => "Times-Roman",
            Self::Courier => "Courier",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub font: StandardFont,
    pub size: f32,
    pub color: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrokeStyle {
    pub color: [f32; 3],
    pub width: f32,
    pub fill: Option<[f32; 3]>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Rectangle(PdfRect),
    Ellipse(PdfRect),
    Line { from: PdfPoint, to: PdfPoint },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncryptionMode {
    /// Write with the source's protection. Fails for encrypted sources.
    #[default]
    Keep,
    /// Write an unprotected file.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub compress: bool,
    pub encryption: EncryptionMode,
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { compress: true, encryption: EncryptionMode::Keep }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("document is encrypted and needs a password")]
    PasswordRequired,
    #[error("incorrect password")]
    WrongPassword,
    #[error("re-encrypting on save is not supported; save unprotected instead")]
    EncryptionUnsupported,
    #[error("invalid page rotation {0}")]
    InvalidRotation(i64),
    #[error("backend error: {0}")]
    Backend(String),
}

pub trait PdfEngine {
    type Document: PdfDocument;

    /// Opens a document. An empty password is always tried first for
    /// encrypted sources, then `password`.
    fn open(
        &self,
        source: OpenSource,
        password: Option<&str>,
    ) -> Result<Self::Document, PdfEngineError>;
}

/// An open document. Cloning forks it: mutations on the clone never reach
/// the original.
pub trait PdfDocument: Clone {
    fn page_count(&self) -> u32;
    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError>;
    fn is_encrypted(&self) -> bool;
    fn rasterize(&self, request: RenderRequest) -> Result<RgbaImage, PdfEngineError>;
    fn page_rotation(&self, page_index: u32) -> Result<Rotation, PdfEngineError>;
    fn set_page_rotation(
        &mut self,
        page_index: u32,
        rotation: Rotation,
    ) -> Result<(), PdfEngineError>;

    /// `origin` is the text baseline start.
    fn insert_text(
        &mut self,
        page_index: u32,
        origin: PdfPoint,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), PdfEngineError>;

    /// `image` is an encoded PNG or JPEG, stretched over `rect`.
    fn insert_image(
        &mut self,
        page_index: u32,
        rect: PdfRect,
        image: &[u8],
    ) -> Result<(), PdfEngineError>;

    fn draw_shape(
        &mut self,
        page_index: u32,
        shape: &Shape,
        stroke: &StrokeStyle,
    ) -> Result<(), PdfEngineError>;

    fn add_highlight(
        &mut self,
        page_index: u32,
        rect: PdfRect,
        color: [f32; 3],
    ) -> Result<(), PdfEngineError>;

    fn save(&mut self, path: &Path, options: &SaveOptions) -> Result<(), PdfEngineError>;
}

/// Blank page raster with a light border, sized for `zoom` and `rotation`.
///
/// Both bundled backends rasterize through this; neither carries a
/// content renderer.
pub fn placeholder_raster(size: PageSize, zoom: f32, rotation: Rotation) -> RgbaImage {
    let zoom = if zoom <= 0.0 { 1.0 } else { zoom };
    let (w_pt, h_pt) = if rotation.is_sideways() {
        (size.height_pt, size.width_pt)
    } else {
        (size.width_pt, size.height_pt)
    };

    let width = (w_pt * zoom).round().max(1.0) as u32;
    let height = (h_pt * zoom).round().max(1.0) as u32;

    let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

    if width >= 4 && height >= 4 {
        for x in 0..width {
            image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
            image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
        }
        for y in 0..height {
            image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
            image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
        }
    }

    image
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
