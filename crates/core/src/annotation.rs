//! Annotation data model
//!
//! Annotations are stored in document space and drawn or hit-tested in
//! view space through the same zoom scaling, so what is drawn is what can
//! be selected. Variants form a closed set; every consumer matches on
//! [`AnnotationKind`] exhaustively.

use crate::error::AnnotationError;
use crate::geometry::{PageCoordinate, ViewRect, Zoom};
use crate::surface::{Surface, SELECTION_COLOR, SELECTION_WIDTH};
use chrono::NaiveDate;
use image::Rgba;
use serde::{Deserialize, Serialize};

pub use signature_vault::SignatureKind;

/// Unique identifier for an annotation
///
/// Two annotations with identical fields are still distinct.
pub type AnnotationId = uuid::Uuid;

/// Nominal stamp size in document units.
pub const STAMP_WIDTH: f32 = 100.0;
pub const STAMP_HEIGHT: f32 = 40.0;
pub const STAMP_LABEL_SIZE: f32 = 16.0;
pub const STAMP_DATE_SIZE: f32 = 10.0;
/// Gap between the stamp box and its date line.
pub const STAMP_DATE_GAP: f32 = 2.0;
const STAMP_CORNER_RADIUS: f32 = 5.0;
const STAMP_BORDER_WIDTH: f32 = 3.0;

/// Arrowhead wing length in document units.
pub const ARROW_HEAD_LENGTH: f32 = 10.0;
/// Angle between the shaft and each arrowhead wing, in radians.
pub const ARROW_HEAD_ANGLE: f32 = 2.7;

/// Text hit-box heuristics, as fractions of the font size.
pub const TEXT_ADVANCE: f32 = 0.6;
pub const TEXT_LINE_HEIGHT: f32 = 1.2;

/// Opaque 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };
    pub const GREEN: Color = Color { r: 0, g: 255, b: 0 };
    pub const BLUE: Color = Color { r: 0, g: 0, b: 255 };
    pub const YELLOW: Color = Color { r: 255, g: 255, b: 0 };
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color { r: 255, g: 255, b: 255 };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_normalized(self) -> [f32; 3] {
        [self.r as f32 / 255.0, self.g as f32 / 255.0, self.b as f32 / 255.0]
    }

    pub fn with_alpha(self, alpha: u8) -> Rgba<u8> {
        Rgba([self.r, self.g, self.b, alpha])
    }

    pub fn opaque(self) -> Rgba<u8> {
        self.with_alpha(255)
    }
}

/// RGB colour with channels in `[0, 1]`, as text colours are specified.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Default for TextColor {
    fn default() -> Self {
        Self::BLACK
    }
}

impl TextColor {
    pub const BLACK: TextColor = TextColor { r: 0.0, g: 0.0, b: 0.0 };

    /// Channels outside `[0, 1]` are clamped.
    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r: r.clamp(0.0, 1.0), g: g.clamp(0.0, 1.0), b: b.clamp(0.0, 1.0) }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn to_color(self) -> Color {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        Color::rgb(channel(self.r), channel(self.g), channel(self.b))
    }
}

/// Tolerances that widen hit regions beyond the drawn geometry, in view
/// pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitSlop {
    pub shape_margin: f32,
    pub stamp_date_extent: f32,
}

impl Default for HitSlop {
    fn default() -> Self {
        Self { shape_margin: 5.0, stamp_date_extent: 15.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub anchor: PageCoordinate,
    pub text: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
    #[serde(default)]
    pub color: TextColor,
}

fn default_font_family() -> String {
    "helv".to_owned()
}

fn default_font_size() -> f32 {
    12.0
}

impl TextAnnotation {
    pub fn new(anchor: PageCoordinate, text: impl Into<String>) -> Self {
        Self {
            anchor,
            text: text.into(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            color: TextColor::BLACK,
        }
    }

    pub fn with_font_family(mut self, family: impl Into<String>) -> Self {
        self.font_family = family.into();
        self
    }

    pub fn with_font_size(mut self, size: f32) -> Self {
        self.font_size = size;
        self
    }

    pub fn with_color(mut self, color: TextColor) -> Self {
        self.color = color;
        self
    }

    /// Heuristic box: `len * size * 0.6` wide, `size * 1.2` tall, sitting
    /// on the anchor.
    pub fn view_bounds(&self, zoom: Zoom) -> ViewRect {
        let z = zoom.factor();
        let x = self.anchor.x * z;
        let y = self.anchor.y * z;
        let width = self.text.chars().count() as f32 * self.font_size * z * TEXT_ADVANCE;
        let height = self.font_size * z * TEXT_LINE_HEIGHT;
        ViewRect::from_corners(x, y - height, x + width, y)
    }

    fn render(&self, surface: &mut Surface<'_>, zoom: Zoom, selected: bool) {
        let z = zoom.factor();
        let size = self.font_size * z;
        let x = self.anchor.x * z;
        let y = self.anchor.y * z;

        surface.draw_text(x, y - size, &self.text, size, self.color.to_color().opaque());

        if selected {
            let width = surface.measure_text(&self.text, size);
            surface.stroke_rect(x, y - size, x + width, y, SELECTION_WIDTH, SELECTION_COLOR);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureAnnotation {
    pub top_left: PageCoordinate,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub kind: SignatureKind,
    /// Encoded bitmap, transparent background. Decoded lazily, so bytes
    /// that do not decode only fail at render or flatten time.
    #[serde(with = "base64_bytes")]
    pub image: Vec<u8>,
}

impl SignatureAnnotation {
    pub fn new(top_left: PageCoordinate, width: f32, height: f32, image: Vec<u8>) -> Self {
        Self { top_left, width, height, kind: SignatureKind::Signature, image }
    }

    pub fn with_kind(mut self, kind: SignatureKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn view_bounds(&self, zoom: Zoom) -> ViewRect {
        let z = zoom.factor();
        let x = self.top_left.x * z;
        let y = self.top_left.y * z;
        ViewRect::from_corners(x, y, x + self.width * z, y + self.height * z)
    }

    fn render(
        &self,
        id: AnnotationId,
        surface: &mut Surface<'_>,
        zoom: Zoom,
        selected: bool,
    ) -> Result<(), image::ImageError> {
        let bounds = self.view_bounds(zoom);
        let drawn = surface.draw_signature(
            id,
            &self.image,
            bounds.x0,
            bounds.y0,
            bounds.x1 - bounds.x0,
            bounds.y1 - bounds.y0,
        );

        if selected {
            surface.stroke_rect(
                bounds.x0,
                bounds.y0,
                bounds.x1,
                bounds.y1,
                SELECTION_WIDTH,
                SELECTION_COLOR,
            );
        }
        drawn
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Circle,
    Line,
    Arrow,
}

impl ShapeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Line => "line",
            Self::Arrow => "arrow",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeAnnotation {
    pub start: PageCoordinate,
    pub end: PageCoordinate,
    pub shape: ShapeKind,
    #[serde(default = "default_shape_color")]
    pub color: Color,
    #[serde(default = "default_thickness")]
    pub thickness: u32,
    #[serde(default)]
    pub fill: bool,
}

fn default_shape_color() -> Color {
    Color::RED
}

fn default_thickness() -> u32 {
    2
}

impl ShapeAnnotation {
    pub fn new(shape: ShapeKind, start: PageCoordinate, end: PageCoordinate) -> Self {
        Self {
            start,
            end,
            shape,
            color: default_shape_color(),
            thickness: default_thickness(),
            fill: false,
        }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_thickness(mut self, thickness: u32) -> Self {
        self.thickness = thickness;
        self
    }

    pub fn with_fill(mut self, fill: bool) -> Self {
        self.fill = fill;
        self
    }

    /// Bounding box of the two corners, without the hit margin.
    pub fn view_bounds(&self, zoom: Zoom) -> ViewRect {
        let z = zoom.factor();
        ViewRect::from_corners(self.start.x * z, self.start.y * z, self.end.x * z, self.end.y * z)
    }

    fn render(&self, surface: &mut Surface<'_>, zoom: Zoom, selected: bool) {
        let z = zoom.factor();
        let (x1, y1) = (self.start.x * z, self.start.y * z);
        let (x2, y2) = (self.end.x * z, self.end.y * z);
        let thickness = (self.thickness as f32 * z).max(1.0);
        let color = self.color.opaque();

        match self.shape {
            ShapeKind::Rectangle => {
                if self.fill {
                    surface.fill_rect(x1, y1, x2, y2, color);
                }
                surface.stroke_rect(x1, y1, x2, y2, thickness, color);
            }
            ShapeKind::Circle => {
                if self.fill {
                    surface.fill_ellipse(x1, y1, x2, y2, color);
                }
                surface.stroke_ellipse(x1, y1, x2, y2, thickness, color);
            }
            ShapeKind::Line => surface.draw_line(x1, y1, x2, y2, thickness, color),
            ShapeKind::Arrow => {
                surface.draw_line(x1, y1, x2, y2, thickness, color);
                let [left, right] = arrowhead((x1, y1), (x2, y2), ARROW_HEAD_LENGTH * z);
                surface.fill_polygon(&[(x2, y2), left, right], color);
            }
        }

        if selected {
            let bounds = self.view_bounds(zoom).expanded(SELECTION_WIDTH);
            surface.stroke_rect(
                bounds.x0,
                bounds.y0,
                bounds.x1,
                bounds.y1,
                SELECTION_WIDTH,
                SELECTION_COLOR,
            );
        }
    }
}

/// Wing tips of an arrowhead at `end`, each `length` away, swept back
/// from the shaft direction by [`ARROW_HEAD_ANGLE`].
pub fn arrowhead(start: (f32, f32), end: (f32, f32), length: f32) -> [(f32, f32); 2] {
    let angle = (end.1 - start.1).atan2(end.0 - start.0);
    let wing = |offset: f32| {
        let a = angle + offset;
        (end.0 + length * a.cos(), end.1 + length * a.sin())
    };
    [wing(ARROW_HEAD_ANGLE), wing(-ARROW_HEAD_ANGLE)]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightAnnotation {
    pub start: PageCoordinate,
    pub end: PageCoordinate,
    #[serde(default = "default_highlight_color")]
    pub color: Color,
}

fn default_highlight_color() -> Color {
    Color::YELLOW
}

impl HighlightAnnotation {
    pub fn new(start: PageCoordinate, end: PageCoordinate) -> Self {
        Self { start, end, color: default_highlight_color() }
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn view_bounds(&self, zoom: Zoom) -> ViewRect {
        let z = zoom.factor();
        ViewRect::from_corners(self.start.x * z, self.start.y * z, self.end.x * z, self.end.y * z)
    }

    fn render(&self, surface: &mut Surface<'_>, zoom: Zoom, selected: bool) {
        let bounds = self.view_bounds(zoom);
        let alpha = surface.highlight_alpha();
        surface.fill_rect(bounds.x0, bounds.y0, bounds.x1, bounds.y1, self.color.with_alpha(alpha));

        if selected {
            surface.stroke_rect(
                bounds.x0,
                bounds.y0,
                bounds.x1,
                bounds.y1,
                SELECTION_WIDTH,
                SELECTION_COLOR,
            );
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StampKind {
    #[default]
    Approved,
    Rejected,
    Confidential,
    Draft,
    Final,
    Reviewed,
}

impl StampKind {
    pub const ALL: [StampKind; 6] = [
        Self::Approved,
        Self::Rejected,
        Self::Confidential,
        Self::Draft,
        Self::Final,
        Self::Reviewed,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Confidential => "CONFIDENTIAL",
            Self::Draft => "DRAFT",
            Self::Final => "FINAL",
            Self::Reviewed => "REVIEWED",
        }
    }

    pub fn color(self) -> Color {
        match self {
            Self::Approved => Color::rgb(0, 150, 0),
            Self::Rejected | Self::Confidential => Color::rgb(200, 0, 0),
            Self::Draft => Color::rgb(128, 128, 128),
            Self::Final => Color::rgb(0, 0, 200),
            Self::Reviewed => Color::rgb(150, 0, 150),
        }
    }
}

impl std::str::FromStr for StampKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.label().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown stamp '{value}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampAnnotation {
    pub anchor: PageCoordinate,
    pub stamp: StampKind,
    /// Captured at creation; shown under the stamp box.
    #[serde(default = "today")]
    pub date: NaiveDate,
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

impl StampAnnotation {
    pub fn new(anchor: PageCoordinate, stamp: StampKind) -> Self {
        Self { anchor, stamp, date: today() }
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    pub fn date_text(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// The stamp box plus the date line below it.
    pub fn view_bounds(&self, zoom: Zoom, date_extent: f32) -> ViewRect {
        let z = zoom.factor();
        let x = self.anchor.x * z;
        let y = self.anchor.y * z;
        ViewRect::from_corners(x, y, x + STAMP_WIDTH * z, y + STAMP_HEIGHT * z + date_extent)
    }

    fn render(&self, surface: &mut Surface<'_>, zoom: Zoom, selected: bool) {
        let z = zoom.factor();
        let x = self.anchor.x * z;
        let y = self.anchor.y * z;
        let w = STAMP_WIDTH * z;
        let h = STAMP_HEIGHT * z;
        let color = self.stamp.color().opaque();

        surface.stroke_rounded_rect(x, y, x + w, y + h, STAMP_CORNER_RADIUS, STAMP_BORDER_WIDTH, color);

        let label = self.stamp.label();
        let label_size = STAMP_LABEL_SIZE * z;
        let label_width = surface.measure_text(label, label_size);
        surface.draw_text(
            x + (w - label_width) / 2.0,
            y + (h - label_size) / 2.0,
            label,
            label_size,
            color,
        );

        let date = self.date_text();
        let date_size = STAMP_DATE_SIZE * z;
        let date_width = surface.measure_text(&date, date_size);
        surface.draw_text(x + (w - date_width) / 2.0, y + h + STAMP_DATE_GAP, &date, date_size, color);

        if selected {
            surface.stroke_rect(
                x - SELECTION_WIDTH,
                y - SELECTION_WIDTH,
                x + w + SELECTION_WIDTH,
                y + h + HitSlop::default().stamp_date_extent,
                SELECTION_WIDTH,
                SELECTION_COLOR,
            );
        }
    }
}

/// The closed set of annotation variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    Text(TextAnnotation),
    Signature(SignatureAnnotation),
    Shape(ShapeAnnotation),
    Highlight(HighlightAnnotation),
    Stamp(StampAnnotation),
}

impl AnnotationKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Signature(_) => "signature",
            Self::Shape(_) => "shape",
            Self::Highlight(_) => "highlight",
            Self::Stamp(_) => "stamp",
        }
    }

    fn validate(&self) -> Result<(), AnnotationError> {
        match self {
            Self::Text(text) => {
                check_point(text.anchor)?;
                if !(text.font_size.is_finite() && text.font_size > 0.0) {
                    return Err(AnnotationError::FontSize(text.font_size));
                }
            }
            Self::Signature(signature) => {
                check_point(signature.top_left)?;
                let valid = |v: f32| v.is_finite() && v > 0.0;
                if !valid(signature.width) || !valid(signature.height) {
                    return Err(AnnotationError::Dimensions {
                        width: signature.width,
                        height: signature.height,
                    });
                }
            }
            Self::Shape(shape) => {
                check_point(shape.start)?;
                check_point(shape.end)?;
                if shape.thickness == 0 {
                    return Err(AnnotationError::Thickness);
                }
            }
            Self::Highlight(highlight) => {
                check_point(highlight.start)?;
                check_point(highlight.end)?;
            }
            Self::Stamp(stamp) => check_point(stamp.anchor)?,
        }
        Ok(())
    }
}

fn check_point(point: PageCoordinate) -> Result<(), AnnotationError> {
    if point.is_finite() {
        Ok(())
    } else {
        Err(AnnotationError::NonFinite)
    }
}

impl From<TextAnnotation> for AnnotationKind {
    fn from(value: TextAnnotation) -> Self {
        Self::Text(value)
    }
}

impl From<SignatureAnnotation> for AnnotationKind {
    fn from(value: SignatureAnnotation) -> Self {
        Self::Signature(value)
    }
}

impl From<ShapeAnnotation> for AnnotationKind {
    fn from(value: ShapeAnnotation) -> Self {
        Self::Shape(value)
    }
}

impl From<HighlightAnnotation> for AnnotationKind {
    fn from(value: HighlightAnnotation) -> Self {
        Self::Highlight(value)
    }
}

impl From<StampAnnotation> for AnnotationKind {
    fn from(value: StampAnnotation) -> Self {
        Self::Stamp(value)
    }
}

/// A placed annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,
    page_index: u32,
    #[serde(skip)]
    selected: bool,
    #[serde(flatten)]
    kind: AnnotationKind,
}

impl Annotation {
    /// Creates an annotation with a fresh id. Non-finite coordinates and
    /// non-positive sizes are rejected.
    pub fn new(page_index: u32, kind: impl Into<AnnotationKind>) -> Result<Self, AnnotationError> {
        let kind = kind.into();
        kind.validate()?;
        Ok(Self { id: uuid::Uuid::new_v4(), page_index, selected: false, kind })
    }

    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub(crate) fn set_selected(&mut self, selected: bool) {
        self.selected = selected;
    }

    pub fn kind(&self) -> &AnnotationKind {
        &self.kind
    }

    /// Moves the annotation by a document-space delta.
    pub fn translate(&mut self, dx: f32, dy: f32) {
        match &mut self.kind {
            AnnotationKind::Text(text) => text.anchor = text.anchor.translated(dx, dy),
            AnnotationKind::Signature(signature) => {
                signature.top_left = signature.top_left.translated(dx, dy)
            }
            AnnotationKind::Shape(shape) => {
                shape.start = shape.start.translated(dx, dy);
                shape.end = shape.end.translated(dx, dy);
            }
            AnnotationKind::Highlight(highlight) => {
                highlight.start = highlight.start.translated(dx, dy);
                highlight.end = highlight.end.translated(dx, dy);
            }
            AnnotationKind::Stamp(stamp) => stamp.anchor = stamp.anchor.translated(dx, dy),
        }
    }

    /// Region a click must land in to select this annotation.
    pub fn hit_region(&self, zoom: Zoom, slop: &HitSlop) -> ViewRect {
        match &self.kind {
            AnnotationKind::Text(text) => text.view_bounds(zoom),
            AnnotationKind::Signature(signature) => signature.view_bounds(zoom),
            AnnotationKind::Shape(shape) => shape.view_bounds(zoom).expanded(slop.shape_margin),
            AnnotationKind::Highlight(highlight) => highlight.view_bounds(zoom),
            AnnotationKind::Stamp(stamp) => stamp.view_bounds(zoom, slop.stamp_date_extent),
        }
    }

    pub fn hit_test(&self, view_x: f32, view_y: f32, zoom: Zoom) -> bool {
        self.hit_test_with(view_x, view_y, zoom, &HitSlop::default())
    }

    pub fn hit_test_with(&self, view_x: f32, view_y: f32, zoom: Zoom, slop: &HitSlop) -> bool {
        self.hit_region(zoom, slop).contains(view_x, view_y)
    }

    /// Draws the annotation, plus a selection outline when selected.
    ///
    /// Only signature images can fail, when their bytes do not decode.
    pub fn render(&self, surface: &mut Surface<'_>, zoom: Zoom) -> Result<(), image::ImageError> {
        match &self.kind {
            AnnotationKind::Text(text) => text.render(surface, zoom, self.selected),
            AnnotationKind::Signature(signature) => {
                signature.render(self.id, surface, zoom, self.selected)?
            }
            AnnotationKind::Shape(shape) => shape.render(surface, zoom, self.selected),
            AnnotationKind::Highlight(highlight) => highlight.render(surface, zoom, self.selected),
            AnnotationKind::Stamp(stamp) => stamp.render(surface, zoom, self.selected),
        }
        Ok(())
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.trim()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::Fonts;
    use crate::surface::ImageCache;
    use image::RgbaImage;
    use pretty_assertions::assert_eq;

    fn text_at(x: f32, y: f32, text: &str, size: f32) -> Annotation {
        Annotation::new(0, TextAnnotation::new(PageCoordinate::new(x, y), text).with_font_size(size))
            .expect("valid text")
    }

    fn render_one(annotation: &Annotation, zoom: f32, size: (u32, u32)) -> RgbaImage {
        let mut image = RgbaImage::from_pixel(size.0, size.1, Rgba([255, 255, 255, 255]));
        let fonts = Fonts::bitmap_only();
        let mut cache = ImageCache::default();
        let mut surface = Surface::new(&mut image, &fonts, &mut cache, 100);
        annotation.render(&mut surface, Zoom::new(zoom)).expect("render");
        image
    }

    #[test]
    fn text_hit_box_matches_heuristic() {
        let text = text_at(100.0, 100.0, "Hi", 12.0);

        assert!(text.hit_test(105.0, 95.0, Zoom::new(1.0)));
        assert!(!text.hit_test(500.0, 500.0, Zoom::new(1.0)));
        // 2 chars * 12 * 0.6 = 14.4 wide, 14.4 tall above the anchor.
        assert!(text.hit_test(114.0, 86.0, Zoom::new(1.0)));
        assert!(!text.hit_test(115.0, 95.0, Zoom::new(1.0)));
        assert!(!text.hit_test(105.0, 101.0, Zoom::new(1.0)));
    }

    #[test]
    fn text_hit_box_scales_with_zoom() {
        let text = text_at(100.0, 100.0, "Hi", 12.0);

        assert!(text.hit_test(210.0, 190.0, Zoom::new(2.0)));
        assert!(!text.hit_test(105.0, 95.0, Zoom::new(2.0)));
    }

    #[test]
    fn shape_hit_includes_margin_for_thin_lines() {
        let line = Annotation::new(
            0,
            ShapeAnnotation::new(
                ShapeKind::Line,
                PageCoordinate::new(10.0, 50.0),
                PageCoordinate::new(90.0, 50.0),
            ),
        )
        .expect("valid shape");

        assert!(line.hit_test(50.0, 54.0, Zoom::new(1.0)));
        assert!(line.hit_test(5.0, 50.0, Zoom::new(1.0)));
        assert!(!line.hit_test(50.0, 56.0, Zoom::new(1.0)));
    }

    #[test]
    fn stamp_hit_region_reaches_date_line() {
        let stamp = Annotation::new(
            0,
            StampAnnotation::new(PageCoordinate::new(0.0, 0.0), StampKind::Draft),
        )
        .expect("valid stamp");

        assert!(stamp.hit_test(50.0, 54.0, Zoom::new(1.0)));
        assert!(!stamp.hit_test(50.0, 56.0, Zoom::new(1.0)));
        // Extension is in view units, not scaled.
        assert!(stamp.hit_test(50.0, 94.0, Zoom::new(2.0)));
        assert!(!stamp.hit_test(50.0, 96.0, Zoom::new(2.0)));
    }

    #[test]
    fn corners_are_order_independent() {
        let highlight = Annotation::new(
            0,
            HighlightAnnotation::new(PageCoordinate::new(80.0, 40.0), PageCoordinate::new(20.0, 10.0)),
        )
        .expect("valid highlight");

        assert!(highlight.hit_test(50.0, 25.0, Zoom::new(1.0)));
        assert!(!highlight.hit_test(81.0, 25.0, Zoom::new(1.0)));
    }

    #[test]
    fn translate_moves_every_point() {
        let mut shape = Annotation::new(
            2,
            ShapeAnnotation::new(
                ShapeKind::Rectangle,
                PageCoordinate::new(0.0, 0.0),
                PageCoordinate::new(10.0, 10.0),
            ),
        )
        .expect("valid shape");
        shape.translate(5.0, -3.0);

        let AnnotationKind::Shape(moved) = shape.kind() else {
            panic!("kind changed");
        };
        assert_eq!(moved.start, PageCoordinate::new(5.0, -3.0));
        assert_eq!(moved.end, PageCoordinate::new(15.0, 7.0));
        assert_eq!(shape.page_index(), 2);
    }

    #[test]
    fn arrowhead_wings_sweep_back_from_tip() {
        let [left, right] = arrowhead((0.0, 0.0), (100.0, 0.0), 10.0);

        assert!(left.0 < 100.0 && right.0 < 100.0);
        assert!((left.1 + right.1).abs() < 1e-4);
        let wing = ((left.0 - 100.0).powi(2) + left.1.powi(2)).sqrt();
        assert!((wing - 10.0).abs() < 1e-4);
    }

    #[test]
    fn invalid_geometry_is_rejected() {
        let zero_font = TextAnnotation::new(PageCoordinate::new(0.0, 0.0), "x").with_font_size(0.0);
        assert!(matches!(Annotation::new(0, zero_font), Err(AnnotationError::FontSize(_))));

        let flat = SignatureAnnotation::new(PageCoordinate::new(0.0, 0.0), 10.0, 0.0, Vec::new());
        assert!(matches!(Annotation::new(0, flat), Err(AnnotationError::Dimensions { .. })));

        let thin = ShapeAnnotation::new(
            ShapeKind::Line,
            PageCoordinate::new(0.0, 0.0),
            PageCoordinate::new(1.0, 1.0),
        )
        .with_thickness(0);
        assert!(matches!(Annotation::new(0, thin), Err(AnnotationError::Thickness)));

        let nan = StampAnnotation::new(PageCoordinate::new(f32::NAN, 0.0), StampKind::Final);
        assert!(matches!(Annotation::new(0, nan), Err(AnnotationError::NonFinite)));
    }

    #[test]
    fn field_identical_annotations_have_distinct_ids() {
        let a = text_at(1.0, 1.0, "same", 12.0);
        let b = text_at(1.0, 1.0, "same", 12.0);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.kind(), b.kind());
    }

    #[test]
    fn selection_outline_is_drawn_in_blue() {
        let mut highlight = Annotation::new(
            0,
            HighlightAnnotation::new(PageCoordinate::new(10.0, 10.0), PageCoordinate::new(30.0, 30.0)),
        )
        .expect("valid highlight");

        let plain = render_one(&highlight, 1.0, (40, 40));
        assert_ne!(*plain.get_pixel(10, 20), Rgba([0, 0, 255, 255]));

        highlight.set_selected(true);
        let outlined = render_one(&highlight, 1.0, (40, 40));
        assert_eq!(*outlined.get_pixel(10, 20), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn stamp_renders_in_its_table_colour() {
        let stamp = Annotation::new(
            0,
            StampAnnotation::new(PageCoordinate::new(5.0, 5.0), StampKind::Final),
        )
        .expect("valid stamp");
        let image = render_one(&stamp, 1.0, (120, 70));

        // Border runs along the top edge of the box.
        assert_eq!(*image.get_pixel(50, 6), Rgba([0, 0, 200, 255]));
    }

    #[test]
    fn stamp_names_parse_case_insensitively() {
        assert_eq!("approved".parse::<StampKind>(), Ok(StampKind::Approved));
        assert_eq!("CONFIDENTIAL".parse::<StampKind>(), Ok(StampKind::Confidential));
        assert!("void".parse::<StampKind>().is_err());
    }

    #[test]
    fn annotation_serializes_with_type_tag() {
        let stamp = Annotation::new(
            1,
            StampAnnotation::new(PageCoordinate::new(1.0, 2.0), StampKind::Reviewed)
                .with_date(NaiveDate::from_ymd_opt(2024, 5, 6).expect("date")),
        )
        .expect("valid stamp");
        let json = serde_json::to_value(&stamp).expect("serialize");

        assert_eq!(json["type"], "stamp");
        assert_eq!(json["stamp"], "reviewed");
        assert_eq!(json["date"], "2024-05-06");
        assert_eq!(json["page_index"], 1);
        assert!(json.get("selected").is_none());
    }

    #[test]
    fn signature_image_travels_as_base64() {
        let signature = AnnotationKind::from(SignatureAnnotation::new(
            PageCoordinate::new(0.0, 0.0),
            150.0,
            50.0,
            vec![1, 2, 3],
        ));
        let json = serde_json::to_value(&signature).expect("serialize");
        assert_eq!(json["image"], "AQID");

        let back: AnnotationKind = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, signature);
    }
}
