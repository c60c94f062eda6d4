//! Flatten stage: burns pending rotations and annotations into a document.

use crate::annotation::{
    arrowhead, Annotation, AnnotationKind, HighlightAnnotation, ShapeAnnotation, ShapeKind,
    SignatureAnnotation, StampAnnotation, TextAnnotation, ARROW_HEAD_LENGTH, STAMP_DATE_GAP,
    STAMP_DATE_SIZE, STAMP_HEIGHT, STAMP_LABEL_SIZE, STAMP_WIDTH, TEXT_ADVANCE,
};
use crate::error::FlattenError;
use crate::store::AnnotationStore;
use pdf_engine::{
    PdfDocument, PdfEngineError, PdfPoint, PdfRect, Rotation, Shape, StandardFont, StrokeStyle,
    TextStyle,
};
use std::collections::BTreeMap;

const STAMP_BORDER_WIDTH: f32 = 3.0;

/// Net rotation added to each page since the document was opened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageRotations {
    deltas: BTreeMap<u32, Rotation>,
}

impl PageRotations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `delta` to the page's pending rotation. A net rotation of zero
    /// removes the entry.
    pub fn rotate(&mut self, page_index: u32, delta: Rotation) -> Rotation {
        let next = self.get(page_index).rotate_by(delta);
        if next == Rotation::Deg0 {
            self.deltas.remove(&page_index);
        } else {
            self.deltas.insert(page_index, next);
        }
        next
    }

    pub fn reset(&mut self, page_index: u32) {
        self.deltas.remove(&page_index);
    }

    pub fn get(&self, page_index: u32) -> Rotation {
        self.deltas.get(&page_index).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, Rotation)> + '_ {
        self.deltas.iter().map(|(page, rotation)| (*page, *rotation))
    }

    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn clear(&mut self) {
        self.deltas.clear();
    }
}

/// What a flatten pass did. Failures do not stop the pass.
#[derive(Debug, Default)]
pub struct FlattenReport {
    pub applied: usize,
    pub rotated_pages: usize,
    pub failures: Vec<FlattenError>,
}

impl FlattenReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Applies every pending rotation, then every annotation in store order.
pub fn flatten<D: PdfDocument>(
    document: &mut D,
    store: &AnnotationStore,
    rotations: &PageRotations,
) -> FlattenReport {
    let mut report = FlattenReport::default();

    for (page, delta) in rotations.iter() {
        let applied = document
            .page_rotation(page)
            .and_then(|live| document.set_page_rotation(page, live.rotate_by(delta)));
        match applied {
            Ok(()) => report.rotated_pages += 1,
            Err(source) => {
                tracing::warn!(page, %source, "page rotation failed");
                report.failures.push(FlattenError::Rotation { page, source });
            }
        }
    }

    for annotation in store.iter() {
        match flatten_annotation(document, annotation) {
            Ok(()) => report.applied += 1,
            Err(source) => {
                let id = annotation.id();
                let page = annotation.page_index();
                let kind = annotation.kind().name();
                tracing::warn!(%id, page, kind, %source, "annotation flatten failed");
                report.failures.push(FlattenError::Annotation { id, page, kind, source });
            }
        }
    }

    tracing::info!(
        applied = report.applied,
        rotated_pages = report.rotated_pages,
        failures = report.failures.len(),
        "flatten complete"
    );
    report
}

fn flatten_annotation<D: PdfDocument>(
    document: &mut D,
    annotation: &Annotation,
) -> Result<(), PdfEngineError> {
    let page = annotation.page_index();
    match annotation.kind() {
        AnnotationKind::Text(text) => flatten_text(document, page, text),
        AnnotationKind::Signature(signature) => flatten_signature(document, page, signature),
        AnnotationKind::Shape(shape) => flatten_shape(document, page, shape),
        AnnotationKind::Highlight(highlight) => flatten_highlight(document, page, highlight),
        AnnotationKind::Stamp(stamp) => flatten_stamp(document, page, stamp),
    }
}

fn flatten_text<D: PdfDocument>(
    document: &mut D,
    page: u32,
    text: &TextAnnotation,
) -> Result<(), PdfEngineError> {
    let style = TextStyle {
        font: StandardFont::from_family(&text.font_family),
        size: text.font_size,
        color: text.color.to_array(),
    };
    document.insert_text(page, PdfPoint::new(text.anchor.x, text.anchor.y), &text.text, &style)
}

fn flatten_signature<D: PdfDocument>(
    document: &mut D,
    page: u32,
    signature: &SignatureAnnotation,
) -> Result<(), PdfEngineError> {
    let x = signature.top_left.x;
    let y = signature.top_left.y;
    let rect = PdfRect::new(x, y, x + signature.width, y + signature.height);
    document.insert_image(page, rect, &signature.image)
}

fn flatten_shape<D: PdfDocument>(
    document: &mut D,
    page: u32,
    shape: &ShapeAnnotation,
) -> Result<(), PdfEngineError> {
    let color = shape.color.to_normalized();
    let stroke = StrokeStyle {
        color,
        width: shape.thickness as f32,
        fill: shape.fill.then_some(color),
    };
    let bounds = PdfRect::new(shape.start.x, shape.start.y, shape.end.x, shape.end.y).normalized();
    let from = PdfPoint::new(shape.start.x, shape.start.y);
    let to = PdfPoint::new(shape.end.x, shape.end.y);

    match shape.shape {
        ShapeKind::Rectangle => document.draw_shape(page, &Shape::Rectangle(bounds), &stroke),
        ShapeKind::Circle => document.draw_shape(page, &Shape::Ellipse(bounds), &stroke),
        ShapeKind::Line => document.draw_shape(page, &Shape::Line { from, to }, &stroke),
        ShapeKind::Arrow => {
            let stroke = StrokeStyle { fill: None, ..stroke };
            document.draw_shape(page, &Shape::Line { from, to }, &stroke)?;
            let wings = arrowhead((from.x, from.y), (to.x, to.y), ARROW_HEAD_LENGTH);
            for (x, y) in wings {
                document.draw_shape(page, &Shape::Line { from: to, to: PdfPoint::new(x, y) }, &stroke)?;
            }
            Ok(())
        }
    }
}

fn flatten_highlight<D: PdfDocument>(
    document: &mut D,
    page: u32,
    highlight: &HighlightAnnotation,
) -> Result<(), PdfEngineError> {
    let rect = PdfRect::new(highlight.start.x, highlight.start.y, highlight.end.x, highlight.end.y)
        .normalized();
    document.add_highlight(page, rect, highlight.color.to_normalized())
}

/// Border, centred label and the date line under the box, all in the
/// stamp colour.
fn flatten_stamp<D: PdfDocument>(
    document: &mut D,
    page: u32,
    stamp: &StampAnnotation,
) -> Result<(), PdfEngineError> {
    let color = stamp.stamp.color().to_normalized();
    let x = stamp.anchor.x;
    let y = stamp.anchor.y;

    let border = StrokeStyle { color, width: STAMP_BORDER_WIDTH, fill: None };
    let rect = PdfRect::new(x, y, x + STAMP_WIDTH, y + STAMP_HEIGHT);
    document.draw_shape(page, &Shape::Rectangle(rect), &border)?;

    let label = stamp.stamp.label();
    let label_style = TextStyle { font: StandardFont::Helvetica, size: STAMP_LABEL_SIZE, color };
    let label_origin = PdfPoint::new(
        x + centered_offset(label, STAMP_LABEL_SIZE, STAMP_WIDTH),
        y + (STAMP_HEIGHT + STAMP_LABEL_SIZE) / 2.0 - 2.0,
    );
    document.insert_text(page, label_origin, label, &label_style)?;

    let date = stamp.date_text();
    let date_style = TextStyle { font: StandardFont::Helvetica, size: STAMP_DATE_SIZE, color };
    let date_origin = PdfPoint::new(
        x + centered_offset(&date, STAMP_DATE_SIZE, STAMP_WIDTH),
        y + STAMP_HEIGHT + STAMP_DATE_GAP + STAMP_DATE_SIZE,
    );
    document.insert_text(page, date_origin, &date, &date_style)
}

fn centered_offset(text: &str, size: f32, width: f32) -> f32 {
    let text_width = text.chars().count() as f32 * size * TEXT_ADVANCE;
    ((width - text_width) / 2.0).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Color, StampKind};
    use crate::geometry::PageCoordinate;
    use chrono::NaiveDate;
    use pdf_engine::{OpenSource, PdfEngine, Primitive, RecordingEngine};
    use pretty_assertions::assert_eq;

    fn document(pages: u32) -> pdf_engine::RecordingDocument {
        RecordingEngine::new(pages)
            .open(OpenSource::Bytes(Vec::new()), None)
            .expect("open")
    }

    #[test]
    fn rotations_compose_on_live_value() {
        let mut doc = document(2);
        doc.set_page_rotation(1, Rotation::Deg90).expect("seed rotation");

        let mut rotations = PageRotations::new();
        rotations.rotate(1, Rotation::Deg90);
        rotations.rotate(1, Rotation::Deg90);

        let report = flatten(&mut doc, &AnnotationStore::new(), &rotations);
        assert_eq!(report.rotated_pages, 1);
        assert_eq!(doc.page_rotation(1).expect("rotation"), Rotation::Deg270);
    }

    #[test]
    fn full_turn_leaves_no_pending_entry() {
        let mut rotations = PageRotations::new();
        for _ in 0..4 {
            rotations.rotate(0, Rotation::Deg90);
        }
        assert!(rotations.is_empty());

        rotations.rotate(0, Rotation::Deg270);
        assert_eq!(rotations.get(0), Rotation::Deg270);
        rotations.reset(0);
        assert_eq!(rotations.get(0), Rotation::Deg0);
    }

    #[test]
    fn rotation_on_missing_page_is_reported() {
        let mut doc = document(1);
        let mut rotations = PageRotations::new();
        rotations.rotate(4, Rotation::Deg90);

        let report = flatten(&mut doc, &AnnotationStore::new(), &rotations);
        assert_eq!(report.rotated_pages, 0);
        assert!(matches!(report.failures.as_slice(), [FlattenError::Rotation { page: 4, .. }]));
    }

    #[test]
    fn arrow_emits_shaft_and_two_wings() {
        let mut doc = document(1);
        let mut store = AnnotationStore::new();
        store.add(
            Annotation::new(
                0,
                ShapeAnnotation::new(
                    ShapeKind::Arrow,
                    PageCoordinate::new(0.0, 0.0),
                    PageCoordinate::new(100.0, 0.0),
                )
                .with_fill(true),
            )
            .expect("valid arrow"),
        );

        let report = flatten(&mut doc, &store, &PageRotations::new());
        assert!(report.is_clean());

        let lines: Vec<_> = doc
            .primitives()
            .iter()
            .filter_map(|p| match p {
                Primitive::Shape { shape: Shape::Line { from, to }, stroke, .. } => {
                    assert_eq!(stroke.fill, None);
                    Some((*from, *to))
                }
                _ => None,
            })
            .collect();
        assert_eq!(lines.len(), 3);
        for (from, to) in &lines[1..] {
            assert_eq!(*from, PdfPoint::new(100.0, 0.0));
            assert!(to.x < 100.0);
            let length = ((to.x - from.x).powi(2) + (to.y - from.y).powi(2)).sqrt();
            assert!((length - ARROW_HEAD_LENGTH).abs() < 1e-3);
        }
    }

    #[test]
    fn circle_uses_normalized_bounds_and_fill() {
        let mut doc = document(1);
        let mut store = AnnotationStore::new();
        store.add(
            Annotation::new(
                0,
                ShapeAnnotation::new(
                    ShapeKind::Circle,
                    PageCoordinate::new(50.0, 40.0),
                    PageCoordinate::new(10.0, 20.0),
                )
                .with_color(Color::BLUE)
                .with_fill(true)
                .with_thickness(3),
            )
            .expect("valid circle"),
        );

        flatten(&mut doc, &store, &PageRotations::new());
        assert_eq!(
            doc.primitives(),
            &[Primitive::Shape {
                page: 0,
                shape: Shape::Ellipse(PdfRect::new(10.0, 20.0, 50.0, 40.0)),
                stroke: StrokeStyle {
                    color: [0.0, 0.0, 1.0],
                    width: 3.0,
                    fill: Some([0.0, 0.0, 1.0]),
                },
            }]
        );
    }

    #[test]
    fn stamp_flattens_border_label_and_date() {
        let mut doc = document(1);
        let mut store = AnnotationStore::new();
        store.add(
            Annotation::new(
                0,
                StampAnnotation::new(PageCoordinate::new(100.0, 200.0), StampKind::Approved)
                    .with_date(NaiveDate::from_ymd_opt(2024, 1, 31).expect("date")),
            )
            .expect("valid stamp"),
        );

        flatten(&mut doc, &store, &PageRotations::new());
        let texts: Vec<&str> = doc
            .primitives()
            .iter()
            .filter_map(|p| match p {
                Primitive::Text { text, style, .. } => {
                    assert_eq!(style.color, [0.0, 150.0 / 255.0, 0.0]);
                    Some(text.as_str())
                }
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["APPROVED", "2024-01-31"]);
        assert!(matches!(
            doc.primitives().first(),
            Some(Primitive::Shape { shape: Shape::Rectangle(_), .. })
        ));
    }

    #[test]
    fn highlight_uses_normalized_rect_and_colour() {
        let mut doc = document(1);
        let mut store = AnnotationStore::new();
        store.add(
            Annotation::new(
                0,
                HighlightAnnotation::new(PageCoordinate::new(30.0, 30.0), PageCoordinate::new(10.0, 10.0)),
            )
            .expect("valid highlight"),
        );

        flatten(&mut doc, &store, &PageRotations::new());
        assert_eq!(
            doc.primitives(),
            &[Primitive::Highlight {
                page: 0,
                rect: PdfRect::new(10.0, 10.0, 30.0, 30.0),
                color: [1.0, 1.0, 0.0],
            }]
        );
    }
}
