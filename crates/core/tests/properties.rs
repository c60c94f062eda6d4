use annotator_core::{
    flatten, to_doc, to_view, Annotation, AnnotationStore, PageCoordinate, PageRotations,
    ScrollOffset, TextAnnotation, Zoom,
};
use pdf_engine::{OpenSource, PdfEngine, Primitive, RecordingEngine};
use proptest::prelude::*;

fn labelled(page: u32, label: usize) -> Annotation {
    Annotation::new(page, TextAnnotation::new(PageCoordinate::new(10.0, 20.0), format!("#{label}")))
        .expect("valid text")
}

proptest! {
    #[test]
    fn render_and_flatten_agree_on_order(pages in prop::collection::vec(0u32..3, 1..24)) {
        let mut store = AnnotationStore::new();
        for (label, page) in pages.iter().enumerate() {
            store.add(labelled(*page, label));
        }

        let mut doc = RecordingEngine::new(3)
            .open(OpenSource::Bytes(Vec::new()), None)
            .expect("open");
        let report = flatten(&mut doc, &store, &PageRotations::new());
        prop_assert!(report.is_clean());

        for page in 0..3u32 {
            let rendered: Vec<String> = store
                .annotations_for_page(page)
                .map(|a| match a.kind() {
                    annotator_core::AnnotationKind::Text(t) => t.text.clone(),
                    _ => unreachable!(),
                })
                .collect();
            let flattened: Vec<String> = doc
                .primitives()
                .iter()
                .filter_map(|p| match p {
                    Primitive::Text { page: p, text, .. } if *p == page => Some(text.clone()),
                    _ => None,
                })
                .collect();
            let expected: Vec<String> = pages
                .iter()
                .enumerate()
                .filter(|(_, p)| **p == page)
                .map(|(label, _)| format!("#{label}"))
                .collect();
            prop_assert_eq!(&rendered, &expected);
            prop_assert_eq!(&flattened, &expected);
        }
    }

    #[test]
    fn add_then_undo_is_identity(existing in 0usize..8, page in 0u32..4) {
        let mut store = AnnotationStore::new();
        for label in 0..existing {
            store.add(labelled(page, label));
        }
        let before = store.ids().to_vec();

        let id = store.add(labelled(page, 99));
        store.undo_once();
        prop_assert_eq!(store.ids(), before.as_slice());

        store.redo_once();
        prop_assert_eq!(store.ids().last(), Some(&id));
    }

    #[test]
    fn view_round_trip_with_scroll(
        x in -1000.0f32..1000.0,
        y in -1000.0f32..1000.0,
        z in 0.25f32..=5.0,
        sx in 0.0f32..500.0,
        sy in 0.0f32..500.0,
    ) {
        let zoom = Zoom::new(z);
        let p = PageCoordinate::new(x, y);
        let view = to_view(p, zoom);
        let scrolled = annotator_core::ViewPoint::new(view.x - sx, view.y - sy);
        let back = to_doc(scrolled, zoom, ScrollOffset::new(sx, sy));
        prop_assert!((back.x - x).abs() <= 1e-2 * (1.0 + x.abs()));
        prop_assert!((back.y - y).abs() <= 1e-2 * (1.0 + y.abs()));
    }
}
