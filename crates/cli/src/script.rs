//! JSON annotation scripts.
//!
//! ```json
//! {
//!   "rotations": { "0": 90 },
//!   "annotations": [
//!     { "page": 0, "type": "text", "anchor": { "x": 72, "y": 72 }, "text": "Hello" },
//!     { "page": 0, "type": "stamp", "anchor": { "x": 300, "y": 80 }, "stamp": "approved" }
//!   ]
//! }
//! ```

use annotator_core::{Annotation, AnnotationKind, EditorSession};
use anyhow::{Context, Result};
use pdf_engine::{PdfDocument, Rotation};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct AnnotationScript {
    /// Page index to clockwise delta in degrees.
    #[serde(default)]
    pub rotations: BTreeMap<u32, i64>,
    #[serde(default)]
    pub annotations: Vec<ScriptEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ScriptEntry {
    pub page: u32,
    #[serde(flatten)]
    pub kind: AnnotationKind,
}

impl AnnotationScript {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read script {}", path.display()))?;
        Self::from_json(&contents)
            .with_context(|| format!("invalid annotation script {}", path.display()))
    }

    pub fn from_json(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Places every annotation in script order, then records the rotations.
    pub fn apply<D: PdfDocument>(&self, session: &mut EditorSession<D>) -> Result<()> {
        for (index, entry) in self.annotations.iter().enumerate() {
            let annotation = Annotation::new(entry.page, entry.kind.clone())
                .with_context(|| format!("annotation #{index} is invalid"))?;
            session
                .add_annotation(annotation)
                .with_context(|| format!("annotation #{index} could not be placed"))?;
        }

        let page_count = session.page_count();
        for (&page, &degrees) in &self.rotations {
            if page >= page_count {
                anyhow::bail!("rotation for page {page} but document has {page_count} pages");
            }
            let delta = Rotation::from_degrees(degrees)
                .with_context(|| format!("rotation {degrees} is not a multiple of 90"))?;
            session.rotate_page(page, delta);
        }

        tracing::debug!(
            annotations = self.annotations.len(),
            rotations = self.rotations.len(),
            "script applied"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use annotator_core::{EditorConfig, StampKind};
    use pdf_engine::{OpenSource, PdfEngine, RecordingEngine};

    fn session(pages: u32) -> EditorSession<pdf_engine::RecordingDocument> {
        let document = RecordingEngine::new(pages)
            .open(OpenSource::Bytes(Vec::new()), None)
            .expect("open");
        EditorSession::with_document(document, "doc.pdf", EditorConfig::default())
    }

    #[test]
    fn parses_tagged_entries_with_defaults() {
        let script = AnnotationScript::from_json(
            r#"{
                "rotations": { "1": -90 },
                "annotations": [
                    { "page": 0, "type": "stamp", "anchor": { "x": 10, "y": 20 }, "stamp": "draft" },
                    { "page": 1, "type": "shape", "start": { "x": 0, "y": 0 },
                      "end": { "x": 50, "y": 50 }, "shape": "arrow" }
                ]
            }"#,
        )
        .expect("parse");

        assert_eq!(script.rotations.get(&1), Some(&-90));
        assert_eq!(script.annotations.len(), 2);
        match &script.annotations[0].kind {
            AnnotationKind::Stamp(stamp) => assert_eq!(stamp.stamp, StampKind::Draft),
            other => panic!("unexpected {other:?}"),
        }
        match &script.annotations[1].kind {
            AnnotationKind::Shape(shape) => assert_eq!(shape.thickness, 2),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn apply_places_annotations_and_rotations() {
        let script = AnnotationScript::from_json(
            r#"{
                "rotations": { "0": 270 },
                "annotations": [
                    { "page": 0, "type": "text", "anchor": { "x": 10, "y": 20 }, "text": "a" },
                    { "page": 1, "type": "highlight", "start": { "x": 0, "y": 0 }, "end": { "x": 9, "y": 9 } }
                ]
            }"#,
        )
        .expect("parse");
        let mut session = session(2);

        script.apply(&mut session).expect("apply");
        assert_eq!(session.store().len(), 2);
        assert_eq!(session.rotations().get(0), Rotation::Deg270);
    }

    #[test]
    fn apply_rejects_out_of_range_pages_and_bad_rotations() {
        let mut session = session(1);
        let bad_page = AnnotationScript::from_json(
            r#"{ "annotations": [ { "page": 4, "type": "text", "anchor": { "x": 1, "y": 1 }, "text": "x" } ] }"#,
        )
        .expect("parse");
        assert!(bad_page.apply(&mut session).is_err());

        let bad_rotation =
            AnnotationScript::from_json(r#"{ "rotations": { "0": 45 } }"#).expect("parse");
        let error = bad_rotation.apply(&mut session).expect_err("45 is not a quarter turn");
        assert!(format!("{error:#}").contains("multiple of 90"));
    }

    #[test]
    fn unknown_annotation_type_is_a_parse_error() {
        let result = AnnotationScript::from_json(
            r#"{ "annotations": [ { "page": 0, "type": "sticker", "anchor": { "x": 1, "y": 1 } } ] }"#,
        );
        assert!(result.is_err());
    }
}
