//! Annotation overlay engine.
//!
//! Annotations are placed on a rasterized page preview, hit-tested and
//! dragged in view space, kept in an ordered store with an undo log, and
//! flattened into the document through a [`pdf_engine::PdfDocument`] on
//! save.

pub mod annotation;
pub mod compositor;
pub mod config;
pub mod error;
pub mod flatten;
pub mod fonts;
pub mod geometry;
pub mod history;
pub mod placement;
pub mod session;
pub mod signature_image;
pub mod signature_pad;
pub mod store;
pub mod surface;
pub mod tools;
pub mod unlock;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, Color, HighlightAnnotation, HitSlop,
    ShapeAnnotation, ShapeKind, SignatureAnnotation, SignatureKind, StampAnnotation, StampKind,
    TextAnnotation, TextColor,
};
pub use compositor::{Composite, Compositor};
pub use config::{ConfigError, EditorConfig};
pub use error::{AnnotationError, FlattenError, OpenError, PlacementError, RenderError, SaveError};
pub use flatten::{flatten, FlattenReport, PageRotations};
pub use geometry::{to_doc, to_view, PageCoordinate, ScrollOffset, ViewPoint, ViewRect, Zoom};
pub use history::{HistoryEntry, Operation, UndoLog};
pub use placement::{PendingSignature, PlacementState};
pub use session::{ClickOutcome, EditorSession, SaveReport};
pub use signature_pad::SignaturePad;
pub use store::AnnotationStore;
pub use tools::{Tool, ToolSettings};
pub use unlock::{remove_passwords, unprotected_path, UnlockError, UnlockReport};
