//! Editor session: one open document and everything edited on top of it.
//!
//! The session owns the annotation store (with its undo log), the pending
//! page rotations, the placement slot and the viewport. Opening another
//! document means creating another session; nothing carries over.

use crate::annotation::{
    Annotation, AnnotationId, AnnotationKind, HighlightAnnotation, HitSlop, ShapeAnnotation,
    SignatureAnnotation, SignatureKind, StampAnnotation, TextAnnotation,
};
use crate::compositor::{Composite, Compositor};
use crate::config::EditorConfig;
use crate::error::{OpenError, PlacementError, RenderError, SaveError};
use crate::flatten::{flatten, FlattenReport, PageRotations};
use crate::fonts::Fonts;
use crate::geometry::{to_doc, PageCoordinate, ScrollOffset, ViewPoint, Zoom};
use crate::placement::{PendingSignature, PlacementState};
use crate::store::AnnotationStore;
use crate::tools::{Tool, ToolSettings};
use crate::unlock::unprotected_path;
use image::RgbaImage;
use pdf_engine::{
    EncryptionMode, OpenSource, PdfDocument, PdfEngine, RenderRequest, Rotation, SaveOptions,
};
use std::path::{Path, PathBuf};

/// What a press did.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// An annotation was created on the spot.
    Placed(AnnotationId),
    /// The text tool wants the text to place at `at`.
    NeedsText { at: PageCoordinate },
    /// A signature tool wants an image to place at `at`.
    NeedsSignature { at: PageCoordinate, kind: SignatureKind },
    /// The topmost annotation under the pointer was selected; a drag began.
    Selected(AnnotationId),
    /// Nothing was under the pointer; the selection was cleared.
    SelectionCleared,
    /// A shape or highlight rubber band began.
    DrawingStarted,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum Gesture {
    #[default]
    Idle,
    Dragging {
        last: PageCoordinate,
    },
    Drawing {
        start: PageCoordinate,
        current: PageCoordinate,
    },
}

/// Result of a successful save.
#[derive(Debug)]
pub struct SaveReport {
    pub path: PathBuf,
    pub flatten: FlattenReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RasterKey {
    page: u32,
    zoom_bits: u32,
    rotation: Rotation,
}

pub struct EditorSession<D: PdfDocument> {
    document: D,
    path: PathBuf,
    config: EditorConfig,
    slop: HitSlop,
    store: AnnotationStore,
    rotations: PageRotations,
    placement: PlacementState,
    tool: Tool,
    settings: ToolSettings,
    current_page: u32,
    zoom: Zoom,
    scroll: ScrollOffset,
    gesture: Gesture,
    compositor: Compositor,
    raster: Option<(RasterKey, RgbaImage)>,
    last_good: Option<RgbaImage>,
    render_failures: Vec<RenderError>,
}

impl<D: PdfDocument> std::fmt::Debug for EditorSession<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("path", &self.path)
            .field("current_page", &self.current_page)
            .field("zoom", &self.zoom)
            .field("annotations", &self.store.len())
            .field("tool", &self.tool)
            .finish_non_exhaustive()
    }
}

impl<D: PdfDocument> EditorSession<D> {
    /// Opens `path` through `engine`. Encrypted documents are tried with an
    /// empty password before `password`.
    pub fn open<E>(
        engine: &E,
        path: impl AsRef<Path>,
        password: Option<&str>,
        config: EditorConfig,
    ) -> Result<Self, OpenError>
    where
        E: PdfEngine<Document = D>,
    {
        let path = path.as_ref();
        let document = engine
            .open(OpenSource::from(path), password)
            .map_err(|err| OpenError::from_engine(path, err))?;
        tracing::info!(
            path = %path.display(),
            pages = document.page_count(),
            encrypted = document.is_encrypted(),
            "document opened"
        );
        Ok(Self::with_document(document, path, config))
    }

    /// Starts a session over an already opened document.
    pub fn with_document(document: D, path: impl Into<PathBuf>, config: EditorConfig) -> Self {
        let fonts = Fonts::load(config.font_path.as_deref());
        let slop = HitSlop {
            shape_margin: config.shape_hit_margin,
            stamp_date_extent: config.stamp_date_extent,
        };
        Self {
            document,
            path: path.into(),
            slop,
            store: AnnotationStore::with_history_limit(config.history_limit),
            rotations: PageRotations::new(),
            placement: PlacementState::default(),
            tool: Tool::default(),
            settings: ToolSettings::default(),
            current_page: 0,
            zoom: Zoom::clamped(1.0, config.zoom_min, config.zoom_max),
            scroll: ScrollOffset::default(),
            gesture: Gesture::Idle,
            compositor: Compositor::new(fonts, config.highlight_alpha),
            raster: None,
            last_good: None,
            render_failures: Vec::new(),
            config,
        }
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn rotations(&self) -> &PageRotations {
        &self.rotations
    }

    pub fn page_count(&self) -> u32 {
        self.document.page_count()
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn zoom(&self) -> Zoom {
        self.zoom
    }

    pub fn scroll(&self) -> ScrollOffset {
        self.scroll
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut ToolSettings {
        &mut self.settings
    }

    pub fn is_armed(&self) -> bool {
        self.placement.is_armed()
    }

    /// Switching tools abandons any gesture in progress.
    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
        self.gesture = Gesture::Idle;
        tracing::debug!(%tool, "tool changed");
    }

    pub fn set_scroll(&mut self, scroll: ScrollOffset) {
        self.scroll = scroll;
    }

    /// Document point under a view-space point.
    pub fn to_doc(&self, point: ViewPoint) -> PageCoordinate {
        to_doc(point, self.zoom, self.scroll)
    }

    /// The rubber band of a shape or highlight being drawn.
    pub fn drawing_preview(&self) -> Option<(PageCoordinate, PageCoordinate)> {
        match self.gesture {
            Gesture::Drawing { start, current } => Some((start, current)),
            _ => None,
        }
    }

    /// Adds a fully formed annotation, e.g. from a script.
    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<AnnotationId, PlacementError> {
        let page_count = self.document.page_count();
        if annotation.page_index() >= page_count {
            return Err(PlacementError::PageOutOfRange { page: annotation.page_index(), page_count });
        }
        Ok(self.store.add(annotation))
    }

    fn place(&mut self, kind: impl Into<AnnotationKind>) -> Result<AnnotationId, PlacementError> {
        let annotation = Annotation::new(self.current_page, kind)?;
        let id = annotation.id();
        let kind = annotation.kind().name();
        self.add_annotation(annotation)?;
        tracing::debug!(%id, kind, page = self.current_page, "annotation placed");
        Ok(id)
    }

    pub fn press(&mut self, point: ViewPoint) -> Result<ClickOutcome, PlacementError> {
        let at = self.to_doc(point);

        if let Some(pending) = self.placement.take() {
            let top_left = PageCoordinate::new(at.x - pending.width / 2.0, at.y - pending.height / 2.0);
            let signature =
                SignatureAnnotation::new(top_left, pending.width, pending.height, pending.image)
                    .with_kind(pending.kind);
            return self.place(signature).map(ClickOutcome::Placed);
        }

        match self.tool {
            Tool::Select => {
                let canvas_x = point.x + self.scroll.x;
                let canvas_y = point.y + self.scroll.y;
                match self.store.hit_test(self.current_page, canvas_x, canvas_y, self.zoom, &self.slop)
                {
                    Some(id) => {
                        self.store.select(id);
                        self.gesture = Gesture::Dragging { last: at };
                        Ok(ClickOutcome::Selected(id))
                    }
                    None => {
                        self.store.clear_selection();
                        self.gesture = Gesture::Idle;
                        Ok(ClickOutcome::SelectionCleared)
                    }
                }
            }
            Tool::Text => Ok(ClickOutcome::NeedsText { at }),
            Tool::Signature => Ok(ClickOutcome::NeedsSignature { at, kind: SignatureKind::Signature }),
            Tool::Initials => Ok(ClickOutcome::NeedsSignature { at, kind: SignatureKind::Initials }),
            Tool::Stamp => self.place_stamp(at).map(ClickOutcome::Placed),
            Tool::Rectangle | Tool::Circle | Tool::Line | Tool::Arrow | Tool::Highlight => {
                self.gesture = Gesture::Drawing { start: at, current: at };
                Ok(ClickOutcome::DrawingStarted)
            }
        }
    }

    /// Continues a gesture. Returns whether anything visible changed.
    pub fn drag(&mut self, point: ViewPoint) -> bool {
        let at = self.to_doc(point);
        match self.gesture {
            Gesture::Dragging { last } => {
                let Some(id) = self.store.selected() else {
                    self.gesture = Gesture::Idle;
                    return false;
                };
                let moved = self.store.move_by(id, at.x - last.x, at.y - last.y);
                self.gesture = Gesture::Dragging { last: at };
                moved
            }
            Gesture::Drawing { start, .. } => {
                self.gesture = Gesture::Drawing { start, current: at };
                true
            }
            Gesture::Idle => false,
        }
    }

    /// Ends a gesture. A finished rubber band becomes a shape or highlight;
    /// one with no extent is dropped.
    pub fn release(&mut self, point: ViewPoint) -> Result<Option<AnnotationId>, PlacementError> {
        let at = self.to_doc(point);
        let gesture = std::mem::take(&mut self.gesture);
        let Gesture::Drawing { start, .. } = gesture else {
            return Ok(None);
        };
        if start == at {
            return Ok(None);
        }

        let settings = &self.settings;
        let kind: AnnotationKind = match self.tool.shape_kind() {
            Some(shape) => ShapeAnnotation::new(shape, start, at)
                .with_color(settings.shape_color)
                .with_thickness(settings.shape_thickness)
                .with_fill(settings.shape_fill)
                .into(),
            None if self.tool == Tool::Highlight => {
                HighlightAnnotation::new(start, at).with_color(settings.highlight_color).into()
            }
            None => return Ok(None),
        };
        self.place(kind).map(Some)
    }

    /// Places text with the current text settings. Blank text places
    /// nothing.
    pub fn place_text(
        &mut self,
        at: PageCoordinate,
        text: &str,
    ) -> Result<Option<AnnotationId>, PlacementError> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        let annotation = TextAnnotation::new(at, text)
            .with_font_family(self.settings.font_family.clone())
            .with_font_size(self.settings.font_size)
            .with_color(self.settings.text_color);
        self.place(annotation).map(Some)
    }

    /// Places a signature image centred on `at`, sized by its kind.
    pub fn place_signature(
        &mut self,
        at: PageCoordinate,
        image: Vec<u8>,
        kind: SignatureKind,
    ) -> Result<AnnotationId, PlacementError> {
        validate_image(&image)?;
        let (width, height) = self.signature_box(kind);
        let top_left = PageCoordinate::new(at.x - width / 2.0, at.y - height / 2.0);
        self.place(SignatureAnnotation::new(top_left, width, height, image).with_kind(kind))
    }

    /// Arms a signature for the next press, replacing any armed one.
    pub fn arm_signature(&mut self, image: Vec<u8>, kind: SignatureKind) -> Result<(), PlacementError> {
        validate_image(&image)?;
        let (width, height) = self.signature_box(kind);
        self.placement.arm(PendingSignature { image, width, height, kind });
        tracing::debug!(kind = kind.as_str(), "signature armed");
        Ok(())
    }

    pub fn cancel_placement(&mut self) {
        self.placement.cancel();
    }

    pub fn place_stamp(&mut self, at: PageCoordinate) -> Result<AnnotationId, PlacementError> {
        self.place(StampAnnotation::new(at, self.settings.stamp))
    }

    fn signature_box(&self, kind: SignatureKind) -> (f32, f32) {
        match kind {
            SignatureKind::Signature => (self.config.signature_width, self.config.signature_height),
            SignatureKind::Initials => (self.config.initials_width, self.config.initials_height),
        }
    }

    pub fn delete_selected(&mut self) -> Option<AnnotationId> {
        let id = self.store.selected()?;
        self.gesture = Gesture::Idle;
        self.store.remove(id).then_some(id)
    }

    pub fn undo(&mut self) -> bool {
        self.gesture = Gesture::Idle;
        self.store.undo_once().is_some()
    }

    pub fn redo(&mut self) -> bool {
        self.gesture = Gesture::Idle;
        self.store.redo_once().is_some()
    }

    pub fn next_page(&mut self) -> bool {
        self.go_to_page(self.current_page.saturating_add(1))
    }

    pub fn previous_page(&mut self) -> bool {
        match self.current_page.checked_sub(1) {
            Some(page) => self.go_to_page(page),
            None => false,
        }
    }

    /// Returns false, staying put, when `page` does not exist.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        if page >= self.document.page_count() || page == self.current_page {
            return false;
        }
        self.current_page = page;
        self.store.clear_selection();
        self.gesture = Gesture::Idle;
        self.scroll = ScrollOffset::default();
        tracing::debug!(page, "page changed");
        true
    }

    pub fn zoom_in(&mut self) -> Zoom {
        self.set_zoom(self.zoom.factor() + self.config.zoom_step)
    }

    pub fn zoom_out(&mut self) -> Zoom {
        self.set_zoom(self.zoom.factor() - self.config.zoom_step)
    }

    pub fn reset_zoom(&mut self) -> Zoom {
        self.set_zoom(1.0)
    }

    pub fn set_zoom(&mut self, factor: f32) -> Zoom {
        self.zoom = Zoom::clamped(factor, self.config.zoom_min, self.config.zoom_max);
        self.zoom
    }

    pub fn rotate_clockwise(&mut self) -> Rotation {
        self.rotate_page(self.current_page, Rotation::Deg90)
    }

    pub fn rotate_counter_clockwise(&mut self) -> Rotation {
        self.rotate_page(self.current_page, Rotation::Deg270)
    }

    pub fn reset_rotation(&mut self) {
        self.rotations.reset(self.current_page);
    }

    /// Adds to the pending rotation of any page. Returns the net pending
    /// rotation.
    pub fn rotate_page(&mut self, page_index: u32, delta: Rotation) -> Rotation {
        let net = self.rotations.rotate(page_index, delta);
        tracing::debug!(page = page_index, degrees = net.degrees(), "page rotation pending");
        net
    }

    /// Rasterizes the current page with its pending rotation and composites
    /// its annotations.
    ///
    /// Only a rasterization failure fails the frame; [`Self::last_frame`]
    /// then keeps the last good one. Annotations that cannot be drawn are
    /// left out of the frame and queued once each for
    /// [`Self::take_render_failures`].
    pub fn render(&mut self) -> Result<&RgbaImage, RenderError> {
        let frame = self
            .compose_frame()
            .inspect_err(|err| tracing::warn!(%err, "render failed, keeping last frame"))?;
        for failure in &frame.failures {
            tracing::warn!(%failure, "annotation left out of the preview");
        }
        self.render_failures.extend(frame.failures);
        Ok(self.last_good.insert(frame.image))
    }

    pub fn last_frame(&self) -> Option<&RgbaImage> {
        self.last_good.as_ref()
    }

    /// Drawing failures not yet shown to the user.
    pub fn take_render_failures(&mut self) -> Vec<RenderError> {
        std::mem::take(&mut self.render_failures)
    }

    fn compose_frame(&mut self) -> Result<Composite, RenderError> {
        let page = self.current_page;
        let key = RasterKey {
            page,
            zoom_bits: self.zoom.factor().to_bits(),
            rotation: self.rotations.get(page),
        };

        let base = match self.raster.take() {
            Some((cached, image)) if cached == key => image,
            _ => self
                .document
                .rasterize(RenderRequest { page_index: page, zoom: self.zoom.factor(), rotation: key.rotation })
                .map_err(|source| RenderError::Rasterize { page, source })?,
        };
        let frame = self.compositor.compose(&base, &self.store, page, self.zoom);
        self.raster = Some((key, base));
        Ok(frame)
    }

    /// Flattens onto a copy of the document and writes it back to the
    /// session path, keeping the source's protection.
    pub fn save(&mut self) -> Result<SaveReport, SaveError> {
        let path = self.path.clone();
        self.write_flattened(&path, EncryptionMode::Keep)
    }

    /// Flattens onto a copy of the document and writes it to `path` without
    /// password protection. The session follows the new path on success.
    pub fn save_as(&mut self, path: impl AsRef<Path>) -> Result<SaveReport, SaveError> {
        let path = path.as_ref();
        let report = self.write_flattened(path, EncryptionMode::Remove)?;
        self.path = path.to_path_buf();
        Ok(report)
    }

    /// Writes an unprotected copy next to the source, named
    /// `<stem>_unprotected.<ext>`.
    pub fn save_unprotected(&mut self) -> Result<SaveReport, SaveError> {
        if !self.document.is_encrypted() {
            return Err(SaveError::NotEncrypted);
        }
        let path = unprotected_path(&self.path);
        self.write_flattened(&path, EncryptionMode::Remove)
    }

    fn write_flattened(&self, path: &Path, encryption: EncryptionMode) -> Result<SaveReport, SaveError> {
        let mut fork = self.document.clone();
        let flatten = flatten(&mut fork, &self.store, &self.rotations);
        fork.save(path, &SaveOptions { compress: true, encryption })
            .map_err(|source| SaveError::Write { path: path.to_path_buf(), source })?;

        tracing::info!(
            path = %path.display(),
            applied = flatten.applied,
            failures = flatten.failures.len(),
            "document saved"
        );
        Ok(SaveReport { path: path.to_path_buf(), flatten })
    }
}

fn validate_image(bytes: &[u8]) -> Result<(), PlacementError> {
    image::load_from_memory(bytes).map(|_| ()).map_err(PlacementError::InvalidImage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::ShapeKind;
    use pdf_engine::{RecordingDocument, RecordingEngine};
    use pretty_assertions::assert_eq;

    fn session(pages: u32) -> EditorSession<RecordingDocument> {
        let document = RecordingEngine::new(pages)
            .open(OpenSource::Bytes(Vec::new()), None)
            .expect("open");
        EditorSession::with_document(document, "/tmp/doc.pdf", EditorConfig::default())
    }

    fn png() -> Vec<u8> {
        crate::signature_image::encode_png(&RgbaImage::from_pixel(
            3,
            3,
            image::Rgba([0, 0, 0, 255]),
        ))
        .expect("encode")
    }

    #[test]
    fn armed_signature_wins_over_tool_and_is_consumed() {
        let mut session = session(1);
        session.set_tool(Tool::Stamp);
        session.arm_signature(png(), SignatureKind::Initials).expect("arm");

        let outcome = session.press(ViewPoint::new(100.0, 100.0)).expect("press");
        let ClickOutcome::Placed(id) = outcome else {
            panic!("expected placement, got {outcome:?}");
        };
        let AnnotationKind::Signature(sig) = session.store().get(id).expect("placed").kind() else {
            panic!("expected signature");
        };
        assert_eq!(sig.top_left, PageCoordinate::new(70.0, 85.0));
        assert_eq!((sig.width, sig.height), (60.0, 30.0));
        assert!(!session.is_armed());

        // Slot is empty again: the stamp tool takes over.
        assert!(matches!(session.press(ViewPoint::new(5.0, 5.0)), Ok(ClickOutcome::Placed(_))));
        assert_eq!(session.store().len(), 2);
    }

    #[test]
    fn arming_rejects_undecodable_bytes() {
        let mut session = session(1);
        assert!(matches!(
            session.arm_signature(vec![1, 2, 3], SignatureKind::Signature),
            Err(PlacementError::InvalidImage(_))
        ));
        assert!(!session.is_armed());
    }

    #[test]
    fn text_and_signature_tools_ask_for_input() {
        let mut session = session(1);
        session.set_zoom(2.0);
        session.set_tool(Tool::Text);
        assert_eq!(
            session.press(ViewPoint::new(20.0, 40.0)).expect("press"),
            ClickOutcome::NeedsText { at: PageCoordinate::new(10.0, 20.0) }
        );

        session.set_tool(Tool::Initials);
        assert_eq!(
            session.press(ViewPoint::new(20.0, 40.0)).expect("press"),
            ClickOutcome::NeedsSignature {
                at: PageCoordinate::new(10.0, 20.0),
                kind: SignatureKind::Initials
            }
        );
    }

    #[test]
    fn blank_text_places_nothing() {
        let mut session = session(1);
        assert_eq!(session.place_text(PageCoordinate::new(1.0, 1.0), "   ").expect("ok"), None);
        assert!(session.store().is_empty());
    }

    #[test]
    fn rubber_band_creates_shape_with_settings() {
        let mut session = session(1);
        session.set_tool(Tool::Arrow);
        session.settings_mut().shape_thickness = 4;

        session.press(ViewPoint::new(10.0, 10.0)).expect("press");
        assert!(session.drag(ViewPoint::new(30.0, 20.0)));
        assert!(session.drawing_preview().is_some());
        let id = session.release(ViewPoint::new(50.0, 40.0)).expect("release").expect("created");

        let AnnotationKind::Shape(shape) = session.store().get(id).expect("placed").kind() else {
            panic!("expected shape");
        };
        assert_eq!(shape.shape, ShapeKind::Arrow);
        assert_eq!(shape.end, PageCoordinate::new(50.0, 40.0));
        assert_eq!(shape.thickness, 4);
        assert!(session.drawing_preview().is_none());
    }

    #[test]
    fn click_without_drag_draws_nothing() {
        let mut session = session(1);
        session.set_tool(Tool::Highlight);
        session.press(ViewPoint::new(10.0, 10.0)).expect("press");
        assert_eq!(session.release(ViewPoint::new(10.0, 10.0)).expect("release"), None);
        assert!(session.store().is_empty());
    }

    #[test]
    fn select_uses_scrolled_canvas_position() {
        let mut session = session(1);
        let id = session.place_stamp(PageCoordinate::new(200.0, 300.0)).expect("stamp");
        session.set_scroll(ScrollOffset::new(150.0, 250.0));

        assert_eq!(session.press(ViewPoint::new(60.0, 60.0)).expect("press"), ClickOutcome::Selected(id));
        assert!(session.drag(ViewPoint::new(70.0, 65.0)));
        session.release(ViewPoint::new(70.0, 65.0)).expect("release");

        let AnnotationKind::Stamp(stamp) = session.store().get(id).expect("placed").kind() else {
            panic!("expected stamp");
        };
        assert_eq!(stamp.anchor, PageCoordinate::new(210.0, 305.0));

        assert_eq!(session.press(ViewPoint::new(0.0, 0.0)).expect("press"), ClickOutcome::SelectionCleared);
        assert_eq!(session.store().selected(), None);
    }

    #[test]
    fn delete_selected_then_undo_restores() {
        let mut session = session(1);
        let id = session.place_stamp(PageCoordinate::new(0.0, 0.0)).expect("stamp");
        session.press(ViewPoint::new(10.0, 10.0)).expect("press");

        assert_eq!(session.delete_selected(), Some(id));
        assert!(session.store().is_empty());
        assert_eq!(session.delete_selected(), None);

        assert!(session.undo());
        assert!(session.store().contains(id));
        assert!(session.undo());
        assert!(session.store().is_empty());
    }

    #[test]
    fn navigation_is_bounded_and_clears_selection() {
        let mut session = session(2);
        let id = session.place_stamp(PageCoordinate::new(0.0, 0.0)).expect("stamp");
        session.press(ViewPoint::new(10.0, 10.0)).expect("press");
        assert_eq!(session.store().selected(), Some(id));

        assert!(!session.previous_page());
        assert!(session.next_page());
        assert_eq!(session.store().selected(), None);
        assert!(!session.next_page());
        assert_eq!(session.current_page(), 1);
        assert!(!session.go_to_page(9));
    }

    #[test]
    fn zoom_steps_and_clamps() {
        let mut session = session(1);
        assert_eq!(session.zoom_in().factor(), 1.25);
        for _ in 0..40 {
            session.zoom_in();
        }
        assert_eq!(session.zoom().factor(), 5.0);
        for _ in 0..40 {
            session.zoom_out();
        }
        assert_eq!(session.zoom().factor(), 0.25);
        assert_eq!(session.reset_zoom().factor(), 1.0);
    }

    #[test]
    fn rotation_controls_track_current_page() {
        let mut session = session(2);
        assert_eq!(session.rotate_counter_clockwise(), Rotation::Deg270);
        assert_eq!(session.rotate_clockwise(), Rotation::Deg0);
        session.rotate_clockwise();
        session.next_page();
        session.rotate_clockwise();
        session.reset_rotation();

        assert_eq!(session.rotations().get(0), Rotation::Deg90);
        assert_eq!(session.rotations().get(1), Rotation::Deg0);
    }

    #[test]
    fn render_reflects_pending_rotation() {
        let mut session = session(1);
        let upright = session.render().expect("render").dimensions();
        session.rotate_clockwise();
        let turned = session.render().expect("render").dimensions();
        assert_eq!(upright, (612, 792));
        assert_eq!(turned, (792, 612));
    }

    #[test]
    fn undecodable_signature_does_not_block_the_frame() {
        let mut session = session(1);
        session
            .add_annotation(
                Annotation::new(
                    0,
                    SignatureAnnotation::new(PageCoordinate::new(0.0, 0.0), 10.0, 10.0, vec![9, 9]),
                )
                .expect("valid"),
            )
            .expect("add");
        session
            .add_annotation(
                Annotation::new(
                    0,
                    ShapeAnnotation::new(
                        ShapeKind::Rectangle,
                        PageCoordinate::new(20.0, 20.0),
                        PageCoordinate::new(40.0, 40.0),
                    )
                    .with_fill(true),
                )
                .expect("valid"),
            )
            .expect("add");

        let frame = session.render().expect("render");
        assert_eq!(*frame.get_pixel(30, 30), image::Rgba([255, 0, 0, 255]));
        let failures = session.take_render_failures();
        assert_eq!(failures.len(), 1);
        assert!(matches!(failures[0], RenderError::SignatureDecode { .. }));

        session.render().expect("render");
        assert!(session.take_render_failures().is_empty());
        assert!(session.last_frame().is_some());
    }

    #[test]
    fn annotations_on_missing_pages_are_rejected() {
        let mut session = session(1);
        let annotation = Annotation::new(3, StampAnnotation::new(PageCoordinate::new(0.0, 0.0), Default::default()))
            .expect("valid");
        assert!(matches!(
            session.add_annotation(annotation),
            Err(PlacementError::PageOutOfRange { page: 3, page_count: 1 })
        ));
    }

    #[test]
    fn save_unprotected_requires_encrypted_source() {
        let mut session = session(1);
        assert!(matches!(session.save_unprotected(), Err(SaveError::NotEncrypted)));
    }
}
