//! An in-memory backend that records what would be written.
//!
//! Used for dry runs and by tests that need to observe exactly which
//! primitives a flatten pass produced.

use crate::{
    placeholder_raster, EncryptionMode, OpenSource, PageSize, PdfDocument, PdfEngine,
    PdfEngineError, PdfPoint, PdfRect, RenderRequest, RgbaImage, Rotation, SaveOptions, Shape,
    StrokeStyle, TextStyle, DEFAULT_PAGE_SIZE,
};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Text { page: u32, origin: PdfPoint, text: String, style: TextStyle },
    Image { page: u32, rect: PdfRect, width_px: u32, height_px: u32 },
    Shape { page: u32, shape: Shape, stroke: StrokeStyle },
    Highlight { page: u32, rect: PdfRect, color: [f32; 3] },
    Rotation { page: u32, rotation: Rotation },
}

impl Primitive {
    pub fn page(&self) -> u32 {
        match self {
            Self::Text { page, .. }
            | Self::Image { page, .. }
            | Self::Shape { page, .. }
            | Self::Highlight { page, .. }
            | Self::Rotation { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordingEngine {
    page_sizes: Vec<PageSize>,
    password: Option<String>,
    save_error: Option<String>,
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new(1)
    }
}

impl RecordingEngine {
    /// Engine whose documents have `page_count` letter-sized pages.
    pub fn new(page_count: u32) -> Self {
        Self {
            page_sizes: vec![DEFAULT_PAGE_SIZE; page_count as usize],
            password: None,
            save_error: None,
        }
    }

    pub fn with_page_sizes(mut self, sizes: Vec<PageSize>) -> Self {
        self.page_sizes = sizes;
        self
    }

    /// Documents open only with this user password. The empty password
    /// never unlocks them.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Every save fails with `message`.
    pub fn with_save_error(mut self, message: impl Into<String>) -> Self {
        self.save_error = Some(message.into());
        self
    }
}

impl PdfEngine for RecordingEngine {
    type Document = RecordingDocument;

    fn open(
        &self,
        source: OpenSource,
        password: Option<&str>,
    ) -> Result<RecordingDocument, PdfEngineError> {
        if let OpenSource::Path(path) = &source {
            if !path.exists() {
                return Err(PdfEngineError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("{} not found", path.display()),
                )));
            }
        }

        if let Some(expected) = &self.password {
            match password {
                None => return Err(PdfEngineError::PasswordRequired),
                Some(given) if given != expected => return Err(PdfEngineError::WrongPassword),
                Some(_) => {}
            }
        }

        Ok(RecordingDocument {
            pages: self
                .page_sizes
                .iter()
                .map(|size| RecordedPage { size: *size, rotation: Rotation::Deg0 })
                .collect(),
            encrypted: self.password.is_some(),
            primitives: Vec::new(),
            saved: Vec::new(),
            save_error: self.save_error.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct RecordedPage {
    size: PageSize,
    rotation: Rotation,
}

#[derive(Debug, Clone)]
pub struct RecordingDocument {
    pages: Vec<RecordedPage>,
    encrypted: bool,
    primitives: Vec<Primitive>,
    saved: Vec<(PathBuf, SaveOptions)>,
    save_error: Option<String>,
}

impl RecordingDocument {
    /// Copies page geometry and rotation from any open document.
    pub fn mirror<D: PdfDocument>(source: &D) -> Result<Self, PdfEngineError> {
        let pages = (0..source.page_count())
            .map(|index| {
                Ok(RecordedPage {
                    size: source.page_size(index)?,
                    rotation: source.page_rotation(index)?,
                })
            })
            .collect::<Result<Vec<_>, PdfEngineError>>()?;

        Ok(Self {
            pages,
            encrypted: source.is_encrypted(),
            primitives: Vec::new(),
            saved: Vec::new(),
            save_error: None,
        })
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn saved_paths(&self) -> impl Iterator<Item = &Path> {
        self.saved.iter().map(|(path, _)| path.as_path())
    }

    pub fn last_save_options(&self) -> Option<SaveOptions> {
        self.saved.last().map(|(_, options)| *options)
    }

    fn check_page(&self, page_index: u32) -> Result<&RecordedPage, PdfEngineError> {
        self.pages.get(page_index as usize).ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }
}

impl PdfDocument for RecordingDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        Ok(self.check_page(page_index)?.size)
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn rasterize(&self, request: RenderRequest) -> Result<RgbaImage, PdfEngineError> {
        let page = self.check_page(request.page_index)?;
        Ok(placeholder_raster(page.size, request.zoom, page.rotation.rotate_by(request.rotation)))
    }

    fn page_rotation(&self, page_index: u32) -> Result<Rotation, PdfEngineError> {
        Ok(self.check_page(page_index)?.rotation)
    }

    fn set_page_rotation(
        &mut self,
        page_index: u32,
        rotation: Rotation,
    ) -> Result<(), PdfEngineError> {
        self.check_page(page_index)?;
        self.pages[page_index as usize].rotation = rotation;
        self.primitives.push(Primitive::Rotation { page: page_index, rotation });
        Ok(())
    }

    fn insert_text(
        &mut self,
        page_index: u32,
        origin: PdfPoint,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), PdfEngineError> {
        self.check_page(page_index)?;
        self.primitives.push(Primitive::Text {
            page: page_index,
            origin,
            text: text.to_owned(),
            style: *style,
        });
        Ok(())
    }

    fn insert_image(
        &mut self,
        page_index: u32,
        rect: PdfRect,
        image: &[u8],
    ) -> Result<(), PdfEngineError> {
        self.check_page(page_index)?;
        let decoded = image::load_from_memory(image)?;
        self.primitives.push(Primitive::Image {
            page: page_index,
            rect,
            width_px: decoded.width(),
            height_px: decoded.height(),
        });
        Ok(())
    }

    fn draw_shape(
        &mut self,
        page_index: u32,
        shape: &Shape,
        stroke: &StrokeStyle,
    ) -> Result<(), PdfEngineError> {
        self.check_page(page_index)?;
        self.primitives.push(Primitive::Shape { page: page_index, shape: *shape, stroke: *stroke });
        Ok(())
    }

    fn add_highlight(
        &mut self,
        page_index: u32,
        rect: PdfRect,
        color: [f32; 3],
    ) -> Result<(), PdfEngineError> {
        self.check_page(page_index)?;
        self.primitives.push(Primitive::Highlight { page: page_index, rect, color });
        Ok(())
    }

    fn save(&mut self, path: &Path, options: &SaveOptions) -> Result<(), PdfEngineError> {
        if let Some(message) = &self.save_error {
            return Err(PdfEngineError::Backend(message.clone()));
        }
        if self.encrypted && options.encryption == EncryptionMode::Keep {
            return Err(PdfEngineError::EncryptionUnsupported);
        }
        self.saved.push((path.to_path_buf(), *options));
        Ok(())
    }
}
