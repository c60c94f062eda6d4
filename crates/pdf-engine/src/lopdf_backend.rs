use crate::content;
use crate::{
    placeholder_raster, EncryptionMode, OpenSource, PageSize, PdfDocument, PdfEngine,
    PdfEngineError, PdfPoint, PdfRect, RenderRequest, RgbaImage, Rotation, SaveOptions, Shape,
    StandardFont, StrokeStyle, TextStyle, DEFAULT_PAGE_SIZE,
};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Depth limit when walking `/Parent` chains.
const MAX_INHERIT_DEPTH: usize = 32;

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfEngine;

impl LopdfEngine {
    pub fn new() -> Self {
        Self
    }
}

impl PdfEngine for LopdfEngine {
    type Document = LopdfDocument;

    fn open(
        &self,
        source: OpenSource,
        password: Option<&str>,
    ) -> Result<LopdfDocument, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let mut doc = Document::load_mem(&bytes)?;
        let encrypted = doc.is_encrypted();
        if encrypted {
            unlock(&mut doc, password)?;
        }

        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        tracing::debug!(pages = pages.len(), encrypted, "opened document");
        Ok(LopdfDocument { doc, pages, encrypted, fonts: HashMap::new() })
    }
}

fn unlock(doc: &mut Document, password: Option<&str>) -> Result<(), PdfEngineError> {
    let mut attempt = doc.clone();
    if attempt.decrypt("").is_ok() {
        *doc = attempt;
        return Ok(());
    }

    let password = password.ok_or(PdfEngineError::PasswordRequired)?;
    let mut attempt = doc.clone();
    attempt.decrypt(password).map_err(|_| PdfEngineError::WrongPassword)?;
    *doc = attempt;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct LopdfDocument {
    doc: Document,
    pages: Vec<ObjectId>,
    encrypted: bool,
    fonts: HashMap<StandardFont, ObjectId>,
}

impl LopdfDocument {
    fn page_id(&self, page_index: u32) -> Result<ObjectId, PdfEngineError> {
        self.pages.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.pages.len() as u32,
        })
    }

    /// Looks `key` up on the page, then through its `/Parent` chain.
    /// The value is returned unresolved.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut current = Some(page_id);
        for _ in 0..MAX_INHERIT_DEPTH {
            let id = current?;
            let dict = self.doc.get_dictionary(id).ok()?;
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        }
        None
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.doc.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    fn media_box(&self, page_id: ObjectId) -> PdfRect {
        self.inherited(page_id, b"MediaBox")
            .map(|object| self.resolve(object))
            .and_then(|object| object.as_array().ok())
            .and_then(|array| {
                if array.len() != 4 {
                    return None;
                }
                let x0 = array[0].as_float().ok()?;
                let y0 = array[1].as_float().ok()?;
                let x1 = array[2].as_float().ok()?;
                let y1 = array[3].as_float().ok()?;
                Some(PdfRect::new(x0, y0, x1, y1).normalized())
            })
            .unwrap_or(PdfRect::new(0.0, 0.0, DEFAULT_PAGE_SIZE.width_pt, DEFAULT_PAGE_SIZE.height_pt))
    }

    /// Page space (top-left origin, y down) to PDF user space.
    fn to_user_point(&self, page_id: ObjectId, point: PdfPoint) -> PdfPoint {
        let media_box = self.media_box(page_id);
        PdfPoint::new(media_box.x0 + point.x, media_box.y1 - point.y)
    }

    fn to_user_rect(&self, page_id: ObjectId, rect: PdfRect) -> PdfRect {
        let a = self.to_user_point(page_id, PdfPoint::new(rect.x0, rect.y0));
        let b = self.to_user_point(page_id, PdfPoint::new(rect.x1, rect.y1));
        PdfRect::new(a.x, a.y, b.x, b.y).normalized()
    }

    fn to_user_shape(&self, page_id: ObjectId, shape: &Shape) -> Shape {
        match shape {
            Shape::Rectangle(rect) => Shape::Rectangle(self.to_user_rect(page_id, *rect)),
            Shape::Ellipse(rect) => Shape::Ellipse(self.to_user_rect(page_id, *rect)),
            Shape::Line { from, to } => Shape::Line {
                from: self.to_user_point(page_id, *from),
                to: self.to_user_point(page_id, *to),
            },
        }
    }

    fn page_dict_mut(&mut self, page_id: ObjectId) -> Result<&mut Dictionary, PdfEngineError> {
        Ok(self.doc.get_object_mut(page_id)?.as_dict_mut()?)
    }

    /// Gives the page a resources dictionary it can be written through.
    /// Inline dictionaries are lifted into their own object; shared
    /// references are kept shared.
    fn resources_id(&mut self, page_id: ObjectId) -> Result<ObjectId, PdfEngineError> {
        match self.inherited(page_id, b"Resources").cloned() {
            Some(Object::Reference(id)) => Ok(id),
            other => {
                let dict = match other {
                    Some(Object::Dictionary(dict)) => dict,
                    _ => Dictionary::new(),
                };
                let id = self.doc.add_object(dict);
                self.page_dict_mut(page_id)?.set("Resources", Object::Reference(id));
                Ok(id)
            }
        }
    }

    /// Registers `target` under a fresh name in the page's `category`
    /// resources and returns that name.
    fn register_resource(
        &mut self,
        page_id: ObjectId,
        category: &[u8],
        prefix: &str,
        target: ObjectId,
    ) -> Result<String, PdfEngineError> {
        let resources_id = self.resources_id(page_id)?;
        let existing = self.doc.get_dictionary(resources_id)?.get(category).ok().cloned();

        let (category_id, mut names) = match existing {
            Some(Object::Reference(id)) => (Some(id), self.doc.get_dictionary(id)?.clone()),
            Some(Object::Dictionary(dict)) => (None, dict),
            _ => (None, Dictionary::new()),
        };

        let name = (1..)
            .map(|n| format!("{prefix}{n}"))
            .find(|candidate| !names.has(candidate.as_bytes()))
            .unwrap_or_else(|| prefix.to_owned());
        names.set(name.clone(), Object::Reference(target));

        match category_id {
            Some(id) => *self.doc.get_object_mut(id)? = Object::Dictionary(names),
            None => {
                self.doc.get_object_mut(resources_id)?.as_dict_mut()?.set(category, names);
            }
        }

        Ok(name)
    }

    fn font_object(&mut self, font: StandardFont) -> ObjectId {
        if let Some(id) = self.fonts.get(&font) {
            return *id;
        }
        let id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font_name(),
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.insert(font, id);
        id
    }

    fn append_content(&mut self, page_id: ObjectId, stream: String) -> Result<(), PdfEngineError> {
        self.doc.add_page_contents(page_id, stream.into_bytes())?;
        Ok(())
    }

    fn push_annotation(&mut self, page_id: ObjectId, annot_id: ObjectId) -> Result<(), PdfEngineError> {
        let existing = self.doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();
        match existing {
            Some(Object::Reference(id)) => {
                self.doc.get_object_mut(id)?.as_array_mut()?.push(Object::Reference(annot_id));
            }
            Some(Object::Array(mut annots)) => {
                annots.push(Object::Reference(annot_id));
                self.page_dict_mut(page_id)?.set("Annots", annots);
            }
            _ => {
                self.page_dict_mut(page_id)?
                    .set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
            }
        }
        Ok(())
    }
}

impl PdfDocument for LopdfDocument {
    fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    fn page_size(&self, page_index: u32) -> Result<PageSize, PdfEngineError> {
        let media_box = self.media_box(self.page_id(page_index)?);
        Ok(PageSize { width_pt: media_box.width(), height_pt: media_box.height() })
    }

    fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn rasterize(&self, request: RenderRequest) -> Result<RgbaImage, PdfEngineError> {
        let size = self.page_size(request.page_index)?;
        let rotation = self.page_rotation(request.page_index)?.rotate_by(request.rotation);
        Ok(placeholder_raster(size, request.zoom, rotation))
    }

    fn page_rotation(&self, page_index: u32) -> Result<Rotation, PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        let Some(value) = self.inherited(page_id, b"Rotate") else {
            return Ok(Rotation::Deg0);
        };
        let degrees = self.resolve(value).as_i64()?;
        Rotation::from_degrees(degrees).ok_or(PdfEngineError::InvalidRotation(degrees))
    }

    fn set_page_rotation(
        &mut self,
        page_index: u32,
        rotation: Rotation,
    ) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        self.page_dict_mut(page_id)?.set("Rotate", Object::Integer(rotation.degrees()));
        Ok(())
    }

    fn insert_text(
        &mut self,
        page_index: u32,
        origin: PdfPoint,
        text: &str,
        style: &TextStyle,
    ) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        let font_id = self.font_object(style.font);
        let resource = self.register_resource(page_id, b"Font", "AnnF", font_id)?;
        let origin = self.to_user_point(page_id, origin);
        self.append_content(page_id, content::text(&resource, origin, text, style))
    }

    fn insert_image(
        &mut self,
        page_index: u32,
        rect: PdfRect,
        image: &[u8],
    ) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        let decoded = image::load_from_memory(image)?.to_rgba8();
        let (width, height) = decoded.dimensions();

        let mut rgb = Vec::with_capacity(sample_count(width, height, 3));
        let mut alpha = Vec::with_capacity(sample_count(width, height, 1));
        for pixel in decoded.pixels() {
            rgb.extend_from_slice(&pixel.0[..3]);
            alpha.push(pixel[3]);
        }

        let smask_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        let image_id = self.doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => smask_id,
            },
            rgb,
        ));

        let resource = self.register_resource(page_id, b"XObject", "AnnIm", image_id)?;
        let rect = self.to_user_rect(page_id, rect);
        self.append_content(page_id, content::image(&resource, rect))
    }

    fn draw_shape(
        &mut self,
        page_index: u32,
        shape: &Shape,
        stroke: &StrokeStyle,
    ) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        let shape = self.to_user_shape(page_id, shape);
        self.append_content(page_id, content::shape(&shape, stroke))
    }

    fn add_highlight(
        &mut self,
        page_index: u32,
        rect: PdfRect,
        color: [f32; 3],
    ) -> Result<(), PdfEngineError> {
        let page_id = self.page_id(page_index)?;
        let rect = self.to_user_rect(page_id, rect);
        let [r, g, b] = color;

        let annot_id = self.doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Highlight",
            "Rect" => vec![rect.x0.into(), rect.y0.into(), rect.x1.into(), rect.y1.into()],
            "QuadPoints" => vec![
                rect.x0.into(), rect.y1.into(),
                rect.x1.into(), rect.y1.into(),
                rect.x0.into(), rect.y0.into(),
                rect.x1.into(), rect.y0.into(),
            ],
            "C" => vec![r.into(), g.into(), b.into()],
            "CA" => 0.4_f32,
            "F" => 4,
            "P" => page_id,
        });
        self.push_annotation(page_id, annot_id)
    }

    fn save(&mut self, path: &Path, options: &SaveOptions) -> Result<(), PdfEngineError> {
        if self.encrypted {
            match options.encryption {
                EncryptionMode::Keep => return Err(PdfEngineError::EncryptionUnsupported),
                EncryptionMode::Remove => {
                    self.doc.trailer.remove(b"Encrypt");
                }
            }
        }

        if options.compress {
            self.doc.compress();
        }
        self.doc.save(path)?;
        tracing::debug!(path = %path.display(), "saved document");
        Ok(())
    }
}

/// Byte count of a `width` x `height` raster with `channels` bytes per pixel.
fn sample_count(width: u32, height: u32, channels: usize) -> usize {
    width as usize * height as usize * channels
}

/// Builds an unencrypted document of `page_count` blank pages.
pub fn blank_pdf(page_count: u32, size: PageSize) -> Result<Vec<u8>, PdfEngineError> {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let kids: Vec<Object> = (0..page_count)
        .map(|_| {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), size.width_pt.into(), size.height_pt.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {},
            });
            Object::Reference(page_id)
        })
        .collect();

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}
