//! Render pipeline: page raster plus the page's annotations.

use crate::annotation::AnnotationId;
use crate::error::RenderError;
use crate::fonts::Fonts;
use crate::geometry::Zoom;
use crate::store::AnnotationStore;
use crate::surface::{ImageCache, Surface};
use image::RgbaImage;
use std::collections::HashSet;

pub const DEFAULT_HIGHLIGHT_ALPHA: u8 = 100;

/// One composited frame.
#[derive(Debug)]
pub struct Composite {
    pub image: RgbaImage,
    /// Annotations that failed to draw for the first time in this frame.
    /// An annotation that keeps failing is reported only once.
    pub failures: Vec<RenderError>,
}

/// Composites annotations over page rasters.
///
/// Holds the fonts and the decoded-signature cache between frames; neither
/// changes what a frame looks like, only how fast it is produced.
#[derive(Debug)]
pub struct Compositor {
    fonts: Fonts,
    highlight_alpha: u8,
    images: ImageCache,
    reported: HashSet<AnnotationId>,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(Fonts::default(), DEFAULT_HIGHLIGHT_ALPHA)
    }
}

impl Compositor {
    pub fn new(fonts: Fonts, highlight_alpha: u8) -> Self {
        Self { fonts, highlight_alpha, images: ImageCache::default(), reported: HashSet::new() }
    }

    pub fn fonts(&self) -> &Fonts {
        &self.fonts
    }

    pub fn cached_images(&self) -> usize {
        self.images.len()
    }

    /// Draws every annotation on `page_index` over a copy of `base`, oldest
    /// first. The same store, page and zoom always yield the same pixels.
    ///
    /// A signature that cannot be decoded is skipped; the rest of the page
    /// is still drawn.
    pub fn compose(
        &mut self,
        base: &RgbaImage,
        store: &AnnotationStore,
        page_index: u32,
        zoom: Zoom,
    ) -> Composite {
        let mut image = base.clone();
        let mut failures = Vec::new();
        {
            let mut surface =
                Surface::new(&mut image, &self.fonts, &mut self.images, self.highlight_alpha);
            for annotation in store.annotations_for_page(page_index) {
                let Err(source) = annotation.render(&mut surface, zoom) else {
                    continue;
                };
                let id = annotation.id();
                if self.reported.insert(id) {
                    failures.push(RenderError::SignatureDecode { id, source });
                }
            }
        }
        self.images.retain(|id| store.contains(*id));
        self.reported.retain(|id| store.contains(*id));
        Composite { image, failures }
    }
}
