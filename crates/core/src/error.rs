//! Error types for the editor core.

use crate::annotation::AnnotationId;
use pdf_engine::PdfEngineError;
use std::path::PathBuf;
use thiserror::Error;

/// Rejected annotation geometry.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AnnotationError {
    #[error("annotation coordinates must be finite")]
    NonFinite,

    #[error("font size must be positive, got {0}")]
    FontSize(f32),

    #[error("dimensions must be positive, got {width}x{height}")]
    Dimensions { width: f32, height: f32 },

    #[error("stroke thickness must be at least 1")]
    Thickness,
}

#[derive(Debug, Error)]
pub enum OpenError {
    #[error("document not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("document is password protected")]
    PasswordRequired,

    #[error("incorrect password")]
    WrongPassword,

    #[error("failed to open document: {0}")]
    Engine(#[source] PdfEngineError),
}

impl OpenError {
    pub(crate) fn from_engine(path: &std::path::Path, err: PdfEngineError) -> Self {
        match err {
            PdfEngineError::PasswordRequired => Self::PasswordRequired,
            PdfEngineError::WrongPassword => Self::WrongPassword,
            PdfEngineError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                Self::NotFound(path.to_path_buf())
            }
            other => Self::Engine(other),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to rasterize page {page}: {source}")]
    Rasterize {
        page: u32,
        #[source]
        source: PdfEngineError,
    },

    #[error("signature image of annotation {id} could not be decoded: {source}")]
    SignatureDecode {
        id: AnnotationId,
        #[source]
        source: image::ImageError,
    },
}

/// A single failure during flattening. Flattening continues past these.
#[derive(Debug, Error)]
pub enum FlattenError {
    #[error("failed to rotate page {page}: {source}")]
    Rotation {
        page: u32,
        #[source]
        source: PdfEngineError,
    },

    #[error("failed to write {kind} annotation {id} on page {page}: {source}")]
    Annotation {
        id: AnnotationId,
        page: u32,
        kind: &'static str,
        #[source]
        source: PdfEngineError,
    },
}

impl FlattenError {
    /// The annotation that failed, if this was an annotation failure.
    pub fn id(&self) -> Option<AnnotationId> {
        match self {
            Self::Annotation { id, .. } => Some(*id),
            Self::Rotation { .. } => None,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            Self::Rotation { page, .. } | Self::Annotation { page, .. } => *page,
        }
    }
}

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: PdfEngineError,
    },

    #[error("document is not password protected")]
    NotEncrypted,
}

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("signature image is not a decodable image: {0}")]
    InvalidImage(#[source] image::ImageError),

    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },

    #[error(transparent)]
    Annotation(#[from] AnnotationError),
}
