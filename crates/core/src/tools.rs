//! Editing tools and their settings.

use crate::annotation::{Color, ShapeKind, SignatureKind, StampKind, TextColor};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Tool {
    #[default]
    Select,
    Text,
    Signature,
    Initials,
    Stamp,
    Rectangle,
    Circle,
    Line,
    Arrow,
    Highlight,
}

impl Tool {
    pub const ALL: [Tool; 10] = [
        Self::Select,
        Self::Text,
        Self::Signature,
        Self::Initials,
        Self::Stamp,
        Self::Rectangle,
        Self::Circle,
        Self::Line,
        Self::Arrow,
        Self::Highlight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Text => "text",
            Self::Signature => "signature",
            Self::Initials => "initials",
            Self::Stamp => "stamp",
            Self::Rectangle => "rectangle",
            Self::Circle => "circle",
            Self::Line => "line",
            Self::Arrow => "arrow",
            Self::Highlight => "highlight",
        }
    }

    /// The shape a drag with this tool produces.
    pub fn shape_kind(self) -> Option<ShapeKind> {
        match self {
            Self::Rectangle => Some(ShapeKind::Rectangle),
            Self::Circle => Some(ShapeKind::Circle),
            Self::Line => Some(ShapeKind::Line),
            Self::Arrow => Some(ShapeKind::Arrow),
            _ => None,
        }
    }

    pub fn signature_kind(self) -> Option<SignatureKind> {
        match self {
            Self::Signature => Some(SignatureKind::Signature),
            Self::Initials => Some(SignatureKind::Initials),
            _ => None,
        }
    }

    /// Whether pressing with this tool starts a rubber-band drag.
    pub fn draws(self) -> bool {
        self.shape_kind().is_some() || self == Self::Highlight
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tool {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|tool| tool.name().eq_ignore_ascii_case(value))
            .ok_or_else(|| format!("unknown tool '{value}'"))
    }
}

/// Attributes applied to newly created annotations.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSettings {
    pub font_family: String,
    pub font_size: f32,
    pub text_color: TextColor,
    pub shape_color: Color,
    pub shape_thickness: u32,
    pub shape_fill: bool,
    pub highlight_color: Color,
    pub stamp: StampKind,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            font_family: "helv".to_owned(),
            font_size: 12.0,
            text_color: TextColor::BLACK,
            shape_color: Color::RED,
            shape_thickness: 2,
            shape_fill: false,
            highlight_color: Color::YELLOW,
            stamp: StampKind::Approved,
        }
    }
}
