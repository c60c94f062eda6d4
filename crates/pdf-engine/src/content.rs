//! Content-stream fragments appended to page contents.
//!
//! Every fragment is wrapped in `q`/`Q` so it leaves the page's graphics
//! state untouched.

use crate::{PdfPoint, PdfRect, Shape, StrokeStyle, TextStyle};

/// Bézier control distance for a quarter ellipse.
const KAPPA: f32 = 0.552_284_8;

pub(crate) fn text(font_resource: &str, origin: PdfPoint, text: &str, style: &TextStyle) -> String {
    let [r, g, b] = style.color;
    let mut stream = String::from("q\nBT\n");
    stream.push_str(&format!("/{} {} Tf\n", font_resource, style.size));
    stream.push_str(&format!("{} {} {} rg\n", r, g, b));
    stream.push_str(&format!("{} {} Td\n", origin.x, origin.y));
    stream.push_str(&format!("({}) Tj\n", escape_literal(text)));
    stream.push_str("ET\nQ\n");
    stream
}

pub(crate) fn image(xobject_resource: &str, rect: PdfRect) -> String {
    let rect = rect.normalized();
    format!(
        "q\n{} 0 0 {} {} {} cm\n/{} Do\nQ\n",
        rect.width(),
        rect.height(),
        rect.x0,
        rect.y0,
        xobject_resource
    )
}

pub(crate) fn shape(shape: &Shape, stroke: &StrokeStyle) -> String {
    let [r, g, b] = stroke.color;
    let mut stream = String::from("q\n");
    stream.push_str(&format!("{} {} {} RG\n", r, g, b));
    stream.push_str(&format!("{} w\n", stroke.width));
    if let Some([r, g, b]) = stroke.fill {
        stream.push_str(&format!("{} {} {} rg\n", r, g, b));
    }

    match shape {
        Shape::Line { from, to } => {
            stream.push_str(&format!("{} {} m\n{} {} l\nS\n", from.x, from.y, to.x, to.y));
        }
        Shape::Rectangle(rect) => {
            let rect = rect.normalized();
            stream.push_str(&format!(
                "{} {} {} {} re\n",
                rect.x0,
                rect.y0,
                rect.width(),
                rect.height()
            ));
            stream.push_str(if stroke.fill.is_some() { "B\n" } else { "S\n" });
        }
        Shape::Ellipse(rect) => {
            let rect = rect.normalized();
            ellipse_path(&mut stream, rect);
            stream.push_str(if stroke.fill.is_some() { "b\n" } else { "s\n" });
        }
    }

    stream.push_str("Q\n");
    stream
}

fn ellipse_path(stream: &mut String, rect: PdfRect) {
    let cx = (rect.x0 + rect.x1) / 2.0;
    let cy = (rect.y0 + rect.y1) / 2.0;
    let rx = rect.width() / 2.0;
    let ry = rect.height() / 2.0;
    let kx = rx * KAPPA;
    let ky = ry * KAPPA;

    stream.push_str(&format!("{} {} m\n", cx + rx, cy));
    let curves = [
        [cx + rx, cy + ky, cx + kx, cy + ry, cx, cy + ry],
        [cx - kx, cy + ry, cx - rx, cy + ky, cx - rx, cy],
        [cx - rx, cy - ky, cx - kx, cy - ry, cx, cy - ry],
        [cx + kx, cy - ry, cx + rx, cy - ky, cx + rx, cy],
    ];
    for [x1, y1, x2, y2, x3, y3] in curves {
        stream.push_str(&format!("{} {} {} {} {} {} c\n", x1, y1, x2, y2, x3, y3));
    }
}

/// Encodes `text` as a WinAnsi literal string body. Characters outside
/// Latin-1 become `?`.
pub(crate) fn escape_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '(' => out.push_str("\\("),
            ')' => out.push_str("\\)"),
            '\n' | '\r' => out.push(' '),
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            c if (c as u32) <= 0xFF => out.push_str(&format!("\\{:03o}", c as u32)),
            _ => out.push('?'),
        }
    }
    out
}
