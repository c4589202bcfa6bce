//! Visible appearance of the signature widget.
//!
//! The normal appearance is a stack of form XObjects:
//!
//! ```text
//! /N   q /FRM Do Q
//! /FRM q /n0 Do Q q /n2 Do Q
//! /n0  % DSBlank        (background layer, empty)
//! /n2  BT /F1 .. Tf .. ET (description text)
//! ```
//!
//! Text is set in the standard Helvetica font with WinAnsi encoding and is
//! sized to fit the box.

use crate::geometry::Rect;
use crate::object::{Dictionary, Object, ObjectRef};
use crate::writer::{IncrementalUpdate, ObjectSerializer};

/// Largest font size used for the description.
const MAX_FONT_SIZE: f32 = 12.0;

/// Smallest font size used for the description.
const MIN_FONT_SIZE: f32 = 1.0;

/// Inner padding of the text block.
const MARGIN: f32 = 2.0;

/// Line height as a multiple of the font size.
const LEADING: f32 = 1.2;

/// Helvetica ascender in 1/1000 em.
const HELVETICA_ASCENT: f32 = 718.0;

/// Annotation flags: Print | Locked.
const WIDGET_FLAGS: i64 = 132;

/// Helvetica advance widths for codes 32..=126, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556,
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778,
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556,
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556,
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584,
];

/// Helvetica advance widths for WinAnsi codes 0xA0..=0xFF, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_LATIN1_WIDTHS: [u16; 96] = [
    278, 333, 556, 556, 556, 556, 260, 556, 333, 737, 370, 556, 584, 333, 737, 333,
    400, 584, 333, 333, 333, 556, 537, 278, 333, 333, 365, 556, 834, 834, 834, 611,
    667, 667, 667, 667, 667, 667, 1000, 722, 667, 667, 667, 667, 278, 278, 278, 278,
    722, 722, 778, 778, 778, 778, 778, 584, 778, 722, 722, 722, 722, 667, 667, 611,
    556, 556, 556, 556, 556, 556, 889, 500, 556, 556, 556, 556, 278, 278, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 584, 611, 556, 556, 556, 556, 500, 556, 500,
];

/// Width of codes the encoder never produces.
const DEFAULT_WIDTH: u16 = 556;

/// Rendered but not yet written appearance.
#[derive(Debug, Clone)]
pub struct SignatureAppearance {
    page: ObjectRef,
    rect: Rect,
    font_size: Option<f32>,
    layer0: Object,
    layer2: Object,
}

/// Widget entries for a signature field, with the appearance written.
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetAnnotation {
    /// Page the widget sits on
    pub page: ObjectRef,
    /// `/Rect` as `[llx lly urx ury]`
    pub rect: [f32; 4],
    /// Top-level normal appearance
    pub normal_appearance: ObjectRef,
}

/// Draw a box at `rect` on `page` holding `text`.
///
/// No bounds check is made against the page size.
pub fn render(page: ObjectRef, rect: Rect, text: &str) -> SignatureAppearance {
    let (width, height) = (rect.width.max(0.0), rect.height.max(0.0));
    let lines: Vec<Vec<u8>> = text.lines().map(encode_win_ansi).collect();
    let font_size = fit_font_size(&lines, width, height);

    let layer0 = form_xobject(width, height, Dictionary::new(), b"% DSBlank\n".to_vec());

    let mut fonts = Dictionary::new();
    fonts.insert("F1".to_string(), helvetica());
    let mut resources = Dictionary::new();
    resources.insert("Font".to_string(), Object::Dictionary(fonts));
    let content = match font_size {
        Some(size) => text_content(&lines, size, width, height),
        None => Vec::new(),
    };
    let layer2 = form_xobject(width, height, resources, content);

    log::debug!(
        "Rendered appearance {}x{} at ({}, {}) with {} lines, font size {:?}",
        width,
        height,
        rect.x,
        rect.y,
        lines.len(),
        font_size
    );

    SignatureAppearance {
        page,
        rect,
        font_size,
        layer0,
        layer2,
    }
}

impl SignatureAppearance {
    /// Font size chosen for the text, `None` when nothing is drawn.
    pub fn font_size(&self) -> Option<f32> {
        self.font_size
    }

    /// Description layer (`/n2`).
    pub fn text_layer(&self) -> &Object {
        &self.layer2
    }

    /// Write the form XObjects into `update`.
    pub fn write_into(self, update: &mut IncrementalUpdate<'_>) -> WidgetAnnotation {
        let (width, height) = (self.rect.width.max(0.0), self.rect.height.max(0.0));

        let n0 = update.allocate();
        update.put(n0, self.layer0);
        let n2 = update.allocate();
        update.put(n2, self.layer2);

        let frm = update.allocate();
        update.put(
            frm,
            form_xobject(
                width,
                height,
                xobject_resources(&[("n0", n0), ("n2", n2)]),
                b"q 1 0 0 1 0 0 cm /n0 Do Q\nq 1 0 0 1 0 0 cm /n2 Do Q\n".to_vec(),
            ),
        );

        let normal = update.allocate();
        update.put(
            normal,
            form_xobject(
                width,
                height,
                xobject_resources(&[("FRM", frm)]),
                b"q 1 0 0 1 0 0 cm /FRM Do Q\n".to_vec(),
            ),
        );

        WidgetAnnotation {
            page: self.page,
            rect: self.rect.to_corners(),
            normal_appearance: normal,
        }
    }
}

impl WidgetAnnotation {
    /// Set the widget entries on a field or widget dictionary.
    pub fn apply_to(&self, dict: &mut Dictionary) {
        dict.insert("Type".to_string(), Object::name("Annot"));
        dict.insert("Subtype".to_string(), Object::name("Widget"));
        dict.insert("F".to_string(), Object::Integer(WIDGET_FLAGS));
        dict.insert(
            "Rect".to_string(),
            Object::Array(self.rect.iter().map(|&v| number(v)).collect()),
        );
        dict.insert("P".to_string(), Object::Reference(self.page));
        let mut ap = Dictionary::new();
        ap.insert("N".to_string(), Object::Reference(self.normal_appearance));
        dict.insert("AP".to_string(), Object::Dictionary(ap));
    }
}

fn form_xobject(width: f32, height: f32, resources: Dictionary, content: Vec<u8>) -> Object {
    let mut dict = Dictionary::new();
    dict.insert("Type".to_string(), Object::name("XObject"));
    dict.insert("Subtype".to_string(), Object::name("Form"));
    dict.insert("FormType".to_string(), Object::Integer(1));
    dict.insert(
        "BBox".to_string(),
        Object::Array(vec![number(0.0), number(0.0), number(width), number(height)]),
    );
    dict.insert("Resources".to_string(), Object::Dictionary(resources));
    Object::Stream {
        dict,
        data: bytes::Bytes::from(content),
    }
}

fn xobject_resources(entries: &[(&str, ObjectRef)]) -> Dictionary {
    let xobjects = entries
        .iter()
        .map(|(name, obj_ref)| (name.to_string(), Object::Reference(*obj_ref)))
        .collect();
    let mut resources = Dictionary::new();
    resources.insert("XObject".to_string(), Object::Dictionary(xobjects));
    resources
}

fn helvetica() -> Object {
    let mut font = Dictionary::new();
    font.insert("Type".to_string(), Object::name("Font"));
    font.insert("Subtype".to_string(), Object::name("Type1"));
    font.insert("BaseFont".to_string(), Object::name("Helvetica"));
    font.insert("Encoding".to_string(), Object::name("WinAnsiEncoding"));
    Object::Dictionary(font)
}

/// Integral values as integers, everything else as reals.
fn number(value: f32) -> Object {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        Object::Integer(value as i64)
    } else {
        Object::Real(value as f64)
    }
}

/// Map text to WinAnsi codes. Characters outside Latin-1 become `?`.
fn encode_win_ansi(line: &str) -> Vec<u8> {
    line.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn glyph_width(code: u8) -> f32 {
    let width = match code {
        32..=126 => HELVETICA_WIDTHS[(code - 32) as usize],
        0xA0..=0xFF => HELVETICA_LATIN1_WIDTHS[(code - 0xA0) as usize],
        _ => DEFAULT_WIDTH,
    };
    width as f32
}

/// Width of an encoded line at 1pt.
fn line_width(line: &[u8]) -> f32 {
    line.iter().map(|&c| glyph_width(c)).sum::<f32>() / 1000.0
}

/// Largest size up to 12pt at which every line fits the box.
fn fit_font_size(lines: &[Vec<u8>], width: f32, height: f32) -> Option<f32> {
    let inner_width = width - 2.0 * MARGIN;
    let inner_height = height - 2.0 * MARGIN;
    if lines.is_empty() || inner_width <= 0.0 || inner_height <= 0.0 {
        return None;
    }

    let by_height = inner_height / (lines.len() as f32 * LEADING);
    let widest = lines.iter().map(|l| line_width(l)).fold(0.0f32, f32::max);
    let by_width = if widest > 0.0 { inner_width / widest } else { MAX_FONT_SIZE };

    Some(by_height.min(by_width).clamp(MIN_FONT_SIZE, MAX_FONT_SIZE))
}

fn text_content(lines: &[Vec<u8>], size: f32, width: f32, height: f32) -> Vec<u8> {
    let serializer = ObjectSerializer::compact();
    let baseline = height - MARGIN - size * HELVETICA_ASCENT / 1000.0;

    let mut out = format!(
        "q\n0 0 {} {} re W n\nBT\n/F1 {} Tf\n{} TL\n{} {} Td\n",
        fmt_number(width),
        fmt_number(height),
        fmt_number(size),
        fmt_number(size * LEADING),
        fmt_number(MARGIN),
        fmt_number(baseline)
    )
    .into_bytes();

    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            out.extend_from_slice(b"T* ");
        }
        out.extend_from_slice(&serializer.serialize(&Object::String(line.clone())));
        out.extend_from_slice(b" Tj\n");
    }
    out.extend_from_slice(b"ET\nQ\n");
    out
}

fn fmt_number(value: f32) -> String {
    String::from_utf8_lossy(&ObjectSerializer::compact().serialize(&Object::Real(value as f64)))
        .into_owned()
}
