// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-stream interpreter that places every shown glyph in user space and
// groups glyphs into words.
//
// Matrices use the PDF row-vector convention `[a b c d e f]`; a point maps as
// `x' = a*x + c*y + e`, `y' = b*x + d*y + f` and `A x B` applies A first.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, warn};

use lesewerk_core::Rectangle;

use super::font::FontMetrics;
use super::objects::{inherited, lookup, lookup_array, lookup_dict, lookup_name, number, stream_bytes};

type Matrix = [f64; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Nesting limit for form XObjects drawing other forms.
const MAX_FORM_DEPTH: usize = 16;

/// A gap wider than this fraction of the font size starts a new word.
const WORD_GAP: f64 = 0.2;

fn multiply(a: &Matrix, b: &Matrix) -> Matrix {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn transform(x: f64, y: f64, m: &Matrix) -> (f64, f64) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn translation(tx: f64, ty: f64) -> Matrix {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn matrix_from(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = IDENTITY;
    for (slot, operand) in m.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(m)
}

#[derive(Debug, Clone)]
struct GraphicsState {
    ctm: Matrix,
    font: Option<Rc<FontMetrics>>,
    font_size: f64,
    char_spacing: f64,
    word_spacing: f64,
    /// `Tz / 100`.
    horizontal_scaling: f64,
    leading: f64,
    rise: f64,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: IDENTITY,
            font: None,
            font_size: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

/// A glyph placed in user space.
#[derive(Debug, Clone)]
struct PlacedGlyph {
    text: String,
    bbox: Rectangle,
    start: (f64, f64),
    end: (f64, f64),
    /// Font size after all transforms.
    size: f64,
    breaks: bool,
}

/// A word in unclipped user space.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PlacedWord {
    pub text: String,
    pub rect: Rectangle,
}

pub(crate) struct TextExtractor<'a> {
    doc: &'a Document,
    fonts: HashMap<ObjectId, Rc<FontMetrics>>,
    fallback_font: Rc<FontMetrics>,
    stack: Vec<GraphicsState>,
    state: GraphicsState,
    text_matrix: Matrix,
    line_matrix: Matrix,
    glyphs: Vec<PlacedGlyph>,
    depth: usize,
}

impl<'a> TextExtractor<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self {
            doc,
            fonts: HashMap::new(),
            fallback_font: Rc::new(FontMetrics::default()),
            stack: Vec::new(),
            state: GraphicsState::default(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            glyphs: Vec::new(),
            depth: 0,
        }
    }

    /// Interpret one content stream against `resources`.
    pub fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>) {
        let content = match Content::decode(content) {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "content stream could not be decoded, skipping");
                return;
            }
        };
        for operation in &content.operations {
            self.apply(operation, resources);
        }
    }

    fn apply(&mut self, op: &Operation, resources: Option<&'a Dictionary>) {
        let nums: Vec<f64> = op.operands.iter().filter_map(number).collect();
        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = matrix_from(&op.operands) {
                    self.state.ctm = multiply(&m, &self.state.ctm);
                }
            }
            "BT" => {
                self.text_matrix = IDENTITY;
                self.line_matrix = IDENTITY;
            }
            "ET" => {}
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) =
                    (op.operands.first(), op.operands.get(1).and_then(number))
                {
                    self.state.font = Some(self.font(name, resources));
                    self.state.font_size = size;
                }
            }
            "Tc" => self.set(&nums, |s, v| s.char_spacing = v),
            "Tw" => self.set(&nums, |s, v| s.word_spacing = v),
            "Tz" => self.set(&nums, |s, v| s.horizontal_scaling = v / 100.0),
            "TL" => self.set(&nums, |s, v| s.leading = v),
            "Ts" => self.set(&nums, |s, v| s.rise = v),
            "Td" => {
                if let [tx, ty, ..] = nums[..] {
                    self.next_line(tx, ty);
                }
            }
            "TD" => {
                if let [tx, ty, ..] = nums[..] {
                    self.state.leading = -ty;
                    self.next_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_from(&op.operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(0.0, -self.state.leading),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "'" => {
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    self.show(bytes);
                }
            }
            "\"" => {
                if let [aw, ac, ..] = nums[..] {
                    self.state.word_spacing = aw;
                    self.state.char_spacing = ac;
                }
                self.next_line(0.0, -self.state.leading);
                if let Some(Object::String(bytes, _)) = op.operands.get(2) {
                    self.show(bytes);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show(bytes),
                            other => {
                                if let Some(adjust) = number(other) {
                                    let tx = -adjust / 1000.0
                                        * self.state.font_size
                                        * self.state.horizontal_scaling;
                                    self.text_matrix = multiply(&translation(tx, 0.0), &self.text_matrix);
                                }
                            }
                        }
                    }
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = op.operands.first() {
                    self.draw_form(name, resources);
                }
            }
            _ => {}
        }
    }

    fn set(&mut self, nums: &[f64], apply: impl FnOnce(&mut GraphicsState, f64)) {
        if let Some(&v) = nums.first() {
            apply(&mut self.state, v);
        }
    }

    fn next_line(&mut self, tx: f64, ty: f64) {
        self.line_matrix = multiply(&translation(tx, ty), &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn font(&mut self, name: &[u8], resources: Option<&'a Dictionary>) -> Rc<FontMetrics> {
        let doc = self.doc;
        let Some(fonts) = resources.and_then(|r| lookup_dict(doc, r, b"Font")) else {
            debug!(font = %String::from_utf8_lossy(name), "no font resources, using defaults");
            return self.fallback_font.clone();
        };
        let id = match fonts.get(name) {
            Ok(Object::Reference(id)) => Some(*id),
            _ => None,
        };
        if let Some(id) = id
            && let Some(cached) = self.fonts.get(&id)
        {
            return cached.clone();
        }
        let Some(dict) = lookup_dict(doc, fonts, name) else {
            debug!(font = %String::from_utf8_lossy(name), "font resource missing, using defaults");
            return self.fallback_font.clone();
        };
        let metrics = Rc::new(FontMetrics::load(doc, dict));
        if let Some(id) = id {
            self.fonts.insert(id, metrics.clone());
        }
        metrics
    }

    fn show(&mut self, bytes: &[u8]) {
        let font = self.state.font.clone().unwrap_or_else(|| self.fallback_font.clone());
        let fs = self.state.font_size;
        let th = self.state.horizontal_scaling;
        let (ascent, descent) = (font.ascent / 1000.0, font.descent / 1000.0);

        for glyph in font.decode(bytes) {
            let render = [fs * th, 0.0, 0.0, fs, 0.0, self.state.rise];
            let trm = multiply(&multiply(&render, &self.text_matrix), &self.state.ctm);
            let w = glyph.width / 1000.0;

            let corners = [
                transform(0.0, descent, &trm),
                transform(w, descent, &trm),
                transform(0.0, ascent, &trm),
                transform(w, ascent, &trm),
            ];
            let bbox = corners[1..].iter().fold(
                Rectangle::from_corners(corners[0], corners[0]),
                |acc, &p| acc.union(&Rectangle::from_corners(p, p)),
            );

            let breaks = glyph.is_space || glyph.text.trim().is_empty();
            self.glyphs.push(PlacedGlyph {
                start: transform(0.0, 0.0, &trm),
                end: transform(w, 0.0, &trm),
                size: trm[2].hypot(trm[3]),
                bbox,
                breaks,
                text: glyph.text,
            });

            let spacing = if glyph.is_space { self.state.word_spacing } else { 0.0 };
            let tx = (w * fs + self.state.char_spacing + spacing) * th;
            self.text_matrix = multiply(&translation(tx, 0.0), &self.text_matrix);
        }
    }

    fn draw_form(&mut self, name: &[u8], resources: Option<&'a Dictionary>) {
        if self.depth >= MAX_FORM_DEPTH {
            warn!(depth = self.depth, "form XObject nesting too deep, skipping");
            return;
        }
        let doc = self.doc;
        let Some(xobjects) = resources.and_then(|r| lookup_dict(doc, r, b"XObject")) else {
            return;
        };
        let Some(Object::Stream(stream)) = lookup(doc, xobjects, name) else {
            return;
        };
        if lookup_name(doc, &stream.dict, b"Subtype") != Some(b"Form".as_slice()) {
            return;
        }
        let Some(data) = stream_bytes(stream) else {
            warn!(xobject = %String::from_utf8_lossy(name), "form XObject could not be decompressed");
            return;
        };
        let matrix = lookup_array(doc, &stream.dict, b"Matrix")
            .and_then(|m| matrix_from(m))
            .unwrap_or(IDENTITY);
        let form_resources = lookup_dict(doc, &stream.dict, b"Resources").or(resources);

        let saved_depth = self.stack.len();
        self.stack.push(self.state.clone());
        let (text_matrix, line_matrix) = (self.text_matrix, self.line_matrix);
        self.state.ctm = multiply(&matrix, &self.state.ctm);

        self.depth += 1;
        self.run(&data, form_resources);
        self.depth -= 1;

        self.stack.truncate(saved_depth + 1);
        if let Some(saved) = self.stack.pop() {
            self.state = saved;
        }
        self.text_matrix = text_matrix;
        self.line_matrix = line_matrix;
    }

    /// Group the placed glyphs into words in drawing order.
    pub fn into_words(self) -> Vec<PlacedWord> {
        let mut words = Vec::new();
        let mut text = String::new();
        let mut rect: Option<Rectangle> = None;
        let mut last: Option<&PlacedGlyph> = None;

        let mut flush = |text: &mut String, rect: &mut Option<Rectangle>| {
            if let Some(r) = rect.take()
                && !text.is_empty()
            {
                words.push(PlacedWord { text: std::mem::take(text), rect: r });
            }
            text.clear();
        };

        for glyph in &self.glyphs {
            if glyph.breaks {
                flush(&mut text, &mut rect);
                last = None;
                continue;
            }
            if let Some(prev) = last {
                let gap = (glyph.start.0 - prev.end.0).hypot(glyph.start.1 - prev.end.1);
                if gap > WORD_GAP * prev.size.max(glyph.size) {
                    flush(&mut text, &mut rect);
                }
            }
            text.push_str(&glyph.text);
            rect = Some(match rect {
                Some(r) => r.union(&glyph.bbox),
                None => glyph.bbox,
            });
            last = Some(glyph);
        }
        flush(&mut text, &mut rect);
        words
    }
}

/// Words drawn by a page's content streams, in unclipped user space.
pub(crate) fn page_words(doc: &Document, page_id: ObjectId) -> lopdf::Result<Vec<PlacedWord>> {
    let content = doc.get_page_content(page_id)?;
    let resources = inherited(doc, page_id, b"Resources").and_then(|r| r.as_dict().ok());
    let mut extractor = TextExtractor::new(doc);
    extractor.run(&content, resources);
    let words = extractor.into_words();
    debug!(?page_id, words = words.len(), "vector words extracted");
    Ok(words)
}
