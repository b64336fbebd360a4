// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Font metrics and character decoding for text extraction.
//
// Only what is needed to place words is read: code-to-Unicode mapping
// (`/ToUnicode`, `/Encoding` with `/Differences`, WinAnsi fallback), glyph
// advances (`/Widths`, `/W`) and the vertical extent (`/FontDescriptor`).

use std::collections::HashMap;

use lopdf::{Dictionary, Document, Object};
use tracing::debug;

use super::objects::{
    lookup, lookup_array, lookup_dict, lookup_name, lookup_number, number, resolve, stream_bytes,
};

/// Upper bound on the codes a single `bfrange` entry may expand to.
const MAX_RANGE_SPAN: u32 = 0x1_0000;

/// One decoded character code.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Glyph {
    pub text: String,
    /// Advance in glyph space (1/1000 em).
    pub width: f64,
    /// Single-byte code 32, which receives word spacing.
    pub is_space: bool,
}

/// Code-to-Unicode table parsed from a `/ToUnicode` CMap stream.
#[derive(Debug, Clone, Default)]
pub(crate) struct ToUnicode {
    map: HashMap<u32, String>,
    code_bytes: usize,
}

enum Token {
    Hex(Vec<u8>),
    ArrayStart,
    ArrayEnd,
    Word(String),
}

fn tokenize(data: &[u8]) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' if data.get(i + 1) == Some(&b'<') => {
                tokens.push(Token::Word("<<".into()));
                i += 2;
            }
            b'<' => {
                let end = data[i..].iter().position(|&b| b == b'>').map_or(data.len(), |p| i + p);
                let digits: Vec<u8> = data[i + 1..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let s = std::str::from_utf8(pair).ok()?;
                        let s = if s.len() == 1 { format!("{s}0") } else { s.to_string() };
                        u8::from_str_radix(&s, 16).ok()
                    })
                    .collect();
                tokens.push(Token::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(Token::ArrayStart);
                i += 1;
            }
            b']' => {
                tokens.push(Token::ArrayEnd);
                i += 1;
            }
            b'%' => {
                while i < data.len() && data[i] != b'\n' && data[i] != b'\r' {
                    i += 1;
                }
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let start = i;
                while i < data.len()
                    && !data[i].is_ascii_whitespace()
                    && !matches!(data[i], b'<' | b'[' | b']' | b'%')
                {
                    i += 1;
                }
                if i == start {
                    i += 1;
                }
                tokens.push(Token::Word(String::from_utf8_lossy(&data[start..i]).into_owned()));
            }
        }
    }
    tokens
}

fn code_value(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, &b| (acc << 8) | u32::from(b))
}

fn utf16_text(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [lo] => u16::from(*lo),
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Add `offset` to the last UTF-16 unit of `base`.
fn offset_utf16(base: &[u8], offset: u32) -> String {
    let mut units: Vec<u16> = base
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [lo] => u16::from(*lo),
            _ => 0,
        })
        .collect();
    if let Some(last) = units.last_mut() {
        *last = last.wrapping_add(offset as u16);
    }
    String::from_utf16_lossy(&units)
}

impl ToUnicode {
    pub fn parse(data: &[u8]) -> Self {
        let tokens = tokenize(data);
        let mut cmap = Self::default();
        let mut i = 0;
        while i < tokens.len() {
            match &tokens[i] {
                Token::Word(w) if w == "begincodespacerange" => {
                    if let Some(Token::Hex(lo)) = tokens.get(i + 1) {
                        cmap.code_bytes = cmap.code_bytes.max(lo.len());
                    }
                    i += 1;
                }
                Token::Word(w) if w == "beginbfchar" => {
                    i += 1;
                    while let (Some(Token::Hex(src)), Some(Token::Hex(dst))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.note_width(src);
                        cmap.map.insert(code_value(src), utf16_text(dst));
                        i += 2;
                    }
                }
                Token::Word(w) if w == "beginbfrange" => {
                    i += 1;
                    while let (Some(Token::Hex(lo)), Some(Token::Hex(hi))) =
                        (tokens.get(i), tokens.get(i + 1))
                    {
                        cmap.note_width(lo);
                        let (lo_v, hi_v) = (code_value(lo), code_value(hi));
                        let span = hi_v.saturating_sub(lo_v).min(MAX_RANGE_SPAN);
                        match tokens.get(i + 2) {
                            Some(Token::Hex(dst)) => {
                                for k in 0..=span {
                                    cmap.map.insert(lo_v + k, offset_utf16(dst, k));
                                }
                                i += 3;
                            }
                            Some(Token::ArrayStart) => {
                                let mut j = i + 3;
                                let mut k = 0;
                                while let Some(Token::Hex(dst)) = tokens.get(j) {
                                    if k <= span {
                                        cmap.map.insert(lo_v + k, utf16_text(dst));
                                    }
                                    k += 1;
                                    j += 1;
                                }
                                // Skip the closing bracket.
                                i = j + 1;
                            }
                            _ => break,
                        }
                    }
                }
                _ => i += 1,
            }
        }
        if cmap.code_bytes == 0 {
            cmap.code_bytes = 1;
        }
        cmap
    }

    fn note_width(&mut self, code: &[u8]) {
        if self.code_bytes == 0 {
            self.code_bytes = code.len();
        }
    }

    pub fn get(&self, code: u32) -> Option<&str> {
        self.map.get(&code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }
}

/// WinAnsiEncoding differs from Latin-1 only in 0x80..=0x9F.
const WIN_ANSI_HIGH: [char; 32] = [
    '€', '\u{FFFD}', '‚', 'ƒ', '„', '…', '†', '‡', 'ˆ', '‰', 'Š', '‹', 'Œ', '\u{FFFD}', 'Ž',
    '\u{FFFD}', '\u{FFFD}', '‘', '’', '“', '”', '•', '–', '—', '˜', '™', 'š', '›', 'œ',
    '\u{FFFD}', 'ž', 'Ÿ',
];

fn win_ansi(code: u8) -> char {
    match code {
        0x80..=0x9F => WIN_ANSI_HIGH[usize::from(code - 0x80)],
        _ => char::from(code),
    }
}

/// Unicode for the glyph names that commonly appear in `/Differences`.
fn glyph_name_to_char(name: &str) -> Option<char> {
    if let Some(hex) = name.strip_prefix("uni") {
        return u32::from_str_radix(hex.get(..4)?, 16).ok().and_then(char::from_u32);
    }
    let mut chars = name.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c);
    }
    let c = match name {
        "space" => ' ',
        "exclam" => '!',
        "quotedbl" => '"',
        "numbersign" => '#',
        "dollar" => '$',
        "percent" => '%',
        "ampersand" => '&',
        "quotesingle" => '\'',
        "parenleft" => '(',
        "parenright" => ')',
        "asterisk" => '*',
        "plus" => '+',
        "comma" => ',',
        "hyphen" | "minus" => '-',
        "period" => '.',
        "slash" => '/',
        "zero" => '0',
        "one" => '1',
        "two" => '2',
        "three" => '3',
        "four" => '4',
        "five" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" => '8',
        "nine" => '9',
        "colon" => ':',
        "semicolon" => ';',
        "less" => '<',
        "equal" => '=',
        "greater" => '>',
        "question" => '?',
        "at" => '@',
        "bracketleft" => '[',
        "backslash" => '\\',
        "bracketright" => ']',
        "underscore" => '_',
        "quoteleft" => '‘',
        "quoteright" => '’',
        "quotedblleft" => '“',
        "quotedblright" => '”',
        "endash" => '–',
        "emdash" => '—',
        "bullet" => '•',
        "ellipsis" => '…',
        "adieresis" => 'ä',
        "odieresis" => 'ö',
        "udieresis" => 'ü',
        "Adieresis" => 'Ä',
        "Odieresis" => 'Ö',
        "Udieresis" => 'Ü',
        "germandbls" => 'ß',
        "eacute" => 'é',
        "egrave" => 'è',
        "agrave" => 'à',
        "ccedilla" => 'ç',
        "fi" => return Some('\u{FB01}'),
        "fl" => return Some('\u{FB02}'),
        _ => return None,
    };
    Some(c)
}

/// Metrics and decoding tables of one font resource.
#[derive(Debug, Clone)]
pub(crate) struct FontMetrics {
    to_unicode: Option<ToUnicode>,
    differences: HashMap<u8, char>,
    /// Composite (`Type0`) fonts use two-byte codes.
    composite: bool,
    first_char: u32,
    widths: Vec<f64>,
    cid_widths: HashMap<u32, f64>,
    default_width: f64,
    /// Vertical extent in glyph space (1/1000 em).
    pub ascent: f64,
    pub descent: f64,
}

impl Default for FontMetrics {
    fn default() -> Self {
        Self {
            to_unicode: None,
            differences: HashMap::new(),
            composite: false,
            first_char: 0,
            widths: Vec::new(),
            cid_widths: HashMap::new(),
            default_width: 500.0,
            ascent: 900.0,
            descent: -200.0,
        }
    }
}

impl FontMetrics {
    /// Read metrics from a `/Font` dictionary.
    pub fn load(doc: &Document, font: &Dictionary) -> Self {
        let mut metrics = Self::default();
        let subtype = lookup_name(doc, font, b"Subtype").unwrap_or_default();
        metrics.composite = subtype == b"Type0";

        if let Some(base) = lookup_name(doc, font, b"BaseFont") {
            let base = String::from_utf8_lossy(base);
            if base.contains("Courier") || base.contains("Mono") {
                metrics.default_width = 600.0;
            }
        }

        if let Some(Object::Stream(stream)) = lookup(doc, font, b"ToUnicode") {
            if let Some(data) = stream_bytes(stream) {
                let cmap = ToUnicode::parse(&data);
                debug!(entries = cmap.len(), "ToUnicode CMap parsed");
                metrics.to_unicode = Some(cmap);
            }
        }

        let descriptor_owner = if metrics.composite {
            let descendant = lookup_array(doc, font, b"DescendantFonts")
                .and_then(|kids| kids.first())
                .and_then(|kid| resolve(doc, kid))
                .and_then(|kid| kid.as_dict().ok());
            if let Some(cid_font) = descendant {
                metrics.load_cid_widths(doc, cid_font);
            }
            descendant
        } else {
            metrics.load_simple_widths(doc, font);
            metrics.load_differences(doc, font);
            Some(font)
        };

        if let Some(descriptor) = descriptor_owner.and_then(|d| lookup_dict(doc, d, b"FontDescriptor")) {
            if let Some(ascent) = lookup_number(doc, descriptor, b"Ascent").filter(|a| *a > 0.0) {
                metrics.ascent = ascent;
            }
            if let Some(descent) = lookup_number(doc, descriptor, b"Descent").filter(|d| *d < 0.0) {
                metrics.descent = descent;
            }
            if !metrics.composite
                && let Some(missing) = lookup_number(doc, descriptor, b"MissingWidth").filter(|w| *w > 0.0)
            {
                metrics.default_width = missing;
            }
        }
        metrics
    }

    fn load_simple_widths(&mut self, doc: &Document, font: &Dictionary) {
        self.first_char = lookup_number(doc, font, b"FirstChar").map_or(0, |v| v.max(0.0) as u32);
        if let Some(widths) = lookup_array(doc, font, b"Widths") {
            self.widths = widths
                .iter()
                .map(|w| resolve(doc, w).and_then(number).unwrap_or(0.0))
                .collect();
        }
    }

    fn load_cid_widths(&mut self, doc: &Document, cid_font: &Dictionary) {
        self.default_width = lookup_number(doc, cid_font, b"DW").unwrap_or(1000.0);
        let Some(w) = lookup_array(doc, cid_font, b"W") else {
            return;
        };
        // Entries are `c [w1 w2 ...]` or `c_first c_last w`.
        let mut i = 0;
        while i < w.len() {
            let Some(first) = resolve(doc, &w[i]).and_then(number) else {
                break;
            };
            let first = first.max(0.0) as u32;
            match w.get(i + 1).and_then(|o| resolve(doc, o)) {
                Some(Object::Array(list)) => {
                    for (k, width) in list.iter().enumerate() {
                        if let Some(width) = resolve(doc, width).and_then(number) {
                            self.cid_widths.insert(first + k as u32, width);
                        }
                    }
                    i += 2;
                }
                Some(last) => {
                    let last = number(last).map_or(first, |l| l.max(0.0) as u32);
                    let width = w.get(i + 2).and_then(|o| resolve(doc, o)).and_then(number);
                    if let Some(width) = width {
                        for cid in first..=last.min(first.saturating_add(MAX_RANGE_SPAN)) {
                            self.cid_widths.insert(cid, width);
                        }
                    }
                    i += 3;
                }
                None => break,
            }
        }
    }

    fn load_differences(&mut self, doc: &Document, font: &Dictionary) {
        let Some(Object::Dictionary(encoding)) = lookup(doc, font, b"Encoding") else {
            return;
        };
        let Some(differences) = lookup_array(doc, encoding, b"Differences") else {
            return;
        };
        let mut code: u32 = 0;
        for item in differences {
            match resolve(doc, item) {
                Some(Object::Name(name)) => {
                    if let (Ok(byte), Some(c)) = (
                        u8::try_from(code),
                        glyph_name_to_char(&String::from_utf8_lossy(name)),
                    ) {
                        self.differences.insert(byte, c);
                    }
                    code += 1;
                }
                Some(other) => {
                    if let Some(n) = number(other) {
                        code = n.max(0.0) as u32;
                    }
                }
                None => {}
            }
        }
    }

    fn width_of(&self, code: u32) -> f64 {
        if self.composite {
            return self.cid_widths.get(&code).copied().unwrap_or(self.default_width);
        }
        code.checked_sub(self.first_char)
            .and_then(|idx| self.widths.get(idx as usize))
            .copied()
            .filter(|w| *w > 0.0)
            .unwrap_or(self.default_width)
    }

    fn text_of(&self, code: u32) -> String {
        if let Some(text) = self.to_unicode.as_ref().and_then(|cmap| cmap.get(code)) {
            return text.to_string();
        }
        if self.composite {
            // Identity-H without a usable CMap: no way to recover text.
            return char::from_u32(code).map(String::from).unwrap_or_default();
        }
        let byte = code as u8;
        match self.differences.get(&byte) {
            Some(c) => c.to_string(),
            None => win_ansi(byte).to_string(),
        }
    }

    /// Split a shown string into glyphs.
    pub fn decode(&self, bytes: &[u8]) -> Vec<Glyph> {
        let step = if self.composite {
            2
        } else {
            self.to_unicode.as_ref().map_or(1, |cmap| cmap.code_bytes.clamp(1, 2))
        };
        bytes
            .chunks(step)
            .map(|chunk| {
                let code = code_value(chunk);
                Glyph {
                    text: self.text_of(code),
                    width: self.width_of(code),
                    is_space: chunk.len() == 1 && code == 32,
                }
            })
            .collect()
    }
}
