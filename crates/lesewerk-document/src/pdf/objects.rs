// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Small accessors over `lopdf` objects: reference resolution, numbers, names,
// rectangles, text strings and page-tree inheritance.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use lesewerk_core::Rectangle;

/// Reference chains longer than this are treated as broken.
const MAX_REFERENCE_DEPTH: usize = 32;

/// Follow indirect references until a direct object is reached.
pub(crate) fn resolve<'a>(doc: &'a Document, mut object: &'a Object) -> Option<&'a Object> {
    for _ in 0..MAX_REFERENCE_DEPTH {
        match object {
            Object::Reference(id) => object = doc.get_object(*id).ok()?,
            direct => return Some(direct),
        }
    }
    None
}

/// Resolve `key` in `dict`.
pub(crate) fn lookup<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    resolve(doc, dict.get(key).ok()?)
}

pub(crate) fn lookup_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    match lookup(doc, dict, key)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

pub(crate) fn lookup_number(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    number(lookup(doc, dict, key)?)
}

pub(crate) fn lookup_name<'a>(doc: &'a Document, dict: &'a Dictionary, key: &[u8]) -> Option<&'a [u8]> {
    match lookup(doc, dict, key)? {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

pub(crate) fn lookup_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    match lookup(doc, dict, key)? {
        Object::Array(items) => Some(items),
        _ => None,
    }
}

/// A PDF text string (`/Contents`, `/T`, ...) decoded to UTF-8.
pub(crate) fn lookup_text(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    match lookup(doc, dict, key)? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

/// Numeric value of an integer or real object.
pub(crate) fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// A four-number array as a normalized rectangle.
pub(crate) fn rectangle(doc: &Document, object: &Object) -> Option<Rectangle> {
    let Object::Array(items) = resolve(doc, object)? else {
        return None;
    };
    if items.len() != 4 {
        return None;
    }
    let mut values = [0.0; 4];
    for (slot, item) in values.iter_mut().zip(items) {
        *slot = number(resolve(doc, item)?)?;
    }
    Some(Rectangle::from_corners(
        (values[0], values[1]),
        (values[2], values[3]),
    ))
}

/// Look up a page attribute, walking up the `/Parent` chain for the
/// inheritable ones (`/Resources`, `/MediaBox`, `/CropBox`, `/Rotate`).
pub(crate) fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Some(value) = lookup(doc, node, key) {
            return Some(value);
        }
        node = lookup_dict(doc, node, b"Parent")?;
    }
    None
}

/// Stream payload with its filters applied. Unfiltered streams are returned
/// as stored.
pub(crate) fn stream_bytes(stream: &Stream) -> Option<Vec<u8>> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content().ok()
    } else {
        Some(stream.content.clone())
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, UTF-8 with BOM, otherwise
/// PDFDocEncoding (read as Latin-1).
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    bytes.iter().map(|&b| char::from(b)).collect()
}
