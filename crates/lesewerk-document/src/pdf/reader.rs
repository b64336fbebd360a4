// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open existing documents with `lopdf` and pull out what the
// reconciler needs (page geometry, vector words, annotations, embedded
// images) plus annotation removal.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{AnnotationId, AnnotationKind, AnnotationRecord, WordBox};
use lesewerk_core::{PageCoordinateSpace, Rectangle, Rotation};
use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::objects::{
    inherited, lookup_dict, lookup_name, lookup_number, lookup_text, rectangle, resolve,
    stream_bytes,
};
use super::text::page_words;

/// US Letter, used when a page carries no usable `/MediaBox`.
const FALLBACK_MEDIA_BOX: Rectangle = Rectangle {
    x_min: 0.0,
    y_min: 0.0,
    x_max: 612.0,
    y_max: 792.0,
};

/// Geometry of one page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageInfo {
    /// 1-based page number.
    pub page: u32,
    pub media_box: Rectangle,
    /// Visible region; the media box when `/CropBox` is absent.
    pub crop_box: Rectangle,
    pub rotation: Rotation,
}

impl PageInfo {
    /// The page's PDF user space, shifted to the crop box origin.
    pub fn user_space(&self) -> PageCoordinateSpace {
        PageCoordinateSpace::pdf_user_space(
            self.crop_box.width(),
            self.crop_box.height(),
            self.rotation,
        )
    }

    /// Width and height in points as a viewer shows the page.
    pub fn display_size(&self) -> (f64, f64) {
        self.user_space().display_size(1.0)
    }

    /// Clip a user-space rectangle to the crop box and move it to the crop
    /// box origin.
    fn localize(&self, rect: &Rectangle) -> Option<Rectangle> {
        rect.clamp_to(&self.crop_box)
            .map(|r| r.translate(-self.crop_box.x_min, -self.crop_box.y_min))
    }
}

/// Encoding of an extracted image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmbeddedImageFormat {
    Jpeg,
    Png,
}

/// An image XObject drawn on a page.
#[derive(Debug, Clone)]
pub struct EmbeddedImage {
    /// Resource name, e.g. `Im0`.
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: EmbeddedImageFormat,
    pub data: Vec<u8>,
}

/// Reads an existing PDF file.
///
/// Wraps `lopdf::Document`; all page numbers are 1-based.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Source path, if opened from a file.
    source_path: Option<PathBuf>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Open a PDF from the filesystem.
    ///
    /// Encrypted documents open only when the empty user password decrypts
    /// them, which `lopdf` attempts while loading.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_ref = path.as_ref();
        info!("Opening PDF: {}", path_ref.display());

        let document = Document::load(path_ref).map_err(|err| {
            LesewerkError::PdfError(format!("failed to open {}: {}", path_ref.display(), err))
        })?;
        Self::check_readable(&document)?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self {
            document,
            source_path: Some(path_ref.to_path_buf()),
        })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            LesewerkError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;
        Self::check_readable(&document)?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self {
            document,
            source_path: None,
        })
    }

    fn check_readable(document: &Document) -> Result<()> {
        if document.is_encrypted() && document.get_pages().is_empty() {
            return Err(LesewerkError::PdfError(
                "document is encrypted and the empty password does not open it".into(),
            ));
        }
        Ok(())
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Return the source path if the reader was created via [`PdfReader::open`].
    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    fn page_id(&self, page: u32) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        pages.get(&page).copied().ok_or(LesewerkError::PageOutOfRange {
            page,
            page_count: pages.len(),
        })
    }

    /// Media box, crop box and rotation of `page`, following page-tree
    /// inheritance.
    pub fn page_info(&self, page: u32) -> Result<PageInfo> {
        let page_id = self.page_id(page)?;
        let doc = &self.document;

        let media_box = inherited(doc, page_id, b"MediaBox")
            .and_then(|obj| rectangle(doc, obj))
            .unwrap_or_else(|| {
                warn!(page, "page has no usable /MediaBox, assuming US Letter");
                FALLBACK_MEDIA_BOX
            });
        let crop_box = inherited(doc, page_id, b"CropBox")
            .and_then(|obj| rectangle(doc, obj))
            .and_then(|crop| crop.intersection(&media_box))
            .unwrap_or(media_box);

        let degrees = inherited(doc, page_id, b"Rotate")
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0);
        let rotation = Rotation::from_degrees(degrees).unwrap_or_else(|| {
            warn!(page, degrees, "/Rotate is not a multiple of 90, ignoring");
            Rotation::None
        });

        Ok(PageInfo {
            page,
            media_box,
            crop_box,
            rotation,
        })
    }

    // -- Extraction -----------------------------------------------------------

    /// Words drawn in the page's content streams, in the page's user space.
    #[instrument(skip(self))]
    pub fn vector_words(&self, page: u32) -> Result<Vec<WordBox>> {
        let info = self.page_info(page)?;
        let page_id = self.page_id(page)?;
        let space = info.user_space();

        let placed = page_words(&self.document, page_id).map_err(|err| {
            LesewerkError::PdfError(format!("cannot read content of page {}: {}", page, err))
        })?;
        let total = placed.len();

        let words: Vec<WordBox> = placed
            .into_iter()
            .filter_map(|word| {
                let rect = info.localize(&word.rect)?;
                Some(WordBox::vector(word.text, rect, space))
            })
            .collect();

        if words.len() < total {
            debug!(page, clipped = total - words.len(), "words outside the crop box dropped");
        }
        debug!(page, words = words.len(), "vector words read");
        Ok(words)
    }

    /// Annotations on `page`, in the page's user space. Popups are skipped.
    #[instrument(skip(self))]
    pub fn annotations(&self, page: u32) -> Result<Vec<AnnotationRecord>> {
        let info = self.page_info(page)?;
        let page_id = self.page_id(page)?;
        let doc = &self.document;
        let space = info.user_space();

        let Some(annots) = doc
            .get_object(page_id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|dict| dict.get(b"Annots").ok())
            .and_then(|obj| resolve(doc, obj))
            .and_then(|obj| obj.as_array().ok())
        else {
            return Ok(Vec::new());
        };

        let mut records = Vec::new();
        for (index, entry) in annots.iter().enumerate() {
            let id = match entry {
                Object::Reference((num, generation)) => AnnotationId::Object(*num, *generation),
                _ => AnnotationId::Inline { page, index },
            };
            let Some(dict) = resolve(doc, entry).and_then(|obj| obj.as_dict().ok()) else {
                warn!(page, %id, "annotation is not a dictionary, skipping");
                continue;
            };
            let subtype = lookup_name(doc, dict, b"Subtype")
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .unwrap_or_default();
            if subtype == "Popup" {
                continue;
            }
            let Some(rect) = dict.get(b"Rect").ok().and_then(|obj| rectangle(doc, obj)) else {
                warn!(page, %id, "annotation has no usable /Rect, skipping");
                continue;
            };
            let Some(rect) = info.localize(&rect) else {
                debug!(page, %id, "annotation lies outside the crop box, skipping");
                continue;
            };

            records.push(AnnotationRecord {
                id,
                page,
                kind: AnnotationKind::from_subtype(&subtype),
                rect,
                space,
                contents: lookup_text(doc, dict, b"Contents"),
                subject: lookup_text(doc, dict, b"Subj"),
                author: lookup_text(doc, dict, b"T"),
            });
        }

        debug!(page, annotations = records.len(), "annotations read");
        Ok(records)
    }

    /// Annotations of every page, in page order.
    pub fn all_annotations(&self) -> Result<Vec<AnnotationRecord>> {
        let mut records = Vec::new();
        for page in self.document.get_pages().into_keys() {
            records.extend(self.annotations(page)?);
        }
        Ok(records)
    }

    /// Image XObjects in the page's resources.
    ///
    /// JPEG data is passed through; 8-bit gray or RGB raw images are
    /// re-encoded as PNG. Other encodings are skipped.
    #[instrument(skip(self))]
    pub fn extract_images(&self, page: u32) -> Result<Vec<EmbeddedImage>> {
        let page_id = self.page_id(page)?;
        let doc = &self.document;

        let Some(xobjects) = inherited(doc, page_id, b"Resources")
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|resources| lookup_dict(doc, resources, b"XObject"))
        else {
            return Ok(Vec::new());
        };

        let mut images = Vec::new();
        for (name, entry) in xobjects.iter() {
            let name = String::from_utf8_lossy(name).into_owned();
            let Some(Object::Stream(stream)) = resolve(doc, entry) else {
                continue;
            };
            let dict = &stream.dict;
            if lookup_name(doc, dict, b"Subtype") != Some(b"Image".as_slice()) {
                continue;
            }
            let width = lookup_number(doc, dict, b"Width").unwrap_or(0.0) as u32;
            let height = lookup_number(doc, dict, b"Height").unwrap_or(0.0) as u32;
            let filter = match dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) {
                Some(Object::Name(n)) => Some(n.as_slice()),
                Some(Object::Array(items)) if items.len() == 1 => match &items[0] {
                    Object::Name(n) => Some(n.as_slice()),
                    _ => None,
                },
                _ => None,
            };

            if filter == Some(b"DCTDecode".as_slice()) {
                images.push(EmbeddedImage {
                    name,
                    width,
                    height,
                    format: EmbeddedImageFormat::Jpeg,
                    data: stream.content.clone(),
                });
                continue;
            }

            let bits = lookup_number(doc, dict, b"BitsPerComponent").unwrap_or(8.0);
            let color_space = lookup_name(doc, dict, b"ColorSpace").unwrap_or_default();
            let raw_filter = matches!(filter, None | Some(b"FlateDecode"));
            if !raw_filter || bits != 8.0 {
                debug!(page, image = %name, "unsupported image encoding, skipping");
                continue;
            }
            let Some(pixels) = stream_bytes(stream) else {
                warn!(page, image = %name, "image stream could not be decompressed");
                continue;
            };
            let dynamic = match color_space {
                b"DeviceGray" => ::image::GrayImage::from_raw(width, height, pixels)
                    .map(::image::DynamicImage::ImageLuma8),
                b"DeviceRGB" => ::image::RgbImage::from_raw(width, height, pixels)
                    .map(::image::DynamicImage::ImageRgb8),
                _ => None,
            };
            let Some(dynamic) = dynamic else {
                debug!(page, image = %name, "unsupported color space or short pixel data, skipping");
                continue;
            };
            let mut png = Vec::new();
            dynamic
                .write_to(&mut Cursor::new(&mut png), ::image::ImageFormat::Png)
                .map_err(|err| {
                    LesewerkError::ImageError(format!("failed to encode {} as PNG: {}", name, err))
                })?;
            images.push(EmbeddedImage {
                name,
                width,
                height,
                format: EmbeddedImageFormat::Png,
                data: png,
            });
        }

        debug!(page, images = images.len(), "images extracted");
        Ok(images)
    }

    // -- Output ---------------------------------------------------------------

    /// The document serialised unchanged.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut doc = self.document.clone();
        let mut output = Vec::new();
        doc.save_to(&mut output).map_err(|err| {
            LesewerkError::PdfError(format!("failed to serialise PDF: {}", err))
        })?;
        Ok(output)
    }

    /// A copy of the document with every page's `/Annots` removed.
    #[instrument(skip(self))]
    pub fn without_annotations(&self) -> Result<Vec<u8>> {
        let mut doc = self.document.clone();
        let mut removed = 0usize;
        for page_id in doc.get_pages().into_values() {
            if let Ok(dict) = doc.get_object_mut(page_id).and_then(Object::as_dict_mut)
                && dict.remove(b"Annots").is_some()
            {
                removed += 1;
            }
        }
        let pruned = doc.prune_objects();
        info!(pages_cleaned = removed, objects_pruned = pruned.len(), "Annotations removed");

        let mut output = Vec::new();
        doc.save_to(&mut output).map_err(|err| {
            LesewerkError::PdfError(format!("failed to serialise cleaned PDF: {}", err))
        })?;
        Ok(output)
    }

    /// Write an annotation-free copy of the document to `path`.
    pub fn remove_annotations_and_save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.without_annotations()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote cleaned PDF to {}", path.as_ref().display());
        Ok(())
    }
}
