// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: searchable image PDFs using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use std::path::Path;

use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::ReconciledWord;
use printpdf::{
    BuiltinFont, Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Point, Pt, RawImage,
    RawImageData, RawImageFormat, TextItem, TextRenderingMode, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::raster::PageImage;

/// Average Helvetica advance as a fraction of the font size.
const HELVETICA_AVERAGE_ADVANCE: f64 = 0.5;

fn pt_to_mm(pt: f64) -> Mm {
    Mm((pt * 25.4 / 72.0) as f32)
}

/// One output page: the rendered image and the words to lay over it.
#[derive(Debug, Clone)]
pub struct SearchablePage {
    /// Page width and height in points, as displayed.
    pub size: (f64, f64),
    pub image: PageImage,
    /// Words in the page's display frame.
    pub words: Vec<ReconciledWord>,
}

/// Creates image PDFs with an invisible, selectable text layer.
#[derive(Debug, Default)]
pub struct PdfWriter {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a title for the PDF metadata.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Build one PDF page per entry: the image stretched over the whole page
    /// and one invisible Helvetica run per word, sized to the word's box.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn create_searchable(&self, pages: &[SearchablePage]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(LesewerkError::PdfError("no pages to write".into()));
        }
        let title = self.title.as_deref().unwrap_or("Lesewerk Document");
        info!(title, pages = pages.len(), "Creating searchable PDF");

        let mut doc = PdfDocument::new(title);
        let mut pdf_pages = Vec::with_capacity(pages.len());

        for page in pages {
            let (page_w, page_h) = page.size;
            if page_w <= 0.0 || page_h <= 0.0 {
                return Err(LesewerkError::PdfError(format!(
                    "invalid page size {}x{}",
                    page_w, page_h
                )));
            }

            let rgb = page.image.image.to_rgb8();
            let (px_w, px_h) = rgb.dimensions();
            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: px_w as usize,
                height: px_h as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            // Native size at the render DPI, stretched to fill the page.
            let native_w = f64::from(px_w) * 72.0 / page.image.dpi;
            let native_h = f64::from(px_h) * 72.0 / page.image.dpi;

            let mut ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    scale_x: Some((page_w / native_w) as f32),
                    scale_y: Some((page_h / native_h) as f32),
                    dpi: Some(page.image.dpi as f32),
                    rotate: None,
                },
            }];
            ops.extend(page.words.iter().flat_map(|word| invisible_word(word, page_h)));

            pdf_pages.push(PdfPage::new(pt_to_mm(page_w), pt_to_mm(page_h), ops));
        }

        doc.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(bytes = output.len(), warnings = warnings.len(), "Searchable PDF serialised");
        Ok(output)
    }

    /// Create a searchable PDF and write it directly to a file.
    pub fn write_searchable_to_file(
        &self,
        pages: &[SearchablePage],
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let bytes = self.create_searchable(pages)?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote searchable PDF to {}", path.as_ref().display());
        Ok(())
    }
}

/// Text operations for one word: font size equal to the box height, baseline
/// on the box bottom, stretched horizontally to the box width.
fn invisible_word(word: &ReconciledWord, page_height: f64) -> Vec<Op> {
    let rect = word.rect();
    let text = word.text();
    let chars = text.chars().count();
    if chars == 0 || rect.height() <= 0.0 || rect.width() <= 0.0 {
        return Vec::new();
    }
    let size = rect.height();
    let natural_width = chars as f64 * HELVETICA_AVERAGE_ADVANCE * size;
    let stretch = rect.width() / natural_width * 100.0;

    vec![
        Op::StartTextSection,
        Op::SetTextRenderingMode {
            mode: TextRenderingMode::Invisible,
        },
        Op::SetHorizontalScaling {
            percent: stretch as f32,
        },
        Op::SetTextCursor {
            pos: Point {
                x: Pt(rect.x_min as f32),
                y: Pt((page_height - rect.y_max) as f32),
            },
        },
        Op::SetFontSizeBuiltinFont {
            size: Pt(size as f32),
            font: BuiltinFont::Helvetica,
        },
        Op::WriteTextBuiltinFont {
            items: vec![TextItem::Text(text.to_string())],
            font: BuiltinFont::Helvetica,
        },
        Op::EndTextSection,
    ]
}
