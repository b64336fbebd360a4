// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the lesewerk-document crate: vector word
// extraction from a dense text page and searchable-PDF generation.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, Rgb, RgbImage};
use lopdf::{Document, Object, Stream, dictionary};

use lesewerk_core::Rectangle;
use lesewerk_core::space::PageCoordinateSpace;
use lesewerk_core::types::{Provenance, ReadingOrder, ReconciledWord, WordBox};
use lesewerk_document::pdf::writer::SearchablePage;
use lesewerk_document::raster::PageImage;
use lesewerk_document::{PdfReader, PdfWriter};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A Letter page of 60 lines, each drawn with a kerned `TJ` array.
fn dense_text_pdf() -> Vec<u8> {
    let mut content = String::from("BT /F1 10 Tf 12 TL 36 756 Td\n");
    for line in 0..60 {
        content.push_str(&format!(
            "[(Line) -30 ({line}) -280 (of) -280 (dense) -280 (vector) -280 (text,) -280 (kerned.)] TJ T*\n"
        ));
    }
    content.push_str("ET");

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("bench fixture serialises");
    bytes
}

fn searchable_page() -> SearchablePage {
    let display = PageCoordinateSpace::display(612.0, 792.0);
    let words = (0..400)
        .map(|i| {
            let x = 36.0 + (i % 10) as f64 * 54.0;
            let y = 36.0 + (i / 10) as f64 * 18.0;
            ReconciledWord {
                word: WordBox::ocr(format!("w{i}"), Rectangle::new(x, y, x + 48.0, y + 12.0), display, Some(0.9)),
                order: ReadingOrder {
                    line: i / 10,
                    position: i,
                    source: Provenance::Ocr,
                    source_index: i,
                },
            }
        })
        .collect();
    SearchablePage {
        size: (612.0, 792.0),
        image: PageImage {
            image: DynamicImage::ImageRgb8(RgbImage::from_pixel(425, 550, Rgb([245, 245, 245]))),
            dpi: 50.0,
        },
        words,
    }
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Interpret a 60-line content stream into positioned words.
fn bench_vector_words(c: &mut Criterion) {
    let reader = PdfReader::from_bytes(&dense_text_pdf()).expect("bench fixture opens");

    c.bench_function("vector_words (60 lines)", |b| {
        b.iter(|| {
            let words = reader.vector_words(black_box(1));
            black_box(words.map(|w| w.len()).unwrap_or_default());
        });
    });
}

/// Write one image page with a 400-word invisible text layer.
fn bench_searchable_pdf(c: &mut Criterion) {
    let pages = vec![searchable_page()];
    let writer = PdfWriter::new();

    c.bench_function("create_searchable (400 words)", |b| {
        b.iter(|| {
            let bytes = writer.create_searchable(black_box(&pages));
            black_box(bytes.map(|b| b.len()).unwrap_or_default());
        });
    });
}

criterion_group!(benches, bench_vector_words, bench_searchable_pdf);
criterion_main!(benches);
