// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory PDF fixtures for tests.

use lopdf::{Dictionary, Document, Object, Stream, dictionary};

/// One page of a fixture document.
#[derive(Default)]
pub(crate) struct FixturePage {
    pub content: &'static str,
    pub rotate: Option<i64>,
    pub crop_box: Option<[i64; 4]>,
    /// Stored as indirect objects.
    pub annotations: Vec<Dictionary>,
    /// Stored directly inside `/Annots`.
    pub inline_annotations: Vec<Dictionary>,
}

impl FixturePage {
    pub fn text(content: &'static str) -> Self {
        Self {
            content,
            ..Self::default()
        }
    }
}

/// Build a PDF whose pages share an A4 media box and a Courier `/F1` font,
/// both inherited from the page tree root. `tree_rotate` is set on the root.
pub(crate) fn build_pdf(pages: Vec<FixturePage>, tree_rotate: Option<i64>) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page.content.as_bytes().to_vec()));
        let mut annots: Vec<Object> = page
            .annotations
            .into_iter()
            .map(|a| doc.add_object(a).into())
            .collect();
        annots.extend(page.inline_annotations.into_iter().map(Object::Dictionary));

        let mut dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if let Some(rotate) = page.rotate {
            dict.set("Rotate", rotate);
        }
        if let Some(crop) = page.crop_box {
            dict.set("CropBox", crop.iter().map(|&v| v.into()).collect::<Vec<Object>>());
        }
        if !annots.is_empty() {
            dict.set("Annots", annots);
        }
        kids.push(doc.add_object(dict).into());
    }

    let mut root = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
    };
    if let Some(rotate) = tree_rotate {
        root.set("Rotate", rotate);
    }
    doc.objects.insert(pages_id, Object::Dictionary(root));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture PDF serialises");
    bytes
}

/// A `/Annot` dictionary with the given subtype and rectangle.
pub(crate) fn annotation(subtype: &str, rect: [f64; 4], contents: &str) -> Dictionary {
    dictionary! {
        "Type" => "Annot",
        "Subtype" => Object::Name(subtype.as_bytes().to_vec()),
        "Rect" => rect.iter().map(|&v| Object::Real(v as f32)).collect::<Vec<Object>>(),
        "Contents" => Object::string_literal(contents),
        "T" => Object::string_literal("Reviewer"),
    }
}

/// Line "Hello World!" in 48pt Courier at (100, 600).
pub(crate) const HELLO_WORLD: &str = "BT /F1 48 Tf 100 600 Td (Hello World!) Tj ET";

/// Route `tracing` output to the test harness; `RUST_LOG` selects levels.
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
