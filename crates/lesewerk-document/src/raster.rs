// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rasterization through poppler's `pdftoppm`.

use std::path::Path;
use std::process::Command;

use image::DynamicImage;
use lesewerk_core::config::RasterConfig;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::PageCoordinateSpace;
use tracing::{debug, instrument};

/// A rendered page and the resolution it was rendered at.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub image: DynamicImage,
    pub dpi: f64,
}

impl PageImage {
    /// Top-left pixel frame of the image, tagged with its DPI.
    pub fn space(&self) -> PageCoordinateSpace {
        PageCoordinateSpace::image(self.image.width(), self.image.height(), Some(self.dpi))
    }
}

/// Anything that turns one PDF page into an image.
///
/// Images must cover the page's crop box, upright, so that pixel boxes found
/// on them line up with the page's display frame.
pub trait PageRenderer: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Render one page (1-based) of the file at `pdf_path`.
    fn render_page(&self, pdf_path: &Path, page: u32, dpi: u32) -> Result<PageImage>;
}

/// Renders PDF pages to images with an external `pdftoppm` binary.
#[derive(Debug, Clone)]
pub struct Rasterizer {
    config: RasterConfig,
}

impl Rasterizer {
    pub fn new(config: RasterConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RasterConfig {
        &self.config
    }

    /// Whether the configured binary can be started.
    pub fn is_available(&self) -> bool {
        Command::new(&self.config.pdftoppm_path).arg("-v").output().is_ok()
    }
}

/// Arguments selecting one page at `dpi`, clipped to the crop box.
fn pdftoppm_args(page: u32, dpi: u32) -> Vec<String> {
    let page = page.to_string();
    vec![
        "-f".into(),
        page.clone(),
        "-l".into(),
        page,
        "-r".into(),
        dpi.to_string(),
        "-cropbox".into(),
        "-png".into(),
        "-singlefile".into(),
    ]
}

impl PageRenderer for Rasterizer {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    /// Output goes to a temporary directory removed before returning.
    #[instrument(skip(self, pdf_path), fields(path = %pdf_path.display()))]
    fn render_page(&self, pdf_path: &Path, page: u32, dpi: u32) -> Result<PageImage> {
        let tool = self.config.pdftoppm_path.display().to_string();
        let workdir = tempfile::tempdir()?;
        let prefix = workdir.path().join("page");

        let output = Command::new(&self.config.pdftoppm_path)
            .args(pdftoppm_args(page, dpi))
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|e| LesewerkError::ExternalTool {
                tool: tool.clone(),
                detail: format!("failed to execute: {}", e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LesewerkError::ExternalTool {
                tool,
                detail: format!("exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let png = prefix.with_extension("png");
        let image = image::open(&png).map_err(|e| {
            LesewerkError::Rasterize(format!("cannot load rendered page {}: {}", page, e))
        })?;

        debug!(page, dpi, width = image.width(), height = image.height(), "page rendered");
        Ok(PageImage {
            image,
            dpi: f64::from(dpi),
        })
    }
}

/// Reject an image whose height/width ratio differs from the page's by more
/// than `tolerance`, relative to the page's ratio.
pub fn check_aspect(image: &PageImage, display_size: (f64, f64), tolerance: f64) -> Result<()> {
    let (w, h) = (f64::from(image.image.width()), f64::from(image.image.height()));
    let (page_w, page_h) = display_size;
    if w <= 0.0 || h <= 0.0 || page_w <= 0.0 || page_h <= 0.0 {
        return Err(LesewerkError::Rasterize(format!(
            "empty extent: image {}x{}, page {}x{}",
            w, h, page_w, page_h
        )));
    }
    let image_aspect = h / w;
    let page_aspect = page_h / page_w;
    if (image_aspect / page_aspect - 1.0).abs() > tolerance {
        return Err(LesewerkError::Rasterize(format!(
            "image aspect {:.3} does not match page aspect {:.3}",
            image_aspect, page_aspect
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use lesewerk_core::space::{Origin, Unit};

    use super::*;
    use crate::testing::{FixturePage, HELLO_WORLD, build_pdf};

    fn page_image(w: u32, h: u32) -> PageImage {
        PageImage {
            image: DynamicImage::new_rgb8(w, h),
            dpi: 150.0,
        }
    }

    #[test]
    fn image_space_is_top_left_pixels() {
        let space = page_image(1275, 1650).space();
        assert_eq!(space.origin, Origin::TopLeft);
        assert_eq!(space.unit, Unit::Pixels { dpi: Some(150.0) });
        assert_eq!((space.width, space.height), (1275.0, 1650.0));
    }

    #[test]
    fn aspect_check() {
        assert!(check_aspect(&page_image(1275, 1650), (612.0, 792.0), 0.1).is_ok());
        // Landscape image for a portrait page.
        assert!(matches!(
            check_aspect(&page_image(1650, 1275), (612.0, 792.0), 0.1),
            Err(LesewerkError::Rasterize(_))
        ));
        assert!(check_aspect(&page_image(1650, 1275), (792.0, 612.0), 0.1).is_ok());
    }

    #[test]
    fn renders_the_crop_box() {
        let args = pdftoppm_args(3, 200);
        assert_eq!(&args[..6], ["-f", "3", "-l", "3", "-r", "200"]);
        assert!(args.iter().any(|a| a == "-cropbox"));
    }

    #[test]
    fn missing_binary_is_an_external_tool_error() {
        let r = Rasterizer::new(RasterConfig {
            pdftoppm_path: "/nonexistent/pdftoppm".into(),
            ..RasterConfig::default()
        });
        assert!(!r.is_available());
        assert!(matches!(
            r.render_page(Path::new("missing.pdf"), 1, 72),
            Err(LesewerkError::ExternalTool { .. })
        ));
    }

    #[test]
    fn renders_with_pdftoppm() {
        let r = Rasterizer::new(RasterConfig::default());
        if !r.is_available() {
            eprintln!("pdftoppm not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.pdf");
        std::fs::write(&path, build_pdf(vec![FixturePage::text(HELLO_WORLD)], None)).unwrap();

        let image = r.render_page(&path, 1, 72).unwrap();
        assert_eq!(image.dpi, 72.0);
        assert!((i64::from(image.image.width()) - 595).abs() <= 1);
        assert!((i64::from(image.image.height()) - 842).abs() <= 1);
    }

    #[test]
    fn pdftoppm_output_has_crop_box_size() {
        let r = Rasterizer::new(RasterConfig::default());
        if !r.is_available() {
            eprintln!("pdftoppm not installed, skipping");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cropped.pdf");
        let page = FixturePage {
            crop_box: Some([50, 500, 300, 700]),
            ..FixturePage::text(HELLO_WORLD)
        };
        std::fs::write(&path, build_pdf(vec![page], None)).unwrap();

        let image = r.render_page(&path, 1, 72).unwrap();
        assert!((i64::from(image.image.width()) - 250).abs() <= 1);
        assert!((i64::from(image.image.height()) - 200).abs() <= 1);
    }
}
