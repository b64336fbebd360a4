// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page document processing: vector words, optional OCR, reconciliation
// and annotation matching, with bounded page parallelism.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lesewerk_core::LesewerkConfig;
use lesewerk_core::config::OcrPolicy;
use lesewerk_core::error::{LesewerkError, Result};
use lesewerk_core::types::{ReconciledPage, WordBox};
use lesewerk_reconcile::{DisplayFrame, Reconciler, match_annotations};
use tempfile::TempDir;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use crate::pdf::reader::{PageInfo, PdfReader};
use crate::pdf::writer::{PdfWriter, SearchablePage};
use crate::raster::{PageImage, PageRenderer, check_aspect};
use crate::scan::WordRecognizer;

/// A file on disk holding the document, for tools that need a path.
struct SourceFile {
    path: PathBuf,
    /// Keeps a materialised copy alive; `None` for the reader's own file.
    _workdir: Option<TempDir>,
}

impl SourceFile {
    fn for_reader(reader: &PdfReader) -> Result<Self> {
        if let Some(path) = reader.source_path() {
            return Ok(Self {
                path: path.to_path_buf(),
                _workdir: None,
            });
        }
        let workdir = tempfile::tempdir()?;
        let path = workdir.path().join("document.pdf");
        std::fs::write(&path, reader.to_bytes()?)?;
        debug!(path = %path.display(), "in-memory document written for rasterization");
        Ok(Self {
            path,
            _workdir: Some(workdir),
        })
    }
}

/// Turns PDF pages into [`ReconciledPage`]s.
///
/// Renderer and recognizer are optional caller-owned handles; without them
/// OCR is skipped even when the policy asks for it.
pub struct DocumentPipeline {
    config: LesewerkConfig,
    reconciler: Reconciler,
    renderer: Option<Arc<dyn PageRenderer>>,
    recognizer: Option<Arc<dyn WordRecognizer>>,
}

impl DocumentPipeline {
    pub fn new(config: LesewerkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            reconciler: Reconciler::new(config.reconcile.clone()),
            config,
            renderer: None,
            recognizer: None,
        })
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_recognizer(mut self, recognizer: Arc<dyn WordRecognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn config(&self) -> &LesewerkConfig {
        &self.config
    }

    fn ocr_handles(&self) -> Option<(&dyn PageRenderer, &dyn WordRecognizer)> {
        match (&self.renderer, &self.recognizer) {
            (Some(renderer), Some(recognizer)) => Some((renderer.as_ref(), recognizer.as_ref())),
            _ => None,
        }
    }

    fn ocr_dpi(&self) -> u32 {
        self.config.raster.ocr_dpi.unwrap_or(self.config.raster.dpi)
    }

    /// Render a page and recognise its words.
    fn render_and_recognize(
        &self,
        pdf_path: &Path,
        info: &PageInfo,
    ) -> Result<Option<(PageImage, Vec<WordBox>)>> {
        let Some((renderer, recognizer)) = self.ocr_handles() else {
            warn!(page = info.page, "OCR requested but no renderer or recognizer configured");
            return Ok(None);
        };
        let image = renderer.render_page(pdf_path, info.page, self.ocr_dpi())?;
        check_aspect(&image, info.display_size(), self.config.raster.aspect_tolerance)?;
        let words = recognizer.recognize_words(&image)?;
        debug!(
            page = info.page,
            renderer = renderer.name(),
            recognizer = recognizer.name(),
            words = words.len(),
            "page recognized"
        );
        Ok(Some((image, words)))
    }

    /// Process one page (1-based).
    pub fn process_page(&self, reader: &PdfReader, page: u32) -> Result<ReconciledPage> {
        match reader.source_path() {
            Some(path) => self.process_page_at(reader, Some(path), page),
            None if self.may_need_file() => {
                let source = SourceFile::for_reader(reader)?;
                self.process_page_at(reader, Some(&source.path), page)
            }
            None => self.process_page_at(reader, None, page),
        }
    }

    fn may_need_file(&self) -> bool {
        self.ocr_handles().is_some() && self.config.ocr_policy != OcrPolicy::Never
    }

    #[instrument(skip(self, reader, pdf_path))]
    fn process_page_at(&self, reader: &PdfReader, pdf_path: Option<&Path>, page: u32) -> Result<ReconciledPage> {
        let info = reader.page_info(page)?;
        let vector = reader.vector_words(page)?;
        let annotations = reader.annotations(page)?;

        let mut ocr = Vec::new();
        let mut ocr_applied = false;
        if self.config.ocr_policy.requires_ocr(vector.len()) {
            match pdf_path {
                Some(path) => {
                    if let Some((_, words)) = self.render_and_recognize(path, &info)? {
                        ocr = words;
                        ocr_applied = true;
                    }
                }
                None => warn!(page, "OCR requested but the document has no file to render"),
            }
        }

        let frame = DisplayFrame::for_reference(&info.user_space(), self.config.reconcile.size_tolerance);
        let words = self.reconciler.reconcile_in(&frame, &vector, &ocr)?;
        let annotations = annotations
            .iter()
            .map(|a| frame.normalize_annotation(a))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        let matches = match_annotations(&annotations, &words, &self.config.annotations);

        info!(
            page,
            vector = vector.len(),
            ocr = ocr.len(),
            words = words.len(),
            annotations = annotations.len(),
            ocr_applied,
            "page reconciled"
        );

        Ok(ReconciledPage {
            page,
            space: frame.space(),
            words,
            annotations,
            matches,
            ocr_applied,
        })
    }

    /// Process every page on tokio's blocking pool, at most
    /// `max_parallel_pages` at a time. Pages come back in page order; the
    /// first failing page fails the whole call.
    #[instrument(skip_all, fields(pages = reader.page_count()))]
    pub async fn process_document(self: Arc<Self>, reader: Arc<PdfReader>) -> Result<Vec<ReconciledPage>> {
        let source = if self.may_need_file() {
            Some(Arc::new(SourceFile::for_reader(&reader)?))
        } else {
            None
        };
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel_pages));
        let mut tasks = JoinSet::new();

        let page_count = reader.page_count() as u32;
        for page in 1..=page_count {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| LesewerkError::Task(e.to_string()))?;
            let pipeline = self.clone();
            let reader = reader.clone();
            let source = source.clone();
            tasks.spawn_blocking(move || {
                let _permit = permit;
                let path = source.as_ref().map(|s| s.path.as_path());
                pipeline.process_page_at(&reader, path, page)
            });
        }

        let mut pages = Vec::with_capacity(page_count as usize);
        while let Some(joined) = tasks.join_next().await {
            let page = joined.map_err(|e| LesewerkError::Task(e.to_string()))??;
            pages.push(page);
        }
        pages.sort_by_key(|p| p.page);

        info!(pages = pages.len(), "document processed");
        Ok(pages)
    }

    /// Rebuild the document as a searchable image PDF: every page is
    /// rendered, recognised, reconciled with its vector words and written
    /// with an invisible text layer.
    #[instrument(skip_all, fields(output = %output.as_ref().display()))]
    pub fn recreate_digital_content(&self, reader: &PdfReader, output: impl AsRef<Path>) -> Result<()> {
        if self.ocr_handles().is_none() {
            return Err(LesewerkError::Configuration(
                "recreating digital content needs a renderer and a recognizer".into(),
            ));
        }
        let source = SourceFile::for_reader(reader)?;

        let mut pages = Vec::with_capacity(reader.page_count());
        for page in 1..=reader.page_count() as u32 {
            let info = reader.page_info(page)?;
            let vector = reader.vector_words(page)?;
            let Some((image, ocr)) = self.render_and_recognize(&source.path, &info)? else {
                return Err(LesewerkError::Configuration("no OCR handles".into()));
            };
            let frame = DisplayFrame::for_reference(&info.user_space(), self.config.reconcile.size_tolerance);
            let words = self.reconciler.reconcile_in(&frame, &vector, &ocr)?;
            pages.push(SearchablePage {
                size: info.display_size(),
                image,
                words,
            });
        }

        PdfWriter::new().write_searchable_to_file(&pages, output)
    }
}
