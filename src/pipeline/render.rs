//! Document backend: text-layer extraction and page rasterisation via pdfium.
//!
//! ## Why a trait?
//!
//! Text acquisition only needs two operations from a document library: "give
//! me the embedded text of each page" and "render page N to an image".
//! [`DocumentBackend`] captures exactly that, so the acquisition logic can be
//! exercised against a fake backend without a pdfium shared library.
//!
//! Both operations are blocking. pdfium keeps thread-local state and must not
//! run on Tokio worker threads; callers move them into `spawn_blocking`.

use crate::error::{ContractError, DocumentError};
use crate::pipeline::input::RawDocument;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the pdfium library file or its directory.
pub const PDFIUM_LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";

/// Blocking access to a document's text layer and page images.
pub trait DocumentBackend: Send + Sync {
    /// Embedded text of every page, in page order.
    fn text_layer(&self, doc: &RawDocument) -> Result<Vec<String>, DocumentError>;

    /// Rasterise one page. `page_index` is 0-based.
    fn render_page(
        &self,
        doc: &RawDocument,
        page_index: usize,
        dpi: u32,
        max_pixels: u32,
    ) -> Result<DynamicImage, DocumentError>;
}

/// [`DocumentBackend`] backed by the pdfium library.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    library: Option<PathBuf>,
}

impl PdfiumBackend {
    /// Locate pdfium and verify it can be bound.
    ///
    /// Resolution order: `library` argument, then `PDFIUM_LIB_PATH`, then the
    /// system loader.
    pub fn new(library: Option<PathBuf>) -> Result<Self, ContractError> {
        let library = library.or_else(|| std::env::var_os(PDFIUM_LIB_PATH_ENV).map(PathBuf::from));
        let backend = Self { library };
        backend.bind().map_err(ContractError::PdfiumBindingFailed)?;
        info!(
            "pdfium bound ({})",
            backend
                .library
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "system library".to_string())
        );
        Ok(backend)
    }

    fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match &self.library {
            Some(path) => Pdfium::bind_to_library(library_file(path)),
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|e| format!("{:?}", e))?;
        Ok(Pdfium::new(bindings))
    }

    fn open<'a>(
        pdfium: &'a Pdfium,
        doc: &'a RawDocument,
    ) -> Result<PdfDocument<'a>, DocumentError> {
        pdfium
            .load_pdf_from_byte_slice(&doc.bytes, None)
            .map_err(|e| {
                let err_str = format!("{:?}", e);
                if err_str.contains("Password") || err_str.contains("password") {
                    DocumentError::PasswordProtected { id: doc.id.clone() }
                } else {
                    DocumentError::Unreadable {
                        id: doc.id.clone(),
                        detail: err_str,
                    }
                }
            })
    }

    fn bind_for(&self, doc: &RawDocument) -> Result<Pdfium, DocumentError> {
        self.bind().map_err(|detail| DocumentError::Internal {
            id: doc.id.clone(),
            detail,
        })
    }
}

/// Accept either the library file itself or the directory holding it.
fn library_file(path: &Path) -> PathBuf {
    if path.is_dir() {
        Pdfium::pdfium_platform_library_name_at_path(path)
    } else {
        path.to_path_buf()
    }
}

impl DocumentBackend for PdfiumBackend {
    fn text_layer(&self, doc: &RawDocument) -> Result<Vec<String>, DocumentError> {
        let pdfium = self.bind_for(doc)?;
        let document = Self::open(&pdfium, doc)?;

        let mut pages = Vec::new();
        for (idx, page) in document.pages().iter().enumerate() {
            // A page whose text object cannot be read has no usable text layer;
            // it is not a reason to reject the whole document.
            let text = match page.text() {
                Ok(t) => t.all(),
                Err(e) => {
                    debug!("{}: page {} has no text layer: {:?}", doc.id, idx + 1, e);
                    String::new()
                }
            };
            pages.push(text);
        }

        debug!("{}: text layer read from {} pages", doc.id, pages.len());
        Ok(pages)
    }

    fn render_page(
        &self,
        doc: &RawDocument,
        page_index: usize,
        dpi: u32,
        max_pixels: u32,
    ) -> Result<DynamicImage, DocumentError> {
        let pdfium = self.bind_for(doc)?;
        let document = Self::open(&pdfium, doc)?;
        let rasterise_failed = |detail: String| DocumentError::Internal {
            id: doc.id.clone(),
            detail: format!("rasterisation failed for page {}: {}", page_index + 1, detail),
        };

        let index = u16::try_from(page_index)
            .map_err(|_| rasterise_failed("page index out of range".to_string()))?;
        let pages = document.pages();
        let page = pages
            .get(index)
            .map_err(|e| rasterise_failed(format!("{:?}", e)))?;

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / 72.0)
            .set_maximum_width(max_pixels as i32)
            .set_maximum_height(max_pixels as i32);
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| rasterise_failed(format!("{:?}", e)))?;

        let image = bitmap.as_image();
        debug!(
            "{}: rendered page {} → {}x{} px",
            doc.id,
            page_index + 1,
            image.width(),
            image.height()
        );
        Ok(image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_file_keeps_explicit_file() {
        let p = PathBuf::from("/opt/pdfium/lib/libpdfium.so");
        assert_eq!(library_file(&p), p);
    }

    #[test]
    fn library_file_expands_directory() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = library_file(dir.path());
        assert!(resolved.starts_with(dir.path()));
        assert!(resolved.to_string_lossy().contains("pdfium"));
    }
}
