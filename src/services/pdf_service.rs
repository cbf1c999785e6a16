use std::io::Cursor;
use std::path::Path;
use std::sync::{Arc, Mutex};

use image::{DynamicImage, ImageFormat, RgbaImage};
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{LibraryError, LibraryResult};
use crate::models::text_hit::{HitRect, TextHit};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: String,
    pub subject: String,
    pub keywords: String,
    pub creator: String,
    pub producer: String,
    pub page_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
    pub png: Vec<u8>,
    pub scale: f64,
    pub width: u32,
    pub height: u32,
}

/// Everything that needs to parse a document file.
///
/// Implementations open the document inside each call and release it before
/// returning; no handle is kept between calls.
pub trait DocumentEngine {
    fn supports(&self, format: &str) -> bool {
        format.eq_ignore_ascii_case("pdf")
    }

    fn extract_metadata(&self, path: &Path) -> LibraryResult<DocumentMetadata>;

    fn page_count(&self, path: &Path) -> LibraryResult<usize>;

    /// Renders `page_index` scaled so that its width is `max_width` pixels.
    fn render_page(
        &self,
        path: &Path,
        page_index: i64,
        max_width: u32,
    ) -> LibraryResult<RenderedPage>;

    /// Case-insensitive search, one [`TextHit`] per matching page in page order.
    fn search(&self, path: &Path, query: &str, max_hits: usize) -> LibraryResult<Vec<TextHit>>;
}

/// Rendering targets must be at least one pixel wide.
pub fn check_render_width(max_width: u32) -> LibraryResult<()> {
    if max_width == 0 {
        return Err(LibraryError::InvalidRenderWidth);
    }
    Ok(())
}

/// `max_width / native_width`, or 1.0 for a degenerate page.
pub fn render_scale(native_width: f32, max_width: u32) -> f64 {
    if native_width > 0.0 {
        f64::from(max_width) / f64::from(native_width)
    } else {
        1.0
    }
}

/// Pixel extent of a native dimension rendered at `scale`, never below one pixel.
pub fn raster_extent(native: f32, scale: f64) -> u32 {
    let px = (f64::from(native) * scale).round();
    if px.is_finite() && px >= 1.0 {
        px.min(f64::from(u32::MAX)) as u32
    } else {
        1
    }
}

/// Trimmed query, or `None` when there is nothing to search for.
pub fn normalize_query(query: &str) -> Option<&str> {
    let trimmed = query.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Visits pages from 0 and accumulates their rectangles.
///
/// Stops before the next page once the running rectangle count reaches
/// `max_hits`. The page that reaches the cap is kept whole.
pub fn collect_hits<F>(
    page_count: usize,
    max_hits: usize,
    mut search_page: F,
) -> LibraryResult<Vec<TextHit>>
where
    F: FnMut(usize) -> LibraryResult<Vec<HitRect>>,
{
    let mut hits = Vec::new();
    let mut total = 0usize;

    for page_index in 0..page_count {
        let rects = search_page(page_index)?;
        if rects.is_empty() {
            continue;
        }
        total += rects.len();
        hits.push(TextHit { page_index, rects });
        if total >= max_hits {
            break;
        }
    }

    Ok(hits)
}

/// [`DocumentEngine`] backed by the PDFium library.
///
/// PDFium is process-global and dropping a binding tears the library down for
/// every other binding, so there is at most one engine per process and it
/// lives until exit. Obtain it through [`PdfiumEngine::bind`].
pub struct PdfiumEngine {
    pdfium: Pdfium,
}

static SHARED_ENGINE: Mutex<Option<Arc<PdfiumEngine>>> = Mutex::new(None);

impl PdfiumEngine {
    /// Returns the process-wide engine, binding it on first use.
    ///
    /// The first successful bind searches `library_dir` if given, then the
    /// working directory, then the system library paths. Later calls return
    /// the same engine and ignore `library_dir`.
    pub fn bind(library_dir: Option<&Path>) -> LibraryResult<Arc<Self>> {
        let mut shared = SHARED_ENGINE
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(engine) = shared.as_ref() {
            return Ok(engine.clone());
        }

        let engine = Arc::new(Self {
            pdfium: Pdfium::new(load_bindings(library_dir)?),
        });
        *shared = Some(engine.clone());
        Ok(engine)
    }

    fn open<'a>(&'a self, path: &Path) -> LibraryResult<PdfDocument<'a>> {
        self.pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| unreadable(path, e))
    }
}

fn load_bindings(library_dir: Option<&Path>) -> LibraryResult<Box<dyn PdfiumLibraryBindings>> {
    let mut dirs: Vec<String> = Vec::new();
    if let Some(dir) = library_dir {
        dirs.push(dir.to_string_lossy().to_string());
    }
    dirs.push("./".to_string());

    for dir in &dirs {
        match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
            Ok(bindings) => {
                info!(dir = %dir, "bound PDFium library");
                return Ok(bindings);
            }
            Err(e) => debug!(dir = %dir, error = ?e, "PDFium library not found"),
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| {
        LibraryError::EngineUnavailable(format!("failed to load PDFium library: {e:?}"))
    })?;
    info!("bound system PDFium library");
    Ok(bindings)
}

fn unreadable(path: &Path, err: PdfiumError) -> LibraryError {
    LibraryError::unreadable(path.display().to_string(), format!("{err:?}"))
}

fn pdfium_index(page_index: usize, page_count: usize) -> LibraryResult<PdfPageIndex> {
    PdfPageIndex::try_from(page_index).map_err(|_| LibraryError::InvalidPageIndex {
        index: page_index as i64,
        page_count,
    })
}

impl DocumentEngine for PdfiumEngine {
    fn extract_metadata(&self, path: &Path) -> LibraryResult<DocumentMetadata> {
        let document = self.open(path)?;
        let metadata = document.metadata();
        let tag = |kind: PdfDocumentMetadataTagType| {
            metadata
                .get(kind)
                .map(|t| t.value().trim().to_string())
                .unwrap_or_default()
        };

        Ok(DocumentMetadata {
            title: tag(PdfDocumentMetadataTagType::Title),
            author: tag(PdfDocumentMetadataTagType::Author),
            subject: tag(PdfDocumentMetadataTagType::Subject),
            keywords: tag(PdfDocumentMetadataTagType::Keywords),
            creator: tag(PdfDocumentMetadataTagType::Creator),
            producer: tag(PdfDocumentMetadataTagType::Producer),
            page_count: document.pages().len() as usize,
        })
    }

    fn page_count(&self, path: &Path) -> LibraryResult<usize> {
        let document = self.open(path)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        path: &Path,
        page_index: i64,
        max_width: u32,
    ) -> LibraryResult<RenderedPage> {
        check_render_width(max_width)?;
        let document = self.open(path)?;
        let page_count = document.pages().len() as usize;
        let index = usize::try_from(page_index)
            .ok()
            .filter(|&i| i < page_count)
            .ok_or(LibraryError::InvalidPageIndex {
                index: page_index,
                page_count,
            })?;

        let page = document
            .pages()
            .get(pdfium_index(index, page_count)?)
            .map_err(|e| unreadable(path, e))?;
        let native_width = page.width().value;
        let scale = render_scale(native_width, max_width);
        let target_width = raster_extent(native_width, scale);

        let config = PdfRenderConfig::new().set_target_width(
            Pixels::try_from(target_width).unwrap_or(Pixels::MAX),
        );
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| unreadable(path, e))?;

        let width = bitmap.width() as u32;
        let height = bitmap.height() as u32;
        let rgba = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
            LibraryError::unreadable(path.display().to_string(), "invalid RGBA pixel buffer")
        })?;

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        debug!(path = %path.display(), page_index, width, height, scale, "rendered page");
        Ok(RenderedPage {
            png,
            scale,
            width,
            height,
        })
    }

    fn search(&self, path: &Path, query: &str, max_hits: usize) -> LibraryResult<Vec<TextHit>> {
        let Some(query) = normalize_query(query) else {
            return Ok(Vec::new());
        };

        let document = self.open(path)?;
        let page_count = document.pages().len() as usize;
        let options = PdfSearchOptions::new();

        collect_hits(page_count, max_hits, |page_index| {
            let page = document
                .pages()
                .get(pdfium_index(page_index, page_count)?)
                .map_err(|e| unreadable(path, e))?;
            let page_height = page.height().value;
            let text = page.text().map_err(|e| unreadable(path, e))?;
            let search = text
                .search(query, &options)
                .map_err(|e| unreadable(path, e))?;

            let mut rects = Vec::new();
            for segments in search.iter(PdfSearchDirection::SearchForward) {
                for segment in segments.iter() {
                    let bounds = segment.bounds();
                    // PDFium measures y from the bottom edge of the page
                    rects.push(HitRect {
                        left: bounds.left().value,
                        top: page_height - bounds.top().value,
                        right: bounds.right().value,
                        bottom: page_height - bounds.bottom().value,
                    });
                }
            }
            Ok(rects)
        })
    }
}
