use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use crate::error::{LibraryError, LibraryResult};
use crate::models::text_hit::{HitRect, TextHit};
use crate::services::pdf_service::{
    check_render_width, collect_hits, normalize_query, raster_extent, render_scale,
    DocumentEngine, DocumentMetadata, RenderedPage,
};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;

struct FakeDocument {
    title: String,
    author: String,
    pages: Vec<String>,
}

/// In-memory engine keyed by path. Registered files are also written to disk
/// so existence checks behave as they would for real documents.
#[derive(Default)]
pub struct FakeEngine {
    documents: HashMap<PathBuf, FakeDocument>,
    unreadable: HashSet<PathBuf>,
    unavailable: bool,
    search_delay: Option<Duration>,
    searched: Mutex<Vec<PathBuf>>,
}

impl FakeEngine {
    pub fn add_file(&mut self, dir: &Path, name: &str, title: &str, pages: &[&str]) -> PathBuf {
        self.add_file_with_author(dir, name, title, "", pages)
    }

    pub fn add_file_with_author(
        &mut self,
        dir: &Path,
        name: &str,
        title: &str,
        author: &str,
        pages: &[&str],
    ) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"%PDF-1.4 fake").unwrap();
        self.documents.insert(
            path.clone(),
            FakeDocument {
                title: title.to_string(),
                author: author.to_string(),
                pages: pages.iter().map(|p| p.to_string()).collect(),
            },
        );
        path
    }

    /// A file that exists on disk but fails to parse.
    pub fn add_unreadable(&mut self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, b"garbage").unwrap();
        self.unreadable.insert(path.clone());
        path
    }

    /// Every call fails as if the native library were missing.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Each search sleeps this long before answering.
    pub fn with_search_delay(mut self, delay: Duration) -> Self {
        self.search_delay = Some(delay);
        self
    }

    pub fn searched_paths(&self) -> Vec<PathBuf> {
        self.searched.lock().unwrap().clone()
    }

    fn document(&self, path: &Path) -> LibraryResult<&FakeDocument> {
        if self.unavailable {
            return Err(LibraryError::EngineUnavailable("fake engine offline".into()));
        }
        if self.unreadable.contains(path) {
            return Err(LibraryError::unreadable(path.display().to_string(), "bad header"));
        }
        self.documents
            .get(path)
            .ok_or_else(|| LibraryError::unreadable(path.display().to_string(), "unknown file"))
    }
}

impl DocumentEngine for FakeEngine {
    fn extract_metadata(&self, path: &Path) -> LibraryResult<DocumentMetadata> {
        let doc = self.document(path)?;
        Ok(DocumentMetadata {
            title: doc.title.clone(),
            author: doc.author.clone(),
            page_count: doc.pages.len(),
            ..DocumentMetadata::default()
        })
    }

    fn page_count(&self, path: &Path) -> LibraryResult<usize> {
        Ok(self.document(path)?.pages.len())
    }

    fn render_page(
        &self,
        path: &Path,
        page_index: i64,
        max_width: u32,
    ) -> LibraryResult<RenderedPage> {
        check_render_width(max_width)?;
        let doc = self.document(path)?;
        let page_count = doc.pages.len();
        if usize::try_from(page_index).map_or(true, |i| i >= page_count) {
            return Err(LibraryError::InvalidPageIndex {
                index: page_index,
                page_count,
            });
        }
        let scale = render_scale(PAGE_WIDTH, max_width);
        Ok(RenderedPage {
            png: Vec::new(),
            scale,
            width: raster_extent(PAGE_WIDTH, scale),
            height: raster_extent(PAGE_HEIGHT, scale),
        })
    }

    fn search(&self, path: &Path, query: &str, max_hits: usize) -> LibraryResult<Vec<TextHit>> {
        self.searched.lock().unwrap().push(path.to_path_buf());
        if let Some(delay) = self.search_delay {
            thread::sleep(delay);
        }
        let Some(query) = normalize_query(query) else {
            return Ok(Vec::new());
        };
        let doc = self.document(path)?;
        let needle = query.to_lowercase();

        collect_hits(doc.pages.len(), max_hits, |page_index| {
            let count = doc.pages[page_index].to_lowercase().matches(&needle).count();
            Ok((0..count)
                .map(|n| HitRect {
                    left: 10.0 * n as f32,
                    top: 20.0,
                    right: 10.0 * n as f32 + 8.0,
                    bottom: 32.0,
                })
                .collect())
        })
    }
}
