use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::data::store::CatalogStore;
use crate::error::{LibraryError, LibraryResult};
use crate::models::book::{now_timestamp, Book, BookUpdate, NewBook, SortKey};
use crate::models::scan::ScannedFile;
use crate::models::text_hit::TextHit;
use crate::services::content_search::{
    scan_catalog, ContentSearchEvent, ContentSearchOutcome, ContentSearchTask,
};
use crate::services::pdf_service::{
    normalize_query, DocumentEngine, DocumentMetadata, RenderedPage,
};
use crate::services::scanner::Scanner;
use crate::services::settings_service::{SettingsService, SettingsStore};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Orchestrates the catalog store, the scanner and a document engine.
///
/// Holds no document state between calls; every engine call opens and
/// releases its own document. Preferences go to the catalog's settings table
/// unless another [`SettingsStore`] is supplied with [`with_settings`](Self::with_settings).
pub struct LibraryService<E> {
    store: CatalogStore,
    engine: Arc<E>,
    scanner: Scanner,
    settings: Option<Box<dyn SettingsStore + Send>>,
}

impl<E: DocumentEngine> LibraryService<E> {
    pub fn new(store: CatalogStore, engine: E) -> Self {
        Self::with_shared_engine(store, Arc::new(engine))
    }

    pub fn with_shared_engine(store: CatalogStore, engine: Arc<E>) -> Self {
        Self {
            store,
            engine,
            scanner: Scanner::default(),
            settings: None,
        }
    }

    pub fn with_scanner(mut self, scanner: Scanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_settings<S>(mut self, settings: S) -> Self
    where
        S: SettingsStore + Send + 'static,
    {
        self.settings = Some(Box::new(settings));
        self
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn engine(&self) -> &Arc<E> {
        &self.engine
    }

    pub fn scanner(&self) -> &Scanner {
        &self.scanner
    }

    pub fn settings(&self) -> SettingsService<&dyn SettingsStore> {
        let store: &dyn SettingsStore = match &self.settings {
            Some(custom) => &**custom,
            None => &self.store,
        };
        SettingsService::new(store)
    }

    /// Catalog records in `sort` order. A blank `title_filter` lists everything.
    pub fn list_books(&self, sort: SortKey, title_filter: &str) -> LibraryResult<Vec<Book>> {
        let filter = title_filter.trim();
        let filter = (!filter.is_empty()).then_some(filter);
        self.store.query(filter, sort)
    }

    pub fn count_books(&self) -> LibraryResult<usize> {
        self.store.count()
    }

    pub fn get_book(&self, id: i64) -> LibraryResult<Option<Book>> {
        self.store.get(id)
    }

    fn read_metadata(&self, file: &ScannedFile) -> LibraryResult<Option<DocumentMetadata>> {
        if !self.engine.supports(&file.format) {
            return Ok(None);
        }
        match self.engine.extract_metadata(Path::new(&file.path)) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e @ (LibraryError::DocumentUnreadable { .. } | LibraryError::EngineUnavailable(_))) => {
                warn!(path = %file.path, error = %e, "cataloging without metadata");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Catalogs one scanned file and returns its id, or `None` if the path is
    /// already cataloged.
    pub fn add_book_from_scanned(&self, file: &ScannedFile) -> LibraryResult<Option<i64>> {
        let metadata = self.read_metadata(file)?.unwrap_or_default();

        let title = match metadata.title.trim() {
            "" => fallback_title(&file.path),
            title => title.to_string(),
        };
        let book = NewBook {
            title,
            author: metadata.author.trim().to_string(),
            path: file.path.clone(),
            size_bytes: file.size_bytes,
            format: file.format.clone(),
            added_at: now_timestamp(),
            note: String::new(),
        };

        match self.store.insert(&book) {
            Ok(id) => {
                info!(id, path = %book.path, title = %book.title, "cataloged book");
                Ok(Some(id))
            }
            Err(LibraryError::DuplicatePath(path)) => {
                debug!(path = %path, "already cataloged");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Scans `folder` recursively and catalogs every supported file in path order.
    pub fn add_folder(&self, folder: impl AsRef<Path>) -> LibraryResult<ImportSummary> {
        let mut files = self.scanner.scan_folder(folder.as_ref());
        files.sort_by(|a, b| a.path.cmp(&b.path));

        let mut summary = ImportSummary::default();
        for file in &files {
            match self.add_book_from_scanned(file)? {
                Some(_) => summary.added += 1,
                None => summary.skipped += 1,
            }
        }

        info!(
            folder = %folder.as_ref().display(),
            added = summary.added,
            skipped = summary.skipped,
            "folder import finished"
        );
        Ok(summary)
    }

    /// Replaces the editable fields of a record. Title, author and path are
    /// trimmed; the note is stored as given.
    pub fn update_book(
        &self,
        id: i64,
        title: &str,
        author: &str,
        path: &str,
        note: &str,
    ) -> LibraryResult<()> {
        let update = BookUpdate {
            title: title.trim().to_string(),
            author: author.trim().to_string(),
            path: path.trim().to_string(),
            note: note.to_string(),
        };
        if update.title.is_empty() {
            return Err(LibraryError::InvalidRecord("title must not be empty".into()));
        }
        if update.path.is_empty() {
            return Err(LibraryError::InvalidRecord("path must not be empty".into()));
        }

        self.store.update(id, &update)?;
        debug!(id, "updated book");
        Ok(())
    }

    /// Removes the record only; the file on disk is left alone.
    pub fn delete_book(&self, id: i64) -> LibraryResult<()> {
        self.store.delete(id)
    }

    pub fn search_books_by_content(&self, keyword: &str, sort: SortKey) -> LibraryResult<Vec<Book>> {
        let outcome =
            self.search_books_by_content_with(keyword, sort, &AtomicBool::new(false), |_| {})?;
        Ok(outcome.books)
    }

    pub fn search_books_by_content_with<F>(
        &self,
        keyword: &str,
        sort: SortKey,
        cancel: &AtomicBool,
        on_event: F,
    ) -> LibraryResult<ContentSearchOutcome>
    where
        F: FnMut(ContentSearchEvent),
    {
        let Some(keyword) = normalize_query(keyword) else {
            return Ok(ContentSearchOutcome::default());
        };
        let candidates = self.list_books(sort, "")?;
        scan_catalog(self.engine.as_ref(), candidates, keyword, cancel, on_event)
    }

    pub fn render_page(
        &self,
        path: impl AsRef<Path>,
        page_index: i64,
        max_width: u32,
    ) -> LibraryResult<RenderedPage> {
        self.engine.render_page(path.as_ref(), page_index, max_width)
    }

    pub fn search_document(
        &self,
        path: impl AsRef<Path>,
        query: &str,
        max_hits: usize,
    ) -> LibraryResult<Vec<TextHit>> {
        self.engine.search(path.as_ref(), query, max_hits)
    }

    pub fn extract_metadata(&self, path: impl AsRef<Path>) -> LibraryResult<DocumentMetadata> {
        self.engine.extract_metadata(path.as_ref())
    }
}

impl<E> LibraryService<E>
where
    E: DocumentEngine + Send + Sync + 'static,
{
    /// Runs a content search over a snapshot of the catalog on a worker thread.
    pub fn start_content_search(
        &self,
        keyword: &str,
        sort: SortKey,
    ) -> LibraryResult<ContentSearchTask> {
        let candidates = match normalize_query(keyword) {
            Some(_) => self.list_books(sort, "")?,
            None => Vec::new(),
        };
        ContentSearchTask::spawn(self.engine.clone(), candidates, keyword.to_string())
    }
}

fn fallback_title(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| path.to_string())
}
