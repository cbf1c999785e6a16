//! Local document library: a SQLite catalog of book files with title search,
//! full-text content search and page rendering through PDFium.

pub mod config;
pub mod data;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::LibraryConfig;
pub use data::store::CatalogStore;
pub use error::{LibraryError, LibraryResult};
pub use models::book::{Book, SortKey};
pub use models::scan::ScannedFile;
pub use models::text_hit::{HitRect, TextHit};
pub use services::content_search::{ContentSearchEvent, ContentSearchOutcome, ContentSearchTask};
pub use services::library_service::{ImportSummary, LibraryService};
pub use services::pdf_service::{DocumentEngine, DocumentMetadata, PdfiumEngine, RenderedPage};

use tracing::info;

fn init_store(config: &LibraryConfig) -> LibraryResult<CatalogStore> {
    let mut store = CatalogStore::new(config.database_path());
    store.initialize()?;
    Ok(store)
}

/// Opens the catalog in `config.data_dir` and binds PDFium.
pub fn open_library(config: &LibraryConfig) -> LibraryResult<LibraryService<PdfiumEngine>> {
    let store = init_store(config)?;
    let engine = PdfiumEngine::bind(config.pdfium_library_dir.as_deref())?;
    info!(data_dir = %config.data_dir.display(), "library ready");
    Ok(LibraryService::with_shared_engine(store, engine).with_scanner(config.scanner()))
}
