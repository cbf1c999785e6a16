use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::data::{migrations, register_text_functions, repository};
use crate::error::{LibraryError, LibraryResult};
use crate::models::book::{Book, BookUpdate, NewBook, SortKey};
use crate::services::settings_service::SettingsStore;

enum Backing {
    File(PathBuf),
    Memory,
}

/// Durable catalog of books plus the settings table.
///
/// Construction does not touch the disk; every operation fails with
/// [`LibraryError::NotInitialized`] until [`CatalogStore::initialize`] succeeds.
pub struct CatalogStore {
    backing: Backing,
    conn: Option<Connection>,
}

impl CatalogStore {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            backing: Backing::File(db_path.into()),
            conn: None,
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backing: Backing::Memory,
            conn: None,
        }
    }

    pub fn db_path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File(path) => Some(path),
            Backing::Memory => None,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.conn.is_some()
    }

    /// Opens the database and creates the schema if it is missing.
    pub fn initialize(&mut self) -> LibraryResult<()> {
        let conn = match &self.backing {
            Backing::File(path) => open_file(path)?,
            Backing::Memory => Connection::open_in_memory().map_err(storage_unavailable)?,
        };
        register_text_functions(&conn).map_err(storage_unavailable)?;
        migrations::run_migrations(&conn).map_err(storage_unavailable)?;
        self.conn = Some(conn);
        debug!("catalog store initialized");
        Ok(())
    }

    fn conn(&self) -> LibraryResult<&Connection> {
        self.conn.as_ref().ok_or(LibraryError::NotInitialized)
    }

    pub fn insert(&self, book: &NewBook) -> LibraryResult<i64> {
        repository::insert_book(self.conn()?, book)
    }

    /// `title_filter` is used as given; callers decide what counts as blank.
    pub fn query(&self, title_filter: Option<&str>, sort: SortKey) -> LibraryResult<Vec<Book>> {
        repository::query_books(self.conn()?, title_filter, sort)
    }

    pub fn get(&self, id: i64) -> LibraryResult<Option<Book>> {
        repository::get_book(self.conn()?, id)
    }

    pub fn update(&self, id: i64, update: &BookUpdate) -> LibraryResult<()> {
        repository::update_book(self.conn()?, id, update)
    }

    /// Removing an id that does not exist is a successful no-op.
    pub fn delete(&self, id: i64) -> LibraryResult<()> {
        let removed = repository::delete_book(self.conn()?, id)?;
        if removed == 0 {
            debug!(id, "delete of absent book ignored");
        }
        Ok(())
    }

    pub fn count(&self) -> LibraryResult<usize> {
        repository::count_books(self.conn()?)
    }
}

impl SettingsStore for CatalogStore {
    fn get_setting(&self, key: &str, default: &str) -> LibraryResult<String> {
        Ok(repository::get_setting(self.conn()?, key)?.unwrap_or_else(|| default.to_string()))
    }

    fn set_setting(&self, key: &str, value: &str) -> LibraryResult<()> {
        repository::set_setting(self.conn()?, key, value)
    }
}

fn open_file(path: &Path) -> LibraryResult<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            LibraryError::StorageUnavailable(format!("{}: {e}", parent.display()))
        })?;
    }
    let conn = Connection::open(path)
        .map_err(|e| LibraryError::StorageUnavailable(format!("{}: {e}", path.display())))?;
    conn.busy_timeout(Duration::from_secs(5))
        .map_err(storage_unavailable)?;
    info!(path = %path.display(), "opened catalog database");
    Ok(conn)
}

fn storage_unavailable(err: impl std::fmt::Display) -> LibraryError {
    LibraryError::StorageUnavailable(err.to_string())
}
