use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("catalog store is not initialized")]
    NotInitialized,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("already cataloged: {0}")]
    DuplicatePath(String),

    #[error("no book with id {0}")]
    NotFound(i64),

    #[error("invalid page index {index} (document has {page_count} pages)")]
    InvalidPageIndex { index: i64, page_count: usize },

    #[error("render width must be at least one pixel")]
    InvalidRenderWidth,

    #[error("cannot read document {path}: {reason}")]
    DocumentUnreadable { path: String, reason: String },

    #[error("document engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("content search task failed: {0}")]
    TaskFailed(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

pub type LibraryResult<T> = Result<T, LibraryError>;

impl LibraryError {
    pub fn unreadable(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::DocumentUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for failures that belong to one document and must not abort a batch.
    pub fn is_document_failure(&self) -> bool {
        matches!(self, Self::DocumentUnreadable { .. })
    }
}

impl Serialize for LibraryError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
