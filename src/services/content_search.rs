use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{LibraryError, LibraryResult};
use crate::models::book::Book;
use crate::services::pdf_service::{normalize_query, DocumentEngine};

#[derive(Debug, Clone, PartialEq)]
pub enum ContentSearchEvent {
    Progress { processed: usize, total: usize },
    Matched(Book),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentSearchOutcome {
    pub books: Vec<Book>,
    pub cancelled: bool,
}

fn book_matches<E>(engine: &E, book: &Book, keyword: &str) -> LibraryResult<bool>
where
    E: DocumentEngine + ?Sized,
{
    if !book.file_exists() {
        debug!(id = book.id, path = %book.path, "skipping book with missing file");
        return Ok(false);
    }

    match engine.search(Path::new(&book.path), keyword, 1) {
        Ok(hits) => Ok(!hits.is_empty()),
        Err(e) if e.is_document_failure() => {
            warn!(id = book.id, error = %e, "skipping unreadable book");
            Ok(false)
        }
        Err(LibraryError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(id = book.id, path = %book.path, "file vanished during search");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Opens each candidate in order and keeps those containing `keyword`.
///
/// `cancel` is checked before every book; a cancelled scan returns the matches
/// found so far. Missing and unreadable documents are skipped, any other
/// failure aborts the scan.
pub fn scan_catalog<E, F>(
    engine: &E,
    candidates: Vec<Book>,
    keyword: &str,
    cancel: &AtomicBool,
    mut on_event: F,
) -> LibraryResult<ContentSearchOutcome>
where
    E: DocumentEngine + ?Sized,
    F: FnMut(ContentSearchEvent),
{
    let Some(keyword) = normalize_query(keyword) else {
        return Ok(ContentSearchOutcome::default());
    };

    let total = candidates.len();
    let mut books = Vec::new();
    on_event(ContentSearchEvent::Progress {
        processed: 0,
        total,
    });

    for (index, book) in candidates.into_iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            info!(processed = index, total, "content search cancelled");
            return Ok(ContentSearchOutcome {
                books,
                cancelled: true,
            });
        }

        if book_matches(engine, &book, keyword)? {
            on_event(ContentSearchEvent::Matched(book.clone()));
            books.push(book);
        }
        on_event(ContentSearchEvent::Progress {
            processed: index + 1,
            total,
        });
    }

    info!(total, matched = books.len(), "content search finished");
    Ok(ContentSearchOutcome {
        books,
        cancelled: false,
    })
}

/// A content search running on its own thread.
///
/// Events stream in catalog order; the final outcome arrives once the worker
/// has visited every candidate or observed cancellation. Dropping the task
/// cancels the worker.
pub struct ContentSearchTask {
    id: Uuid,
    cancel: Arc<AtomicBool>,
    events: mpsc::UnboundedReceiver<ContentSearchEvent>,
    outcome: Option<oneshot::Receiver<LibraryResult<ContentSearchOutcome>>>,
}

impl ContentSearchTask {
    pub fn spawn<E>(engine: Arc<E>, candidates: Vec<Book>, keyword: String) -> LibraryResult<Self>
    where
        E: DocumentEngine + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        let cancel = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let worker_cancel = cancel.clone();
        thread::Builder::new()
            .name(format!("content-search-{id}"))
            .spawn(move || {
                let span = tracing::info_span!("content_search", %id);
                let _entered = span.enter();
                let result = scan_catalog(
                    engine.as_ref(),
                    candidates,
                    &keyword,
                    &worker_cancel,
                    |event| {
                        if event_tx.send(event).is_err() {
                            worker_cancel.store(true, Ordering::Relaxed);
                        }
                    },
                );
                let _ = outcome_tx.send(result);
            })?;

        Ok(Self {
            id,
            cancel,
            events: event_rx,
            outcome: Some(outcome_rx),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Asks the worker to stop before its next book.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Next progress or match event, `None` once the worker is done.
    pub async fn next_event(&mut self) -> Option<ContentSearchEvent> {
        self.events.recv().await
    }

    fn take_outcome(
        &mut self,
    ) -> LibraryResult<oneshot::Receiver<LibraryResult<ContentSearchOutcome>>> {
        self.outcome
            .take()
            .ok_or_else(|| LibraryError::TaskFailed(format!("worker {} already joined", self.id)))
    }

    pub async fn finish(mut self) -> LibraryResult<ContentSearchOutcome> {
        let id = self.id;
        self.take_outcome()?
            .await
            .map_err(|_| LibraryError::TaskFailed(format!("worker {id} stopped")))?
    }

    /// Blocking variant of [`finish`](Self::finish) for callers outside a runtime.
    pub fn blocking_finish(mut self) -> LibraryResult<ContentSearchOutcome> {
        let id = self.id;
        self.take_outcome()?
            .blocking_recv()
            .map_err(|_| LibraryError::TaskFailed(format!("worker {id} stopped")))?
    }
}

impl Drop for ContentSearchTask {
    fn drop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}
