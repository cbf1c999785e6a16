use chrono::NaiveDateTime;
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

use crate::error::LibraryError;
use crate::models::book::{Book, BookUpdate, NewBook, SortKey, TIMESTAMP_FORMAT};

const BOOK_COLUMNS: &str = "id, title, author, path, size_bytes, format, added_at, note";

/// Maps one `books` row, selected with [`BOOK_COLUMNS`], to a [`Book`].
pub fn book_from_row(row: &Row<'_>) -> rusqlite::Result<Book> {
    let added_raw: String = row.get("added_at")?;
    let added_at = NaiveDateTime::parse_from_str(&added_raw, TIMESTAMP_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;

    Ok(Book {
        id: row.get("id")?,
        title: row.get("title")?,
        author: row.get("author")?,
        path: row.get("path")?,
        size_bytes: row.get("size_bytes")?,
        format: row.get("format")?,
        added_at,
        note: row.get("note")?,
    })
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn map_write_error(err: rusqlite::Error, path: &str) -> LibraryError {
    if is_unique_violation(&err) {
        LibraryError::DuplicatePath(path.to_string())
    } else {
        LibraryError::Database(err)
    }
}

pub fn insert_book(conn: &Connection, book: &NewBook) -> Result<i64, LibraryError> {
    conn.execute(
        "INSERT INTO books (title, author, path, size_bytes, format, added_at, note)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            book.title,
            book.author,
            book.path,
            book.size_bytes,
            book.format,
            book.added_at.format(TIMESTAMP_FORMAT).to_string(),
            book.note,
        ],
    )
    .map_err(|e| map_write_error(e, &book.path))?;
    Ok(conn.last_insert_rowid())
}

fn order_clause(sort: SortKey) -> &'static str {
    match sort {
        SortKey::TitleAsc => "ORDER BY title COLLATE UNICASE ASC, id ASC",
        SortKey::AddedDesc => "ORDER BY added_at DESC, id DESC",
        SortKey::AddedAsc => "ORDER BY added_at ASC, id ASC",
    }
}

/// Lists books, optionally keeping only titles containing `title_filter`
/// (case-insensitive, matched literally).
pub fn query_books(
    conn: &Connection,
    title_filter: Option<&str>,
    sort: SortKey,
) -> Result<Vec<Book>, LibraryError> {
    let order = order_clause(sort);
    let books = match title_filter {
        Some(filter) => {
            let sql = format!(
                "SELECT {BOOK_COLUMNS} FROM books
                 WHERE instr(casefold(title), casefold(?1)) > 0 {order}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![filter], book_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
        None => {
            let sql = format!("SELECT {BOOK_COLUMNS} FROM books {order}");
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], book_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(books)
}

pub fn get_book(conn: &Connection, id: i64) -> Result<Option<Book>, LibraryError> {
    let sql = format!("SELECT {BOOK_COLUMNS} FROM books WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let book = stmt.query_row(params![id], book_from_row).optional()?;
    Ok(book)
}

pub fn update_book(conn: &Connection, id: i64, update: &BookUpdate) -> Result<(), LibraryError> {
    let count = conn
        .execute(
            "UPDATE books SET title = ?1, author = ?2, path = ?3, note = ?4 WHERE id = ?5",
            params![update.title, update.author, update.path, update.note, id],
        )
        .map_err(|e| map_write_error(e, &update.path))?;
    if count == 0 {
        return Err(LibraryError::NotFound(id));
    }
    Ok(())
}

pub fn delete_book(conn: &Connection, id: i64) -> Result<usize, LibraryError> {
    let count = conn.execute("DELETE FROM books WHERE id = ?1", params![id])?;
    Ok(count)
}

pub fn count_books(conn: &Connection) -> Result<usize, LibraryError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
}

pub fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, LibraryError> {
    let value = conn
        .query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), LibraryError> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

// Needed for rusqlite optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::migrations::run_migrations;
    use crate::data::register_text_functions;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register_text_functions(&conn).unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn at(raw: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).unwrap()
    }

    fn sample_book(title: &str, path: &str, added: &str) -> NewBook {
        NewBook {
            title: title.to_string(),
            author: String::new(),
            path: path.to_string(),
            size_bytes: 1024,
            format: "pdf".to_string(),
            added_at: at(added),
            note: String::new(),
        }
    }

    fn titles(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.title.as_str()).collect()
    }

    #[test]
    fn test_book_crud() {
        let conn = setup_db();
        let book = sample_book("Alpha", "/x/Alpha.pdf", "2025-01-01T10:00:00");

        let id = insert_book(&conn, &book).unwrap();
        assert!(id > 0);

        let fetched = get_book(&conn, id).unwrap().unwrap();
        assert_eq!(fetched.title, "Alpha");
        assert_eq!(fetched.size_bytes, 1024);
        assert_eq!(fetched.added_at, at("2025-01-01T10:00:00"));

        update_book(
            &conn,
            id,
            &BookUpdate {
                title: "Alpha, 2nd ed.".to_string(),
                author: "A. Author".to_string(),
                path: "/x/Alpha2.pdf".to_string(),
                note: "  keep spacing ".to_string(),
            },
        )
        .unwrap();
        let updated = get_book(&conn, id).unwrap().unwrap();
        assert_eq!(updated.title, "Alpha, 2nd ed.");
        assert_eq!(updated.path, "/x/Alpha2.pdf");
        assert_eq!(updated.note, "  keep spacing ");
        assert_eq!(updated.added_at, fetched.added_at);

        assert_eq!(delete_book(&conn, id).unwrap(), 1);
        assert!(get_book(&conn, id).unwrap().is_none());
        assert_eq!(delete_book(&conn, id).unwrap(), 0);
    }

    #[test]
    fn test_duplicate_path_rejected_without_side_effects() {
        let conn = setup_db();
        insert_book(&conn, &sample_book("a", "/x/a.pdf", "2025-01-01T10:00:00")).unwrap();

        let err = insert_book(&conn, &sample_book("other", "/x/a.pdf", "2025-01-02T10:00:00"))
            .unwrap_err();
        assert!(matches!(err, LibraryError::DuplicatePath(ref p) if p == "/x/a.pdf"));

        let all = query_books(&conn, None, SortKey::TitleAsc).unwrap();
        assert_eq!(titles(&all), vec!["a"]);
    }

    #[test]
    fn test_update_into_existing_path_is_duplicate() {
        let conn = setup_db();
        insert_book(&conn, &sample_book("a", "/x/a.pdf", "2025-01-01T10:00:00")).unwrap();
        let b = insert_book(&conn, &sample_book("b", "/x/b.pdf", "2025-01-01T10:00:00")).unwrap();

        let err = update_book(
            &conn,
            b,
            &BookUpdate {
                title: "b".to_string(),
                author: String::new(),
                path: "/x/a.pdf".to_string(),
                note: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, LibraryError::DuplicatePath(_)));
        assert_eq!(get_book(&conn, b).unwrap().unwrap().path, "/x/b.pdf");
    }

    #[test]
    fn test_update_missing_id_is_not_found() {
        let conn = setup_db();
        let err = update_book(
            &conn,
            42,
            &BookUpdate {
                title: "t".to_string(),
                author: String::new(),
                path: "/x/t.pdf".to_string(),
                note: String::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, LibraryError::NotFound(42)));
    }

    #[test]
    fn test_title_order_is_case_insensitive() {
        let conn = setup_db();
        insert_book(&conn, &sample_book("beta", "/x/beta.pdf", "2025-01-01T10:00:00")).unwrap();
        insert_book(&conn, &sample_book("Gamma", "/x/g.pdf", "2025-01-01T10:00:00")).unwrap();
        insert_book(&conn, &sample_book("Alpha", "/x/Alpha.pdf", "2025-01-01T10:00:00")).unwrap();
        insert_book(&conn, &sample_book("Ärger", "/x/arger.pdf", "2025-01-01T10:00:00"))
            .unwrap();
        insert_book(&conn, &sample_book("ärger", "/x/arger2.pdf", "2025-01-01T10:00:00"))
            .unwrap();

        let books = query_books(&conn, None, SortKey::TitleAsc).unwrap();
        assert_eq!(titles(&books)[..3], ["Alpha", "beta", "Gamma"]);
        // equal under folding: ties resolve by insertion order
        assert_eq!(titles(&books)[3..], ["Ärger", "ärger"]);
    }

    #[test]
    fn test_added_orderings() {
        let conn = setup_db();
        insert_book(&conn, &sample_book("mid", "/x/m.pdf", "2025-02-01T10:00:00")).unwrap();
        insert_book(&conn, &sample_book("old", "/x/o.pdf", "2024-12-31T23:59:59")).unwrap();
        insert_book(&conn, &sample_book("new", "/x/n.pdf", "2025-03-01T08:30:00")).unwrap();

        let desc = query_books(&conn, None, SortKey::AddedDesc).unwrap();
        assert_eq!(titles(&desc), vec!["new", "mid", "old"]);

        let asc = query_books(&conn, None, SortKey::AddedAsc).unwrap();
        assert_eq!(titles(&asc), vec!["old", "mid", "new"]);
    }

    #[test]
    fn test_title_filter_is_literal_substring() {
        let conn = setup_db();
        insert_book(&conn, &sample_book("Rust in Action", "/x/1.pdf", "2025-01-01T10:00:00"))
            .unwrap();
        insert_book(&conn, &sample_book("TRUSTED systems", "/x/2.pdf", "2025-01-01T10:00:00"))
            .unwrap();
        insert_book(&conn, &sample_book("100% Go", "/x/3.pdf", "2025-01-01T10:00:00")).unwrap();
        insert_book(&conn, &sample_book("Python", "/x/4.pdf", "2025-01-01T10:00:00")).unwrap();

        let rust = query_books(&conn, Some("rust"), SortKey::TitleAsc).unwrap();
        assert_eq!(titles(&rust), vec!["Rust in Action", "TRUSTED systems"]);

        let percent = query_books(&conn, Some("%"), SortKey::TitleAsc).unwrap();
        assert_eq!(titles(&percent), vec!["100% Go"]);

        let none = query_books(&conn, Some("haskell"), SortKey::TitleAsc).unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_corrupt_timestamp_is_an_error() {
        let conn = setup_db();
        conn.execute(
            "INSERT INTO books (title, author, path, size_bytes, format, added_at, note)
             VALUES ('bad', '', '/x/bad.pdf', 1, 'pdf', 'yesterday', '')",
            [],
        )
        .unwrap();

        let result = query_books(&conn, None, SortKey::TitleAsc);
        assert!(matches!(result, Err(LibraryError::Database(_))));
    }

    #[test]
    fn test_count_books() {
        let conn = setup_db();
        assert_eq!(count_books(&conn).unwrap(), 0);
        insert_book(&conn, &sample_book("a", "/x/a.pdf", "2025-01-01T10:00:00")).unwrap();
        assert_eq!(count_books(&conn).unwrap(), 1);
    }

    #[test]
    fn test_settings_last_write_wins() {
        let conn = setup_db();
        assert!(get_setting(&conn, "theme").unwrap().is_none());

        set_setting(&conn, "theme", "dark").unwrap();
        set_setting(&conn, "theme", "light").unwrap();
        assert_eq!(get_setting(&conn, "theme").unwrap().as_deref(), Some("light"));
    }
}
