use rusqlite::{params, Connection, Error as SqlError, Row};
use tracing::{error, info, warn};

use crate::error::{is_constraint, DbResultExt, LibraryError, Result};
use crate::models::{Book, BookInput, BookStatus};
use crate::validation::{normalize_isbn, sanitize_input, validate_book};

const BOOK_COLUMNS: &str = "book_id, title, author, isbn, quantity, date_added, status";

fn map_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        author: row.get(2)?,
        isbn: row.get(3)?,
        quantity: row.get(4)?,
        date_added: row.get(5)?,
        status: row.get(6)?,
    })
}

/// Every book ordered by title. This is the listing the books panel shows
/// and re-runs after each mutation.
pub fn fetch_books(conn: &Connection) -> Result<Vec<Book>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY title"))
        .db_context("failed to prepare book query")?;

    let books = stmt
        .query_map([], map_book)
        .db_context("failed to load books")?
        .collect::<Result<Vec<_>, _>>()
        .db_context("failed to collect books")?;

    info!(count = books.len(), "Retrieved books");
    Ok(books)
}

/// Books whose title or author contains `term`. SQLite's LIKE is
/// case-insensitive for ASCII, which matches what people expect when typing
/// into the search bar.
pub fn search_books(conn: &Connection, term: &str) -> Result<Vec<Book>> {
    let pattern = format!("%{term}%");
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {BOOK_COLUMNS} FROM books
             WHERE title LIKE ?1 OR author LIKE ?1
             ORDER BY title"
        ))
        .db_context("failed to prepare book search")?;

    let books = stmt
        .query_map(params![pattern], map_book)
        .db_context("failed to search books")?
        .collect::<Result<Vec<_>, _>>()
        .db_context("failed to collect book search results")?;

    info!(count = books.len(), term, "Book search finished");
    Ok(books)
}

/// Validate, normalize, and insert a book. The ISBN is stored without
/// separators and the status is derived from the quantity.
pub fn create_book(conn: &Connection, input: &BookInput) -> Result<Book> {
    let input = prepare(input)?;
    let status = BookStatus::from_quantity(input.quantity);

    conn.execute(
        "INSERT INTO books (title, author, isbn, quantity, status) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![input.title, input.author, input.isbn, input.quantity, status],
    )
    .map_err(|err| map_unique_isbn(err, &input.isbn, "failed to insert book"))?;

    let id = conn.last_insert_rowid();
    info!(id, title = %input.title, "Book added");
    fetch_book(conn, id)
}

/// Overwrite every editable field of an existing book and recompute its
/// status. A missing id surfaces as [`LibraryError::NotFound`].
pub fn update_book(conn: &Connection, id: i64, input: &BookInput) -> Result<Book> {
    let input = prepare(input)?;
    let status = BookStatus::from_quantity(input.quantity);

    let updated = conn
        .execute(
            "UPDATE books SET title = ?1, author = ?2, isbn = ?3, quantity = ?4, status = ?5
             WHERE book_id = ?6",
            params![input.title, input.author, input.isbn, input.quantity, status, id],
        )
        .map_err(|err| map_unique_isbn(err, &input.isbn, "failed to update book"))?;

    if updated == 0 {
        warn!(id, "Update skipped, book not found");
        return Err(LibraryError::NotFound { entity: "Book", id });
    }

    info!(id, title = %input.title, "Book updated");
    fetch_book(conn, id)
}

/// Hard-delete a book row.
pub fn delete_book(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM books WHERE book_id = ?1", params![id])
        .db_context("failed to delete book")?;

    if deleted == 0 {
        warn!(id, "Delete skipped, book not found");
        Err(LibraryError::NotFound { entity: "Book", id })
    } else {
        info!(id, "Book deleted");
        Ok(())
    }
}

pub fn count_books(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))
        .db_context("failed to count books")
}

fn fetch_book(conn: &Connection, id: i64) -> Result<Book> {
    conn.query_row(
        &format!("SELECT {BOOK_COLUMNS} FROM books WHERE book_id = ?1"),
        params![id],
        map_book,
    )
    .map_err(|err| match err {
        SqlError::QueryReturnedNoRows => LibraryError::NotFound { entity: "Book", id },
        other => LibraryError::Database {
            action: "failed to reload book",
            source: other,
        },
    })
}

fn prepare(input: &BookInput) -> Result<BookInput> {
    let prepared = BookInput {
        title: sanitize_input(&input.title),
        author: sanitize_input(&input.author),
        isbn: normalize_isbn(&input.isbn),
        quantity: input.quantity,
    };
    validate_book(&prepared).inspect_err(|err| warn!(error = %err, "Rejected invalid book"))?;
    Ok(prepared)
}

/// The only constraint a valid book can trip is the unique ISBN, so any
/// constraint failure is reported as a duplicate.
fn map_unique_isbn(err: SqlError, isbn: &str, action: &'static str) -> LibraryError {
    if is_constraint(&err) {
        warn!(isbn, "Book with this ISBN already exists");
        LibraryError::Duplicate(format!("A book with ISBN {isbn} already exists."))
    } else {
        error!(error = %err, action, "Book write failed");
        LibraryError::Database { action, source: err }
    }
}
