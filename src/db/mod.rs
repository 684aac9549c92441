//! Persistence module split across logical submodules: the connection
//! holder plus one file per table.

mod admins;
mod books;
mod connection;
mod staff;

pub use admins::{authenticate, count_admins, create_admin, fetch_admin};
pub use books::{count_books, create_book, delete_book, fetch_books, search_books, update_book};
pub use connection::{ensure_schema, hash_password, seed_default_admin, Database, DbTarget};
pub use staff::{count_active_staff, create_staff, delete_staff, fetch_staff, update_staff};

use rusqlite::Connection;

use crate::error::Result;
use crate::models::Stats;

/// Gather the dashboard numbers. These are two separate statements with no
/// snapshot between them.
pub fn fetch_stats(conn: &Connection) -> Result<Stats> {
    Ok(Stats {
        total_books: count_books(conn)?,
        active_staff: count_active_staff(conn)?,
    })
}
