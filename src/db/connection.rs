use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::error::{DbResultExt, LibraryError, Result};

use super::admins::{count_admins, create_admin};

/// Where the holder opens its connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbTarget {
    File(PathBuf),
    /// A private in-memory database. Reopening it starts from an empty
    /// schema, which is what the unit tests want.
    Memory,
}

/// Shared handle around the single live connection. Cloning is cheap and
/// every clone talks to the same connection, so a worker thread can take one
/// without borrowing from the UI.
#[derive(Clone)]
pub struct Database {
    target: DbTarget,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl Database {
    /// Build the holder without touching the disk; the first access opens
    /// the connection.
    pub fn open(target: DbTarget) -> Self {
        Self {
            target,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    pub fn in_memory() -> Self {
        Self::open(DbTarget::Memory)
    }

    pub fn target(&self) -> &DbTarget {
        &self.target
    }

    /// Run `f` against the live connection, opening a fresh one first when
    /// none is held. The mutex serializes every caller.
    pub fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let mut guard = self.conn.lock().map_err(|_| LibraryError::Poisoned)?;
        if guard.is_none() {
            let conn = open_connection(&self.target)?;
            if matches!(self.target, DbTarget::File(_)) {
                info!(path = %self.describe_target(), "Database connection established");
            }
            *guard = Some(conn);
        }
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(LibraryError::Poisoned),
        }
    }

    /// Ping the connection, opening it if necessary.
    pub fn test_connection(&self) -> bool {
        match self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .db_context("connection test failed")
        }) {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "Connection test failed");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.conn
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Drop the held connection. The next access reopens it.
    pub fn close(&self) {
        let Ok(mut guard) = self.conn.lock() else {
            return;
        };
        if let Some(conn) = guard.take() {
            match conn.close() {
                Ok(()) => info!("Database connection closed"),
                Err((_, err)) => warn!(error = %err, "Failed to close database connection"),
            }
        }
    }

    pub fn connection_status(&self) -> String {
        if self.is_connected() {
            format!("Connected to: {}", self.describe_target())
        } else {
            "Not connected".to_string()
        }
    }

    fn describe_target(&self) -> String {
        match &self.target {
            DbTarget::File(path) => path.display().to_string(),
            DbTarget::Memory => ":memory:".to_string(),
        }
    }
}

/// Hex-encoded SHA-256, the same digest the `sha2()` SQL function produces.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

fn open_connection(target: &DbTarget) -> Result<Connection> {
    let conn = match target {
        DbTarget::File(path) => {
            ensure_parent_dir(path)?;
            Connection::open(path)
        }
        DbTarget::Memory => Connection::open_in_memory(),
    }
    .map_err(|err| {
        error!(error = %err, "Failed to establish database connection");
        LibraryError::Connection(err)
    })?;

    register_functions(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| {
            error!(error = %err, dir = %parent.display(), "Failed to create data directory");
            LibraryError::Connection(rusqlite::Error::InvalidPath(parent.to_path_buf()))
        })?;
    }
    Ok(())
}

/// Expose `sha2(text)` to SQL so password comparison happens inside the
/// query rather than in application code.
fn register_functions(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "sha2",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let input: String = ctx.get(0)?;
            Ok(hash_password(&input))
        },
    )
    .map_err(LibraryError::Connection)
}

/// Create the three tables if they are missing.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            created_date TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            last_login TEXT,
            status TEXT NOT NULL DEFAULT 'ACTIVE'
        )",
        [],
    )
    .db_context("failed to create admins table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS books (
            book_id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            isbn TEXT NOT NULL UNIQUE,
            quantity INTEGER NOT NULL CHECK (quantity >= 0),
            date_added TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            status TEXT NOT NULL
        )",
        [],
    )
    .db_context("failed to create books table")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS staff (
            staff_id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            role TEXT NOT NULL,
            hire_date TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'ACTIVE',
            email TEXT,
            phone TEXT
        )",
        [],
    )
    .db_context("failed to create staff table")?;

    Ok(())
}

/// Insert the bootstrap admin when the admin table is empty. Returns whether
/// a row was created.
pub fn seed_default_admin(conn: &Connection, username: &str, password: &str) -> Result<bool> {
    if count_admins(conn)? > 0 {
        return Ok(false);
    }

    create_admin(conn, username, password)?;
    info!(username, "Seeded default admin account");
    Ok(true)
}
