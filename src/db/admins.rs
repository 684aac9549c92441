use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{info, warn};

use crate::error::{is_constraint, DbResultExt, LibraryError, Result};
use crate::models::Admin;

const ADMIN_COLUMNS: &str = "id, username, password_hash, created_date, last_login, status";

fn map_admin(row: &Row<'_>) -> rusqlite::Result<Admin> {
    Ok(Admin {
        id: row.get(0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        created_date: row.get(3)?,
        last_login: row.get(4)?,
        status: row.get(5)?,
    })
}

/// Check a username/password pair and stamp `last_login` on success.
///
/// The password is hashed by the `sha2()` SQL function inside the lookup.
/// The lookup and the stamp run in one transaction while the caller holds
/// the connection lock, so concurrent sign-ins of one account are
/// serialized. A mismatch returns [`LibraryError::InvalidCredentials`] and
/// writes nothing.
pub fn authenticate(conn: &Connection, username: &str, password: &str) -> Result<Admin> {
    let tx = conn
        .unchecked_transaction()
        .db_context("failed to start login transaction")?;

    let found = tx
        .query_row(
            &format!(
                "SELECT {ADMIN_COLUMNS} FROM admins
                 WHERE username = ?1 AND password_hash = sha2(?2) AND status = 'ACTIVE'"
            ),
            params![username, password],
            map_admin,
        )
        .optional()
        .db_context("failed to authenticate admin")?;

    let Some(admin) = found else {
        warn!(username, "Authentication failed");
        return Err(LibraryError::InvalidCredentials);
    };

    tx.execute(
        "UPDATE admins SET last_login = CURRENT_TIMESTAMP WHERE id = ?1",
        params![admin.id],
    )
    .db_context("failed to update last login")?;

    let admin = tx
        .query_row(
            &format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?1"),
            params![admin.id],
            map_admin,
        )
        .db_context("failed to reload admin")?;

    tx.commit().db_context("failed to commit login")?;
    info!(username, "Admin authenticated");
    Ok(admin)
}

/// Look up a single admin by primary key.
pub fn fetch_admin(conn: &Connection, id: i64) -> Result<Admin> {
    conn.query_row(
        &format!("SELECT {ADMIN_COLUMNS} FROM admins WHERE id = ?1"),
        params![id],
        map_admin,
    )
    .optional()
    .db_context("failed to load admin")?
    .ok_or(LibraryError::NotFound {
        entity: "Admin",
        id,
    })
}

/// Insert an admin account, hashing the password in SQL.
pub fn create_admin(conn: &Connection, username: &str, password: &str) -> Result<Admin> {
    conn.execute(
        "INSERT INTO admins (username, password_hash, status) VALUES (?1, sha2(?2), 'ACTIVE')",
        params![username, password],
    )
    .map_err(|err| {
        if is_constraint(&err) {
            LibraryError::Duplicate(format!("Admin '{username}' already exists."))
        } else {
            LibraryError::Database {
                action: "failed to insert admin",
                source: err,
            }
        }
    })?;

    fetch_admin(conn, conn.last_insert_rowid())
}

pub fn count_admins(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM admins", [], |row| row.get(0))
        .db_context("failed to count admins")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn correct_password_signs_in_and_stamps_last_login() {
        let db = Database::in_memory();
        db.with_conn(|conn| {
            let created = create_admin(conn, "admin", "admin123")?;
            assert!(created.last_login.is_none());
            assert!(created.is_active());

            let admin = authenticate(conn, "admin", "admin123")?;
            assert_eq!(admin.id, created.id);
            assert!(admin.last_login.is_some());
            assert_eq!(fetch_admin(conn, admin.id)?.last_login, admin.last_login);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn wrong_password_leaves_row_untouched() {
        let db = Database::in_memory();
        db.with_conn(|conn| {
            let created = create_admin(conn, "admin", "admin123")?;
            let err = authenticate(conn, "admin", "wrong-pass").unwrap_err();
            assert!(matches!(err, LibraryError::InvalidCredentials));
            assert_eq!(fetch_admin(conn, created.id)?, created);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn inactive_admin_cannot_sign_in() {
        let db = Database::in_memory();
        db.with_conn(|conn| {
            let created = create_admin(conn, "retired", "admin123")?;
            conn.execute(
                "UPDATE admins SET status = 'INACTIVE' WHERE id = ?1",
                params![created.id],
            )
            .db_context("deactivate")?;
            assert!(matches!(
                authenticate(conn, "retired", "admin123"),
                Err(LibraryError::InvalidCredentials)
            ));
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn duplicate_username_is_reported() {
        let db = Database::in_memory();
        db.with_conn(|conn| {
            create_admin(conn, "admin", "admin123")?;
            let err = create_admin(conn, "admin", "another1").unwrap_err();
            assert!(matches!(err, LibraryError::Duplicate(_)));
            assert_eq!(count_admins(conn)?, 1);
            Ok(())
        })
        .unwrap();
    }
}
