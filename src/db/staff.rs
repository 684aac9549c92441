use chrono::{Local, NaiveDate};
use rusqlite::{params, Connection, Error as SqlError, Row};
use tracing::{error, info, warn};

use crate::error::{DbResultExt, LibraryError, Result};
use crate::models::{Staff, StaffInput, StaffStatus};
use crate::validation::{sanitize_input, validate_staff};

const STAFF_COLUMNS: &str = "staff_id, name, role, hire_date, status, email, phone";

fn map_staff(row: &Row<'_>) -> rusqlite::Result<Staff> {
    Ok(Staff {
        id: row.get(0)?,
        name: row.get(1)?,
        role: row.get(2)?,
        hire_date: row.get(3)?,
        status: row.get(4)?,
        email: row.get(5)?,
        phone: row.get(6)?,
    })
}

/// All staff ordered by name.
pub fn fetch_staff(conn: &Connection) -> Result<Vec<Staff>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {STAFF_COLUMNS} FROM staff ORDER BY name"))
        .db_context("failed to prepare staff query")?;

    let staff = stmt
        .query_map([], map_staff)
        .db_context("failed to load staff")?
        .collect::<Result<Vec<_>, _>>()
        .db_context("failed to collect staff")?;

    info!(count = staff.len(), "Retrieved staff members");
    Ok(staff)
}

/// Insert a staff member. New hires always start out active regardless of
/// `input.status`.
pub fn create_staff(conn: &Connection, input: &StaffInput) -> Result<Staff> {
    create_staff_on(conn, input, Local::now().date_naive())
}

/// Overwrite every editable field, including status.
pub fn update_staff(conn: &Connection, id: i64, input: &StaffInput) -> Result<Staff> {
    update_staff_on(conn, id, input, Local::now().date_naive())
}

pub(crate) fn create_staff_on(conn: &Connection, input: &StaffInput, today: NaiveDate) -> Result<Staff> {
    let input = prepare(input, today)?;

    conn.execute(
        "INSERT INTO staff (name, role, hire_date, status, email, phone)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            input.name,
            input.role,
            input.hire_date,
            StaffStatus::Active,
            input.email,
            input.phone
        ],
    )
    .inspect_err(|err| error!(error = %err, name = %input.name, "Failed to insert staff member"))
    .db_context("failed to insert staff member")?;

    let id = conn.last_insert_rowid();
    info!(id, name = %input.name, "Staff member added");
    fetch_staff_member(conn, id)
}

pub(crate) fn update_staff_on(
    conn: &Connection,
    id: i64,
    input: &StaffInput,
    today: NaiveDate,
) -> Result<Staff> {
    let input = prepare(input, today)?;

    let updated = conn
        .execute(
            "UPDATE staff SET name = ?1, role = ?2, hire_date = ?3, status = ?4, email = ?5, phone = ?6
             WHERE staff_id = ?7",
            params![
                input.name,
                input.role,
                input.hire_date,
                input.status,
                input.email,
                input.phone,
                id
            ],
        )
        .inspect_err(|err| error!(error = %err, id, "Failed to update staff member"))
        .db_context("failed to update staff member")?;

    if updated == 0 {
        warn!(id, "Update skipped, staff member not found");
        return Err(LibraryError::NotFound {
            entity: "Staff member",
            id,
        });
    }

    info!(id, name = %input.name, "Staff member updated");
    fetch_staff_member(conn, id)
}

pub fn delete_staff(conn: &Connection, id: i64) -> Result<()> {
    let deleted = conn
        .execute("DELETE FROM staff WHERE staff_id = ?1", params![id])
        .inspect_err(|err| error!(error = %err, id, "Failed to delete staff member"))
        .db_context("failed to delete staff member")?;

    if deleted == 0 {
        warn!(id, "Delete skipped, staff member not found");
        Err(LibraryError::NotFound {
            entity: "Staff member",
            id,
        })
    } else {
        info!(id, "Staff member deleted");
        Ok(())
    }
}

/// Number of staff whose status is `ACTIVE`; inactive rows are not counted.
pub fn count_active_staff(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM staff WHERE status = ?1",
        params![StaffStatus::Active],
        |row| row.get(0),
    )
    .db_context("failed to count staff")
}

fn fetch_staff_member(conn: &Connection, id: i64) -> Result<Staff> {
    conn.query_row(
        &format!("SELECT {STAFF_COLUMNS} FROM staff WHERE staff_id = ?1"),
        params![id],
        map_staff,
    )
    .map_err(|err| match err {
        SqlError::QueryReturnedNoRows => LibraryError::NotFound {
            entity: "Staff member",
            id,
        },
        other => LibraryError::Database {
            action: "failed to reload staff member",
            source: other,
        },
    })
}

/// Sanitize free-text fields and turn blank contact details into NULLs.
fn prepare(input: &StaffInput, today: NaiveDate) -> Result<StaffInput> {
    let optional = |value: &Option<String>| {
        value
            .as_deref()
            .map(sanitize_input)
            .filter(|v| !v.is_empty())
    };
    let prepared = StaffInput {
        name: sanitize_input(&input.name),
        role: sanitize_input(&input.role),
        hire_date: input.hire_date,
        email: optional(&input.email),
        phone: optional(&input.phone),
        status: input.status,
    };
    validate_staff(&prepared, today)
        .inspect_err(|err| warn!(error = %err, "Rejected invalid staff member"))?;
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn input(name: &str) -> StaffInput {
        StaffInput {
            name: name.to_string(),
            role: "Cataloguer".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2021, 3, 15).unwrap(),
            email: Some(" ".to_string()),
            phone: None,
            status: StaffStatus::Inactive,
        }
    }

    #[test]
    fn new_staff_start_active_with_blank_contacts_as_null() {
        let db = Database::in_memory();
        let staff = db
            .with_conn(|conn| create_staff_on(conn, &input("Grace Hopper"), today()))
            .unwrap();
        assert!(staff.is_active());
        assert_eq!(staff.email, None);
        assert_eq!(staff.hire_date, NaiveDate::from_ymd_opt(2021, 3, 15).unwrap());
    }

    #[test]
    fn update_overwrites_status_and_changes_active_count() {
        let db = Database::in_memory();
        db.with_conn(|conn| {
            let a = create_staff_on(conn, &input("Grace Hopper"), today())?;
            create_staff_on(conn, &input("Alan Turing"), today())?;
            assert_eq!(count_active_staff(conn)?, 2);

            let updated = update_staff_on(conn, a.id, &input("Grace Hopper"), today())?;
            assert_eq!(updated.status, StaffStatus::Inactive);
            assert_eq!(count_active_staff(conn)?, 1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn listing_is_ordered_by_name() {
        let db = Database::in_memory();
        db.with_conn(|conn| {
            create_staff_on(conn, &input("Zora"), today())?;
            create_staff_on(conn, &input("Amal"), today())?;
            let names: Vec<_> = fetch_staff(conn)?.into_iter().map(|s| s.name).collect();
            assert_eq!(names, vec!["Amal", "Zora"]);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn future_hire_date_is_rejected() {
        let db = Database::in_memory();
        let mut future = input("Time Traveller");
        future.hire_date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
        let err = db
            .with_conn(|conn| create_staff_on(conn, &future, today()))
            .unwrap_err();
        assert!(matches!(err, LibraryError::Validation(_)));
    }

    #[test]
    fn deleting_missing_staff_reports_not_found() {
        let db = Database::in_memory();
        let err = db.with_conn(|conn| delete_staff(conn, 7)).unwrap_err();
        assert!(matches!(err, LibraryError::NotFound { id: 7, .. }));
    }

    #[test]
    fn write_failures_carry_the_action() {
        let db = Database::in_memory();
        let err = db
            .with_conn(|conn| {
                conn.execute("DROP TABLE staff", [])
                    .db_context("drop staff")?;
                create_staff_on(conn, &input("Grace Hopper"), today())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Database {
                action: "failed to insert staff member",
                ..
            }
        ));

        let err = db.with_conn(|conn| delete_staff(conn, 1)).unwrap_err();
        assert!(matches!(
            err,
            LibraryError::Database {
                action: "failed to delete staff member",
                ..
            }
        ));
    }
}
